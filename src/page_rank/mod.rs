//! PageRank over partitioned collections, in an index-based and a join-based shape.

use crate::error::{Error, Result};
use serde_derive::{Deserialize, Serialize};

mod algorithm;
mod driver;
mod zipf_graph_gen;

pub use algorithm::{page_rank, page_rank_join, page_rank_join_self, PageRankRun, RoundStats};
pub use driver::{
    run, run_join_page_rank_edge_per_line, run_page_rank_edge_per_line,
    run_page_rank_generated, run_page_rank_join_generated, RunOptions, RunReport,
};
pub use zipf_graph_gen::{ZipfGraph, ZipfGraphGen};

pub const DAMPENING: f64 = 0.85;

pub type PageId = usize;
pub type Rank = f64;
pub type OutgoingLinks = Vec<PageId>;
pub type OutgoingLinksRank = (OutgoingLinks, Rank);
pub type LinkedPage = (PageId, OutgoingLinks);
pub type RankedPage = (PageId, Rank);

/// A link from page `src` to page `tgt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagePageLink {
    pub src: PageId,
    pub tgt: PageId,
}

/// Rank contribution for `page`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageRankPair {
    pub page: PageId,
    pub rank: Rank,
}

fn parse_page_id(field: &str, line: &str) -> Result<PageId> {
    let invalid = |reason: &str| Error::InputFormat {
        line: line.to_string(),
        reason: reason.to_string(),
    };
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid("page ids must be non-negative integers"));
    }
    field.parse().map_err(|_| invalid("page id out of range"))
}

/// Parses an edge line `"src tgt"`: two non-negative integers separated by exactly one space.
pub fn parse_edge(line: &str) -> Result<PagePageLink> {
    let (src, tgt) = line.split_once(' ').ok_or_else(|| Error::InputFormat {
        line: line.to_string(),
        reason: "expected \"src tgt\"".to_string(),
    })?;
    Ok(PagePageLink {
        src: parse_page_id(src, line)?,
        tgt: parse_page_id(tgt, line)?,
    })
}

/// Formats a rank with six significant digits, switching to exponent notation for very small
/// or large values and dropping trailing zeros, like C's `%g`.
pub fn format_rank(rank: Rank) -> String {
    if rank == 0.0 || !rank.is_finite() {
        return format!("{}", rank);
    }
    let scientific = format!("{:.5e}", rank);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some(parts) => parts,
        None => return scientific,
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let trim = |s: &str| -> String {
        if s.contains('.') {
            s.trim_end_matches('0').trim_end_matches('.').to_string()
        } else {
            s.to_string()
        }
    };
    if !(-4..6).contains(&exponent) {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", trim(mantissa), sign, exponent.abs())
    } else {
        let decimals = (5 - exponent) as usize;
        trim(&format!("{:.*}", decimals, rank))
    }
}
