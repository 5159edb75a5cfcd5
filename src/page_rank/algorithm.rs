use std::time::{Duration, Instant};

use crate::error::Result;
use crate::page_rank::{
    LinkedPage, OutgoingLinks, OutgoingLinksRank, PageId, PageRankPair, Rank, RankedPage,
    DAMPENING,
};
use crate::partitioner::Partitioner;
use crate::rdd::{Dia, LocationDetection, PairRdd, Rdd};
use crate::serializable_traits::Data;

/// Measurements taken after one round.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundStats {
    pub iteration: usize,
    /// Time since the first round started.
    pub elapsed: Duration,
    /// Sum of all ranks after the round.
    pub mass: Rank,
}

/// Final ranks of a run and the measurements of every round.
pub struct PageRankRun<T: Data> {
    pub ranks: Dia<T>,
    pub rounds: Vec<RoundStats>,
}

// Splits the rank of a page evenly over its targets; a page without links contributes nothing.
fn contributions(outs: OutgoingLinks, rank: Rank) -> impl Iterator<Item = (PageId, Rank)> {
    let share = if outs.is_empty() {
        0.0
    } else {
        rank / outs.len() as f64
    };
    outs.into_iter().map(move |tgt| (tgt, share))
}

// Forces the ranks of a finished round and measures it. The ranks are cached; the mass sum is
// one extra read of them.
fn finish_round<T: Data>(
    ranks: &Dia<T>,
    iteration: usize,
    start: Instant,
    rank_of: fn(&T) -> Rank,
) -> Result<RoundStats> {
    ranks.keep();
    ranks.execute()?;
    let elapsed = start.elapsed();
    log::info!("step {}, time: {} s", iteration, elapsed.as_secs_f64());
    let mass = ranks.map(move |r| rank_of(&r)).sum()?;
    log::debug!("step {}, rank mass: {}", iteration, mass);
    Ok(RoundStats {
        iteration,
        elapsed,
        mass,
    })
}

/// Index-based PageRank: `links` holds the outgoing links of page `i` at position `i`.
///
/// Ranks start at `1 / num_pages`; every round pairs links and ranks by position, spreads each
/// rank over its targets and sums the contributions by target index.
pub fn page_rank(
    links: &Dia<OutgoingLinks>,
    num_pages: usize,
    iterations: usize,
) -> Result<PageRankRun<Rank>> {
    let context = links.get_context();
    let num_pages_f = num_pages as f64;

    let mut ranks: Dia<Rank> = context
        .generate(num_pages, move |_| 1.0 / num_pages_f)
        .collapse();

    let start = Instant::now();
    let mut rounds = Vec::with_capacity(iterations);
    for iter in 0..iterations {
        let outs_rank = links.zip(&ranks);
        let contribs = outs_rank.flat_map(|(outs, rank): OutgoingLinksRank| {
            Box::new(contributions(outs, rank).map(|(page, rank)| PageRankPair { page, rank }))
                as Box<dyn Iterator<Item = PageRankPair>>
        });
        ranks = contribs
            .reduce_to_index(
                |p: &PageRankPair| p.page,
                |p1, p2| PageRankPair {
                    page: p1.page,
                    rank: p1.rank + p2.rank,
                },
                num_pages,
                PageRankPair { page: 0, rank: 0.0 },
            )
            .map(move |p| DAMPENING * p.rank + (1.0 - DAMPENING) / num_pages_f)
            .collapse()
            .cache();
        rounds.push(finish_round(&ranks, iter, start, |r| *r)?);
    }

    Ok(PageRankRun { ranks, rounds })
}

fn join_contributions(
    links: &Dia<LinkedPage>,
    ranks: &Dia<RankedPage>,
    location: LocationDetection,
) -> Dia<(PageId, Rank)> {
    links
        .inner_join(
            location,
            ranks,
            |lp: &LinkedPage| lp.0,
            |rp: &RankedPage| rp.0,
            |lp: &LinkedPage, rp: &RankedPage| (lp.1.clone(), rp.1),
        )
        .flat_map(|(outs, rank): OutgoingLinksRank| {
            Box::new(contributions(outs, rank)) as Box<dyn Iterator<Item = (PageId, Rank)>>
        })
}

/// Join-based PageRank over links keyed by a dense page index.
///
/// Ranks start at `1 / num_pages` and are reduced back onto the index range of the pages, so
/// with location detection both join inputs stay where they are in every round.
pub fn page_rank_join(
    links: &Dia<LinkedPage>,
    num_pages: usize,
    iterations: usize,
    location: LocationDetection,
) -> Result<PageRankRun<RankedPage>> {
    let context = links.get_context();
    let num_pages_f = num_pages as f64;
    let by_page = Partitioner::index_range(num_pages, context.num_workers());

    let mut ranks: Dia<RankedPage> = context
        .generate(num_pages, move |page| (page, 1.0 / num_pages_f))
        .collapse();

    let start = Instant::now();
    let mut rounds = Vec::with_capacity(iterations);
    for iter in 0..iterations {
        ranks = join_contributions(links, &ranks, location)
            .reduce_pair_using_partitioner(|r1, r2| r1 + r2, by_page.clone())
            .map_values(move |rank| DAMPENING * rank + (1.0 - DAMPENING) / num_pages_f)
            .collapse()
            .cache();
        rounds.push(finish_round(&ranks, iter, start, |rp| rp.1)?);
    }

    Ok(PageRankRun { ranks, rounds })
}

/// Join-based PageRank over links keyed by arbitrary page ids.
///
/// Every page with outgoing links starts at rank `1.0` and ranks are not normalised:
/// `rank = d * incoming + (1 - d)`. From the second round on, ranks are hash partitioned like
/// the links, so with location detection only the first round shuffles.
pub fn page_rank_join_self(
    links: &Dia<LinkedPage>,
    iterations: usize,
    location: LocationDetection,
) -> Result<PageRankRun<RankedPage>> {
    let mut ranks: Dia<RankedPage> = links.map(|lp: LinkedPage| (lp.0, 1.0));

    let start = Instant::now();
    let mut rounds = Vec::with_capacity(iterations);
    for iter in 0..iterations {
        ranks = join_contributions(links, &ranks, location)
            .reduce_pair(|r1, r2| r1 + r2)
            .map_values(|rank| DAMPENING * rank + (1.0 - DAMPENING))
            .collapse()
            .cache();
        rounds.push(finish_round(&ranks, iter, start, |rp| rp.1)?);
    }

    Ok(PageRankRun { ranks, rounds })
}
