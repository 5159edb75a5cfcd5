use rand::distributions::WeightedIndex;
use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::error::{Error, Result};
use crate::page_rank::{OutgoingLinks, PageId};
use crate::utils::random::get_rng_for_index;

/// Parameters of the random web graph: out-degrees are normally distributed and link targets
/// follow a Zipf-like distribution, so a few pages collect most of the links.
#[derive(Debug, Clone, PartialEq)]
pub struct ZipfGraphGen {
    /// Mean number of outgoing links per page.
    pub size_mean: f64,
    /// Variance of the number of outgoing links per page.
    pub size_var: f64,
    pub link_scale: f64,
    pub link_exponent: f64,
}

impl Default for ZipfGraphGen {
    fn default() -> Self {
        ZipfGraphGen {
            size_mean: 10.0,
            size_var: 4.0,
            link_scale: 1.0,
            link_exponent: 0.5,
        }
    }
}

impl ZipfGraphGen {
    /// Prepares the distributions for a graph of `num_pages` pages.
    pub fn for_pages(&self, num_pages: usize) -> Result<ZipfGraph> {
        let size_dist = Normal::new(self.size_mean, self.size_var.sqrt()).map_err(|e| {
            Error::InvalidConfig(format!(
                "out-degree distribution (mean {}, variance {}): {}",
                self.size_mean, self.size_var, e
            ))
        })?;
        let link_dist = if num_pages == 0 {
            None
        } else {
            let weights = (1..=num_pages)
                .map(|k| 1.0 / (k as f64 + self.link_scale).powf(self.link_exponent));
            Some(WeightedIndex::new(weights).map_err(|e| {
                Error::InvalidConfig(format!(
                    "link distribution (scale {}, exponent {}): {}",
                    self.link_scale, self.link_exponent, e
                ))
            })?)
        };
        Ok(ZipfGraph {
            size_dist,
            link_dist,
        })
    }
}

/// Sampler of outgoing links for a graph of fixed size.
#[derive(Debug, Clone)]
pub struct ZipfGraph {
    size_dist: Normal<f64>,
    link_dist: Option<WeightedIndex<f64>>,
}

impl ZipfGraph {
    /// Sorted targets of one page; targets may repeat.
    pub fn generate_outgoing<R: Rng>(&self, rng: &mut R) -> OutgoingLinks {
        let link_dist = match &self.link_dist {
            Some(dist) => dist,
            None => return Vec::new(),
        };
        let degree = self.size_dist.sample(rng).max(0.0) as usize;
        let mut targets: Vec<PageId> = (0..degree).map(|_| link_dist.sample(rng)).collect();
        targets.sort_unstable();
        targets
    }

    /// Outgoing links of page `index`, reproducible for a given seed.
    pub fn outgoing(&self, seed: u64, index: usize) -> OutgoingLinks {
        self.generate_outgoing(&mut get_rng_for_index(seed, index))
    }
}
