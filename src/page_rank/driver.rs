use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::context::Context;
use crate::error::{Error, Result};
use crate::page_rank::{
    format_rank, page_rank, page_rank_join, page_rank_join_self, parse_edge, LinkedPage,
    OutgoingLinks, PagePageLink, PageId, Rank, RankedPage, RoundStats, ZipfGraphGen,
};
use crate::rdd::{Dia, LocationDetection, Rdd};
use crate::shuffle::Traffic;
use crate::utils::random::random_seed;

/// What to compute: the four benchmark modes are the combinations of `generate` and `join`.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Edge files or directories; when generating, the single entry is the page count.
    pub inputs: Vec<String>,
    pub generate: bool,
    pub join: bool,
    pub location: LocationDetection,
    /// Output pattern for `"page: rank"` lines; without one the ranks are only computed.
    pub output: Option<String>,
    pub iterations: usize,
    pub graph: ZipfGraphGen,
    /// Seed of the generated graph, random when unset.
    pub seed: Option<u64>,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            inputs: Vec::new(),
            generate: false,
            join: false,
            location: LocationDetection::Enabled,
            output: None,
            iterations: 10,
            graph: ZipfGraphGen::default(),
            seed: None,
        }
    }
}

/// Outcome of one benchmark run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub benchmark: &'static str,
    /// Detection setting of the join shapes; `None` for the index shapes.
    pub detection: Option<LocationDetection>,
    pub pages: usize,
    pub edges: usize,
    pub iterations: usize,
    pub elapsed: Duration,
    pub traffic: Traffic,
    pub workers: usize,
    pub rounds: Vec<RoundStats>,
    /// Written output files in partition order.
    pub outputs: Vec<PathBuf>,
}

impl RunReport {
    pub fn result_line(&self) -> String {
        let detection = match self.detection {
            Some(location) => format!(" detection={}", location),
            None => String::new(),
        };
        format!(
            "RESULT benchmark={}{} iterations={} pages={} edges={} time={:.3} traffic={} workers={}",
            self.benchmark,
            detection,
            self.iterations,
            self.pages,
            self.edges,
            self.elapsed.as_secs_f64(),
            self.traffic.remote_bytes,
            self.workers
        )
    }

    fn emit(self, context: &Context) -> Self {
        log::info!("FINISHED PAGERANK COMPUTATION");
        log::info!("#pages: {}", self.pages);
        log::info!("#edges: {}", self.edges);
        log::info!("#iterations: {}", self.iterations);
        log::info!("time: {:.3} s, traffic: {}", self.elapsed.as_secs_f64(), self.traffic);
        context.emit_result(self.result_line());
        self
    }
}

/// Runs the benchmark mode selected by `options`.
pub fn run(context: &Arc<Context>, options: &RunOptions) -> Result<RunReport> {
    let output = options.output.as_deref().filter(|o| !o.is_empty());
    match (options.generate, options.join) {
        (false, false) => {
            run_page_rank_edge_per_line(context, &options.inputs, output, options.iterations)
        }
        (false, true) => run_join_page_rank_edge_per_line(
            context,
            &options.inputs,
            output,
            options.iterations,
            options.location,
        ),
        (true, join) => {
            let num_pages = parse_page_count(&options.inputs)?;
            let seed = options.seed.unwrap_or_else(random_seed);
            log::info!("generating {} pages with seed {}", num_pages, seed);
            if join {
                run_page_rank_join_generated(
                    context,
                    num_pages,
                    &options.graph,
                    seed,
                    output,
                    options.iterations,
                    options.location,
                )
            } else {
                run_page_rank_generated(
                    context,
                    num_pages,
                    &options.graph,
                    seed,
                    output,
                    options.iterations,
                )
            }
        }
    }
}

fn parse_page_count(inputs: &[String]) -> Result<usize> {
    match inputs {
        [count] => count.parse().map_err(|_| {
            Error::InvalidConfig(format!(
                "for generated graph data the input is the number of pages, got {:?}",
                count
            ))
        }),
        _ => Err(Error::InvalidConfig(
            "for generated graph data pass exactly one input: the number of pages".to_string(),
        )),
    }
}

fn read_edges<P: AsRef<Path>>(context: &Arc<Context>, inputs: &[P]) -> Result<Dia<PagePageLink>> {
    Ok(context
        .read_lines(inputs)?
        .try_map(|line: String| parse_edge(&line))
        .cache())
}

// Writes index-shaped ranks as "page: rank" lines; the numbering reads the ranks twice.
fn write_index_ranks(ranks: &Dia<Rank>, output: Option<&str>) -> Result<Vec<PathBuf>> {
    match output {
        Some(pattern) => {
            ranks.keep();
            ranks
                .zip_with_index(|rank, page| format!("{}: {}", page, format_rank(rank)))
                .write_lines(pattern)
        }
        None => ranks.execute().map(|_| Vec::new()),
    }
}

fn write_keyed_ranks(ranks: &Dia<RankedPage>, output: Option<&str>) -> Result<Vec<PathBuf>> {
    match output {
        Some(pattern) => ranks
            .map(|(page, rank): RankedPage| format!("{}: {}", page, format_rank(rank)))
            .write_lines(pattern),
        None => ranks.execute().map(|_| Vec::new()),
    }
}

/// Index shape over edge files.
pub fn run_page_rank_edge_per_line<P: AsRef<Path>>(
    context: &Arc<Context>,
    inputs: &[P],
    output: Option<&str>,
    iterations: usize,
) -> Result<RunReport> {
    context.enable_consume();
    let start = Instant::now();

    let input = read_edges(context, inputs)?;
    // read by the page count, the edge count and the grouping
    input.keep_by(2);

    let num_pages = input
        .map(|link: PagePageLink| link.src.max(link.tgt))
        .max()?
        .map_or(0, |max_page| max_page + 1);

    let number_edges = input.size_future();

    let links: Dia<OutgoingLinks> = input
        .group_to_index(
            |link: &PagePageLink| link.src,
            |links: Box<dyn Iterator<Item = PagePageLink>>, _| {
                links.map(|link| link.tgt).collect::<OutgoingLinks>()
            },
            num_pages,
            Vec::new(),
        )
        .cache();
    links.keep_forever();

    let run = page_rank(&links, num_pages, iterations)?;
    let outputs = write_index_ranks(&run.ranks, output)?;
    let elapsed = start.elapsed();
    let edges = number_edges.get()?;

    Ok(RunReport {
        benchmark: "pagerank",
        detection: None,
        pages: num_pages,
        edges,
        iterations,
        elapsed,
        traffic: context.traffic(),
        workers: context.num_workers(),
        rounds: run.rounds,
        outputs,
    }
    .emit(context))
}

/// Join shape over edge files; pages are keyed by their ids as read.
pub fn run_join_page_rank_edge_per_line<P: AsRef<Path>>(
    context: &Arc<Context>,
    inputs: &[P],
    output: Option<&str>,
    iterations: usize,
    location: LocationDetection,
) -> Result<RunReport> {
    context.enable_consume();
    let start = Instant::now();

    let input = read_edges(context, inputs)?;
    // read by the edge count and the grouping
    input.keep();
    let number_edges = input.size_future();

    let links: Dia<LinkedPage> = input
        .group_by_key(
            |link: &PagePageLink| link.src,
            |src: &PageId, links: Box<dyn Iterator<Item = PagePageLink>>| {
                (*src, links.map(|link| link.tgt).collect::<OutgoingLinks>())
            },
        )
        .cache();
    links.keep_forever();

    let run = page_rank_join_self(&links, iterations, location)?;
    let outputs = write_keyed_ranks(&run.ranks, output)?;
    let elapsed = start.elapsed();
    let pages = links.count()?;
    let edges = number_edges.get()?;

    Ok(RunReport {
        benchmark: "pagerank",
        detection: Some(location),
        pages,
        edges,
        iterations,
        elapsed,
        traffic: context.traffic(),
        workers: context.num_workers(),
        rounds: run.rounds,
        outputs,
    }
    .emit(context))
}

/// Index shape over a generated Zipf graph of `num_pages` pages.
pub fn run_page_rank_generated(
    context: &Arc<Context>,
    num_pages: usize,
    graph_gen: &ZipfGraphGen,
    seed: u64,
    output: Option<&str>,
    iterations: usize,
) -> Result<RunReport> {
    context.enable_consume();
    let start = Instant::now();

    let graph = Arc::new(graph_gen.for_pages(num_pages)?);
    let links: Dia<OutgoingLinks> = context
        .generate(num_pages, move |index| graph.outgoing(seed, index))
        .cache();
    links.keep_forever();

    let edges = links.map(|outs: OutgoingLinks| outs.len()).sum()?;

    let run = page_rank(&links, num_pages, iterations)?;
    let outputs = write_index_ranks(&run.ranks, output)?;

    Ok(RunReport {
        benchmark: "pagerank_gen",
        detection: None,
        pages: num_pages,
        edges,
        iterations,
        elapsed: start.elapsed(),
        traffic: context.traffic(),
        workers: context.num_workers(),
        rounds: run.rounds,
        outputs,
    }
    .emit(context))
}

/// Join shape over a generated Zipf graph; links are keyed by their page index.
pub fn run_page_rank_join_generated(
    context: &Arc<Context>,
    num_pages: usize,
    graph_gen: &ZipfGraphGen,
    seed: u64,
    output: Option<&str>,
    iterations: usize,
    location: LocationDetection,
) -> Result<RunReport> {
    context.enable_consume();
    let start = Instant::now();

    let graph = Arc::new(graph_gen.for_pages(num_pages)?);
    let links: Dia<LinkedPage> = context
        .generate(num_pages, move |index| (index, graph.outgoing(seed, index)))
        .cache();
    links.keep_forever();

    let edges = links
        .map(|(_, outs): LinkedPage| outs.len())
        .sum()?;

    let run = page_rank_join(&links, num_pages, iterations, location)?;
    let outputs = write_keyed_ranks(&run.ranks, output)?;

    Ok(RunReport {
        benchmark: "pagerank_gen",
        detection: Some(location),
        pages: num_pages,
        edges,
        iterations,
        elapsed: start.elapsed(),
        traffic: context.traffic(),
        workers: context.num_workers(),
        rounds: run.rounds,
        outputs,
    }
    .emit(context))
}
