use std::process;
use std::str::FromStr;

use clap::{App, Arg, ArgMatches, ErrorKind};
use dataflow_rank::page_rank::{run, RunOptions, ZipfGraphGen};
use dataflow_rank::{Configuration, Context, LocationDetection, Result};

const GENERATE: &str = "generate";
const JOIN: &str = "join";
const NO_DETECTION: &str = "no-detection";
const OUTPUT: &str = "output";
const ITERATIONS: &str = "iterations";
const SIZE_MEAN: &str = "size_mean";
const SIZE_VAR: &str = "size_var";
const LINK_SCALE: &str = "link_scale";
const LINK_EXPONENT: &str = "link_exponent";
const SEED: &str = "seed";
const WORKERS: &str = "workers";
const INPUTS: &str = "inputs";

fn app() -> App<'static, 'static> {
    App::new("page_rank")
        .about("PageRank benchmark on a partitioned dataflow engine")
        .arg(
            Arg::with_name(GENERATE)
                .short("g")
                .long("generate")
                .help("generate a Zipf graph; the input is the number of pages"),
        )
        .arg(
            Arg::with_name(JOIN)
                .short("j")
                .long("join")
                .help("compute with the join-based algorithm"),
        )
        .arg(
            Arg::with_name(NO_DETECTION)
                .long("no-detection")
                .help("disable location detection of the join"),
        )
        .arg(
            Arg::with_name(OUTPUT)
                .short("o")
                .long("output")
                .takes_value(true)
                .help("output pattern for \"page: rank\" lines"),
        )
        .arg(
            Arg::with_name(ITERATIONS)
                .short("n")
                .long("iterations")
                .takes_value(true)
                .default_value("10")
                .help("number of rounds"),
        )
        .arg(
            Arg::with_name(SIZE_MEAN)
                .long("size_mean")
                .takes_value(true)
                .help("mean number of outgoing links of generated pages"),
        )
        .arg(
            Arg::with_name(SIZE_VAR)
                .long("size_var")
                .takes_value(true)
                .help("variance of the number of outgoing links of generated pages"),
        )
        .arg(
            Arg::with_name(LINK_SCALE)
                .long("link_scale")
                .takes_value(true)
                .help("scale of the Zipf link distribution"),
        )
        .arg(
            Arg::with_name(LINK_EXPONENT)
                .long("link_exponent")
                .takes_value(true)
                .help("exponent of the Zipf link distribution"),
        )
        .arg(
            Arg::with_name(SEED)
                .long("seed")
                .takes_value(true)
                .help("seed of the generated graph"),
        )
        .arg(
            Arg::with_name(WORKERS)
                .short("w")
                .long("workers")
                .takes_value(true)
                .help("number of workers, overrides the configuration"),
        )
        .arg(
            Arg::with_name(INPUTS)
                .multiple(true)
                .required(true)
                .help("edge files or directories, or the number of pages with --generate"),
        )
}

// Parses an optional numeric argument, exiting like any other command line error.
fn numeric<T: FromStr>(matches: &ArgMatches, name: &str) -> Option<T> {
    let value = matches.value_of(name)?;
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            eprintln!("error: invalid value {:?} for --{}", value, name);
            process::exit(-1);
        }
    }
}

fn options(matches: &ArgMatches) -> RunOptions {
    let defaults = ZipfGraphGen::default();
    let graph = ZipfGraphGen {
        size_mean: numeric(matches, SIZE_MEAN).unwrap_or(defaults.size_mean),
        size_var: numeric(matches, SIZE_VAR).unwrap_or(defaults.size_var),
        link_scale: numeric(matches, LINK_SCALE).unwrap_or(defaults.link_scale),
        link_exponent: numeric(matches, LINK_EXPONENT).unwrap_or(defaults.link_exponent),
    };
    let location = if matches.is_present(NO_DETECTION) {
        LocationDetection::Disabled
    } else {
        LocationDetection::Enabled
    };
    RunOptions {
        inputs: matches
            .values_of(INPUTS)
            .map(|values| values.map(String::from).collect())
            .unwrap_or_default(),
        generate: matches.is_present(GENERATE),
        join: matches.is_present(JOIN),
        location,
        output: matches.value_of(OUTPUT).map(String::from),
        iterations: numeric(matches, ITERATIONS).unwrap_or(10),
        graph,
        seed: numeric(matches, SEED),
    }
}

fn start(matches: &ArgMatches) -> Result<()> {
    let mut config: Configuration = Configuration::get()?.clone();
    if let Some(workers) = numeric(matches, WORKERS) {
        config.num_workers = workers;
    }
    let context = Context::with_config(config)?;
    run(&context, &options(matches))?;
    Ok(())
}

fn main() {
    let matches = match app().get_matches_safe() {
        Ok(matches) => matches,
        Err(e) if e.kind == ErrorKind::HelpDisplayed || e.kind == ErrorKind::VersionDisplayed => {
            println!("{}", e.message);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}", e.message);
            process::exit(-1);
        }
    };

    if let Err(e) = start(&matches) {
        log::error!("page_rank failed: {}", e);
        eprintln!("error: {}", e);
        process::exit(1);
    }
}
