//! Command-line driver for a distributed Count-Min Sketch build.
//!
//! This binary is the only non-core surface in the workspace: it parses
//! arguments, opens the input file, simulates a cluster of ranks as OS
//! threads connected by [`sketch_oxide::collective::ThreadCollective`], and
//! prints a report. None of the accuracy or determinism guarantees live
//! here — they live in `sketch_oxide`, which this binary only orchestrates.

use std::fmt;
use std::path::{Path, PathBuf};

use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use sketch_oxide::accuracy;
use sketch_oxide::collective::{Collective, ThreadCollective};
use sketch_oxide::common::SketchError;
use sketch_oxide::config::{ClusterGeometry, JobConfig, SketchParams};
use sketch_oxide::ground_truth::{count_lines, GroundTruthProbe, GroundTruthTable};
use sketch_oxide::hash::UniversalHash;
use sketch_oxide::io;
use sketch_oxide::worker::Worker;

const EXIT_CONFIG_ERROR: i32 = 1;
const EXIT_INPUT_OPEN_FAILURE: i32 = 2;
const EXIT_GROUND_TRUTH_FAILURE: i32 = 3;
const EXIT_PROTOCOL_FAILURE: i32 = 4;

/// Builds a global Count-Min Sketch over a large integer stream, splitting
/// the input across ranks and threads and reducing to one answer.
#[derive(Parser, Debug)]
#[command(name = "cms-cli", version, about)]
struct Cli {
    /// Path to the input file: one unsigned decimal integer per line.
    input: PathBuf,

    /// Optional ground-truth file: "<value> <count>" per line, used to
    /// report the sketch's accuracy against exact counts.
    ground_truth: Option<PathBuf>,

    /// Number of ranks (simulated as OS threads) to split the input across.
    #[arg(long, default_value_t = 1)]
    ranks: usize,

    /// Number of worker threads spawned within each rank.
    #[arg(long = "threads-per-rank", default_value_t = 1)]
    threads_per_rank: usize,

    /// Error bound: point estimates are within `epsilon * total` of the
    /// true count with probability `1 - delta`.
    #[arg(long, default_value_t = 0.001)]
    epsilon: f64,

    /// Confidence that the `epsilon` bound holds.
    #[arg(long, default_value_t = 0.1)]
    delta: f64,

    /// Prime modulus shared by every row of the hash family.
    #[arg(long, default_value_t = sketch_oxide::hash::DEFAULT_PRIME)]
    prime: u64,

    /// Seed for the root's hash-vector draw. Omit to draw from entropy.
    #[arg(long)]
    seed: Option<u64>,

    /// Inclusive range probe `lo:hi`, repeatable.
    #[arg(long = "range", value_parser = parse_range)]
    ranges: Vec<(u32, u32)>,

    /// Exact-value point probe, repeatable.
    #[arg(long = "point")]
    points: Vec<u32>,
}

fn parse_range(s: &str) -> Result<(u32, u32), String> {
    let (lo, hi) = s
        .split_once(':')
        .ok_or_else(|| format!("expected \"lo:hi\", got \"{s}\""))?;
    let lo: u32 = lo.parse().map_err(|_| format!("invalid lo in \"{s}\""))?;
    let hi: u32 = hi.parse().map_err(|_| format!("invalid hi in \"{s}\""))?;
    Ok((lo, hi))
}

#[derive(Debug)]
struct CliError {
    code: i32,
    message: String,
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

fn cli_err(code: i32, message: impl Into<String>) -> CliError {
    CliError {
        code,
        message: message.into(),
    }
}

fn main() {
    tracing_subscriber::fmt::init();
    if let Err(err) = run() {
        eprintln!("error: {err}");
        let code = err
            .downcast_ref::<CliError>()
            .map_or(EXIT_CONFIG_ERROR, |e| e.code);
        std::process::exit(code);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = JobConfig {
        sketch: SketchParams {
            epsilon: cli.epsilon,
            delta: cli.delta,
            prime: cli.prime,
        },
        geometry: ClusterGeometry {
            ranks: cli.ranks,
            threads_per_rank: cli.threads_per_rank,
        },
        seed: cli.seed,
        points: cli.points.clone(),
        ranges: cli.ranges.clone(),
    };
    config
        .validate()
        .map_err(|err| cli_err(EXIT_CONFIG_ERROR, format!("invalid configuration: {err}")))?;

    let report = build_and_query(&cli.input, &config)
        .map_err(|err| map_core_error(err, EXIT_INPUT_OPEN_FAILURE))?;

    print_report(&report, &cli.points, &cli.ranges);

    if let Some(ground_truth_path) = &cli.ground_truth {
        let (truth, record_count) = load_ground_truth(ground_truth_path)
            .map_err(|err| map_core_error(err, EXIT_GROUND_TRUTH_FAILURE))?;
        println!("ground-truth records  : {record_count} (counted, not assumed)");
        let accuracy_report = accuracy::evaluate(&report.sketch, &truth, truth.total())
            .map_err(|err| cli_err(EXIT_PROTOCOL_FAILURE, format!("accuracy check failed: {err}")))?;
        print_accuracy_report(&accuracy_report);
    }

    Ok(())
}

fn map_core_error(err: SketchError, default_code: i32) -> CliError {
    match err {
        SketchError::ResourceFailure { reason } => cli_err(default_code, reason),
        SketchError::ProtocolFailure { reason } => cli_err(EXIT_PROTOCOL_FAILURE, reason),
        other => cli_err(EXIT_CONFIG_ERROR, other.to_string()),
    }
}

/// The outcome of one full ingest job: the reduced global sketch plus the
/// scalar counters every rank contributed to.
struct JobReport {
    sketch: sketch_oxide::sketch::CountMinSketch,
    lines_processed: u64,
    skipped_lines: u64,
    probe_tallies: std::collections::HashMap<GroundTruthProbe, u64>,
}

fn build_and_query(input: &Path, config: &JobConfig) -> Result<JobReport, SketchError> {
    let file_len = std::fs::metadata(input)
        .map_err(|err| SketchError::ResourceFailure {
            reason: format!("reading metadata for {}: {err}", input.display()),
        })?
        .len();

    let chunk_ranges = io::rank_byte_ranges(input, file_len, config.geometry.ranks)?;

    let width = (std::f64::consts::E / config.sketch.epsilon).ceil() as u32;
    let depth = (1.0 / config.sketch.delta).ln().ceil() as usize;
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let root_hashes = UniversalHash::draw_array(&mut rng, config.sketch.prime, width, depth)?;

    let probes: Vec<GroundTruthProbe> = config
        .points
        .iter()
        .map(|&p| GroundTruthProbe::Point(p))
        .chain(config.ranges.iter().map(|&(lo, hi)| GroundTruthProbe::Range(lo, hi)))
        .collect();

    let collectives = ThreadCollective::group(config.geometry.ranks)?;
    let epsilon = config.sketch.epsilon;
    let delta = config.sketch.delta;
    let threads_per_rank = config.geometry.threads_per_rank;

    let results: Vec<Result<sketch_oxide::worker::WorkerResult, SketchError>> =
        std::thread::scope(|scope| {
            let handles: Vec<_> = collectives
                .into_iter()
                .map(|collective| {
                    let &(start, end) = &chunk_ranges[collective.rank()];
                    let root_hashes = root_hashes.clone();
                    let probes = probes.clone();
                    scope.spawn(move || -> Result<sketch_oxide::worker::WorkerResult, SketchError> {
                        let hashes = collective.broadcast(if collective.rank() == 0 {
                            Some(root_hashes)
                        } else {
                            None
                        })?;
                        info!(rank = collective.rank(), start, end, "rank assigned chunk");
                        let chunk = io::read_chunk(input, start, end)?;
                        let worker = Worker::new(hashes, epsilon, delta, threads_per_rank, probes)?;
                        let local = worker.process_rank_slice(&chunk)?;
                        collective.reduce(local, |mut a, b| {
                            a.merge(&b).expect("ranks share one broadcast hash vector");
                            a
                        })
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().expect("rank thread panicked")).collect()
        });

    let global = results.into_iter().next().expect("at least one rank")?;
    Ok(JobReport {
        sketch: global.sketch,
        lines_processed: global.lines_processed,
        skipped_lines: global.skipped_lines,
        probe_tallies: global.probe_tallies,
    })
}

/// Loads a ground-truth table, plus the number of records the file actually
/// contains. That count is always derived by scanning the file twice (once
/// to count lines, once to parse them) rather than trusted from the parsed
/// table's `distinct_items`, so a file with duplicate value entries doesn't
/// silently understate how many records were declared.
fn load_ground_truth(path: &Path) -> Result<(GroundTruthTable, u64), SketchError> {
    let open = || {
        std::fs::File::open(path).map_err(|err| SketchError::ResourceFailure {
            reason: format!("opening ground-truth file {}: {err}", path.display()),
        })
    };
    let record_count = count_lines(std::io::BufReader::new(open()?))?;
    let table = GroundTruthTable::from_reader(std::io::BufReader::new(open()?))?;
    Ok((table, record_count))
}

fn print_report(report: &JobReport, points: &[u32], ranges: &[(u32, u32)]) {
    println!("lines processed : {}", report.lines_processed);
    println!("lines skipped   : {}", report.skipped_lines);
    println!("total (sketch)  : {}", report.sketch.total());
    for &point in points {
        println!("point({point})      = {}", report.sketch.point_query(point));
    }
    for &(lo, hi) in ranges {
        match report.sketch.range_query(lo, hi) {
            Ok(estimate) => println!("range({lo}..={hi}) = {estimate}"),
            Err(err) => println!("range({lo}..={hi}) = error: {err}"),
        }
    }
    for (probe, count) in &report.probe_tallies {
        println!("probe {probe:?} exact count = {count}");
    }
}

fn print_accuracy_report(report: &accuracy::AccuracyReport) {
    println!("--- accuracy ---");
    println!("items checked          : {}", report.items_checked);
    println!("average error          : {:.4}", report.average_error);
    println!("max error              : {}", report.max_error);
    println!("exact matches          : {}", report.exact_matches);
    println!("within theoretical bound: {}", report.within_theoretical_bound);
}
