//! Worker (`L3`): byte-range partitioning, boundary realignment, and the
//! thread-private-sketch-then-barrier accumulation pattern within one rank.
//!
//! A `Worker` owns the hash vector broadcast by the root (see
//! [`crate::collective`]) and is handed the raw bytes assigned to its rank.
//! It partitions that slice again across `threads_per_rank` threads, each of
//! which builds its own private [`CountMinSketch`], then merges the
//! thread-private sketches once every thread has finished — `std::thread::scope`'s
//! join at scope exit *is* the barrier, so no separate synchronization
//! primitive is needed for the intra-rank merge.
//!
//! # Line ownership
//! Both the rank-level and thread-level partitioning use the same rule: a
//! chunk boundary always falls on the start of a line, found by scanning
//! forward from the nominal (equal-sized) split point to the next `\n`. Two
//! adjacent chunks' boundaries are computed from the identical nominal
//! position, so they agree exactly — every line is read by exactly one
//! chunk, with no drops and no double-counts, regardless of how many ranks
//! or threads the job uses. This is what makes the final sketch bit-identical
//! across different `(ranks, threads_per_rank)` choices.

use std::collections::HashMap;

use tracing::{debug, instrument};

use crate::common::{validation, Result, SketchError};
use crate::ground_truth::GroundTruthProbe;
use crate::hash::UniversalHash;
use crate::sketch::CountMinSketch;

/// Outcome of one worker (thread or rank) processing its assigned slice.
#[derive(Debug, Clone)]
pub struct WorkerResult {
    /// The sketch built from every successfully parsed line in the slice.
    pub sketch: CountMinSketch,
    /// Number of lines that could not be parsed as an item and were
    /// skipped rather than aborting the job.
    pub skipped_lines: u64,
    /// Number of lines successfully parsed and folded into the sketch.
    pub lines_processed: u64,
    /// Exact tallies for each requested ground-truth probe, computed
    /// directly from the raw input alongside the sketch build.
    pub probe_tallies: HashMap<GroundTruthProbe, u64>,
}

impl WorkerResult {
    fn empty(sketch: CountMinSketch, probes: &[GroundTruthProbe]) -> Self {
        Self {
            sketch,
            skipped_lines: 0,
            lines_processed: 0,
            probe_tallies: probes.iter().map(|&p| (p, 0)).collect(),
        }
    }

    /// Folds `other` into `self`: sums the sketches, the counters, and the
    /// probe tallies. Used both to merge thread-private results within a
    /// rank and, via the same logic, to merge ground-truth tallies across
    /// ranks.
    pub fn merge(&mut self, other: &Self) -> Result<()> {
        self.sketch.merge(&other.sketch)?;
        self.skipped_lines += other.skipped_lines;
        self.lines_processed += other.lines_processed;
        for (probe, count) in &other.probe_tallies {
            *self.probe_tallies.entry(*probe).or_insert(0) += count;
        }
        Ok(())
    }
}

/// Finds the first line start at or after `pos`: `pos` itself if it already
/// follows a `\n` (or is position zero), otherwise the byte right after the
/// next `\n` found scanning forward, or `data.len()` if none remains.
fn line_start_at_or_after(data: &[u8], pos: usize) -> usize {
    let pos = pos.min(data.len());
    if pos == 0 || data[pos - 1] == b'\n' {
        return pos;
    }
    match data[pos..].iter().position(|&b| b == b'\n') {
        Some(offset) => pos + offset + 1,
        None => data.len(),
    }
}

/// Splits `data` into `n` contiguous, non-overlapping, line-aligned ranges.
/// Every line in `data` falls entirely within exactly one returned range.
pub fn partition_by_lines(data: &[u8], n: usize) -> Vec<(usize, usize)> {
    if n == 0 || data.is_empty() {
        return vec![(0, data.len()); n.max(1)];
    }
    let approx = data.len() / n;
    let mut bounds = Vec::with_capacity(n + 1);
    bounds.push(0usize);
    for i in 1..n {
        let nominal = i * approx;
        bounds.push(line_start_at_or_after(data, nominal));
    }
    bounds.push(data.len());
    bounds.windows(2).map(|w| (w[0], w[1])).collect()
}

#[instrument(level = "debug", skip(slice, hashes, probes), fields(slice_len = slice.len()))]
fn process_slice(
    slice: &[u8],
    hashes: &[UniversalHash],
    epsilon: f64,
    delta: f64,
    probes: &[GroundTruthProbe],
) -> Result<WorkerResult> {
    let sketch = CountMinSketch::from_hashes(hashes.to_vec(), epsilon, delta)?;
    let mut result = WorkerResult::empty(sketch, probes);

    for raw_line in slice.split(|&b| b == b'\n') {
        let line = trim_line(raw_line);
        if line.is_empty() {
            continue;
        }
        match parse_item(line) {
            Some(item) => {
                result.sketch.update_one(item);
                result.lines_processed += 1;
                for &probe in probes {
                    if probe_matches(probe, item) {
                        *result.probe_tallies.entry(probe).or_insert(0) += 1;
                    }
                }
            }
            None => result.skipped_lines += 1,
        }
    }
    debug!(
        lines_processed = result.lines_processed,
        skipped_lines = result.skipped_lines,
        "slice processed"
    );
    Ok(result)
}

fn trim_line(raw: &[u8]) -> &[u8] {
    let mut end = raw.len();
    while end > 0 && (raw[end - 1] == b'\r' || raw[end - 1] == b' ' || raw[end - 1] == b'\t') {
        end -= 1;
    }
    let mut start = 0;
    while start < end && (raw[start] == b' ' || raw[start] == b'\t') {
        start += 1;
    }
    &raw[start..end]
}

fn parse_item(line: &[u8]) -> Option<u32> {
    std::str::from_utf8(line).ok()?.parse::<u32>().ok()
}

fn probe_matches(probe: GroundTruthProbe, item: u32) -> bool {
    match probe {
        GroundTruthProbe::Point(value) => value == item,
        GroundTruthProbe::Range(lo, hi) => item >= lo && item <= hi,
    }
}

/// Processes one rank's assigned byte range: splits it further across
/// `threads_per_rank` threads, each accumulating its own private sketch,
/// then merges every thread's result once all have finished.
pub struct Worker {
    hashes: Vec<UniversalHash>,
    epsilon: f64,
    delta: f64,
    threads_per_rank: usize,
    probes: Vec<GroundTruthProbe>,
}

impl Worker {
    /// Builds a worker around an already-broadcast hash vector.
    ///
    /// # Errors
    /// Returns `SketchError::InvalidParameter` if `threads_per_rank` is 0.
    pub fn new(
        hashes: Vec<UniversalHash>,
        epsilon: f64,
        delta: f64,
        threads_per_rank: usize,
        probes: Vec<GroundTruthProbe>,
    ) -> Result<Self> {
        validation::validate_rank_geometry(1, threads_per_rank)?;
        if hashes.is_empty() {
            return Err(SketchError::InvalidParameter {
                param: "hashes".to_string(),
                value: "empty".to_string(),
                constraint: "must contain at least one row".to_string(),
            });
        }
        Ok(Self {
            hashes,
            epsilon,
            delta,
            threads_per_rank,
            probes,
        })
    }

    /// Processes this rank's already-realigned slice of the input.
    ///
    /// Spawns `threads_per_rank` scoped threads, each over a disjoint,
    /// line-aligned sub-slice; the scope's implicit join is the barrier
    /// after which every thread-private sketch is merged into one.
    #[instrument(level = "info", skip(self, slice), fields(threads = self.threads_per_rank, slice_len = slice.len()))]
    pub fn process_rank_slice(&self, slice: &[u8]) -> Result<WorkerResult> {
        let ranges = partition_by_lines(slice, self.threads_per_rank);
        let hashes = &self.hashes;
        let epsilon = self.epsilon;
        let delta = self.delta;
        let probes = &self.probes;
        let thread_results: Vec<Result<WorkerResult>> = std::thread::scope(|scope| {
            let handles: Vec<_> = ranges
                .iter()
                .map(|&(start, end)| {
                    let sub_slice = &slice[start..end];
                    scope.spawn(move || process_slice(sub_slice, hashes, epsilon, delta, probes))
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().expect("worker thread panicked"))
                .collect()
        });

        let mut results = thread_results.into_iter();
        let mut merged = results
            .next()
            .ok_or_else(|| SketchError::InvalidParameter {
                param: "threads_per_rank".to_string(),
                value: "0".to_string(),
                constraint: "must be at least 1".to_string(),
            })??;
        for result in results {
            merged.merge(&result?)?;
        }
        debug!(total = merged.sketch.total(), "rank merge barrier cleared");
        Ok(merged)
    }
}
