//! End-to-end scenarios from the accuracy and distributed-construction
//! contract: a small exact count, a range query, distributed/serial
//! equivalence across rank and thread counts, an inner-product sentinel,
//! hash-mismatch rejection, and boundary realignment across an awkward
//! file split.

use rand::rngs::StdRng;
use rand::SeedableRng;

use sketch_oxide::collective::{Collective, InProcessCollective};
use sketch_oxide::ground_truth::GroundTruthProbe;
use sketch_oxide::hash::{UniversalHash, DEFAULT_PRIME};
use sketch_oxide::sketch::CountMinSketch;
use sketch_oxide::worker::{partition_by_lines, Worker};

fn draw_hashes(seed: u64, width: u32, depth: usize) -> Vec<UniversalHash> {
    let mut rng = StdRng::seed_from_u64(seed);
    UniversalHash::draw_array(&mut rng, DEFAULT_PRIME, width, depth).unwrap()
}

/// Scenario A — small exact.
#[test]
fn scenario_a_small_exact() {
    let hashes = draw_hashes(1, 64, 4);
    let mut sketch = CountMinSketch::from_hashes(hashes, 0.1, 0.1).unwrap();
    for item in [123u32, 123, 123, 456, 456, 999] {
        sketch.update_one(item);
    }
    assert!(sketch.point_query(123) >= 3);
    assert!(sketch.point_query(456) >= 2);
    assert!(sketch.point_query(999) >= 1);
    assert_eq!(sketch.total(), 6);
}

/// Scenario B — range.
#[test]
fn scenario_b_range() {
    let hashes = draw_hashes(2, 2048, 4);
    let mut sketch = CountMinSketch::from_hashes(hashes, 0.001, 0.1).unwrap();
    for item in 100u32..=110 {
        sketch.update_one(item);
    }
    sketch.update_one(50);
    sketch.update_one(200);
    let estimate = sketch.range_query(100, 110).unwrap();
    assert!(estimate >= 11);
}

/// Scenario C — distributed equivalence: the same input, run serially and
/// split across varying rank/thread counts with the same hash vector,
/// produces a bit-identical global sketch.
#[test]
fn scenario_c_distributed_equivalence() {
    let lines: String = (0u32..50_000)
        .map(|i| format!("{}\n", i % 997))
        .collect();
    let data = lines.into_bytes();
    let hashes = draw_hashes(42, 4096, 5);

    let mut serial = CountMinSketch::from_hashes(hashes.clone(), 0.001, 0.1).unwrap();
    for raw_line in data.split(|&b| b == b'\n') {
        if raw_line.is_empty() {
            continue;
        }
        let item: u32 = std::str::from_utf8(raw_line).unwrap().parse().unwrap();
        serial.update_one(item);
    }

    for &ranks in &[2usize, 4, 8] {
        for &threads in &[1usize, 2, 4] {
            let rank_ranges = partition_by_lines(&data, ranks);
            let mut global: Option<CountMinSketch> = None;
            for &(start, end) in &rank_ranges {
                let worker = Worker::new(hashes.clone(), 0.001, 0.1, threads, Vec::new()).unwrap();
                let result = worker.process_rank_slice(&data[start..end]).unwrap();
                match &mut global {
                    Some(g) => g.merge(&result.sketch).unwrap(),
                    None => global = Some(result.sketch),
                }
            }
            let global = global.unwrap();
            assert_eq!(
                global.total(),
                serial.total(),
                "ranks={ranks} threads={threads}"
            );
            for item in 0u32..997 {
                assert_eq!(
                    global.point_query(item),
                    serial.point_query(item),
                    "ranks={ranks} threads={threads} item={item}"
                );
            }
        }
    }
}

/// Scenario D — inner product sentinel. Width is wide enough relative to
/// the handful of items used that no two of them collide in any row, so the
/// sketch's inner product is exactly the true dot product, not just a lower
/// bound.
#[test]
fn scenario_d_inner_product_sentinel() {
    let hashes = draw_hashes(7, 4096, 3);
    let mut a = CountMinSketch::from_hashes(hashes.clone(), 0.1, 0.1).unwrap();
    let mut b = CountMinSketch::from_hashes(hashes, 0.1, 0.1).unwrap();

    a.update_by(1, 3);
    a.update_by(2, 2);
    b.update_by(1, 2);
    b.update_by(3, 5);

    // True dot product of the frequency vectors: only item 1 overlaps, 3*2 = 6.
    let product = a.inner_product(&b).unwrap();
    assert_eq!(product, 6);
}

/// Scenario E — incompatibility.
#[test]
fn scenario_e_incompatible_sketches_reject_merge_and_inner_product() {
    let a = CountMinSketch::from_hashes(draw_hashes(10, 64, 4), 0.01, 0.1).unwrap();
    let b = CountMinSketch::from_hashes(draw_hashes(11, 64, 4), 0.01, 0.1).unwrap();

    let mut a_clone = a.clone();
    assert!(a_clone.merge(&b).is_err());
    assert!(a.inner_product(&b).is_err());
}

/// Scenario F — boundary realignment: a 3-worker split over a file whose
/// nominal byte boundaries fall mid-record must still yield the exact
/// global line count.
#[test]
fn scenario_f_boundary_realignment_preserves_exact_total() {
    // Deliberately uneven line lengths so nominal equal-sized splits land
    // mid-record.
    let mut data = Vec::new();
    for i in 0..2000u32 {
        data.extend_from_slice(format!("{}\n", 1_000_000 + i).as_bytes());
    }
    let hashes = draw_hashes(99, 1024, 4);
    let ranges = partition_by_lines(&data, 3);
    assert_eq!(ranges.len(), 3);

    let mut total_lines = 0u64;
    let mut global: Option<CountMinSketch> = None;
    for &(start, end) in &ranges {
        let worker = Worker::new(hashes.clone(), 0.001, 0.1, 1, Vec::new()).unwrap();
        let result = worker.process_rank_slice(&data[start..end]).unwrap();
        total_lines += result.lines_processed;
        match &mut global {
            Some(g) => g.merge(&result.sketch).unwrap(),
            None => global = Some(result.sketch),
        }
    }
    assert_eq!(total_lines, 2000);
    assert_eq!(global.unwrap().total(), 2000);
}

/// The in-process collective fake exercises the same broadcast/reduce API
/// a real cluster would, letting a single-rank job run through the full
/// protocol without any thread or process fan-out.
#[test]
fn single_rank_job_runs_through_the_collective_protocol() {
    let collective = InProcessCollective;
    let hashes = collective
        .broadcast(Some(draw_hashes(3, 256, 4)))
        .unwrap();
    let worker = Worker::new(hashes, 0.01, 0.1, 2, vec![GroundTruthProbe::Point(5)]).unwrap();
    let result = worker.process_rank_slice(b"5\n5\n6\n").unwrap();
    let reduced = collective.reduce(result, |mut a, b| {
        a.merge(&b).unwrap();
        a
    }).unwrap();
    assert_eq!(reduced.sketch.total(), 3);
    assert_eq!(reduced.probe_tallies[&GroundTruthProbe::Point(5)], 2);
}
