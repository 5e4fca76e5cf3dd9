//! Accuracy evaluator: compares sketch estimates against ground truth
//!
//! This is query-side tooling, not part of the sketch's own contract — a
//! [`CountMinSketch`] never knows whether its estimates are accurate, only
//! the evaluator checks that against an out-of-band [`GroundTruthTable`].
//! A sketch that ever *underestimates* a ground-truth count indicates a bug
//! (wrong hash vector, a merge that silently dropped updates, ...), never a
//! sign of the probabilistic error the `(epsilon, delta)` bound allows for.

use crate::ground_truth::GroundTruthTable;
use crate::sketch::CountMinSketch;
use crate::common::{Result, SketchError};

/// Summary of how closely a sketch's point-query estimates track a
/// ground-truth table, across every item the ground truth tracks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccuracyReport {
    /// Number of items compared.
    pub items_checked: usize,
    /// Mean of `estimate - true_count` across every item checked.
    pub average_error: f64,
    /// Largest `estimate - true_count` observed.
    pub max_error: u64,
    /// Number of items where `estimate == true_count` exactly.
    pub exact_matches: usize,
    /// Number of items whose error falls within the theoretical
    /// `epsilon * total` bound the sketch was sized for.
    pub within_theoretical_bound: usize,
}

/// Checks every item in `truth` against `sketch`, failing fast with
/// [`SketchError::InvariantViolation`] the moment an estimate undershoots
/// its true count — a correctly functioning Count-Min Sketch never does.
///
/// `total` is the dataset's true item count (`truth.total()` is usually
/// the right value to pass), used to compute the `epsilon * total` bound.
///
/// # Errors
/// Returns `SketchError::InvariantViolation` if any estimate is lower than
/// its ground-truth count.
pub fn evaluate(sketch: &CountMinSketch, truth: &GroundTruthTable, total: u64) -> Result<AccuracyReport> {
    let bound = sketch.epsilon() * total as f64;
    let mut items_checked = 0usize;
    let mut error_sum = 0f64;
    let mut max_error = 0u64;
    let mut exact_matches = 0usize;
    let mut within_theoretical_bound = 0usize;

    for &item in truth.items() {
        let true_count = truth.count_of(item);
        let estimate = u64::from(sketch.point_query(item));
        if estimate < true_count {
            return Err(SketchError::InvariantViolation {
                reason: format!(
                    "point_query({item}) = {estimate} is below true count {true_count}"
                ),
            });
        }
        let error = estimate - true_count;
        items_checked += 1;
        error_sum += error as f64;
        max_error = max_error.max(error);
        if error == 0 {
            exact_matches += 1;
        }
        if error as f64 <= bound {
            within_theoretical_bound += 1;
        }
    }

    Ok(AccuracyReport {
        items_checked,
        average_error: if items_checked == 0 {
            0.0
        } else {
            error_sum / items_checked as f64
        },
        max_error,
        exact_matches,
        within_theoretical_bound,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::{UniversalHash, DEFAULT_PRIME};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::io::Cursor;

    fn sketch_with_items(items: &[u32], epsilon: f64, delta: f64, seed: u64) -> CountMinSketch {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut s = CountMinSketch::init(epsilon, delta, DEFAULT_PRIME, &mut rng).unwrap();
        for &item in items {
            s.update_one(item);
        }
        s
    }

    #[test]
    fn exact_matches_are_counted_when_sketch_is_roomy() {
        let sketch = sketch_with_items(&[1, 1, 1, 2, 2, 3], 0.001, 0.01, 1);
        let truth = GroundTruthTable::from_reader(Cursor::new("1 3\n2 2\n3 1\n")).unwrap();
        let report = evaluate(&sketch, &truth, truth.total()).unwrap();
        assert_eq!(report.items_checked, 3);
        assert_eq!(report.exact_matches, 3);
        assert_eq!(report.max_error, 0);
        assert_eq!(report.within_theoretical_bound, 3);
    }

    #[test]
    fn detects_invariant_violation_when_truth_exceeds_estimate() {
        let sketch = sketch_with_items(&[1], 0.1, 0.1, 2);
        // A ground-truth count impossibly higher than anything the sketch saw.
        let truth = GroundTruthTable::from_reader(Cursor::new("1 1000000\n")).unwrap();
        assert!(matches!(
            evaluate(&sketch, &truth, truth.total()),
            Err(SketchError::InvariantViolation { .. })
        ));
    }

    #[test]
    fn empty_ground_truth_yields_empty_report() {
        let sketch = sketch_with_items(&[], 0.01, 0.1, 3);
        let truth = GroundTruthTable::from_reader(Cursor::new("")).unwrap();
        let report = evaluate(&sketch, &truth, 0).unwrap();
        assert_eq!(report.items_checked, 0);
        assert_eq!(report.average_error, 0.0);
    }

    #[test]
    fn never_underestimates_a_real_stream_with_collisions() {
        // Depth-1, narrow width so rows are forced to collide and overestimate,
        // but the invariant (never under) must still hold.
        let mut rng = StdRng::seed_from_u64(4);
        let hashes = UniversalHash::draw_array(&mut rng, DEFAULT_PRIME, 4, 1).unwrap();
        let mut s = CountMinSketch::from_hashes(hashes, 0.1, 0.1).unwrap();
        for item in [1u32, 2, 3, 4, 5, 6, 7, 8] {
            s.update_one(item);
        }
        let truth = GroundTruthTable::from_reader(Cursor::new(
            "1 1\n2 1\n3 1\n4 1\n5 1\n6 1\n7 1\n8 1\n",
        ))
        .unwrap();
        let report = evaluate(&s, &truth, truth.total()).unwrap();
        assert_eq!(report.items_checked, 8);
    }
}
