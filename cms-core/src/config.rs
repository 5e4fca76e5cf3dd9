//! Job configuration: sketch sizing and cluster geometry as explicit values
//!
//! Every parameter that affects either the sketch's accuracy or the shape of
//! the distributed job is threaded through as a field on [`JobConfig`]
//! rather than a global or an environment variable, so that a job's
//! behavior is fully determined by the value its caller passed in.

use crate::common::{validation, Result};
use crate::hash::DEFAULT_PRIME;

/// Accuracy and hash-family parameters for a [`crate::sketch::CountMinSketch`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SketchParams {
    /// Error bound `epsilon`: point estimates are within `epsilon * total`
    /// of the true count with probability `1 - delta`.
    pub epsilon: f64,
    /// Confidence `delta`.
    pub delta: f64,
    /// Prime modulus shared by every row of the hash family.
    pub prime: u64,
}

impl SketchParams {
    /// Production defaults: `epsilon = 0.001`, `delta = 0.1`, `prime = 2^31 - 1`.
    pub fn production() -> Self {
        Self {
            epsilon: 0.001,
            delta: 0.1,
            prime: DEFAULT_PRIME,
        }
    }

    /// Looser, cheaper defaults suited to local debugging and small tests:
    /// `epsilon = 0.1`, `delta = 0.1`.
    pub fn debug() -> Self {
        Self {
            epsilon: 0.1,
            delta: 0.1,
            prime: DEFAULT_PRIME,
        }
    }

    /// Validates that `epsilon`/`delta` are probabilities and `prime` is
    /// usable for the width this configuration would produce.
    pub fn validate(&self) -> Result<()> {
        validation::validate_probability(self.epsilon, "epsilon")?;
        validation::validate_probability(self.delta, "delta")?;
        let width = (std::f64::consts::E / self.epsilon).ceil() as usize;
        validation::validate_prime(self.prime, width)?;
        Ok(())
    }
}

/// Cluster geometry: how many ranks, and how many threads within each rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterGeometry {
    /// Number of ranks (processes / collective participants).
    pub ranks: usize,
    /// Number of worker threads spawned per rank.
    pub threads_per_rank: usize,
}

impl ClusterGeometry {
    /// A single rank, single thread, for sequential baselines and tests.
    pub fn single() -> Self {
        Self {
            ranks: 1,
            threads_per_rank: 1,
        }
    }

    /// Validates that both dimensions are at least 1.
    pub fn validate(&self) -> Result<()> {
        validation::validate_rank_geometry(self.ranks, self.threads_per_rank)
    }
}

/// Full configuration for one distributed ingest job: sketch sizing, cluster
/// shape, an optional seed for reproducible hash-vector draws, and the
/// probes to evaluate once ingest completes.
#[derive(Debug, Clone)]
pub struct JobConfig {
    /// Sketch accuracy and hash-family parameters.
    pub sketch: SketchParams,
    /// Cluster geometry (ranks x threads-per-rank).
    pub geometry: ClusterGeometry,
    /// Seed for the root's hash-vector draw. `None` means draw from entropy.
    pub seed: Option<u64>,
    /// Inclusive point queries to run once ingest completes.
    pub points: Vec<u32>,
    /// Inclusive range queries `(lo, hi)` to run once ingest completes.
    pub ranges: Vec<(u32, u32)>,
}

impl JobConfig {
    /// Builds a job config from its components, applying [`SketchParams::production`]
    /// and [`ClusterGeometry::single`] as defaults.
    pub fn new(sketch: SketchParams, geometry: ClusterGeometry) -> Self {
        Self {
            sketch,
            geometry,
            seed: None,
            points: Vec::new(),
            ranges: Vec::new(),
        }
    }

    /// Validates every field of the configuration.
    pub fn validate(&self) -> Result<()> {
        self.sketch.validate()?;
        self.geometry.validate()?;
        for &(lo, hi) in &self.ranges {
            if hi < lo {
                return Err(crate::common::SketchError::InvalidParameter {
                    param: "range".to_string(),
                    value: format!("[{lo}, {hi}]"),
                    constraint: "hi must be >= lo".to_string(),
                });
            }
        }
        Ok(())
    }
}

impl Default for JobConfig {
    fn default() -> Self {
        Self::new(SketchParams::production(), ClusterGeometry::single())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_defaults_are_valid() {
        assert!(SketchParams::production().validate().is_ok());
    }

    #[test]
    fn debug_defaults_are_valid() {
        assert!(SketchParams::debug().validate().is_ok());
    }

    #[test]
    fn rejects_prime_too_small_for_width() {
        let params = SketchParams {
            epsilon: 0.0001,
            delta: 0.1,
            prime: 1000,
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn job_config_rejects_inverted_range() {
        let mut cfg = JobConfig::default();
        cfg.ranges.push((10, 5));
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn single_geometry_is_valid() {
        assert!(ClusterGeometry::single().validate().is_ok());
    }
}
