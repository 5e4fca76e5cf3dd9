//! Distributed Count-Min Sketch construction
//!
//! A [`CountMinSketch`] is a probabilistic frequency table: it trades a
//! small, bounded over-estimate for space sub-linear in the number of
//! distinct items. The interesting engineering here is not the sketch
//! itself but building one over a terabyte-scale input split across many
//! processes (`ranks`) and threads without ever materializing the whole
//! stream in one place, while guaranteeing the result is bit-identical to
//! whatever a single-threaded pass over the same lines would have produced.
//!
//! - [`hash`] — the 2-universal hash family every sketch row is keyed by.
//! - [`sketch`] — the counter matrix itself: update, query, merge, inner product.
//! - [`worker`] — per-rank byte-range partitioning and thread-private accumulation.
//! - [`collective`] — the broadcast/reduce/barrier abstraction ranks communicate through.
//! - [`io`] — line-aligned chunked reads from a path on disk.
//! - [`config`] — sketch sizing and cluster geometry as plain, explicit values.
//! - [`ground_truth`] — exact per-item counts used to evaluate sketch accuracy.
//! - [`accuracy`] — compares sketch estimates against ground truth.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod accuracy;
pub mod collective;
pub mod common;
pub mod config;
pub mod ground_truth;
pub mod hash;
pub mod io;
pub mod sketch;
pub mod worker;

pub use common::{Mergeable, Result, Sketch, SketchError};
pub use sketch::CountMinSketch;

/// Error types and result aliases for sketch operations
pub mod error {
    pub use crate::common::{Result, SketchError};
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_library_compiles() {
        // Placeholder ensuring the crate's module tree is well-formed.
    }
}
