//! Core traits for sketch implementations

use super::error::SketchError;

/// Core trait that all sketches in this crate implement
///
/// This trait defines the fundamental operations that any data sketch must support:
/// updating with new data, estimating results, checking emptiness, and serialization.
pub trait Sketch {
    /// The type of items this sketch can process
    type Item;

    /// Update the sketch with a new item
    fn update(&mut self, item: &Self::Item);

    /// Get a scalar summary estimate from the sketch
    ///
    /// The meaning of this value depends on the sketch type; for
    /// `CountMinSketch` it is not the primary interface (use the generic
    /// `update`/`estimate` methods that take a query item instead).
    fn estimate(&self) -> f64;

    /// Check if the sketch is empty (no items added)
    fn is_empty(&self) -> bool;

    /// Serialize the sketch to bytes
    fn serialize(&self) -> Vec<u8>;

    /// Deserialize a sketch from bytes
    ///
    /// # Errors
    /// Returns `SketchError::DeserializationError` if bytes are invalid
    fn deserialize(bytes: &[u8]) -> Result<Self, SketchError>
    where
        Self: Sized;
}

/// Trait for sketches that support merging
///
/// Merging is essential for distributed computing scenarios where sketches
/// are computed independently (one per worker, or one per thread within a
/// worker) and then combined into a single global sketch.
pub trait Mergeable: Sketch {
    /// Merge another sketch into this one
    ///
    /// After merging, this sketch should represent the union of both sketches'
    /// update streams. Implementations must be commutative and associative.
    ///
    /// # Errors
    /// Returns `SketchError::IncompatibleSketches` if the sketches have
    /// different geometry or different hash vectors.
    fn merge(&mut self, other: &Self) -> Result<(), SketchError>;
}
