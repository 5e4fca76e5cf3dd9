//! Error types for sketch and cluster operations

use std::fmt;

/// Errors that can occur while building, merging, or querying a sketch,
/// or while running the distributed ingest pipeline around one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SketchError {
    /// Invalid parameter provided to sketch constructor or operation
    InvalidParameter {
        /// Parameter name
        param: String,
        /// Invalid value provided
        value: String,
        /// Constraint that was violated
        constraint: String,
    },

    /// Error during serialization
    SerializationError(String),

    /// Error during deserialization
    DeserializationError(String),

    /// Attempted to merge, or inner-product, incompatible sketches
    IncompatibleSketches {
        /// Reason for incompatibility
        reason: String,
    },

    /// A worker could not open, read, or parse its assigned input range
    ResourceFailure {
        /// What resource failed and why
        reason: String,
    },

    /// A collective call (broadcast, reduce, barrier) failed
    ProtocolFailure {
        /// Which collective operation failed and why
        reason: String,
    },

    /// An estimate was observed to be lower than the true count it should
    /// bound from above. This can only indicate an implementation bug and
    /// is never produced by a correctly functioning sketch.
    InvariantViolation {
        /// Description of the violated invariant
        reason: String,
    },
}

impl fmt::Display for SketchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SketchError::InvalidParameter {
                param,
                value,
                constraint,
            } => {
                write!(
                    f,
                    "Invalid parameter '{}': value '{}' {}",
                    param, value, constraint
                )
            }
            SketchError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            SketchError::DeserializationError(msg) => write!(f, "Deserialization error: {}", msg),
            SketchError::IncompatibleSketches { reason } => {
                write!(f, "Incompatible sketches: {}", reason)
            }
            SketchError::ResourceFailure { reason } => write!(f, "Resource failure: {}", reason),
            SketchError::ProtocolFailure { reason } => write!(f, "Protocol failure: {}", reason),
            SketchError::InvariantViolation { reason } => {
                write!(f, "Invariant violation: {}", reason)
            }
        }
    }
}

impl std::error::Error for SketchError {}

/// Result type alias for sketch and cluster operations
pub type Result<T> = std::result::Result<T, SketchError>;
