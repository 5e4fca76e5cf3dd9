//! Validation utilities for sketch construction, geometry, and deserialization

use crate::common::{Result, SketchError};

/// Maximum serialized sketch size (256MB) to prevent resource exhaustion
pub const MAX_BYTE_SIZE: usize = 256 * 1024 * 1024; // 256MB

/// Validate that a value is a valid probability (0.0 < p < 1.0)
/// Typically used for epsilon (error rate) and delta (confidence)
pub fn validate_probability(value: f64, param_name: &str) -> Result<()> {
    if !(0.0 < value && value < 1.0) {
        return Err(SketchError::InvalidParameter {
            param: param_name.to_string(),
            value: value.to_string(),
            constraint: "must be in range (0.0, 1.0) (exclusive)".to_string(),
        });
    }
    Ok(())
}

/// Validate that a deserialized byte size doesn't exceed safety limits
pub fn validate_byte_size(size: usize) -> Result<()> {
    if size > MAX_BYTE_SIZE {
        return Err(SketchError::DeserializationError(format!(
            "Deserialized sketch size {} exceeds maximum allowed size {}",
            size, MAX_BYTE_SIZE
        )));
    }
    Ok(())
}

/// Validate minimum required bytes for deserialization header
pub fn validate_min_size(actual: usize, required: usize) -> Result<()> {
    if actual < required {
        return Err(SketchError::DeserializationError(format!(
            "Insufficient data: need at least {} bytes, got {}",
            required, actual
        )));
    }
    Ok(())
}

/// Validate that width and depth are reasonable for Count-Min Sketch
pub fn validate_width_depth(width: u32, depth: u32) -> Result<()> {
    // Reasonable bounds: width and depth should each be at least 1 and at most 2^20 (1M)
    const MAX_DIM: u32 = 1 << 20; // 1,048,576

    if width == 0 {
        return Err(SketchError::InvalidParameter {
            param: "width".to_string(),
            value: width.to_string(),
            constraint: "must be greater than 0".to_string(),
        });
    }
    if width > MAX_DIM {
        return Err(SketchError::InvalidParameter {
            param: "width".to_string(),
            value: width.to_string(),
            constraint: format!("must not exceed {}", MAX_DIM),
        });
    }

    if depth == 0 {
        return Err(SketchError::InvalidParameter {
            param: "depth".to_string(),
            value: depth.to_string(),
            constraint: "must be greater than 0".to_string(),
        });
    }
    if depth > MAX_DIM {
        return Err(SketchError::InvalidParameter {
            param: "depth".to_string(),
            value: depth.to_string(),
            constraint: format!("must not exceed {}", MAX_DIM),
        });
    }

    Ok(())
}

/// Validate that a prime modulus is large enough to host the requested width.
///
/// The hash formula `((a*x + b) mod p) mod w` only spreads uniformly over
/// `[0, w)` when `p >= w`; reject configurations that would silently bias
/// low columns.
pub fn validate_prime(prime: u64, width: usize) -> Result<()> {
    if prime < 2 {
        return Err(SketchError::InvalidParameter {
            param: "prime".to_string(),
            value: prime.to_string(),
            constraint: "must be at least 2".to_string(),
        });
    }
    if (prime as u128) < width as u128 {
        return Err(SketchError::InvalidParameter {
            param: "prime".to_string(),
            value: prime.to_string(),
            constraint: format!("must be >= width ({})", width),
        });
    }
    Ok(())
}

/// Validate that a cluster geometry (rank/thread counts) is usable.
pub fn validate_rank_geometry(ranks: usize, threads_per_rank: usize) -> Result<()> {
    if ranks == 0 {
        return Err(SketchError::InvalidParameter {
            param: "ranks".to_string(),
            value: ranks.to_string(),
            constraint: "must be at least 1".to_string(),
        });
    }
    if threads_per_rank == 0 {
        return Err(SketchError::InvalidParameter {
            param: "threads_per_rank".to_string(),
            value: threads_per_rank.to_string(),
            constraint: "must be at least 1".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_probability_valid() {
        assert!(validate_probability(0.1, "epsilon").is_ok());
        assert!(validate_probability(0.5, "delta").is_ok());
        assert!(validate_probability(0.99, "confidence").is_ok());
    }

    #[test]
    fn test_validate_probability_invalid() {
        assert!(validate_probability(0.0, "epsilon").is_err());
        assert!(validate_probability(1.0, "delta").is_err());
        assert!(validate_probability(-0.1, "value").is_err());
    }

    #[test]
    fn test_validate_width_depth() {
        assert!(validate_width_depth(256, 5).is_ok());
        assert!(validate_width_depth(0, 5).is_err());
        assert!(validate_width_depth(256, 0).is_err());
    }

    #[test]
    fn test_validate_prime() {
        assert!(validate_prime(2_147_483_647, 256).is_ok());
        assert!(validate_prime(1, 256).is_err());
        assert!(validate_prime(100, 256).is_err());
    }

    #[test]
    fn test_validate_rank_geometry() {
        assert!(validate_rank_geometry(4, 2).is_ok());
        assert!(validate_rank_geometry(0, 2).is_err());
        assert!(validate_rank_geometry(4, 0).is_err());
    }
}
