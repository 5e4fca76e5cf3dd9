//! 2-universal hash family for Count-Min Sketch rows
//!
//! Each row of a [`CountMinSketch`](crate::sketch::CountMinSketch) is indexed
//! by an independently-drawn member of the family `h(x) = ((a*x + b) mod p)
//! mod w`. The family is 2-universal for any fixed prime `p` and multiplier
//! `a` drawn uniformly from `[1, p-1]`: it is this property, not any
//! particular choice of hash function, that gives the sketch its `(ε, δ)`
//! accuracy guarantee.
//!
//! # Determinism
//! A sketch's hash vector is drawn once by the coordinating root and then
//! broadcast verbatim (see [`crate::collective`]) to every worker. Two
//! sketches can only be merged, or inner-producted, if their hash vectors
//! are bit-identical — see [`UniversalHash::compatible_with`].

use rand::Rng;

use crate::common::{validation, Result};

/// Mersenne prime `2^31 - 1`, the default modulus for the hash family.
pub const DEFAULT_PRIME: u64 = 2_147_483_647;

/// Wide prime used to reduce string keys to a 32-bit digest before they are
/// treated as integer items (spec policy: djb2-style string digestion).
const STRING_DIGEST_PRIME: u64 = 4_294_967_311;

/// A single 2-universal hash function keyed by `(a, b, p, w)`.
///
/// `evaluate` performs its intermediate multiplication in `u64` so that
/// `a * x + b` cannot overflow for any `u32` input before the modular
/// reduction by `p` is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniversalHash {
    a: u32,
    b: u32,
    p: u64,
    w: u32,
}

impl UniversalHash {
    /// Builds a hash function from explicit parameters, validating that `p`
    /// is large enough to host `w` without bias and that `a`/`b` are in
    /// range.
    pub fn new(a: u32, b: u32, p: u64, w: u32) -> Result<Self> {
        validation::validate_prime(p, w as usize)?;
        if a == 0 || u64::from(a) >= p {
            return Err(crate::common::SketchError::InvalidParameter {
                param: "a".to_string(),
                value: a.to_string(),
                constraint: format!("must be in [1, {})", p - 1),
            });
        }
        if u64::from(b) >= p {
            return Err(crate::common::SketchError::InvalidParameter {
                param: "b".to_string(),
                value: b.to_string(),
                constraint: format!("must be in [0, {})", p),
            });
        }
        Ok(Self { a, b, p, w })
    }

    /// Draws a single hash function uniformly at random: `a` from `[1, p-1]`,
    /// `b` from `[0, p-1]`.
    pub fn draw<R: Rng + ?Sized>(rng: &mut R, p: u64, w: u32) -> Result<Self> {
        validation::validate_prime(p, w as usize)?;
        let a = rng.random_range(1..p) as u32;
        let b = rng.random_range(0..p) as u32;
        Ok(Self { a, b, p, w })
    }

    /// Draws `depth` independent hash functions sharing the same `(p, w)`.
    pub fn draw_array<R: Rng + ?Sized>(
        rng: &mut R,
        p: u64,
        w: u32,
        depth: usize,
    ) -> Result<Vec<Self>> {
        (0..depth).map(|_| Self::draw(rng, p, w)).collect()
    }

    /// Evaluates `h(x) = ((a*x + b) mod p) mod w`.
    #[inline]
    pub fn evaluate(&self, x: u32) -> usize {
        let widened = u64::from(self.a) * u64::from(x) + u64::from(self.b);
        ((widened % self.p) % u64::from(self.w)) as usize
    }

    /// Returns the shared modulus.
    pub fn p(&self) -> u64 {
        self.p
    }

    /// Returns the sketch width this hash indexes into.
    pub fn w(&self) -> u32 {
        self.w
    }

    /// Returns the multiplier `a`.
    pub fn a(&self) -> u32 {
        self.a
    }

    /// Returns the additive term `b`.
    pub fn b(&self) -> u32 {
        self.b
    }

    /// Serializes this hash as the `(a, b, p, w)` byte record used by the
    /// collective broadcast, all fields little-endian `u32`.
    pub fn to_bytes(self) -> [u8; 16] {
        let mut out = [0u8; 16];
        out[0..4].copy_from_slice(&self.a.to_le_bytes());
        out[4..8].copy_from_slice(&self.b.to_le_bytes());
        out[8..12].copy_from_slice(&(self.p as u32).to_le_bytes());
        out[12..16].copy_from_slice(&self.w.to_le_bytes());
        out
    }

    /// Deserializes a hash from the 16-byte `(a, b, p, w)` record.
    pub fn from_bytes(bytes: &[u8; 16]) -> Result<Self> {
        let a = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
        let b = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
        let p = u32::from_le_bytes(bytes[8..12].try_into().unwrap());
        let w = u32::from_le_bytes(bytes[12..16].try_into().unwrap());
        Self::new(a, b, u64::from(p), w)
    }
}

/// Reduces an arbitrary byte string to a `u32` key using a djb2-style
/// rolling hash, modulo [`STRING_DIGEST_PRIME`]. The resulting `u32` is then
/// treated as an ordinary integer item by the sketch — the sketch itself
/// never branches on whether the original item was a string or an integer.
pub fn digest_key(bytes: &[u8]) -> u32 {
    let mut hash: u64 = 5381;
    for &byte in bytes {
        hash = hash
            .wrapping_shl(5)
            .wrapping_add(hash)
            .wrapping_add(u64::from(byte));
    }
    (hash % STRING_DIGEST_PRIME) as u32
}
