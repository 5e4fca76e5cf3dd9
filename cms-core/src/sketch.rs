//! Count-Min Sketch: the probabilistic frequency table itself
//!
//! A [`CountMinSketch`] is a `depth x width` matrix of saturating counters
//! plus one [`UniversalHash`] per row. `update` increments one counter per
//! row; `point_query` returns the minimum of those counters, which is never
//! smaller than the true count and is within `epsilon * total` of it with
//! probability at least `1 - delta`.
//!
//! Two sketches can only be [`merge`](Mergeable::merge)d or
//! [`inner_product`](CountMinSketch::inner_product)ed if they share the same
//! geometry and the same hash vector, byte for byte — this crate treats that
//! as a hard precondition rather than something to silently coerce.

use rand::Rng;

use crate::common::{validation, Mergeable, Result, Sketch, SketchError};
use crate::hash::UniversalHash;

/// A Count-Min Sketch over `u32` items.
///
/// String or other hashable items are expected to already have been reduced
/// to a `u32` key via [`crate::hash::digest_key`] before reaching `update`;
/// the sketch itself has no notion of the original item type.
#[derive(Debug, Clone)]
pub struct CountMinSketch {
    depth: usize,
    width: usize,
    table: Vec<u32>,
    hashes: Vec<UniversalHash>,
    total: u64,
    epsilon: f64,
    delta: f64,
}

impl CountMinSketch {
    /// Builds an empty sketch sized for the requested `(epsilon, delta)`
    /// accuracy target, drawing a fresh hash vector from `rng` over the
    /// given `prime`.
    ///
    /// `width = ceil(e / epsilon)`, `depth = ceil(ln(1 / delta))`, matching
    /// the standard Count-Min Sketch sizing theorem.
    ///
    /// # Errors
    /// Returns `SketchError::InvalidParameter` if `epsilon`/`delta` are not
    /// in `(0, 1)`, or if `prime` cannot host the resulting width.
    pub fn init<R: Rng + ?Sized>(epsilon: f64, delta: f64, prime: u64, rng: &mut R) -> Result<Self> {
        validation::validate_probability(epsilon, "epsilon")?;
        validation::validate_probability(delta, "delta")?;

        let width = (std::f64::consts::E / epsilon).ceil() as usize;
        let depth = (1.0_f64 / delta).ln().ceil() as usize;
        validation::validate_width_depth(width as u32, depth as u32)?;

        let hashes = UniversalHash::draw_array(rng, prime, width as u32, depth)?;
        Ok(Self {
            depth,
            width,
            table: vec![0u32; depth * width],
            hashes,
            total: 0,
            epsilon,
            delta,
        })
    }

    /// Builds an empty sketch from an already-drawn hash vector, as used by
    /// a worker that received its hashes via [`crate::collective::Collective::broadcast`]
    /// rather than drawing its own.
    pub fn from_hashes(hashes: Vec<UniversalHash>, epsilon: f64, delta: f64) -> Result<Self> {
        let depth = hashes.len();
        let width = hashes.first().map_or(0, |h| h.w() as usize);
        validation::validate_width_depth(width as u32, depth as u32)?;
        if hashes.iter().any(|h| h.w() as usize != width) {
            return Err(SketchError::InvalidParameter {
                param: "hashes".to_string(),
                value: "non-uniform widths".to_string(),
                constraint: "every row must share the same width".to_string(),
            });
        }
        Ok(Self {
            depth,
            width,
            table: vec![0u32; depth * width],
            hashes,
            total: 0,
            epsilon,
            delta,
        })
    }

    /// Sketch depth (number of hash rows).
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Sketch width (counters per row).
    pub fn width(&self) -> usize {
        self.width
    }

    /// The hash vector this sketch was built with. Two sketches are
    /// mergeable only if this vector is identical between them.
    pub fn hashes(&self) -> &[UniversalHash] {
        &self.hashes
    }

    /// Total number of items folded into this sketch (sum of all updates'
    /// counts, not the number of distinct items).
    pub fn total(&self) -> u64 {
        self.total
    }

    /// `epsilon` this sketch was sized for.
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// `delta` this sketch was sized for.
    pub fn delta(&self) -> f64 {
        self.delta
    }

    #[inline]
    fn cell(&self, row: usize, col: usize) -> u32 {
        self.table[row * self.width + col]
    }

    #[inline]
    fn cell_mut(&mut self, row: usize, col: usize) -> &mut u32 {
        &mut self.table[row * self.width + col]
    }

    /// Increments the counter for `item` by `count` in every row, saturating
    /// at `u32::MAX` rather than wrapping.
    pub fn update_by(&mut self, item: u32, count: u32) {
        for row in 0..self.depth {
            let col = self.hashes[row].evaluate(item);
            let cell = self.cell_mut(row, col);
            *cell = cell.saturating_add(count);
        }
        self.total = self.total.saturating_add(u64::from(count));
    }

    /// Increments the counter for `item` by one.
    pub fn update_one(&mut self, item: u32) {
        self.update_by(item, 1);
    }

    /// Estimates the frequency of `item`: the minimum counter across all
    /// rows. Never smaller than the true count.
    pub fn point_query(&self, item: u32) -> u32 {
        (0..self.depth)
            .map(|row| self.cell(row, self.hashes[row].evaluate(item)))
            .min()
            .unwrap_or(0)
    }

    /// Estimates the sum of frequencies for every item in `[lo, hi]`
    /// inclusive, by summing `point_query` over the range.
    ///
    /// # Errors
    /// Returns `SketchError::InvalidParameter` if `hi < lo`.
    pub fn range_query(&self, lo: u32, hi: u32) -> Result<u64> {
        if hi < lo {
            return Err(SketchError::InvalidParameter {
                param: "range".to_string(),
                value: format!("[{lo}, {hi}]"),
                constraint: "hi must be >= lo".to_string(),
            });
        }
        let mut sum: u64 = 0;
        let mut x = lo;
        loop {
            sum += u64::from(self.point_query(x));
            if x == hi {
                break;
            }
            x += 1;
        }
        Ok(sum)
    }

    /// Estimates the inner product (dot product of true frequency vectors)
    /// between `self` and `other`: for each row, the dot product of the two
    /// rows' counters, minimized across rows. Never smaller than the true
    /// inner product.
    ///
    /// # Errors
    /// Returns `SketchError::IncompatibleSketches` if the two sketches do
    /// not share identical geometry and hash vectors.
    pub fn inner_product(&self, other: &Self) -> Result<u64> {
        self.require_compatible(other)?;
        let mut min_row_product = u64::MAX;
        for row in 0..self.depth {
            let base = row * self.width;
            let mut row_product: u64 = 0;
            for col in 0..self.width {
                row_product +=
                    u64::from(self.table[base + col]) * u64::from(other.table[base + col]);
            }
            min_row_product = min_row_product.min(row_product);
        }
        Ok(min_row_product)
    }

    fn require_compatible(&self, other: &Self) -> Result<()> {
        if self.depth != other.depth || self.width != other.width {
            return Err(SketchError::IncompatibleSketches {
                reason: format!(
                    "geometry mismatch: {}x{} vs {}x{}",
                    self.depth, self.width, other.depth, other.width
                ),
            });
        }
        if self.hashes != other.hashes {
            return Err(SketchError::IncompatibleSketches {
                reason: "hash vectors differ".to_string(),
            });
        }
        Ok(())
    }
}

impl Sketch for CountMinSketch {
    type Item = u32;

    fn update(&mut self, item: &u32) {
        self.update_one(*item);
    }

    fn estimate(&self) -> f64 {
        self.total as f64
    }

    fn is_empty(&self) -> bool {
        self.total == 0
    }

    fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(16 + self.hashes.len() * 16 + self.table.len() * 4);
        out.extend_from_slice(&(self.depth as u32).to_le_bytes());
        out.extend_from_slice(&(self.width as u32).to_le_bytes());
        out.extend_from_slice(&self.epsilon.to_le_bytes());
        out.extend_from_slice(&self.delta.to_le_bytes());
        out.extend_from_slice(&self.total.to_le_bytes());
        for h in &self.hashes {
            out.extend_from_slice(&h.to_bytes());
        }
        for counter in &self.table {
            out.extend_from_slice(&counter.to_le_bytes());
        }
        out
    }

    fn deserialize(bytes: &[u8]) -> Result<Self> {
        const HEADER: usize = 4 + 4 + 8 + 8 + 8;
        validation::validate_min_size(bytes.len(), HEADER)?;
        validation::validate_byte_size(bytes.len())?;

        let depth = u32::from_le_bytes(bytes[0..4].try_into().unwrap()) as usize;
        let width = u32::from_le_bytes(bytes[4..8].try_into().unwrap()) as usize;
        let epsilon = f64::from_le_bytes(bytes[8..16].try_into().unwrap());
        let delta = f64::from_le_bytes(bytes[16..24].try_into().unwrap());
        let total = u64::from_le_bytes(bytes[24..32].try_into().unwrap());

        let hashes_bytes = depth * 16;
        let table_bytes = depth * width * 4;
        validation::validate_min_size(bytes.len(), HEADER + hashes_bytes + table_bytes)?;

        let mut hashes = Vec::with_capacity(depth);
        let mut offset = HEADER;
        for _ in 0..depth {
            let chunk: [u8; 16] = bytes[offset..offset + 16]
                .try_into()
                .map_err(|_| SketchError::DeserializationError("truncated hash row".to_string()))?;
            hashes.push(UniversalHash::from_bytes(&chunk)?);
            offset += 16;
        }

        let mut table = Vec::with_capacity(depth * width);
        for _ in 0..depth * width {
            let counter = u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap());
            table.push(counter);
            offset += 4;
        }

        Ok(Self {
            depth,
            width,
            table,
            hashes,
            total,
            epsilon,
            delta,
        })
    }
}

impl Mergeable for CountMinSketch {
    fn merge(&mut self, other: &Self) -> Result<()> {
        self.require_compatible(other)?;
        for (cell, other_cell) in self.table.iter_mut().zip(other.table.iter()) {
            *cell = cell.saturating_add(*other_cell);
        }
        self.total = self.total.saturating_add(other.total);
        Ok(())
    }
}
