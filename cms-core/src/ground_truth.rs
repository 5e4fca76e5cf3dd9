//! Ground-truth counts used to evaluate sketch accuracy
//!
//! A ground-truth file is a sequence of `"<value> <count>"` lines giving the
//! exact frequency of each distinct item in the dataset the sketch was built
//! from. It is produced out of band (e.g. a full pass with `sort | uniq -c`)
//! and is never required for ingest itself — only for the accuracy report.

use std::collections::HashMap;
use std::io::BufRead;

use crate::common::{Result, SketchError};

/// Exact per-item counts loaded from a ground-truth file, plus the total
/// number of input lines the dataset had (always derived by counting,
/// never assumed or hardcoded).
#[derive(Debug, Clone, Default)]
pub struct GroundTruthTable {
    counts: HashMap<u32, u64>,
}

impl GroundTruthTable {
    /// Parses a ground-truth table from `"<value> <count>"` lines. Blank
    /// lines are skipped; a malformed line is an error, since ground-truth
    /// files are machine-generated and a parse failure here indicates a
    /// corrupt or mismatched file rather than ordinary dirty input.
    ///
    /// # Errors
    /// Returns `SketchError::ResourceFailure` if a line cannot be read, and
    /// `SketchError::InvalidParameter` if a line is malformed.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut counts = HashMap::new();
        for (line_no, line) in reader.lines().enumerate() {
            let line = line.map_err(|err| SketchError::ResourceFailure {
                reason: format!("reading ground-truth line {}: {err}", line_no + 1),
            })?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut parts = line.split_whitespace();
            let value = parts.next().ok_or_else(|| malformed(line_no, line))?;
            let count = parts.next().ok_or_else(|| malformed(line_no, line))?;
            if parts.next().is_some() {
                return Err(malformed(line_no, line));
            }
            let value: u32 = value.parse().map_err(|_| malformed(line_no, line))?;
            let count: u64 = count.parse().map_err(|_| malformed(line_no, line))?;
            counts.insert(value, count);
        }
        Ok(Self { counts })
    }

    /// The exact count for `item`, or `0` if it never appeared.
    pub fn count_of(&self, item: u32) -> u64 {
        self.counts.get(&item).copied().unwrap_or(0)
    }

    /// The exact sum of counts for every item in `[lo, hi]` inclusive.
    pub fn range_count(&self, lo: u32, hi: u32) -> u64 {
        self.counts
            .iter()
            .filter(|&(&value, _)| value >= lo && value <= hi)
            .map(|(_, &count)| count)
            .sum()
    }

    /// Total number of (item, count) pairs tracked.
    pub fn distinct_items(&self) -> usize {
        self.counts.len()
    }

    /// Iterates over every distinct item this table has an exact count for.
    pub fn items(&self) -> impl Iterator<Item = &u32> {
        self.counts.keys()
    }

    /// Total of all counts, i.e. the dataset's item count.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }
}

fn malformed(line_no: usize, line: &str) -> SketchError {
    SketchError::InvalidParameter {
        param: "ground_truth_line".to_string(),
        value: format!("{}: {line}", line_no + 1),
        constraint: "must be \"<value> <count>\"".to_string(),
    }
}

/// A query to issue against both the sketch and the ground-truth table when
/// building an accuracy report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroundTruthProbe {
    /// Exact frequency of a single value.
    Point(u32),
    /// Sum of frequencies over `[lo, hi]` inclusive.
    Range(u32, u32),
}

/// Counts the number of records in a line-oriented input. Always derived by
/// counting newline boundaries rather than assumed from an external source,
/// so a mismatched or truncated dataset cannot silently desync the reported
/// totals from what was actually ingested.
pub fn count_lines<R: BufRead>(mut reader: R) -> Result<u64> {
    let mut count = 0u64;
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let bytes_read = reader
            .read_until(b'\n', &mut buf)
            .map_err(|err| SketchError::ResourceFailure {
                reason: format!("counting lines: {err}"),
            })?;
        if bytes_read == 0 {
            break;
        }
        // Both a trailing newline and a final unterminated line count as a
        // record, as long as the buffer held any bytes at all.
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_value_count_pairs() {
        let table = GroundTruthTable::from_reader(Cursor::new("1 5\n2 3\n")).unwrap();
        assert_eq!(table.count_of(1), 5);
        assert_eq!(table.count_of(2), 3);
        assert_eq!(table.count_of(999), 0);
    }

    #[test]
    fn skips_blank_lines() {
        let table = GroundTruthTable::from_reader(Cursor::new("1 5\n\n2 3\n")).unwrap();
        assert_eq!(table.distinct_items(), 2);
    }

    #[test]
    fn rejects_malformed_line() {
        assert!(GroundTruthTable::from_reader(Cursor::new("1 5\nbogus\n")).is_err());
        assert!(GroundTruthTable::from_reader(Cursor::new("1\n")).is_err());
        assert!(GroundTruthTable::from_reader(Cursor::new("1 5 extra\n")).is_err());
    }

    #[test]
    fn range_count_sums_inclusive_range() {
        let table = GroundTruthTable::from_reader(Cursor::new("1 1\n2 2\n3 3\n4 4\n")).unwrap();
        assert_eq!(table.range_count(2, 3), 5);
    }

    #[test]
    fn count_lines_counts_trailing_newline() {
        assert_eq!(count_lines(Cursor::new("a\nb\nc\n")).unwrap(), 3);
    }

    #[test]
    fn count_lines_counts_unterminated_final_line() {
        assert_eq!(count_lines(Cursor::new("a\nb\nc")).unwrap(), 3);
    }

    #[test]
    fn count_lines_handles_empty_input() {
        assert_eq!(count_lines(Cursor::new("")).unwrap(), 0);
    }
}
