//! Line-aligned chunked file reads for the worker's input side
//!
//! [`crate::worker`] assumes it has already been handed a line-aligned byte
//! slice; this module is what produces that slice from a path on disk,
//! following the boundary-realignment rule from the spec exactly: a rank's
//! nominal start is advanced forward, byte by byte, until the byte just
//! before it is a newline. Each rank opens its own [`File`] handle (the
//! filesystem is assumed to support concurrent, independent random-access
//! reads — see the crate-level concurrency notes) and reads its chunk in
//! bounded sub-reads rather than one unbounded read call.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::common::{Result, SketchError};

/// Upper bound on a single `read` call while pulling in a rank's chunk.
/// Keeps memory use for one sub-read bounded regardless of chunk size.
const MAX_READ_CHUNK: usize = 8 * 1024 * 1024;

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|err| SketchError::ResourceFailure {
        reason: format!("opening {}: {err}", path.display()),
    })
}

/// Scans forward from `nominal` in the file at `path` until the byte right
/// after the next `\n` (or end of file), returning that position. `nominal`
/// itself is returned unchanged when it is `0`, since the first rank never
/// needs realignment.
fn realign_start(path: &Path, nominal: u64, file_len: u64) -> Result<u64> {
    if nominal == 0 || nominal >= file_len {
        return Ok(nominal.min(file_len));
    }
    let mut file = open(path)?;
    file.seek(SeekFrom::Start(nominal))
        .map_err(|err| SketchError::ResourceFailure {
            reason: format!("seeking {}: {err}", path.display()),
        })?;
    let mut pos = nominal;
    let mut buf = [0u8; 4096];
    loop {
        let read = file.read(&mut buf).map_err(|err| SketchError::ResourceFailure {
            reason: format!("scanning {} for line boundary: {err}", path.display()),
        })?;
        if read == 0 {
            return Ok(file_len);
        }
        if let Some(offset) = buf[..read].iter().position(|&b| b == b'\n') {
            return Ok(pos + offset as u64 + 1);
        }
        pos += read as u64;
    }
}

/// Computes the line-aligned `[start, end)` byte range every one of
/// `num_ranks` should process out of the file at `path`, applying the same
/// boundary rule [`crate::worker::partition_by_lines`] applies to an
/// in-memory slice. Only rank boundaries `1..num_ranks` are scanned; rank
/// `0` always starts at `0` and the last rank always ends at `file_len`.
///
/// # Errors
/// Returns `SketchError::ResourceFailure` if the file cannot be opened or
/// read while scanning for a boundary.
pub fn rank_byte_ranges(path: &Path, file_len: u64, num_ranks: usize) -> Result<Vec<(u64, u64)>> {
    if num_ranks == 0 {
        return Err(SketchError::InvalidParameter {
            param: "num_ranks".to_string(),
            value: "0".to_string(),
            constraint: "must be at least 1".to_string(),
        });
    }
    let approx = file_len / num_ranks as u64;
    let mut bounds = Vec::with_capacity(num_ranks + 1);
    bounds.push(0u64);
    for i in 1..num_ranks as u64 {
        let nominal = i * approx;
        bounds.push(realign_start(path, nominal, file_len)?);
    }
    bounds.push(file_len);
    Ok(bounds.windows(2).map(|w| (w[0], w[1])).collect())
}

/// Reads the byte range `[start, end)` out of the file at `path` into an
/// owned buffer, via its own independent file handle and sub-reads bounded
/// by [`MAX_READ_CHUNK`].
///
/// # Errors
/// Returns `SketchError::ResourceFailure` if the file cannot be opened,
/// seeked, or read.
pub fn read_chunk(path: &Path, start: u64, end: u64) -> Result<Vec<u8>> {
    let mut file = open(path)?;
    file.seek(SeekFrom::Start(start))
        .map_err(|err| SketchError::ResourceFailure {
            reason: format!("seeking {}: {err}", path.display()),
        })?;
    let total = (end - start) as usize;
    let mut out = Vec::with_capacity(total);
    let mut remaining = total;
    let mut buf = vec![0u8; MAX_READ_CHUNK.min(total.max(1))];
    while remaining > 0 {
        let want = remaining.min(buf.len());
        let read = file
            .read(&mut buf[..want])
            .map_err(|err| SketchError::ResourceFailure {
                reason: format!("reading {}: {err}", path.display()),
            })?;
        if read == 0 {
            break; // file shorter than expected; caller sees a truncated chunk
        }
        out.extend_from_slice(&buf[..read]);
        remaining -= read;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &[u8]) -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("cms_io_test_{}_{:?}", std::process::id(), std::thread::current().id()));
        let mut f = File::create(&path).unwrap();
        f.write_all(contents).unwrap();
        path
    }

    #[test]
    fn rank_ranges_cover_whole_file_without_gaps() {
        let data = b"1\n22\n333\n4444\n55555\n666666\n7777777\n".to_vec();
        let path = write_temp(&data);
        let ranges = rank_byte_ranges(&path, data.len() as u64, 3).unwrap();
        assert_eq!(ranges.first().unwrap().0, 0);
        assert_eq!(ranges.last().unwrap().1, data.len() as u64);
        for w in ranges.windows(2) {
            assert_eq!(w[0].1, w[1].0);
        }
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn rank_ranges_never_split_a_line() {
        let data = b"1\n2\n3\n4\n5\n6\n7\n8\n9\n10\n".to_vec();
        let path = write_temp(&data);
        for n in 1..=5usize {
            let ranges = rank_byte_ranges(&path, data.len() as u64, n).unwrap();
            for &(start, end) in &ranges {
                let chunk = read_chunk(&path, start, end).unwrap();
                assert!(
                    chunk.is_empty() || chunk.last() == Some(&b'\n') || end == data.len() as u64
                );
            }
        }
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn read_chunk_honors_sub_read_boundary() {
        let data = vec![b'a'; (MAX_READ_CHUNK * 2) + 17];
        let path = write_temp(&data);
        let chunk = read_chunk(&path, 0, data.len() as u64).unwrap();
        assert_eq!(chunk.len(), data.len());
        std::fs::remove_file(&path).unwrap();
    }
}
