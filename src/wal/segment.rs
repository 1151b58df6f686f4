//! Segment naming
//!
//! Segments are named `wal-<unix seconds>.log`. Ordering always goes through
//! the parsed timestamp, so names of different digit counts still sort in
//! creation order.

use std::fs;
use std::path::Path;

use crate::error::{Result, TideError};

pub const SEGMENT_PREFIX: &str = "wal-";
pub const SEGMENT_SUFFIX: &str = ".log";

/// File name for a segment created at `timestamp`
pub fn segment_name(timestamp: u64) -> String {
    format!("{}{}{}", SEGMENT_PREFIX, timestamp, SEGMENT_SUFFIX)
}

/// "wal-1716904987.log" → Some(1716904987)
pub fn parse_segment_timestamp(name: &str) -> Option<u64> {
    name.strip_prefix(SEGMENT_PREFIX)?
        .strip_suffix(SEGMENT_SUFFIX)?
        .parse()
        .ok()
}

pub fn is_segment_name(name: &str) -> bool {
    parse_segment_timestamp(name).is_some()
}

/// All segment names in `dir`, oldest first
pub fn list_segments(dir: &Path) -> Result<Vec<String>> {
    newer_segment_names(dir, "")
}

/// Segment names whose timestamp is `>=` the one embedded in `name`
///
/// An empty `name` selects every segment. Files that are not segments are
/// skipped; a non-empty `name` that is not a segment name is an error.
pub fn newer_segment_names(dir: &Path, name: &str) -> Result<Vec<String>> {
    let threshold = if name.is_empty() {
        0
    } else {
        parse_segment_timestamp(name).ok_or_else(|| {
            TideError::WalCorruption(format!("can't parse segment timestamp from {:?}", name))
        })?
    };

    let mut segments: Vec<(u64, String)> = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_name = entry.file_name().to_string_lossy().into_owned();

        if let Some(timestamp) = parse_segment_timestamp(&file_name) {
            if timestamp >= threshold {
                segments.push((timestamp, file_name));
            }
        }
    }

    segments.sort();
    Ok(segments.into_iter().map(|(_, name)| name).collect())
}

/// Newest segment in `dir`, or an empty string when there is none
pub fn last_segment(dir: &Path) -> Result<String> {
    Ok(newer_segment_names(dir, "")?.pop().unwrap_or_default())
}

/// The segment right after `name`
///
/// - no segments at or after `name` → `""`
/// - `name` empty, or `name` is already the newest → the first result
///   (which is `name` itself when the caller is at the tip)
/// - otherwise → the second result
pub fn next_segment(dir: &Path, name: &str) -> Result<String> {
    let mut segments = newer_segment_names(dir, name)?;

    if segments.len() == 1 || (name.is_empty() && !segments.is_empty()) {
        return Ok(segments.swap_remove(0));
    }
    if segments.len() > 1 {
        return Ok(segments.swap_remove(1));
    }
    Ok(String::new())
}
