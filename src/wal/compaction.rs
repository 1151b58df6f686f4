//! Background compaction
//!
//! Periodically folds the two oldest sealed segments into one snapshot of
//! SET entries that keeps the older segment's name. Deleted keys simply
//! disappear from the snapshot.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam::channel::tick;
use crossbeam::select;

use crate::error::{Result, TideError};
use crate::shutdown::Shutdown;

use super::segment::list_segments;
use super::{encode_batch, ActiveSegment, BatchIter, Entry, Operation};

/// Merges old segments to bound WAL growth
pub struct Compactor {
    directory: PathBuf,
    interval: Duration,
    active: ActiveSegment,
    in_progress: AtomicBool,
}

impl Compactor {
    pub fn new(directory: &Path, interval: Duration, active: ActiveSegment) -> Self {
        Self {
            directory: directory.to_path_buf(),
            interval,
            active,
            in_progress: AtomicBool::new(false),
        }
    }

    /// Run on every interval tick until `shutdown` fires (blocking)
    pub fn start(&self, shutdown: &Shutdown) {
        let ticker = tick(self.interval);

        loop {
            select! {
                recv(ticker) -> _ => {
                    if let Err(e) = self.run() {
                        tracing::error!(error = %e, "can't compact WAL");
                    }
                }
                recv(shutdown.signal()) -> _ => {
                    tracing::debug!("compactor stopped");
                    return;
                }
            }
        }
    }

    /// One compaction pass
    ///
    /// Returns the name of the merged segment, or `None` when the pass was
    /// skipped (another pass running, or fewer than two sealed segments).
    pub fn run(&self) -> Result<Option<String>> {
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("compaction already in progress, skipping tick");
            return Ok(None);
        }

        let result = self.run_once();
        self.in_progress.store(false, Ordering::Release);
        result
    }

    fn run_once(&self) -> Result<Option<String>> {
        // The open segment only ever moves forward, so whatever is sealed
        // now stays sealed after the lock is released.
        let segments = {
            let active = self.active.lock();
            let mut segments = list_segments(&self.directory)?;
            segments.retain(|s| Some(s.as_str()) != active.as_deref());
            segments
        };

        if segments.len() < 2 {
            return Ok(None);
        }

        self.compact(&segments[..2])?;
        Ok(Some(segments[0].clone()))
    }

    /// Merge `segments` (oldest first) into one snapshot named like the first
    pub fn compact(&self, segments: &[String]) -> Result<()> {
        let Some((target, rest)) = segments.split_first() else {
            return Ok(());
        };

        let snapshot = self.read_units(segments)?;
        let frame = if snapshot.is_empty() {
            None
        } else {
            Some(encode_batch(&snapshot)?)
        };

        let tmp_path = self.directory.join(format!("compacted-{}.tmp", target));
        {
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp_path)?;
            if let Some(frame) = &frame {
                file.write_all(frame)?;
            }
            file.sync_all()?;
        }

        // Replacing the oldest segment first keeps every intermediate state
        // replayable: a crash before the remaining removals only leaves
        // segments whose entries are already folded into the snapshot.
        fs::rename(&tmp_path, self.directory.join(target))?;
        for segment in rest {
            fs::remove_file(self.directory.join(segment)).map_err(|e| {
                TideError::Io(std::io::Error::new(
                    e.kind(),
                    format!("can't remove segment {}: {}", segment, e),
                ))
            })?;
        }
        sync_dir(&self.directory)?;

        tracing::info!(
            merged = ?segments,
            into = %target,
            entries = snapshot.len(),
            "compacted WAL segments"
        );
        Ok(())
    }

    /// Replay `segments` into a key → value map and return it as SET entries
    pub fn read_units(&self, segments: &[String]) -> Result<Vec<Entry>> {
        let mut table: BTreeMap<String, String> = BTreeMap::new();

        for segment in segments {
            let data = fs::read(self.directory.join(segment))?;
            for batch in BatchIter::new(&data) {
                for entry in batch? {
                    match entry.operation()? {
                        Operation::Set { key, value } => {
                            table.insert(key.to_string(), value.to_string());
                        }
                        Operation::Del { key } => {
                            table.remove(key);
                        }
                    }
                }
            }
        }

        Ok(table.into_iter().map(|(k, v)| Entry::set(k, v)).collect())
    }

    pub fn is_in_progress(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    fs::File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}
