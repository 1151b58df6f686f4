//! Segment reader
//!
//! Replays every segment, oldest first, as a stream of batches. Used once at
//! startup to rebuild the in-memory table.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

use crossbeam::channel::{bounded, Receiver, Sender};

use crate::error::{Result, TideError};

use super::segment::list_segments;
use super::{BatchIter, Entry};

/// Reads all segments of a WAL directory
pub struct SegmentReader {
    directory: PathBuf,
}

impl SegmentReader {
    pub fn new(directory: &Path) -> Self {
        Self {
            directory: directory.to_path_buf(),
        }
    }

    /// Start a replay
    ///
    /// Batches arrive in segment order and, within a segment, in the order
    /// they were flushed. The channel closes after the last batch; an error
    /// is sent as the final item. Call again for a fresh replay.
    pub fn read(&self) -> Receiver<Result<Vec<Entry>>> {
        let (tx, rx) = bounded(16);
        let directory = self.directory.clone();

        thread::spawn(move || {
            if let Err(e) = replay(&directory, &tx) {
                let _ = tx.send(Err(e));
            }
        });

        rx
    }
}

fn replay(directory: &Path, tx: &Sender<Result<Vec<Entry>>>) -> Result<()> {
    for segment in list_segments(directory)? {
        let data = fs::read(directory.join(&segment))?;
        let mut batches = 0usize;

        for batch in BatchIter::new(&data) {
            let batch = batch.map_err(|e| match e {
                TideError::WalCorruption(msg) => {
                    TideError::WalCorruption(format!("segment {}: {}", segment, msg))
                }
                other => other,
            })?;
            batches += 1;

            if tx.send(Ok(batch)).is_err() {
                // Consumer hung up; nothing left to replay for.
                return Ok(());
            }
        }

        tracing::debug!(segment = %segment, batches, "replayed WAL segment");
    }
    Ok(())
}
