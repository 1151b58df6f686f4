//! Segment writer
//!
//! Appends encoded batches to the current segment and rotates to a fresh one
//! once the size threshold is reached. Only the watcher thread drives it, so
//! the open file needs no lock of its own.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::{Mutex, MutexGuard};

use crate::error::{Result, TideError};

use super::segment::{last_segment, parse_segment_timestamp, segment_name};
use super::{encode_batch, Buffer, Entry};

/// Something that drains a [`Buffer`] into durable storage
pub trait Flusher: Send {
    fn flush(&mut self, buffer: &Buffer);
}

/// Name of the segment the writer currently appends to
///
/// Shared with the compactor and the replication master: both must leave the
/// open segment alone until it has been rotated out.
#[derive(Clone, Default)]
pub struct ActiveSegment(Arc<Mutex<Option<String>>>);

impl ActiveSegment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<String> {
        self.0.lock().clone()
    }

    /// Hold the name steady (rotation waits) while the guard lives
    pub fn lock(&self) -> MutexGuard<'_, Option<String>> {
        self.0.lock()
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.0.lock().as_deref() == Some(name)
    }
}

/// Called with every batch once it is durable
type CommitHook = Box<dyn FnMut(&[Entry]) + Send>;

/// Writes batches to `wal-<timestamp>.log` segments
pub struct SegmentWriter {
    directory: PathBuf,
    file: Option<File>,
    max_segment_size: usize,
    current_size: usize,
    last_timestamp: u64,
    active: ActiveSegment,
    on_commit: Option<CommitHook>,
}

impl SegmentWriter {
    /// Create a writer over `directory`
    ///
    /// No file is opened until the first write; that first segment is always
    /// newer than anything already on disk.
    pub fn new(directory: &Path, max_segment_size: usize, active: ActiveSegment) -> Result<Self> {
        fs::create_dir_all(directory)?;
        let last_timestamp = parse_segment_timestamp(&last_segment(directory)?).unwrap_or(0);

        Ok(Self {
            directory: directory.to_path_buf(),
            file: None,
            max_segment_size,
            current_size: 0,
            last_timestamp,
            active,
            on_commit: None,
        })
    }

    /// Run `hook` on each written batch, in log order, before its waiters
    /// are released
    pub fn on_commit<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&[Entry]) + Send + 'static,
    {
        self.on_commit = Some(Box::new(hook));
        self
    }

    /// Append one batch, rotating first if the current segment is full
    ///
    /// Returns the number of bytes written.
    pub fn write(&mut self, entries: &[Entry]) -> Result<usize> {
        if self.file.is_none() || self.current_size >= self.max_segment_size {
            self.open_new_segment()?;
        }

        let frame = encode_batch(entries)?;
        let current_size = self.current_size;
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| TideError::WalWrite("no open segment".to_string()))?;

        if let Err(e) = file.write_all(&frame).and_then(|_| file.sync_data()) {
            // Cut a torn frame off so the segment stays decodable.
            if let Err(truncate_err) = file.set_len(current_size as u64) {
                tracing::error!(
                    segment = ?self.active.get(),
                    error = %truncate_err,
                    "can't truncate torn WAL frame, abandoning segment"
                );
                self.file = None;
            }
            return Err(e.into());
        }

        self.current_size += frame.len();
        Ok(frame.len())
    }

    /// Name of the segment currently open for append
    pub fn current_segment(&self) -> Option<String> {
        self.active.get()
    }

    pub fn current_size(&self) -> usize {
        self.current_size
    }

    fn open_new_segment(&mut self) -> Result<()> {
        let mut active = self.active.lock();

        // Closing the previous file: every write was already synced.
        self.file = None;

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| TideError::WalWrite(format!("system clock before epoch: {}", e)))?
            .as_secs();
        let timestamp = now.max(self.last_timestamp + 1);
        let name = segment_name(timestamp);

        let file = OpenOptions::new()
            .create_new(true)
            .append(true)
            .open(self.directory.join(&name))?;

        tracing::debug!(segment = %name, "opened new WAL segment");

        self.file = Some(file);
        self.current_size = 0;
        self.last_timestamp = timestamp;
        *active = Some(name);
        Ok(())
    }
}

impl Flusher for SegmentWriter {
    fn flush(&mut self, buffer: &Buffer) {
        let pending = buffer.pop_all();
        if pending.is_empty() {
            return;
        }

        let entries: Vec<Entry> = pending.iter().map(|p| p.entry.clone()).collect();

        match self.write(&entries) {
            Ok(bytes) => {
                tracing::trace!(entries = entries.len(), bytes, "flushed WAL batch");
                if let Some(hook) = self.on_commit.as_mut() {
                    hook(&entries);
                }
                for p in pending {
                    p.complete(Ok(()));
                }
            }
            Err(e) => {
                tracing::error!(entries = entries.len(), error = %e, "WAL flush failed");
                let message = e.to_string();
                for p in pending {
                    p.complete(Err(TideError::WalWrite(message.clone())));
                }
            }
        }
    }
}
