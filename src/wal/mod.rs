//! Write-Ahead Log (WAL) Module
//!
//! Provides durability through batched, append-only segment files.
//!
//! ## Responsibilities
//! - Stage mutations in a [`Buffer`] and group-commit them ([`Watcher`])
//! - Append batches to timestamp-named segments, rotating by size
//!   ([`SegmentWriter`])
//! - Replay all segments at startup ([`SegmentReader`])
//! - Fold old segments together in the background ([`Compactor`])
//!
//! ## Directory Layout
//! ```text
//! {data_directory}/
//!   ├── wal-1716904987.log   (sealed)
//!   ├── wal-1716905005.log   (sealed)
//!   └── wal-1716905022.log   (current, open for append)
//! ```
//!
//! ## Segment Format
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Batch 1                                 │
//! │ ┌─────────┬─────────┬─────────────────┐ │
//! │ │ Len (4) │ CRC (4) │ Entries         │ │
//! │ └─────────┴─────────┴─────────────────┘ │
//! ├─────────────────────────────────────────┤
//! │ Batch 2                                 │
//! │ ┌─────────┬─────────┬─────────────────┐ │
//! │ │ Len (4) │ CRC (4) │ Entries         │ │
//! │ └─────────┴─────────┴─────────────────┘ │
//! └─────────────────────────────────────────┘
//! ```

mod buffer;
mod compaction;
mod entry;
mod reader;
pub mod segment;
mod watcher;
mod writer;

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::Result;
use crate::shutdown::Shutdown;

pub use buffer::{Buffer, Completion, PendingEntry};
pub use compaction::Compactor;
pub use entry::{
    decode_batches, encode_batch, BatchIter, Entry, EntryCommand, Operation, FRAME_HEADER_SIZE,
};
pub use reader::SegmentReader;
pub use watcher::Watcher;
pub use writer::{ActiveSegment, Flusher, SegmentWriter};

/// Front door of the WAL: callers append, a watcher thread flushes
pub struct Wal {
    buffer: Arc<Buffer>,
}

impl Wal {
    /// `batch_size` entries in the buffer trigger an early flush
    pub fn new(batch_size: usize) -> Self {
        Self {
            buffer: Arc::new(Buffer::new(batch_size)),
        }
    }

    /// Spawn the watcher thread that flushes through `flusher`
    ///
    /// The thread performs a final flush and exits once `shutdown` fires.
    pub fn start<F>(&self, mut flusher: F, timeout: Duration, shutdown: Shutdown) -> io::Result<JoinHandle<()>>
    where
        F: Flusher + 'static,
    {
        let watcher = Watcher::new(Arc::clone(&self.buffer));
        thread::Builder::new()
            .name("wal-watcher".to_string())
            .spawn(move || watcher.watch(timeout, &mut flusher, &shutdown))
    }

    /// Append an entry and block until its batch is durable
    pub fn append(&self, entry: Entry) -> Result<()> {
        self.buffer.push(entry).wait()
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        self.append(Entry::set(key, value))
    }

    pub fn del(&self, key: &str) -> Result<()> {
        self.append(Entry::del(key))
    }

    pub fn buffer(&self) -> &Arc<Buffer> {
        &self.buffer
    }
}
