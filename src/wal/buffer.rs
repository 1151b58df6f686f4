//! Batch buffer
//!
//! Staging queue between callers and the segment writer. Callers get a
//! [`Completion`] back and block on it, the watcher drains everything that
//! accumulated since the previous flush.

use crossbeam::channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;

use crate::error::{Result, TideError};

use super::Entry;

/// Receiving half of an entry's single-use durability signal
pub struct Completion {
    rx: Receiver<Result<()>>,
}

impl Completion {
    /// Block until the batch holding this entry has been written (or failed)
    pub fn wait(self) -> Result<()> {
        self.rx.recv().unwrap_or_else(|_| {
            Err(TideError::WalWrite(
                "entry dropped before it was flushed".to_string(),
            ))
        })
    }
}

/// An entry waiting for the next flush, with its completion sender
pub struct PendingEntry {
    pub entry: Entry,
    done: Sender<Result<()>>,
}

impl PendingEntry {
    /// Resolve the caller's completion; consumes the pending entry
    pub fn complete(self, outcome: Result<()>) {
        // The waiter may be gone (caller thread exited); nothing to report to.
        let _ = self.done.send(outcome);
    }
}

struct Inner {
    values: Vec<PendingEntry>,
    closed: bool,
}

/// Buffer of entries pending a WAL flush
pub struct Buffer {
    limit: usize,
    inner: Mutex<Inner>,
    oversize_tx: Sender<()>,
    oversize_rx: Receiver<()>,
}

impl Buffer {
    /// `limit` is the length at which the watcher is asked to flush early
    pub fn new(limit: usize) -> Self {
        let (oversize_tx, oversize_rx) = bounded(1);
        Self {
            limit,
            inner: Mutex::new(Inner {
                values: Vec::with_capacity(limit),
                closed: false,
            }),
            oversize_tx,
            oversize_rx,
        }
    }

    /// Queue an entry; never waits for the flush itself
    pub fn push(&self, entry: Entry) -> Completion {
        let (done, rx) = bounded(1);
        let mut inner = self.inner.lock();

        if inner.closed {
            let _ = done.send(Err(TideError::ShuttingDown));
            return Completion { rx };
        }

        inner.values.push(PendingEntry { entry, done });

        if inner.values.len() >= self.limit && self.oversize_tx.is_empty() {
            // Capacity is one: a Full error means a notification is already
            // pending, which is all we wanted.
            let _ = self.oversize_tx.try_send(());
        }

        Completion { rx }
    }

    /// Take every pending entry, leaving the buffer empty
    pub fn pop_all(&self) -> Vec<PendingEntry> {
        let mut inner = self.inner.lock();
        std::mem::take(&mut inner.values)
    }

    /// Readiness signal raised when the buffer reaches its limit
    pub fn oversize(&self) -> &Receiver<()> {
        &self.oversize_rx
    }

    /// Refuse further pushes; already queued entries are still drained
    pub fn close(&self) {
        self.inner.lock().closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    pub fn len(&self) -> usize {
        self.inner.lock().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}
