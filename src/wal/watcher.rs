//! Batch watcher
//!
//! The group-commit scheduler: flushes the buffer on a timer, early when the
//! buffer reports oversize, and one last time on shutdown.

use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::tick;
use crossbeam::select;

use crate::shutdown::Shutdown;

use super::{Buffer, Flusher};

/// Drives flushes of one buffer
pub struct Watcher {
    buffer: Arc<Buffer>,
}

impl Watcher {
    pub fn new(buffer: Arc<Buffer>) -> Self {
        Self { buffer }
    }

    /// Run until `shutdown` fires (blocking)
    ///
    /// An oversize flush restarts the timeout. On shutdown the buffer is
    /// closed and flushed exactly once more, so every accepted entry gets an
    /// outcome before this returns.
    pub fn watch<F: Flusher>(&self, timeout: Duration, flusher: &mut F, shutdown: &Shutdown) {
        let mut ticker = tick(timeout);

        loop {
            select! {
                recv(self.buffer.oversize()) -> _ => {
                    ticker = tick(timeout);
                    flusher.flush(&self.buffer);
                }
                recv(ticker) -> _ => {
                    flusher.flush(&self.buffer);
                }
                recv(shutdown.signal()) -> _ => {
                    self.buffer.close();
                    flusher.flush(&self.buffer);
                    tracing::debug!("WAL watcher stopped");
                    return;
                }
            }
        }
    }
}
