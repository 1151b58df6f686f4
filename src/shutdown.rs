//! Process-wide cancellation token
//!
//! Background threads `select!` on [`Shutdown::signal`]. Triggering drops the
//! only sender, so every receiver becomes disconnected and its select arm
//! fires immediately, now and forever after.

use std::sync::Arc;

use crossbeam::channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;

/// Cloneable cancellation token shared by every long-lived worker
#[derive(Clone)]
pub struct Shutdown {
    trigger: Arc<Mutex<Option<Sender<()>>>>,
    signal: Receiver<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, rx) = bounded(0);
        Self {
            trigger: Arc::new(Mutex::new(Some(tx))),
            signal: rx,
        }
    }

    /// Cancel every holder of this token. Idempotent.
    pub fn trigger(&self) {
        if self.trigger.lock().take().is_some() {
            tracing::debug!("shutdown triggered");
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.trigger.lock().is_none()
    }

    /// Receiver to use in a `select!` arm; it never yields a value, it only
    /// disconnects once the token is triggered.
    pub fn signal(&self) -> &Receiver<()> {
        &self.signal
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
