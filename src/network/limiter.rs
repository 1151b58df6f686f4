//! Connection limiter
//!
//! A counting semaphore built on a bounded channel: a slot in the channel is
//! one live connection.

use crossbeam::channel::{bounded, Receiver, Sender};

/// Caps the number of concurrently served connections
#[derive(Clone)]
pub struct ConnectionLimiter {
    slots: Sender<()>,
    release: Receiver<()>,
}

/// A held connection slot; dropping it frees the slot
pub struct Permit {
    release: Receiver<()>,
}

impl ConnectionLimiter {
    pub fn new(max_connections: usize) -> Self {
        let (slots, release) = bounded(max_connections);
        Self { slots, release }
    }

    /// Take a slot without waiting; `None` when every slot is in use
    pub fn try_acquire(&self) -> Option<Permit> {
        self.slots.try_send(()).ok().map(|()| Permit {
            release: self.release.clone(),
        })
    }

    pub fn in_use(&self) -> usize {
        self.slots.len()
    }

    pub fn is_full(&self) -> bool {
        self.slots.is_full()
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        let _ = self.release.try_recv();
    }
}
