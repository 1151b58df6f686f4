//! MemTable Module
//!
//! The materialized key → value state of the node.
//!
//! ## Responsibilities
//! - Fast reads and writes in memory
//! - Many concurrent readers, one writer at a time
//! - Apply WAL entries coming from recovery or replication
//!
//! ## Data Structure Choice
//! Using BTreeMap wrapped in RwLock:
//! - Ordered keys make snapshots deterministic
//! - Simple and correct first, optimize later

mod table;

pub use table::MemTable;

use crate::error::Result;
use crate::wal::{Entry, Operation};

/// Storage backend behind the engine
///
/// `MemTable` is the only implementation today.
pub trait Table: Send + Sync {
    fn set(&self, key: &str, value: &str);

    fn get(&self, key: &str) -> Option<String>;

    fn del(&self, key: &str);

    /// Number of live keys
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply a batch of WAL entries in order
    ///
    /// Replaying the same batch twice leaves the same state, which is what
    /// at-least-once replication relies on.
    fn apply(&self, entries: &[Entry]) -> Result<()> {
        for entry in entries {
            match entry.operation()? {
                Operation::Set { key, value } => self.set(key, value),
                Operation::Del { key } => self.del(key),
            }
        }
        Ok(())
    }
}
