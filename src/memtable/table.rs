//! MemTable implementation
//!
//! BTreeMap-based table with RwLock for concurrency.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use super::Table;

/// In-memory key → value table
pub struct MemTable {
    data: RwLock<BTreeMap<String, String>>,
}

impl MemTable {
    /// Create a new empty MemTable
    pub fn new() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of live keys
    pub fn entry_count(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Approximate size of keys and values, in bytes
    pub fn size(&self) -> usize {
        self.data
            .read()
            .iter()
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }

    /// Copy of the whole table, sorted by key
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.data.read().clone()
    }

    pub fn clear(&self) {
        self.data.write().clear();
    }
}

impl Table for MemTable {
    fn set(&self, key: &str, value: &str) {
        self.data.write().insert(key.to_string(), value.to_string());
    }

    fn get(&self, key: &str) -> Option<String> {
        self.data.read().get(key).cloned()
    }

    fn del(&self, key: &str) {
        self.data.write().remove(key);
    }

    fn len(&self) -> usize {
        self.entry_count()
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}
