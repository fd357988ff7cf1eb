//! MemTable implementation
//!
//! Skip list wrapped in a reader/writer lock. Readers share the lock; the
//! apply pipeline is the only writer.

use parking_lot::RwLock;

use super::{LevelGenerator, SkipList, Value, VersionedKey};

/// In-memory multi-version table
pub struct MemTable {
    list: RwLock<SkipList>,
}

impl MemTable {
    /// Create an empty table whose towers are at most `max_level` tall
    pub fn new(max_level: u8) -> Self {
        Self::with_generator(LevelGenerator::new(max_level))
    }

    pub fn with_generator(levels: LevelGenerator) -> Self {
        Self {
            list: RwLock::new(SkipList::with_generator(levels)),
        }
    }

    /// Insert a version (write lock). Returns false for a duplicate key and
    /// version.
    pub fn put(&self, key: VersionedKey, value: Value) -> bool {
        tracing::trace!("Writing {} ({} bytes)", key, value.len());
        self.list.write().insert(key, value)
    }

    /// Latest version of the key visible at `key.version()` (read lock)
    pub fn get(&self, key: &VersionedKey) -> Option<Value> {
        self.list.read().get(key).cloned()
    }

    /// Number of stored versions
    pub fn len(&self) -> usize {
        self.list.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_level(&self) -> usize {
        self.list.read().max_level()
    }

    /// Copy out every stored version in sort order
    pub fn entries(&self) -> Vec<(VersionedKey, Value)> {
        self.list
            .read()
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new(crate::config::Config::default().max_level)
    }
}
