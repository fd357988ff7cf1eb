//! Read-only transactions

use std::sync::Arc;

use bytes::Bytes;

use crate::error::Result;
use crate::mvcc::{Value, VersionedKey};

use super::Oracle;

/// A consistent snapshot of the store at one begin timestamp
pub struct ReadOnlyTransaction {
    begin_timestamp: u64,
    oracle: Arc<Oracle>,
    closed: bool,
}

impl ReadOnlyTransaction {
    /// Take a snapshot; blocks until earlier commits are applied
    pub fn new(oracle: Arc<Oracle>) -> Result<Self> {
        let begin_timestamp = oracle.begin_timestamp()?;
        Ok(Self {
            begin_timestamp,
            oracle,
            closed: false,
        })
    }

    pub fn begin_timestamp(&self) -> u64 {
        self.begin_timestamp
    }

    /// Newest value of `key` committed at or before the snapshot
    pub fn get(&self, key: impl AsRef<[u8]>) -> Option<Value> {
        let key = VersionedKey::new(Bytes::copy_from_slice(key.as_ref()), self.begin_timestamp);
        self.oracle.memtable().get(&key)
    }

    /// End the snapshot. Dropping the transaction does the same.
    pub fn close(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        if std::mem::replace(&mut self.closed, true) {
            return;
        }
        if self.oracle.finish_begin_timestamp(self.begin_timestamp).is_err() {
            tracing::trace!(
                "Store stopped before snapshot {} was closed",
                self.begin_timestamp
            );
        }
    }
}

impl Drop for ReadOnlyTransaction {
    fn drop(&mut self) {
        self.finish();
    }
}
