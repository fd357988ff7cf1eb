//! Read-write transactions
//!
//! Writes are buffered locally and only reach storage through the executor
//! after a successful commit. Every key read from storage is remembered for
//! the oracle's conflict check.

use std::collections::HashSet;
use std::sync::Arc;

use bytes::Bytes;

use crate::error::Result;
use crate::mvcc::{Value, VersionedKey};

use super::{Batch, CommitHandle, Oracle};

pub struct ReadWriteTransaction {
    begin_timestamp: u64,
    oracle: Arc<Oracle>,
    batch: Batch,
    reads: HashSet<Bytes>,
    /// Set once the begin timestamp has been finished, by commit or close
    begin_finished: bool,
}

impl ReadWriteTransaction {
    /// Take a snapshot; blocks until earlier commits are applied
    pub fn new(oracle: Arc<Oracle>) -> Result<Self> {
        let begin_timestamp = oracle.begin_timestamp()?;
        Ok(Self {
            begin_timestamp,
            oracle,
            batch: Batch::new(),
            reads: HashSet::new(),
            begin_finished: false,
        })
    }

    pub fn begin_timestamp(&self) -> u64 {
        self.begin_timestamp
    }

    /// Read `key`, seeing this transaction's own uncommitted writes first.
    /// Reads that reach storage join the read set.
    pub fn get(&mut self, key: impl AsRef<[u8]>) -> Option<Value> {
        let key = key.as_ref();
        if let Some(value) = self.batch.get(key) {
            return Some(value.clone());
        }

        let key = Bytes::copy_from_slice(key);
        self.reads.insert(key.clone());
        self.oracle
            .memtable()
            .get(&VersionedKey::new(key, self.begin_timestamp))
    }

    /// Buffer a write. Fails with `DuplicateKeyInBatch` if `key` was already
    /// written in this transaction.
    pub fn put(&mut self, key: impl AsRef<[u8]>, value: impl Into<Value>) -> Result<()> {
        self.batch
            .add(Bytes::copy_from_slice(key.as_ref()), value.into())
    }

    /// Keys read from storage so far
    pub fn reads(&self) -> &HashSet<Bytes> {
        &self.reads
    }

    pub fn pending_writes(&self) -> usize {
        self.batch.len()
    }

    /// Commit the buffered writes.
    ///
    /// Fails with `EmptyBatch` when nothing was written and with `Conflict`
    /// when a transaction that committed after our snapshot wrote a key we
    /// read. On success the returned handle fires once the writes are
    /// applied and visible to new snapshots.
    pub fn commit(mut self) -> Result<CommitHandle> {
        let batch = std::mem::take(&mut self.batch);
        let handle = self
            .oracle
            .commit(self.begin_timestamp, &self.reads, batch)?;
        self.begin_finished = true;
        Ok(handle)
    }

    /// Abandon the transaction. Dropping it does the same.
    pub fn close(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        if std::mem::replace(&mut self.begin_finished, true) {
            return;
        }
        if self.oracle.finish_begin_timestamp(self.begin_timestamp).is_err() {
            tracing::trace!(
                "Store stopped before transaction {} was closed",
                self.begin_timestamp
            );
        }
    }
}

impl Drop for ReadWriteTransaction {
    fn drop(&mut self) {
        self.finish();
    }
}
