//! Write batches
//!
//! A read-write transaction buffers its writes in a [`Batch`]. At commit the
//! batch is frozen behind an `Arc`, paired with its commit timestamp and handed
//! to the executor as a [`TimestampedBatch`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};

use crate::error::{IsoError, Result};
use crate::mvcc::Value;

/// Insertion-ordered set of pending writes, at most one per key
#[derive(Debug, Default)]
pub struct Batch {
    pairs: Vec<(Bytes, Value)>,
    index: HashMap<Bytes, usize>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &[u8]) -> Option<&Value> {
        self.index.get(key).map(|&slot| &self.pairs[slot].1)
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.index.contains_key(key)
    }

    /// Buffer a write. A key may only be written once per batch.
    pub fn add(&mut self, key: Bytes, value: Value) -> Result<()> {
        if self.contains(&key) {
            return Err(IsoError::DuplicateKeyInBatch(
                String::from_utf8_lossy(&key).into_owned(),
            ));
        }
        self.index.insert(key.clone(), self.pairs.len());
        self.pairs.push((key, value));
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Pairs in the order they were added
    pub fn iter(&self) -> impl Iterator<Item = (&Bytes, &Value)> {
        self.pairs.iter().map(|(key, value)| (key, value))
    }
}

/// A committed batch on its way to storage
pub struct TimestampedBatch {
    batch: Arc<Batch>,
    commit_timestamp: u64,
    done: Sender<()>,
}

impl TimestampedBatch {
    /// Pair `batch` with its commit timestamp. The returned handle fires once
    /// the executor has applied every write.
    pub fn new(batch: Arc<Batch>, commit_timestamp: u64) -> (Self, CommitHandle) {
        let (done, applied) = channel::bounded(1);
        let timestamped = Self {
            batch,
            commit_timestamp,
            done,
        };
        let handle = CommitHandle {
            commit_timestamp,
            applied,
        };
        (timestamped, handle)
    }

    pub fn batch(&self) -> &Batch {
        &self.batch
    }

    pub fn commit_timestamp(&self) -> u64 {
        self.commit_timestamp
    }

    /// Signal the waiting committer and release the batch
    pub(crate) fn mark_applied(self) {
        // The committer may have dropped its handle without waiting.
        let _ = self.done.send(());
    }
}

/// Completion signal for one commit
#[derive(Debug)]
pub struct CommitHandle {
    commit_timestamp: u64,
    applied: Receiver<()>,
}

impl CommitHandle {
    pub fn commit_timestamp(&self) -> u64 {
        self.commit_timestamp
    }

    /// Block until the batch is applied to storage and visible to new
    /// snapshots.
    pub fn wait(self) -> Result<()> {
        self.applied.recv().map_err(|_| IsoError::StoreStopped)
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`. The handle can
    /// be waited on again after a timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<()> {
        match self.applied.recv_timeout(timeout) {
            Ok(()) => Ok(()),
            Err(RecvTimeoutError::Timeout) => Err(IsoError::WaitTimedOut {
                timestamp: self.commit_timestamp,
            }),
            Err(RecvTimeoutError::Disconnected) => Err(IsoError::StoreStopped),
        }
    }
}
