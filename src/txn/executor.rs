//! Transaction Executor
//!
//! The apply pipeline: a single background thread that owns all writes to
//! the memtable and applies committed batches one at a time.
//!
//! ## Ordering
//! Batches must arrive in strictly increasing commit timestamp order; the
//! oracle guarantees this by holding its commit lock from timestamp
//! assignment through `submit`. The executor never re-sorts.
//!
//! ## Per batch
//! 1. Insert every pair as `key@commit_timestamp`
//! 2. Finish the commit timestamp on the commit mark (new snapshots may now
//!    see the writes)
//! 3. Fire the batch's [`CommitHandle`]

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;

use crate::error::{IsoError, Result};
use crate::mvcc::{MemTable, VersionedKey};

use super::{Batch, CommitHandle, TimestampMark, TimestampedBatch};

enum ExecutorMessage {
    Apply(TimestampedBatch),
    Stop,
}

/// Handle to the apply pipeline thread
pub struct TransactionExecutor {
    sender: Sender<ExecutorMessage>,
    memtable: Arc<MemTable>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TransactionExecutor {
    /// Spawn the executor. `queue_capacity` of zero makes `submit` a
    /// rendezvous with the executor thread.
    pub fn new(
        memtable: Arc<MemTable>,
        commit_mark: Arc<TimestampMark>,
        queue_capacity: usize,
    ) -> Result<Self> {
        let (sender, receiver) = channel::bounded(queue_capacity);
        let applier = Applier {
            memtable: Arc::clone(&memtable),
            commit_mark,
            last_applied: 0,
        };
        let worker = thread::Builder::new()
            .name("isokv-executor".to_string())
            .spawn(move || applier.run(receiver))?;

        Ok(Self {
            sender,
            memtable,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Storage the executor writes to
    pub fn memtable(&self) -> &Arc<MemTable> {
        &self.memtable
    }

    /// Hand a batch to the executor as commit `commit_timestamp`. Blocks
    /// until the executor has room for it; fails with `StoreStopped` if the
    /// executor has shut down.
    pub fn submit(&self, batch: Arc<Batch>, commit_timestamp: u64) -> Result<CommitHandle> {
        let (batch, handle) = TimestampedBatch::new(batch, commit_timestamp);
        self.sender
            .send(ExecutorMessage::Apply(batch))
            .map_err(|_| IsoError::StoreStopped)?;
        Ok(handle)
    }

    /// Stop after every batch already handed over has been applied. Later
    /// calls are no-ops.
    pub fn stop(&self) {
        let _ = self.sender.send(ExecutorMessage::Stop);
        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                tracing::warn!("Executor thread panicked");
            }
        }
    }
}

impl Drop for TransactionExecutor {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State owned by the executor thread
struct Applier {
    memtable: Arc<MemTable>,
    commit_mark: Arc<TimestampMark>,
    last_applied: u64,
}

impl Applier {
    fn run(mut self, receiver: Receiver<ExecutorMessage>) {
        for message in receiver.iter() {
            match message {
                ExecutorMessage::Apply(batch) => self.apply(batch),
                ExecutorMessage::Stop => break,
            }
        }
        tracing::debug!("Executor stopped after commit {}", self.last_applied);
    }

    fn apply(&mut self, batch: TimestampedBatch) {
        let commit_timestamp = batch.commit_timestamp();
        assert!(
            commit_timestamp > self.last_applied,
            "batch {} submitted after batch {}",
            commit_timestamp,
            self.last_applied
        );

        for (key, value) in batch.batch().iter() {
            let inserted = self
                .memtable
                .put(VersionedKey::new(key.clone(), commit_timestamp), value.clone());
            debug_assert!(inserted, "version {} of a key written twice", commit_timestamp);
        }
        self.last_applied = commit_timestamp;

        if self.commit_mark.finish(commit_timestamp).is_err() {
            tracing::warn!(
                "Commit mark stopped before commit {} was published",
                commit_timestamp
            );
        }
        tracing::debug!(
            "Applied commit {} ({} writes)",
            commit_timestamp,
            batch.batch().len()
        );
        batch.mark_applied();
    }
}
