//! Timestamp Oracle
//!
//! Hands out begin and commit timestamps and decides whether a read-write
//! transaction may commit.
//!
//! ## Timestamps
//! - `next_timestamp` starts at 1; a snapshot reads at `next_timestamp - 1`
//!   and a commit takes `next_timestamp` and bumps it.
//! - The begin mark tracks live snapshots. The commit mark tracks commits
//!   that have a timestamp but are not yet applied.
//! - A begin timestamp is returned only once the commit mark has reached it,
//!   so a snapshot never sees a half-applied commit.
//!
//! ## Conflicts
//! A commit is refused if any transaction that committed after our snapshot
//! wrote a key we read. Write/write overlap alone is allowed.

use std::collections::HashSet;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::error::{IsoError, Result};
use crate::mvcc::MemTable;

use super::{Batch, CommitHandle, TimestampMark, TransactionExecutor};

/// Writes of a commit, kept while a live snapshot predates it
struct CommittedTransaction {
    commit_timestamp: u64,
    writes: Arc<Batch>,
}

struct OracleState {
    next_timestamp: u64,
    committed: Vec<CommittedTransaction>,
}

/// Timestamp and conflict authority for one store
pub struct Oracle {
    state: Mutex<OracleState>,
    begin_mark: TimestampMark,
    commit_mark: Arc<TimestampMark>,
    executor: TransactionExecutor,

    /// Held from commit timestamp assignment through submission, so the
    /// executor receives batches in commit order
    commit_lock: Mutex<()>,
}

impl Oracle {
    pub fn new(memtable: Arc<MemTable>, apply_queue_capacity: usize) -> Result<Self> {
        let next_timestamp = 1;
        let begin_mark = TimestampMark::new("begin", next_timestamp - 1)?;
        let commit_mark = Arc::new(TimestampMark::new("commit", next_timestamp - 1)?);
        let executor =
            TransactionExecutor::new(memtable, Arc::clone(&commit_mark), apply_queue_capacity)?;

        Ok(Self {
            state: Mutex::new(OracleState {
                next_timestamp,
                committed: Vec::new(),
            }),
            begin_mark,
            commit_mark,
            executor,
            commit_lock: Mutex::new(()),
        })
    }

    pub fn memtable(&self) -> &Arc<MemTable> {
        self.executor.memtable()
    }

    pub fn begin_mark(&self) -> &TimestampMark {
        &self.begin_mark
    }

    pub fn commit_mark(&self) -> &TimestampMark {
        &self.commit_mark
    }

    /// Start a snapshot. Blocks until every commit at or below the returned
    /// timestamp has been applied to storage.
    ///
    /// The caller owns the begin registration and must end it with
    /// [`finish_begin_timestamp`](Self::finish_begin_timestamp) unless a
    /// successful commit ends it first.
    pub fn begin_timestamp(&self) -> Result<u64> {
        let begin_timestamp = {
            let state = self.state.lock();
            let begin_timestamp = state.next_timestamp - 1;
            self.begin_mark.begin(begin_timestamp)?;
            begin_timestamp
        };

        // Waits on the commit mark, not the begin mark.
        if let Err(e) = self.commit_mark.wait_for_mark(begin_timestamp) {
            let _ = self.begin_mark.finish(begin_timestamp);
            return Err(e);
        }
        Ok(begin_timestamp)
    }

    /// End the begin phase of a transaction that did not commit
    pub fn finish_begin_timestamp(&self, begin_timestamp: u64) -> Result<()> {
        self.begin_mark.finish(begin_timestamp)
    }

    /// Assign a commit timestamp to a transaction that read `reads` at
    /// `begin_timestamp` and wants to write `writes`, or refuse with
    /// `Conflict`.
    ///
    /// On success the transaction's begin phase is over and its commit phase
    /// has started on the commit mark; whoever applies the writes must finish
    /// the returned timestamp there.
    pub fn maybe_commit_timestamp(
        &self,
        begin_timestamp: u64,
        reads: &HashSet<Bytes>,
        writes: &Arc<Batch>,
    ) -> Result<u64> {
        let mut state = self.state.lock();

        if Self::has_conflict(&state.committed, begin_timestamp, reads) {
            tracing::debug!(
                "Conflict for transaction beginning at {} ({} keys read)",
                begin_timestamp,
                reads.len()
            );
            return Err(IsoError::Conflict);
        }

        self.begin_mark.finish(begin_timestamp)?;

        // No snapshot at or below the begin horizon is still running, so
        // nothing can conflict with commits up to it any more.
        let horizon = self.begin_mark.done_till();
        state.committed.retain(|txn| txn.commit_timestamp > horizon);

        let commit_timestamp = state.next_timestamp;
        state.next_timestamp += 1;

        self.commit_mark.begin(commit_timestamp)?;
        state.committed.push(CommittedTransaction {
            commit_timestamp,
            writes: Arc::clone(writes),
        });

        tracing::debug!(
            "Assigned commit {} to transaction beginning at {}",
            commit_timestamp,
            begin_timestamp
        );
        Ok(commit_timestamp)
    }

    /// Conflict-check, timestamp and submit a batch in one ordered step
    pub fn commit(
        &self,
        begin_timestamp: u64,
        reads: &HashSet<Bytes>,
        writes: Batch,
    ) -> Result<CommitHandle> {
        if writes.is_empty() {
            return Err(IsoError::EmptyBatch);
        }
        let writes = Arc::new(writes);

        let _ordering = self.commit_lock.lock();
        let commit_timestamp = self.maybe_commit_timestamp(begin_timestamp, reads, &writes)?;
        self.executor.submit(writes, commit_timestamp)
    }

    /// Number of commits still retained for conflict checks
    pub fn committed_transaction_count(&self) -> usize {
        self.state.lock().committed.len()
    }

    /// Stop both marks and the executor
    pub fn stop(&self) {
        self.begin_mark.stop();
        self.commit_mark.stop();
        self.executor.stop();
    }

    fn has_conflict(
        committed: &[CommittedTransaction],
        begin_timestamp: u64,
        reads: &HashSet<Bytes>,
    ) -> bool {
        committed
            .iter()
            .filter(|txn| txn.commit_timestamp > begin_timestamp)
            .any(|txn| reads.iter().any(|key| txn.writes.contains(key)))
    }
}
