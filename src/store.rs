//! Store Module
//!
//! The embedding entry point: owns the memtable and the oracle, hands out
//! transactions and refuses new ones once stopped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::Config;
use crate::error::{IsoError, Result};
use crate::mvcc::{LevelGenerator, MemTable};
use crate::txn::{CommitHandle, Oracle, ReadOnlyTransaction, ReadWriteTransaction};

/// An in-memory MVCC key-value store
///
/// ## Concurrency Model
/// - Any number of transactions may run in parallel on any threads.
/// - Commits are serialized by the oracle and applied by a single executor
///   thread in commit timestamp order.
/// - Reads never block writers; the memtable lock is only held for the
///   duration of one lookup or insert.
pub struct Store {
    config: Config,
    oracle: Arc<Oracle>,
    stopped: AtomicBool,
}

impl Store {
    /// Open an empty store
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        let levels = LevelGenerator::with_skip_factor(config.max_level, config.skip_factor);
        let memtable = Arc::new(MemTable::with_generator(levels));
        let oracle = Arc::new(Oracle::new(memtable, config.apply_queue_capacity)?);

        tracing::info!(
            "Store opened (max_level={}, skip_factor={}, apply_queue_capacity={})",
            config.max_level,
            config.skip_factor,
            config.apply_queue_capacity
        );

        Ok(Self {
            config,
            oracle,
            stopped: AtomicBool::new(false),
        })
    }

    /// Open with a skip list height limit (convenience method)
    ///
    /// Uses default config otherwise
    pub fn with_max_level(max_level: u8) -> Result<Self> {
        Self::open(Config::builder().max_level(max_level).build())
    }

    /// Start a read-only snapshot
    pub fn begin_read(&self) -> Result<ReadOnlyTransaction> {
        self.ensure_running()?;
        ReadOnlyTransaction::new(Arc::clone(&self.oracle))
    }

    /// Start a read-write transaction
    pub fn begin_write(&self) -> Result<ReadWriteTransaction> {
        self.ensure_running()?;
        ReadWriteTransaction::new(Arc::clone(&self.oracle))
    }

    /// Run `reader` against a fresh snapshot, closing it afterwards
    pub fn get<F, R>(&self, reader: F) -> Result<R>
    where
        F: FnOnce(&ReadOnlyTransaction) -> R,
    {
        let transaction = self.begin_read()?;
        Ok(reader(&transaction))
    }

    /// Run `writer` in a fresh read-write transaction and commit what it
    /// buffered. An error from `writer` abandons the transaction.
    pub fn put_or_update<F>(&self, writer: F) -> Result<CommitHandle>
    where
        F: FnOnce(&mut ReadWriteTransaction) -> Result<()>,
    {
        let mut transaction = self.begin_write()?;
        writer(&mut transaction)?;
        transaction.commit()
    }

    /// Stop the background processors. Safe to call more than once and
    /// from several threads; only the first call does the work.
    pub fn stop(&self) {
        if self
            .stopped
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.oracle.stop();
            tracing::info!("Store stopped");
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the oracle
    pub fn oracle(&self) -> &Arc<Oracle> {
        &self.oracle
    }

    /// Number of versions held in the memtable
    pub fn version_count(&self) -> usize {
        self.oracle.memtable().len()
    }

    fn ensure_running(&self) -> Result<()> {
        if self.is_stopped() {
            return Err(IsoError::StoreStopped);
        }
        Ok(())
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        self.stop();
    }
}
