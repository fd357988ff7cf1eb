//! Transaction Module
//!
//! Snapshot-isolated transactions over the MVCC memtable.
//!
//! ## Components
//! - [`TimestampMark`]: watermark over in-flight timestamps
//! - [`Oracle`]: begin/commit timestamps and conflict detection
//! - [`TransactionExecutor`]: applies committed batches in commit order
//! - [`ReadOnlyTransaction`] / [`ReadWriteTransaction`]: client handles
//!
//! ## Commit Flow
//! ```text
//!  ReadWriteTransaction::commit
//!         │  commit lock
//!         ▼
//!  Oracle::maybe_commit_timestamp ──► Conflict?
//!         │ commit_ts
//!         ▼
//!  TransactionExecutor::submit ──► memtable.put(key@commit_ts)...
//!                                  commit_mark.finish(commit_ts)
//!                                  CommitHandle fires
//! ```

mod batch;
mod executor;
mod mark;
mod oracle;
mod read_only;
mod read_write;

pub use batch::{Batch, CommitHandle, TimestampedBatch};
pub use executor::TransactionExecutor;
pub use mark::TimestampMark;
pub use oracle::Oracle;
pub use read_only::ReadOnlyTransaction;
pub use read_write::ReadWriteTransaction;
