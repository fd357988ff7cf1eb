//! # isokv
//!
//! An embedded key-value store with snapshot-isolated transactions:
//! - Multi-version in-memory skip list storage
//! - Timestamp oracle with read/write conflict detection
//! - Watermarks that keep snapshots from seeing half-applied commits
//! - A single executor applying commits in timestamp order
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Store                                │
//! │            begin_read / begin_write / stop                   │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                        Oracle                                │
//! │      begin/commit timestamps, conflict check, commit lock    │
//! └──────┬──────────────────────┬──────────────────────┬────────┘
//!        │                      │                      │
//!        ▼                      ▼                      ▼
//!  ┌────────────┐        ┌────────────┐        ┌──────────────┐
//!  │ Begin Mark │        │Commit Mark │◄───────│   Executor   │
//!  │ (thread)   │        │ (thread)   │ finish │   (thread)   │
//!  └────────────┘        └────────────┘        └──────┬───────┘
//!                                                     │ put
//!                                                     ▼
//!                                              ┌──────────────┐
//!                                              │   MemTable   │
//!                                              │ (skip list)  │
//!                                              └──────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod mvcc;
pub mod txn;
pub mod store;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{IsoError, Result};
pub use config::Config;
pub use mvcc::{Value, VersionedKey};
pub use store::Store;
pub use txn::{CommitHandle, ReadOnlyTransaction, ReadWriteTransaction};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of isokv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
