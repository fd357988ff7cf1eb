//! MVCC Storage Module
//!
//! Multi-version in-memory storage for committed writes.
//!
//! ## Responsibilities
//! - Order versions by (key bytes, version)
//! - Resolve a read at timestamp `t` to the newest version `<= t`
//! - Single-writer/multi-reader access pattern
//!
//! ## Data Structure Choice
//! An index-linked skip list behind one `RwLock`. Every commit inserts new
//! nodes; nothing is updated in place, so old snapshots stay readable.

mod key;
mod level;
mod skiplist;
mod table;

pub use key::{Value, VersionedKey};
pub use level::LevelGenerator;
pub use skiplist::{SkipList, SkipListIter};
pub use table::MemTable;
