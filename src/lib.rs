//! fsflux: a parallel filesystem toolkit.
//!
//! Five independent components, each an explicit OS-thread worker pool
//! coordinated with `crossbeam-channel` rather than an async runtime:
//!
//! - [`walker`] (C1): recursive directory traversal, collecting or streaming.
//! - [`hasher`] (C2): content hashing with `blake3` or `sha2`.
//! - [`transfer`] (C3): bulk copy/move with throttled progress.
//! - [`watcher`] (C4): debounced, cross-platform change notification.
//! - [`dedup`] (C5): content-based duplicate detection.
//!
//! Configuration is per-call only; there is no persistence and no global state.
//! Logging, telemetry sinks, and CLI/host bindings are the embedding
//! application's responsibility.

pub mod defaults;
pub mod dedup;
pub mod error;
pub mod fd_limit;
pub mod hasher;
pub mod transfer;
pub mod types;
pub mod walker;
pub mod watcher;
mod worker_pool;

pub use dedup::{find_duplicates, DedupOptions};
pub use error::{CopyError, Error, HashError, TransferError, WalkError, WatchError};
pub use hasher::{hash_file, hash_files};
pub use transfer::{copy_files, move_files, TransferOptions};
pub use types::{
    Algorithm, ChangeType, CopyProgress, DuplicateGroup, EntryKind, FileChange, FileTypeFilter,
    HashResult, WalkEntry,
};
pub use walker::{walk, WalkIter, WalkOptions};
pub use watcher::FileWatcher;
