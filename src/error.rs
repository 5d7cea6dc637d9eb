//! Error taxonomy: one base enum, one sub-enum per component.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error returned by any fsflux operation.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Walk(#[from] WalkError),
    #[error(transparent)]
    Hash(#[from] HashError),
    #[error(transparent)]
    Copy(#[from] CopyError),
    #[error(transparent)]
    Watch(#[from] WatchError),
}

/// Errors from the parallel directory walker (C1).
#[derive(Debug, Error)]
pub enum WalkError {
    #[error("cannot read root {path}")]
    Root {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("symlink cycle detected at {path}")]
    CycleDetected { path: PathBuf },
}

impl Clone for WalkError {
    fn clone(&self) -> Self {
        match self {
            WalkError::Root { path, source } => WalkError::Root {
                path: path.clone(),
                source: std::io::Error::new(source.kind(), source.to_string()),
            },
            WalkError::CycleDetected { path } => WalkError::CycleDetected { path: path.clone() },
        }
    }
}

/// Errors from content hashing (C2).
#[derive(Debug, Error)]
pub enum HashError {
    #[error("i/o error hashing {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unknown hash algorithm: {name}")]
    UnknownAlgorithm { name: String },
    #[error("failed to start worker pool")]
    PoolInit {
        #[source]
        source: std::io::Error,
    },
}

/// Errors from copy/move operations (C3).
#[derive(Debug, Error)]
pub enum CopyError {
    #[error("failed to enumerate source")]
    Enumeration {
        #[source]
        source: WalkError,
    },
    #[error("failed to write {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("destination exists and overwrite is disabled: {path}")]
    OverwriteRefused { path: PathBuf },
    #[error("destination is a file, cannot receive multiple sources: {path}")]
    DestinationIsFile { path: PathBuf },
}

/// Returned by [`crate::transfer::copy_files`]/[`crate::transfer::move_files`] when the
/// operation aborts partway through. Transfer failures do not roll back prior work, so
/// `completed` carries every destination path that finished successfully before `source`
/// was hit.
#[derive(Debug)]
pub struct TransferError {
    pub source: CopyError,
    pub completed: Vec<PathBuf>,
}

impl std::fmt::Display for TransferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl std::error::Error for TransferError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

impl From<TransferError> for Error {
    /// Lossy: drops `completed`. Callers that need the partial-completion list should match
    /// on `TransferError` directly instead of converting to the aggregate `Error`.
    fn from(e: TransferError) -> Self {
        Error::Copy(e.source)
    }
}

/// Errors from filesystem watching (C4).
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("failed to install watch on {path}")]
    Install {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
    #[error("event source error: {message}")]
    EventSource { message: String },
    #[error("watcher has stopped")]
    Stopped,
}
