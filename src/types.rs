//! Public data types shared across the walker, hasher, transfer, watcher, and dedup components.

use std::path::PathBuf;
use std::str::FromStr;

use crate::error::HashError;

/// Kind of filesystem entry produced by the walker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
}

/// One entry produced by [`crate::walker::walk`] or [`crate::walker::WalkIter`].
#[derive(Clone, Debug)]
pub struct WalkEntry {
    /// Absolute, canonicalized path.
    pub path: PathBuf,
    pub kind: EntryKind,
    /// Depth relative to the walk root (root's direct children are depth 1).
    pub depth: usize,
    /// File size in bytes (0 for directories and symlinks).
    pub size: u64,
}

impl WalkEntry {
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn is_symlink(&self) -> bool {
        self.kind == EntryKind::Symlink
    }
}

/// Filter applied by the walker to admit only files, only directories, or both.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FileTypeFilter {
    #[default]
    Any,
    File,
    Directory,
}

/// Hash algorithm accepted by the hasher and deduper.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Algorithm {
    #[default]
    Blake3,
    Sha256,
}

impl FromStr for Algorithm {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "blake3" => Ok(Algorithm::Blake3),
            "sha256" | "sha-256" => Ok(Algorithm::Sha256),
            other => Err(HashError::UnknownAlgorithm {
                name: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Algorithm::Blake3 => write!(f, "blake3"),
            Algorithm::Sha256 => write!(f, "sha256"),
        }
    }
}

/// Result of hashing a single file.
#[derive(Clone, Debug)]
pub struct HashResult {
    pub path: PathBuf,
    pub algorithm: Algorithm,
    /// Lowercase hex digest.
    pub hash_hex: String,
    pub size: u64,
}

impl PartialEq for HashResult {
    fn eq(&self, other: &Self) -> bool {
        self.algorithm == other.algorithm && self.hash_hex == other.hash_hex
    }
}

impl Eq for HashResult {}

impl std::hash::Hash for HashResult {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.algorithm.hash(state);
        self.hash_hex.hash(state);
    }
}

/// Point-in-time snapshot of an in-flight copy/move operation, handed to the progress callback.
#[derive(Clone, Debug)]
pub struct CopyProgress {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub bytes_copied: u64,
    pub total_bytes: u64,
    pub files_completed: u64,
    pub total_files: u64,
    pub current_file: PathBuf,
}

/// Kind of change reported by the watcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeType {
    Created,
    Modified,
    Deleted,
}

/// One coalesced filesystem change, as delivered by [`crate::watcher::FileWatcher`].
#[derive(Clone, Debug)]
pub struct FileChange {
    pub path: PathBuf,
    pub change_type: ChangeType,
    pub is_dir: bool,
    /// Unix seconds, fractional.
    pub timestamp: f64,
}

/// A group of files sharing identical content, as found by [`crate::dedup::find_duplicates`].
#[derive(Clone, Debug)]
pub struct DuplicateGroup {
    pub hash_hex: String,
    pub algorithm: Algorithm,
    pub file_size: u64,
    /// Sorted lexicographically. Always has at least two entries.
    pub paths: Vec<PathBuf>,
}

impl DuplicateGroup {
    /// Bytes that could be reclaimed by keeping only one copy.
    pub fn wasted_bytes(&self) -> u64 {
        self.file_size * (self.paths.len() - 1) as u64
    }
}
