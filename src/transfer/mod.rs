//! C3: bulk copy and move with throttled progress reporting.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::defaults::Tuning;
use crate::error::{CopyError, TransferError};
use crate::types::{CopyProgress, FileTypeFilter};
use crate::walker::{walk, WalkOptions};

/// Options controlling a single copy or move.
#[derive(Clone, Copy, Debug)]
pub struct TransferOptions {
    pub overwrite: bool,
    pub preserve_metadata: bool,
    pub callback_interval_ms: u64,
}

impl Default for TransferOptions {
    fn default() -> Self {
        TransferOptions {
            overwrite: false,
            preserve_metadata: true,
            callback_interval_ms: Tuning::CALLBACK_INTERVAL_MS,
        }
    }
}

#[derive(Clone, Copy)]
enum Mode {
    Copy,
    Move,
}

struct TransferState {
    bytes_copied: AtomicU64,
    total_bytes: u64,
    files_completed: AtomicU64,
    total_files: u64,
    current_file: Mutex<PathBuf>,
}

impl TransferState {
    fn snapshot(&self, source: &Path, destination: &Path) -> CopyProgress {
        let current_file = self.current_file.lock().unwrap().clone();
        CopyProgress {
            source: source.to_path_buf(),
            destination: destination.to_path_buf(),
            bytes_copied: self.bytes_copied.load(Ordering::SeqCst),
            total_bytes: self.total_bytes,
            files_completed: self.files_completed.load(Ordering::SeqCst),
            total_files: self.total_files,
            current_file,
        }
    }
}

/// Copy every path in `sources` into `destination` (a directory, created if missing).
/// Directory sources are copied recursively, preserving their relative structure.
///
/// On failure, returns a [`TransferError`] carrying the destination paths that completed
/// before the failing file — already-copied files are never rolled back.
pub fn copy_files<F>(
    sources: &[PathBuf],
    destination: &Path,
    options: &TransferOptions,
    progress_callback: F,
) -> Result<Vec<PathBuf>, TransferError>
where
    F: Fn(&CopyProgress) + Send + Sync,
{
    transfer(sources, destination, options, progress_callback, Mode::Copy)
}

/// Move every path in `sources` into `destination`. Uses `rename` when possible, falling
/// back to copy-then-remove across filesystem boundaries. See [`copy_files`] for the
/// partial-failure contract.
pub fn move_files<F>(
    sources: &[PathBuf],
    destination: &Path,
    options: &TransferOptions,
    progress_callback: F,
) -> Result<Vec<PathBuf>, TransferError>
where
    F: Fn(&CopyProgress) + Send + Sync,
{
    transfer(sources, destination, options, progress_callback, Mode::Move)
}

fn transfer<F>(
    sources: &[PathBuf],
    destination: &Path,
    options: &TransferOptions,
    progress_callback: F,
    mode: Mode,
) -> Result<Vec<PathBuf>, TransferError>
where
    F: Fn(&CopyProgress) + Send + Sync,
{
    if destination.exists() && destination.is_file() {
        return Err(TransferError {
            source: CopyError::DestinationIsFile {
                path: destination.to_path_buf(),
            },
            completed: Vec::new(),
        });
    }

    let plan = enumerate_sources(sources, destination).map_err(|source| TransferError {
        source,
        completed: Vec::new(),
    })?;

    if !options.overwrite {
        for (_, target, _) in &plan {
            if target.exists() {
                return Err(TransferError {
                    source: CopyError::OverwriteRefused {
                        path: target.clone(),
                    },
                    completed: Vec::new(),
                });
            }
        }
    }

    let total_bytes = plan.iter().map(|(_, _, size)| size).sum();
    let total_files = plan.len() as u64;
    let state = TransferState {
        bytes_copied: AtomicU64::new(0),
        total_bytes,
        files_completed: AtomicU64::new(0),
        total_files,
        current_file: Mutex::new(PathBuf::new()),
    };
    let last_fired: Mutex<Option<Instant>> = Mutex::new(None);
    let interval = Duration::from_millis(options.callback_interval_ms);

    let mut completed = Vec::with_capacity(plan.len());
    let mut used_fallback_copy = false;
    for (index, (src, target, _size)) in plan.iter().enumerate() {
        *state.current_file.lock().unwrap() = src.clone();

        if let Some(parent) = target.parent() {
            if let Err(source) = fs::create_dir_all(parent) {
                return Err(TransferError {
                    source: CopyError::Write {
                        path: parent.to_path_buf(),
                        source,
                    },
                    completed,
                });
            }
        }

        let is_last = index + 1 == plan.len();
        let used_copy = match transfer_one(
            src,
            target,
            mode,
            options,
            &state,
            &last_fired,
            interval,
            is_last,
            &progress_callback,
        ) {
            Ok(used_copy) => used_copy,
            Err(source) => return Err(TransferError { source, completed }),
        };
        used_fallback_copy |= used_copy;

        state.files_completed.fetch_add(1, Ordering::SeqCst);
        completed.push(target.clone());
    }

    // A move that completed entirely via `rename` reports no progress at all, per spec:
    // only the copy fallback path (or a plain Copy operation) fires callbacks.
    let reports_progress = match mode {
        Mode::Copy => true,
        Mode::Move => used_fallback_copy,
    };
    if reports_progress {
        let final_snapshot = state.snapshot(sources.first().unwrap_or(destination), destination);
        progress_callback(&final_snapshot);
    }

    Ok(completed)
}

#[allow(clippy::too_many_arguments)]
fn transfer_one<F>(
    src: &Path,
    target: &Path,
    mode: Mode,
    options: &TransferOptions,
    state: &TransferState,
    last_fired: &Mutex<Option<Instant>>,
    interval: Duration,
    is_last_file: bool,
    progress_callback: &F,
) -> Result<bool, CopyError>
where
    F: Fn(&CopyProgress) + Send + Sync,
{
    if let Mode::Move = mode {
        match fs::rename(src, target) {
            Ok(()) => {
                // A successful rename is near-instantaneous and reports no intermediate
                // progress; only the operation's own final callback reflects it.
                let size = fs::metadata(target)
                    .map(|m| m.len())
                    .unwrap_or(0);
                state.bytes_copied.fetch_add(size, Ordering::SeqCst);
                return Ok(false);
            }
            Err(e) if is_cross_device(&e) => {
                // fall through to copy + remove below
            }
            Err(source) => {
                return Err(CopyError::Write {
                    path: target.to_path_buf(),
                    source,
                });
            }
        }
    }

    copy_chunked(src, target, state, last_fired, interval, is_last_file, progress_callback)?;

    if options.preserve_metadata {
        match fs::metadata(src) {
            Ok(meta) => {
                let mtime = filetime::FileTime::from_last_modification_time(&meta);
                let atime = filetime::FileTime::from_last_access_time(&meta);
                if let Err(e) = filetime::set_file_times(target, atime, mtime) {
                    log::warn!("failed to preserve mtime/atime on {}: {e}", target.display());
                }
                if let Err(e) = fs::set_permissions(target, meta.permissions()) {
                    log::warn!("failed to preserve permissions on {}: {e}", target.display());
                }
            }
            Err(e) => {
                log::warn!("failed to read source metadata for {}: {e}", src.display());
            }
        }
    }

    if let Mode::Move = mode {
        fs::remove_file(src).map_err(|source| CopyError::Write {
            path: src.to_path_buf(),
            source,
        })?;
    }

    Ok(true)
}

#[allow(clippy::too_many_arguments)]
fn copy_chunked<F>(
    src: &Path,
    target: &Path,
    state: &TransferState,
    last_fired: &Mutex<Option<Instant>>,
    interval: Duration,
    is_last_file: bool,
    progress_callback: &F,
) -> Result<(), CopyError>
where
    F: Fn(&CopyProgress) + Send + Sync,
{
    let mut reader = File::open(src).map_err(|source| CopyError::Write {
        path: src.to_path_buf(),
        source,
    })?;
    let mut writer = File::create(target).map_err(|source| CopyError::Write {
        path: target.to_path_buf(),
        source,
    })?;

    let mut buffer = vec![0u8; Tuning::HASH_CHUNK_SIZE];
    loop {
        let n = reader.read(&mut buffer).map_err(|source| CopyError::Write {
            path: src.to_path_buf(),
            source,
        })?;
        if n == 0 {
            break;
        }
        writer
            .write_all(&buffer[..n])
            .map_err(|source| CopyError::Write {
                path: target.to_path_buf(),
                source,
            })?;
        state.bytes_copied.fetch_add(n as u64, Ordering::SeqCst);
        maybe_fire(state, last_fired, interval, false, src, target, progress_callback);
    }
    maybe_fire(state, last_fired, interval, is_last_file, src, target, progress_callback);
    Ok(())
}

fn maybe_fire<F>(
    state: &TransferState,
    last_fired: &Mutex<Option<Instant>>,
    interval: Duration,
    force: bool,
    src: &Path,
    target: &Path,
    progress_callback: &F,
) where
    F: Fn(&CopyProgress) + Send + Sync,
{
    let mut guard = last_fired.lock().unwrap();
    let due = match *guard {
        None => true,
        Some(last) => last.elapsed() >= interval,
    };
    if force || due {
        *guard = Some(Instant::now());
        drop(guard);
        progress_callback(&state.snapshot(src, target));
    }
}

#[cfg(unix)]
fn is_cross_device(e: &std::io::Error) -> bool {
    e.raw_os_error() == Some(libc::EXDEV)
}

#[cfg(windows)]
fn is_cross_device(e: &std::io::Error) -> bool {
    const ERROR_NOT_SAME_DEVICE: i32 = 17;
    e.raw_os_error() == Some(ERROR_NOT_SAME_DEVICE)
}

#[cfg(not(any(unix, windows)))]
fn is_cross_device(_e: &std::io::Error) -> bool {
    false
}

fn enumerate_sources(
    sources: &[PathBuf],
    destination: &Path,
) -> Result<Vec<(PathBuf, PathBuf, u64)>, CopyError> {
    let mut plan = Vec::new();
    for source in sources {
        let meta = fs::symlink_metadata(source).map_err(|source_err| CopyError::Write {
            path: source.clone(),
            source: source_err,
        })?;
        if meta.is_dir() {
            let options = WalkOptions {
                file_type: FileTypeFilter::File,
                follow_symlinks: false,
                ..WalkOptions::default()
            };
            let entries = walk(source, &options).map_err(|source| CopyError::Enumeration { source })?;
            // walk() canonicalizes its root internally, so entry paths are rooted at the
            // canonical form of `source`, not `source` itself; strip that same root or a
            // relative/symlinked source collapses the relative path to the entry's full
            // absolute path, aiming the copy back at the source file.
            let canonical_source = fs::canonicalize(source).map_err(|io_err| {
                CopyError::Enumeration {
                    source: crate::error::WalkError::Root {
                        path: source.clone(),
                        source: io_err,
                    },
                }
            })?;
            let dir_name = source
                .file_name()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."));
            for entry in entries {
                let relative = entry
                    .path
                    .strip_prefix(&canonical_source)
                    .unwrap_or(&entry.path);
                let target = destination.join(&dir_name).join(relative);
                plan.push((entry.path, target, entry.size));
            }
        } else {
            let target = destination.join(source.file_name().unwrap_or_default());
            plan.push((source.clone(), target, meta.len()));
        }
    }
    Ok(plan)
}
