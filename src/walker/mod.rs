//! C1: parallel recursive directory traversal.
//!
//! The traversal itself is an explicit worker pool, not a wrapped third-party
//! crate: a shared queue of pending directories feeds N threads, each of which
//! reads one directory, filters and emits its children, and pushes any
//! subdirectories it finds back onto the same queue. Pool shutdown is detected
//! with an in-flight counter rather than a fixed iteration count, since the
//! total number of directories isn't known up front.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded, unbounded};

use crate::defaults::Tuning;
use crate::error::WalkError;
use crate::types::{EntryKind, FileTypeFilter, WalkEntry};

/// Options controlling a single walk.
#[derive(Clone, Debug)]
pub struct WalkOptions {
    pub max_depth: usize,
    pub follow_symlinks: bool,
    /// Sort entries lexicographically by path before returning (collecting form only).
    pub sort: bool,
    /// Prune hidden directories (and skip hidden files) before any glob match is consulted.
    pub skip_hidden: bool,
    pub file_type: FileTypeFilter,
    pub glob_pattern: Option<String>,
}

impl Default for WalkOptions {
    fn default() -> Self {
        WalkOptions {
            max_depth: usize::MAX,
            follow_symlinks: false,
            sort: false,
            skip_hidden: false,
            file_type: FileTypeFilter::Any,
            glob_pattern: None,
        }
    }
}

/// Walk `root` and collect every admitted entry into a `Vec`.
pub fn walk(root: &Path, options: &WalkOptions) -> Result<Vec<WalkEntry>, WalkError> {
    let root = root
        .canonicalize()
        .map_err(|source| WalkError::Root {
            path: root.to_path_buf(),
            source,
        })?;
    fs::read_dir(&root).map_err(|source| WalkError::Root {
        path: root.clone(),
        source,
    })?;

    let cancel = Arc::new(AtomicBool::new(false));
    let first_error: Arc<Mutex<Option<WalkError>>> = Arc::new(Mutex::new(None));
    let (out_rx, handles) = spawn_pool(root, options.clone(), Arc::clone(&cancel), Arc::clone(&first_error));

    let mut entries: Vec<WalkEntry> = out_rx.iter().collect();
    for h in handles {
        let _ = h.join();
    }

    if let Some(err) = first_error.lock().unwrap().take() {
        return Err(err);
    }

    if options.sort {
        entries.sort_by(|a, b| a.path.cmp(&b.path));
    }
    Ok(entries)
}

/// Streaming form of [`walk`]. Iterates `WalkEntry`s as the pool produces them.
pub struct WalkIter {
    rx: Receiver<WalkEntry>,
    cancel: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
    first_error: Arc<Mutex<Option<WalkError>>>,
}

impl WalkIter {
    pub fn new(root: &Path, options: &WalkOptions) -> Result<Self, WalkError> {
        let root = root
            .canonicalize()
            .map_err(|source| WalkError::Root {
                path: root.to_path_buf(),
                source,
            })?;
        fs::read_dir(&root).map_err(|source| WalkError::Root {
            path: root.clone(),
            source,
        })?;
        let cancel = Arc::new(AtomicBool::new(false));
        let first_error: Arc<Mutex<Option<WalkError>>> = Arc::new(Mutex::new(None));
        let (rx, handles) = spawn_pool(root, options.clone(), Arc::clone(&cancel), Arc::clone(&first_error));
        Ok(WalkIter {
            rx,
            cancel,
            handles,
            first_error,
        })
    }

    /// Signal every worker to stop at its next check. Safe to call more than once.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// The first root-read or cycle-detection error seen so far, if any.
    pub fn error(&self) -> Option<WalkError> {
        self.first_error.lock().unwrap().clone()
    }
}

impl Iterator for WalkIter {
    type Item = WalkEntry;

    fn next(&mut self) -> Option<WalkEntry> {
        self.rx.recv().ok()
    }
}

impl Drop for WalkIter {
    fn drop(&mut self) {
        self.cancel();
        for h in self.handles.drain(..) {
            let _ = h.join();
        }
    }
}

struct PendingDir {
    path: PathBuf,
    depth: usize,
}

/// Emit the root itself as a depth-0 `WalkEntry` when it passes the `file_type`/`glob_pattern`
/// filters. `skip_hidden` does not apply here: the caller asked for this exact path, hidden or
/// not. This is what makes `max_depth=0` yield "only the root" rather than nothing.
fn emit_root(
    root: &Path,
    options: &WalkOptions,
    glob_pattern: Option<&glob::Pattern>,
    out_tx: &Sender<WalkEntry>,
) {
    let admitted_kind = matches!(options.file_type, FileTypeFilter::Any | FileTypeFilter::Directory);
    let admitted_glob = glob_pattern
        .map(|p| {
            root.file_name()
                .and_then(|n| n.to_str())
                .map(|n| p.matches(n))
                .unwrap_or(false)
        })
        .unwrap_or(true);
    if admitted_kind && admitted_glob {
        let _ = out_tx.send(WalkEntry {
            path: root.to_path_buf(),
            kind: EntryKind::Directory,
            depth: 0,
            size: 0,
        });
    }
}

fn spawn_pool(
    root: PathBuf,
    options: WalkOptions,
    cancel: Arc<AtomicBool>,
    first_error: Arc<Mutex<Option<WalkError>>>,
) -> (Receiver<WalkEntry>, Vec<JoinHandle<()>>) {
    let (dir_tx, dir_rx) = unbounded::<PendingDir>();
    let (out_tx, out_rx) = bounded::<WalkEntry>(Tuning::WALK_CHANNEL_CAP);
    let in_flight = Arc::new(AtomicUsize::new(1));
    let visited: Arc<Mutex<HashSet<String>>> = Arc::new(Mutex::new(HashSet::new()));
    let glob_pattern = options
        .glob_pattern
        .as_deref()
        .and_then(|p| glob::Pattern::new(p).ok());

    emit_root(&root, &options, glob_pattern.as_ref(), &out_tx);

    let num_workers = Tuning::default_workers();
    let _ = dir_tx.send(PendingDir { path: root, depth: 0 });

    let handles = (0..num_workers)
        .map(|_| {
            let dir_tx = dir_tx.clone();
            let dir_rx = dir_rx.clone();
            let out_tx = out_tx.clone();
            let in_flight = Arc::clone(&in_flight);
            let cancel = Arc::clone(&cancel);
            let visited = Arc::clone(&visited);
            let first_error = Arc::clone(&first_error);
            let options = options.clone();
            let glob_pattern = glob_pattern.clone();
            thread::spawn(move || {
                worker_loop(
                    dir_tx,
                    dir_rx,
                    out_tx,
                    in_flight,
                    cancel,
                    visited,
                    first_error,
                    options,
                    glob_pattern,
                )
            })
        })
        .collect();

    drop(dir_tx);
    drop(out_tx);
    (out_rx, handles)
}

#[allow(clippy::too_many_arguments)]
fn worker_loop(
    dir_tx: Sender<PendingDir>,
    dir_rx: Receiver<PendingDir>,
    out_tx: Sender<WalkEntry>,
    in_flight: Arc<AtomicUsize>,
    cancel: Arc<AtomicBool>,
    visited: Arc<Mutex<HashSet<String>>>,
    first_error: Arc<Mutex<Option<WalkError>>>,
    options: WalkOptions,
    glob_pattern: Option<glob::Pattern>,
) {
    loop {
        if cancel.load(Ordering::Relaxed) {
            break;
        }
        match dir_rx.recv_timeout(Duration::from_millis(20)) {
            Ok(task) => {
                process_dir(
                    task,
                    &dir_tx,
                    &out_tx,
                    &in_flight,
                    &cancel,
                    &visited,
                    &first_error,
                    &options,
                    glob_pattern.as_ref(),
                );
            }
            Err(RecvTimeoutError::Timeout) => {
                if in_flight.load(Ordering::SeqCst) == 0 {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn process_dir(
    task: PendingDir,
    dir_tx: &Sender<PendingDir>,
    out_tx: &Sender<WalkEntry>,
    in_flight: &Arc<AtomicUsize>,
    cancel: &Arc<AtomicBool>,
    visited: &Arc<Mutex<HashSet<String>>>,
    first_error: &Arc<Mutex<Option<WalkError>>>,
    options: &WalkOptions,
    glob_pattern: Option<&glob::Pattern>,
) {
    let read_dir = match fs::read_dir(&task.path) {
        Ok(r) => r,
        Err(e) => {
            log::warn!("walker: cannot read {}: {}", task.path.display(), e);
            in_flight.fetch_sub(1, Ordering::SeqCst);
            return;
        }
    };

    let mut subdirs = Vec::new();

    for entry in read_dir.flatten() {
        let path = entry.path();
        let file_name = entry.file_name();
        let hidden = file_name
            .to_str()
            .map(|n| n.starts_with('.'))
            .unwrap_or(false);
        if options.skip_hidden && hidden {
            continue;
        }

        let symlink_meta = match fs::symlink_metadata(&path) {
            Ok(m) => m,
            Err(e) => {
                log::warn!("walker: cannot stat {}: {}", path.display(), e);
                continue;
            }
        };

        let is_symlink = symlink_meta.file_type().is_symlink();
        let (kind, size, traverse_as_dir) = if is_symlink {
            if options.follow_symlinks {
                match fs::metadata(&path) {
                    Ok(target_meta) if target_meta.is_dir() => {
                        if let Some(key) = visit_key(&path, &target_meta) {
                            let mut seen = visited.lock().unwrap();
                            if !seen.insert(key) {
                                let mut fe = first_error.lock().unwrap();
                                fe.get_or_insert(WalkError::CycleDetected { path: path.clone() });
                                cancel.store(true, Ordering::Relaxed);
                                continue;
                            }
                        }
                        (EntryKind::Symlink, 0, true)
                    }
                    Ok(target_meta) => (EntryKind::Symlink, target_meta.len(), false),
                    Err(_) => (EntryKind::Symlink, 0, false),
                }
            } else {
                (EntryKind::Symlink, 0, false)
            }
        } else if symlink_meta.is_dir() {
            (EntryKind::Directory, 0, true)
        } else {
            (EntryKind::File, symlink_meta.len(), false)
        };

        let admitted_kind = matches!(
            (options.file_type, kind),
            (FileTypeFilter::Any, _)
                | (FileTypeFilter::File, EntryKind::File)
                | (FileTypeFilter::Directory, EntryKind::Directory)
        );

        let admitted_glob = glob_pattern
            .map(|p| p.matches(file_name.to_str().unwrap_or_default()))
            .unwrap_or(true);
        let child_depth = task.depth + 1;
        let admitted_depth = child_depth <= options.max_depth;

        if admitted_kind && admitted_glob && admitted_depth {
            let _ = out_tx.send(WalkEntry {
                path: path.clone(),
                kind,
                depth: child_depth,
                size,
            });
        }

        // Recurse only if a grandchild (depth = child_depth + 1) could still be admitted;
        // otherwise the subdirectory's own entry is already emitted above and there's nothing
        // further to discover within max_depth.
        if traverse_as_dir && child_depth < options.max_depth {
            subdirs.push(PendingDir {
                path,
                depth: child_depth,
            });
        }
    }

    if !subdirs.is_empty() && !cancel.load(Ordering::Relaxed) {
        in_flight.fetch_add(subdirs.len(), Ordering::SeqCst);
        for d in subdirs {
            let _ = dir_tx.send(d);
        }
    }
    in_flight.fetch_sub(1, Ordering::SeqCst);
}

#[cfg(unix)]
fn visit_key(_path: &Path, meta: &fs::Metadata) -> Option<String> {
    use std::os::unix::fs::MetadataExt;
    Some(format!("{}:{}", meta.dev(), meta.ino()))
}

#[cfg(not(unix))]
fn visit_key(path: &Path, _meta: &fs::Metadata) -> Option<String> {
    path.canonicalize()
        .ok()
        .map(|p| p.to_string_lossy().into_owned())
}
