//! C4: cross-platform, debounced filesystem change notification.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crossbeam_channel::{Receiver, Sender, unbounded};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::defaults::Tuning;
use crate::error::WatchError;
use crate::types::{ChangeType, FileChange};

struct PendingChange {
    change_type: ChangeType,
    is_dir: bool,
    deadline: Instant,
}

/// Scan cadence for the coalescer thread: how promptly an elapsed debounce deadline is noticed.
const SCAN_TICK: Duration = Duration::from_millis(25);

/// Watches a path (optionally recursive), debouncing the raw OS events into coalesced
/// [`FileChange`] batches. Uninstalls the watch and joins its background thread on `Drop`,
/// so it is safe to use as a scoped resource.
pub struct FileWatcher {
    path: PathBuf,
    recursive: bool,
    debounce_ms: u64,
    ignore_patterns: Vec<String>,
    watcher: Option<RecommendedWatcher>,
    batch_rx: Option<Receiver<Result<Vec<FileChange>, WatchError>>>,
    stop_flag: Arc<AtomicBool>,
    coalescer: Option<JoinHandle<()>>,
    stopped_permanently: Arc<AtomicBool>,
}

impl FileWatcher {
    pub fn new(
        path: &Path,
        recursive: bool,
        debounce_ms: u64,
        ignore_patterns: &[String],
    ) -> Result<Self, WatchError> {
        let mut watcher = FileWatcher {
            path: path.to_path_buf(),
            recursive,
            debounce_ms,
            ignore_patterns: ignore_patterns.to_vec(),
            watcher: None,
            batch_rx: None,
            stop_flag: Arc::new(AtomicBool::new(false)),
            coalescer: None,
            stopped_permanently: Arc::new(AtomicBool::new(false)),
        };
        watcher.start()?;
        Ok(watcher)
    }

    /// (Re)install the native watch and spawn the coalescer thread. A no-op if already running.
    pub fn start(&mut self) -> Result<(), WatchError> {
        if self.watcher.is_some() {
            return Ok(());
        }
        if self.stopped_permanently.load(Ordering::Relaxed) {
            return Err(WatchError::Stopped);
        }

        let (raw_tx, raw_rx) = unbounded::<notify::Result<Event>>();
        let mut watcher =
            notify::recommended_watcher(move |res| {
                let _ = raw_tx.send(res);
            })
            .map_err(|source| WatchError::Install {
                path: self.path.clone(),
                source,
            })?;

        let mode = if self.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher
            .watch(&self.path, mode)
            .map_err(|source| WatchError::Install {
                path: self.path.clone(),
                source,
            })?;

        let patterns: Vec<glob::Pattern> = self
            .ignore_patterns
            .iter()
            .filter_map(|p| glob::Pattern::new(p).ok())
            .collect();

        let (batch_tx, batch_rx) = unbounded();
        let stop_flag = Arc::new(AtomicBool::new(false));
        self.stop_flag = Arc::clone(&stop_flag);
        let debounce = Duration::from_millis(self.debounce_ms.max(1));
        let stopped_permanently = Arc::clone(&self.stopped_permanently);

        let handle = thread::spawn(move || {
            coalescer_loop(raw_rx, batch_tx, patterns, debounce, stop_flag, stopped_permanently);
        });

        self.watcher = Some(watcher);
        self.batch_rx = Some(batch_rx);
        self.coalescer = Some(handle);
        Ok(())
    }

    /// Uninstall the native watch, stop the coalescer thread, and join it. After this call
    /// no further events are delivered.
    pub fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        self.watcher = None; // dropping the watcher uninstalls it
        if let Some(handle) = self.coalescer.take() {
            let _ = handle.join();
        }
        self.batch_rx = None;
    }

    /// Block up to `timeout_ms` for the next coalesced batch. Returns an empty `Vec` on timeout.
    pub fn poll_events(&self, timeout_ms: u64) -> Result<Vec<FileChange>, WatchError> {
        let Some(rx) = &self.batch_rx else {
            return Err(WatchError::Stopped);
        };
        match rx.recv_timeout(Duration::from_millis(timeout_ms)) {
            Ok(batch) => batch,
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => Ok(Vec::new()),
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => Err(WatchError::Stopped),
        }
    }
}

impl Iterator for FileWatcher {
    type Item = Result<Vec<FileChange>, WatchError>;

    fn next(&mut self) -> Option<Self::Item> {
        let rx = self.batch_rx.as_ref()?;
        match rx.recv() {
            Ok(batch) => Some(batch),
            Err(_) => None,
        }
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn coalescer_loop(
    raw_rx: Receiver<notify::Result<Event>>,
    batch_tx: Sender<Result<Vec<FileChange>, WatchError>>,
    patterns: Vec<glob::Pattern>,
    debounce: Duration,
    stop_flag: Arc<AtomicBool>,
    stopped_permanently: Arc<AtomicBool>,
) {
    let pending: Mutex<HashMap<PathBuf, PendingChange>> = Mutex::new(HashMap::new());
    let consecutive_errors = AtomicU32::new(0);

    loop {
        if stop_flag.load(Ordering::Relaxed) {
            break;
        }
        match raw_rx.recv_timeout(SCAN_TICK) {
            Ok(Ok(event)) => {
                consecutive_errors.store(0, Ordering::Relaxed);
                record_event(&pending, &patterns, event, debounce);
            }
            Ok(Err(e)) => {
                let n = consecutive_errors.fetch_add(1, Ordering::Relaxed) + 1;
                let _ = batch_tx.send(Err(WatchError::EventSource {
                    message: e.to_string(),
                }));
                if n >= Tuning::WATCH_ERROR_LIMIT {
                    stopped_permanently.store(true, Ordering::Relaxed);
                    break;
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        }

        flush_expired(&pending, &batch_tx);
    }
}

fn record_event(
    pending: &Mutex<HashMap<PathBuf, PendingChange>>,
    patterns: &[glob::Pattern],
    event: Event,
    debounce: Duration,
) {
    let Some(incoming_type) = classify(&event.kind) else {
        return;
    };
    // Prefer the directory/file distinction the native backend already reports in the event
    // kind (notably for Remove events, where the path no longer exists to `stat`); fall back
    // to a filesystem check only when the backend reports `Any`/unknown.
    let is_dir_hint = is_dir_from_kind(&event.kind);

    let mut map = pending.lock().unwrap();
    for path in event.paths {
        if patterns.iter().any(|p| p.matches_path(&path)) {
            continue;
        }
        let is_dir = is_dir_hint.unwrap_or_else(|| path.is_dir());
        let deadline = Instant::now() + debounce;
        map.entry(path)
            .and_modify(|existing| {
                existing.change_type = merge(existing.change_type, incoming_type);
                existing.is_dir = is_dir_hint.unwrap_or(existing.is_dir);
                existing.deadline = deadline;
            })
            .or_insert(PendingChange {
                change_type: incoming_type,
                is_dir,
                deadline,
            });
    }
}

fn flush_expired(
    pending: &Mutex<HashMap<PathBuf, PendingChange>>,
    batch_tx: &Sender<Result<Vec<FileChange>, WatchError>>,
) {
    let now = Instant::now();
    let mut map = pending.lock().unwrap();
    let mut ready = Vec::new();
    map.retain(|path, change| {
        if change.deadline <= now {
            ready.push(FileChange {
                path: path.clone(),
                change_type: change.change_type,
                is_dir: change.is_dir,
                timestamp: unix_timestamp(),
            });
            false
        } else {
            true
        }
    });
    drop(map);
    if !ready.is_empty() {
        let _ = batch_tx.send(Ok(ready));
    }
}

fn unix_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

fn classify(kind: &EventKind) -> Option<ChangeType> {
    match kind {
        EventKind::Create(_) => Some(ChangeType::Created),
        EventKind::Modify(_) => Some(ChangeType::Modified),
        EventKind::Remove(_) => Some(ChangeType::Deleted),
        _ => None,
    }
}

/// Directory/file hint carried directly in the event kind, when the backend reports one.
/// `Remove` events in particular can't be `stat`-ed after the fact, so this is the only
/// reliable source of `is_dir` for deletions.
fn is_dir_from_kind(kind: &EventKind) -> Option<bool> {
    use notify::event::{CreateKind, RemoveKind};
    match kind {
        EventKind::Create(CreateKind::Folder) => Some(true),
        EventKind::Create(CreateKind::File) => Some(false),
        EventKind::Remove(RemoveKind::Folder) => Some(true),
        EventKind::Remove(RemoveKind::File) => Some(false),
        _ => None,
    }
}

/// Collapse two events seen for the same path within one debounce window. Precedence is
/// `Deleted > Modified > Created`, except a `Created` arriving after a collapsed `Deleted`
/// means the path exists again by the time the window closes, so the net result is `Created`
/// rather than `Deleted`.
fn merge(existing: ChangeType, incoming: ChangeType) -> ChangeType {
    use ChangeType::*;
    match (existing, incoming) {
        (Deleted, Created) => Created,
        (Deleted, Modified) => Created,
        (_, Deleted) => Deleted,
        (Created, _) => Created,
        (Modified, Created) => Modified,
        (Modified, Modified) => Modified,
    }
}
