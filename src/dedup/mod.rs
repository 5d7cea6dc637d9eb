//! C5: content-based duplicate detection via a three-stage size -> partial-hash ->
//! full-hash pipeline, each stage dropping singleton groups before the next runs.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::defaults::Tuning;
use crate::error::HashError;
use crate::hasher::{hash_file, partial_hash};
use crate::types::{Algorithm, DuplicateGroup, FileTypeFilter};
use crate::walker::{walk, WalkOptions};
use crate::worker_pool::WorkerPool;

/// Options controlling a single duplicate scan.
#[derive(Clone, Debug)]
pub struct DedupOptions {
    pub recursive: bool,
    pub min_size: u64,
    pub algorithm: Algorithm,
    pub partial_hash_size: usize,
    pub max_workers: usize,
}

impl Default for DedupOptions {
    fn default() -> Self {
        DedupOptions {
            recursive: true,
            min_size: Tuning::MIN_SIZE,
            algorithm: Algorithm::Blake3,
            partial_hash_size: Tuning::PARTIAL_HASH_SIZE,
            max_workers: Tuning::default_workers(),
        }
    }
}

/// Find duplicate files among `paths` (files or directories). `progress_callback` is invoked
/// as `(stage, completed, total)` at the end of each unit of work within a stage, where
/// `stage` is one of `"collecting"`, `"partial_hash"`, `"full_hash"`.
pub fn find_duplicates<F>(
    paths: &[PathBuf],
    options: &DedupOptions,
    progress_callback: F,
) -> Result<Vec<DuplicateGroup>, HashError>
where
    F: Fn(&str, usize, usize) + Send + Sync + 'static,
{
    let progress_callback = Arc::new(progress_callback);

    // Stage 1: group candidate files by exact size.
    let candidates = enumerate_candidates(paths, options)?;
    let total = candidates.len();
    let mut by_size: HashMap<u64, Vec<PathBuf>> = HashMap::new();
    for (index, (path, size)) in candidates.into_iter().enumerate() {
        by_size.entry(size).or_default().push(path);
        progress_callback("collecting", index + 1, total);
    }
    by_size.retain(|_, group| group.len() > 1);

    // Stage 2: partial (head+tail) hash within each size group.
    let stage2_groups: Vec<(u64, Vec<PathBuf>)> = by_size.into_iter().collect();
    let partial_groups = hash_stage(
        stage2_groups,
        options,
        Arc::clone(&progress_callback),
        "partial_hash",
        |path, size, options| partial_hash(path, options.algorithm, options.partial_hash_size, size),
    )?;
    let partial_groups: Vec<(u64, Vec<PathBuf>)> = partial_groups
        .into_iter()
        .map(|(size, _hash, paths)| (size, paths))
        .collect();

    // Stage 3: full-content hash within each surviving partial-hash group.
    let full_groups = hash_stage(
        partial_groups,
        options,
        Arc::clone(&progress_callback),
        "full_hash",
        |path, _size, options| {
            hash_file(path, options.algorithm, Tuning::HASH_CHUNK_SIZE).map(|r| r.hash_hex)
        },
    )?;

    let mut result: Vec<DuplicateGroup> = full_groups
        .into_iter()
        .map(|(size, hash_hex, mut paths)| {
            paths.sort();
            DuplicateGroup {
                hash_hex,
                algorithm: options.algorithm,
                file_size: size,
                paths,
            }
        })
        .collect();

    result.sort_by(|a, b| {
        b.wasted_bytes()
            .cmp(&a.wasted_bytes())
            .then_with(|| b.file_size.cmp(&a.file_size))
            .then_with(|| a.hash_hex.cmp(&b.hash_hex))
    });

    Ok(result)
}

fn enumerate_candidates(
    paths: &[PathBuf],
    options: &DedupOptions,
) -> Result<Vec<(PathBuf, u64)>, HashError> {
    let mut candidates = Vec::new();
    for path in paths {
        let meta = match fs::metadata(path) {
            Ok(m) => m,
            Err(_) => continue,
        };
        if meta.is_file() {
            if meta.len() >= options.min_size {
                candidates.push((path.clone(), meta.len()));
            }
            continue;
        }
        if meta.is_dir() {
            let walk_options = WalkOptions {
                file_type: FileTypeFilter::File,
                follow_symlinks: false,
                max_depth: if options.recursive { usize::MAX } else { 1 },
                ..WalkOptions::default()
            };
            let entries = walk(path, &walk_options).map_err(|_| HashError::Io {
                path: path.clone(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "enumeration failed"),
            })?;
            for entry in entries {
                if entry.size >= options.min_size {
                    candidates.push((entry.path, entry.size));
                }
            }
        }
    }
    Ok(candidates)
}

/// Run one hashing stage over every size-keyed group, re-grouping survivors by hash within
/// each original size bucket and dropping singletons. Uses the shared worker pool so every
/// file in every group is hashed concurrently, not group by group.
fn hash_stage<F, H>(
    groups: Vec<(u64, Vec<PathBuf>)>,
    options: &DedupOptions,
    progress_callback: Arc<F>,
    stage_name: &'static str,
    hash_fn: H,
) -> Result<Vec<(u64, String, Vec<PathBuf>)>, HashError>
where
    F: Fn(&str, usize, usize) + Send + Sync + 'static,
    H: Fn(&Path, u64, &DedupOptions) -> Result<String, HashError> + Send + Sync + 'static,
{
    let total: usize = groups.iter().map(|(_, g)| g.len()).sum();
    let completed = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let results: Arc<Mutex<Vec<(u64, PathBuf, Result<String, HashError>)>>> =
        Arc::new(Mutex::new(Vec::with_capacity(total)));

    let hash_fn = Arc::new(hash_fn);
    let options = options.clone();
    let pool = WorkerPool::new(options.max_workers.max(1), total.max(1))
        .map_err(|source| HashError::PoolInit { source })?;
    for (size, paths) in &groups {
        for path in paths {
            let size = *size;
            let path = path.clone();
            let results = Arc::clone(&results);
            let completed = Arc::clone(&completed);
            let progress_callback = Arc::clone(&progress_callback);
            let hash_fn = Arc::clone(&hash_fn);
            let options = options.clone();
            pool.submit(move || {
                let hash = hash_fn(&path, size, &options);
                results.lock().unwrap().push((size, path, hash));
                let done = completed.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
                progress_callback(stage_name, done, total);
            });
        }
    }
    pool.join();

    let results = Arc::try_unwrap(results)
        .map(|m| m.into_inner().unwrap())
        .unwrap_or_default();

    // A hash failure on any file aborts the whole call, consistent with C2's hash_files.
    let mut by_size_hash: HashMap<(u64, String), Vec<PathBuf>> = HashMap::new();
    for (size, path, hash) in results {
        let hash_hex = hash?;
        by_size_hash.entry((size, hash_hex)).or_default().push(path);
    }

    let mut out = Vec::new();
    for ((size, hash_hex), paths) in by_size_hash {
        if paths.len() > 1 {
            out.push((size, hash_hex, paths));
        }
    }
    Ok(out)
}
