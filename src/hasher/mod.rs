//! C2: content hashing, single-file and worker-pooled batches.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use memmap2::Mmap;
use sha2::Digest;

use crate::defaults::Tuning;
use crate::error::HashError;
use crate::types::{Algorithm, HashResult};
use crate::worker_pool::WorkerPool;

enum AlgoHasher {
    Blake3(blake3::Hasher),
    Sha256(sha2::Sha256),
}

impl AlgoHasher {
    fn new(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::Blake3 => AlgoHasher::Blake3(blake3::Hasher::new()),
            Algorithm::Sha256 => AlgoHasher::Sha256(sha2::Sha256::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            AlgoHasher::Blake3(h) => {
                h.update(data);
            }
            AlgoHasher::Sha256(h) => Digest::update(h, data),
        }
    }

    fn finalize_hex(self) -> String {
        match self {
            AlgoHasher::Blake3(h) => h.finalize().to_hex().to_string(),
            AlgoHasher::Sha256(h) => hex::encode(Digest::finalize(h)),
        }
    }
}

/// Hash a single file. Uses memory-mapped I/O above [`Tuning::HASH_MMAP_THRESHOLD`],
/// chunked buffered reads below it (zero-byte files never attempt an mmap).
pub fn hash_file(path: &Path, algorithm: Algorithm, chunk_size: usize) -> Result<HashResult, HashError> {
    let file = File::open(path).map_err(|source| HashError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let size = file
        .metadata()
        .map_err(|source| HashError::Io {
            path: path.to_path_buf(),
            source,
        })?
        .len();

    let hash_hex = if size > Tuning::HASH_MMAP_THRESHOLD {
        hash_mmap(&file, path, algorithm)?
    } else {
        hash_buffered(file, path, algorithm, chunk_size)?
    };

    Ok(HashResult {
        path: path.to_path_buf(),
        algorithm,
        hash_hex,
        size,
    })
}

fn hash_mmap(file: &File, path: &Path, algorithm: Algorithm) -> Result<String, HashError> {
    let mmap = unsafe { Mmap::map(file) }.map_err(|source| HashError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut hasher = AlgoHasher::new(algorithm);
    hasher.update(&mmap);
    Ok(hasher.finalize_hex())
}

fn hash_buffered(
    file: File,
    path: &Path,
    algorithm: Algorithm,
    chunk_size: usize,
) -> Result<String, HashError> {
    let chunk_size = chunk_size.max(1);
    let mut reader = std::io::BufReader::with_capacity(chunk_size, file);
    let mut hasher = AlgoHasher::new(algorithm);
    let mut buffer = vec![0u8; chunk_size];
    loop {
        let n = reader.read(&mut buffer).map_err(|source| HashError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(hasher.finalize_hex())
}

/// Hash every path in `paths` across a worker pool of `max_workers` threads, invoking
/// `callback` as each result completes. On the first failure, already-queued tasks are
/// skipped, every worker is joined, and the call returns `Err` with no partial results.
pub fn hash_files<F>(
    paths: &[PathBuf],
    algorithm: Algorithm,
    chunk_size: usize,
    max_workers: usize,
    callback: F,
) -> Result<Vec<HashResult>, HashError>
where
    F: Fn(&HashResult) + Send + Sync + 'static,
{
    let callback = Arc::new(callback);
    let results: Arc<Mutex<Vec<HashResult>>> = Arc::new(Mutex::new(Vec::with_capacity(paths.len())));
    let failed: Arc<Mutex<Option<HashError>>> = Arc::new(Mutex::new(None));
    let abort = Arc::new(AtomicBool::new(false));

    let pool = WorkerPool::new(max_workers.max(1), paths.len().max(1))
        .map_err(|source| HashError::PoolInit { source })?;
    for path in paths {
        let path = path.clone();
        let results = Arc::clone(&results);
        let failed = Arc::clone(&failed);
        let abort = Arc::clone(&abort);
        let callback = Arc::clone(&callback);
        pool.submit(move || {
            if abort.load(Ordering::Relaxed) {
                return;
            }
            match hash_file(&path, algorithm, chunk_size) {
                Ok(result) => {
                    callback(&result);
                    results.lock().unwrap().push(result);
                }
                Err(e) => {
                    abort.store(true, Ordering::Relaxed);
                    failed.lock().unwrap().get_or_insert(e);
                }
            }
        });
    }
    pool.join();

    if let Some(e) = failed.lock().unwrap().take() {
        return Err(e);
    }
    Ok(Arc::try_unwrap(results)
        .unwrap_or_else(|arc| Mutex::new(arc.lock().unwrap().clone()))
        .into_inner()
        .unwrap())
}

/// Hash the first and last `partial_size` bytes of a file, for the deduper's cheap
/// second-stage filter. Files smaller than `2 * partial_size` are hashed whole instead,
/// since head and tail windows would overlap or exceed the file.
pub fn partial_hash(
    path: &Path,
    algorithm: Algorithm,
    partial_size: usize,
    size: u64,
) -> Result<String, HashError> {
    if size < (2 * partial_size) as u64 {
        return Ok(hash_file(path, algorithm, Tuning::HASH_CHUNK_SIZE)?.hash_hex);
    }

    use std::io::{Seek, SeekFrom};
    let mut file = File::open(path).map_err(|source| HashError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut hasher = AlgoHasher::new(algorithm);

    let mut head = vec![0u8; partial_size];
    file.read_exact(&mut head).map_err(|source| HashError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    hasher.update(&head);

    file.seek(SeekFrom::End(-(partial_size as i64)))
        .map_err(|source| HashError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    let mut tail = vec![0u8; partial_size];
    file.read_exact(&mut tail).map_err(|source| HashError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    hasher.update(&tail);

    Ok(hasher.finalize_hex())
}
