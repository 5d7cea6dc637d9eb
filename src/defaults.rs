//! Tuning and defaults in one place, in the teacher's `utils::config` tradition.

/// Walker, hasher, transfer, watcher, and dedup tuning constants.
pub struct Tuning;

impl Tuning {
    /// File size above which hashing switches from buffered reads to memory-mapped I/O.
    pub const HASH_MMAP_THRESHOLD: u64 = 4 * 1024 * 1024;
    /// Default chunked-read buffer size below the mmap threshold.
    pub const HASH_CHUNK_SIZE: usize = 1024 * 1024;
    /// Capacity of the walker's output channel (admitted `WalkEntry`s).
    pub const WALK_CHANNEL_CAP: usize = 4096;
    /// Default debounce window for the watcher.
    pub const DEBOUNCE_MS: u64 = 500;
    /// Default throttle interval for transfer progress callbacks.
    pub const CALLBACK_INTERVAL_MS: u64 = 100;
    /// Default number of leading/trailing bytes hashed in the dedup partial-hash stage.
    pub const PARTIAL_HASH_SIZE: usize = 4096;
    /// Default minimum file size considered by the deduper.
    pub const MIN_SIZE: u64 = 1;
    /// Consecutive watcher event-source errors before the watcher transitions to stopped.
    pub const WATCH_ERROR_LIMIT: u32 = 3;

    /// Default worker-pool width: hardware concurrency, capped by the FD-limit-derived ceiling.
    pub fn default_workers() -> usize {
        let hw = num_cpus::get().max(1);
        match crate::fd_limit::max_workers_by_fd_limit() {
            Some(cap) => hw.min(cap.max(1)),
            None => hw,
        }
    }
}
