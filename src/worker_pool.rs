//! Shared worker-pool primitive: N joined threads draining a bounded task queue.
//!
//! Used by the hasher, transfer, and dedup engines wherever the unit of work is
//! "take one path off a queue, do blocking I/O, send the result." The walker has
//! its own pool shape (workers also produce new work, directories), see
//! `walker::pool`.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, bounded};

/// A pool of worker threads each running `work` against items pulled from a shared
/// bounded channel. Feed items with the returned `Sender`, then drop it so workers
/// exit once the queue drains; join with [`WorkerPool::join`].
pub struct WorkerPool {
    tx: Sender<Box<dyn FnOnce() + Send>>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `num_workers` threads, each looping `recv` on a shared task channel
    /// of capacity `queue_cap` until the channel is closed. Fails if the OS
    /// refuses to create one of the threads; any threads already spawned are
    /// joined before returning the error (the channel is dropped, which closes
    /// it immediately since no sender clone is held elsewhere yet).
    pub fn new(num_workers: usize, queue_cap: usize) -> Result<Self, std::io::Error> {
        let (tx, rx): (Sender<Box<dyn FnOnce() + Send>>, Receiver<_>) = bounded(queue_cap);
        let mut handles = Vec::with_capacity(num_workers.max(1));
        for _ in 0..num_workers.max(1) {
            let rx = rx.clone();
            let spawned = thread::Builder::new().spawn(move || {
                while let Ok(task) = rx.recv() {
                    task();
                }
            });
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    drop(tx);
                    for h in handles {
                        let _ = h.join();
                    }
                    return Err(e);
                }
            }
        }
        Ok(WorkerPool { tx, handles })
    }

    /// Enqueue one unit of work. Blocks if the queue is full.
    pub fn submit<F: FnOnce() + Send + 'static>(&self, task: F) {
        let _ = self.tx.send(Box::new(task));
    }

    /// Close the task queue and wait for every worker to drain and exit.
    pub fn join(self) {
        drop(self.tx);
        for h in self.handles {
            let _ = h.join();
        }
    }
}
