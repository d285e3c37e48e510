//! Work router for distributing batches to worker contexts.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, trace};

/// Distributes work items to a fixed set of worker queues.
///
/// Each worker has its own bounded queue. Routing starts at a round-robin
/// position and hands the item to the first worker with queue space; when
/// every queue is full it waits on the round-robin choice.
pub struct WorkRouter<T> {
    /// Senders for each worker
    senders: Vec<mpsc::Sender<T>>,

    /// Round-robin counter for distribution
    next_worker: AtomicUsize,

    /// Whether the router is shutdown
    shutdown: AtomicBool,
}

impl<T: Send> std::fmt::Debug for WorkRouter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkRouter")
            .field("workers", &self.senders.len())
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}

impl<T: Send> WorkRouter<T> {
    /// Creates a router with `num_workers` queues of `queue_depth` items each.
    pub fn new(num_workers: usize, queue_depth: usize) -> (Self, Vec<mpsc::Receiver<T>>) {
        let mut senders = Vec::with_capacity(num_workers);
        let mut receivers = Vec::with_capacity(num_workers);

        for _ in 0..num_workers {
            let (tx, rx) = mpsc::channel(queue_depth.max(1));
            senders.push(tx);
            receivers.push(rx);
        }

        let router = Self {
            senders,
            next_worker: AtomicUsize::new(0),
            shutdown: AtomicBool::new(false),
        };

        (router, receivers)
    }

    /// Routes one item to a worker.
    ///
    /// Returns `Err(item)` if the router is shut down or the chosen
    /// worker's queue is closed.
    pub async fn route(&self, item: T) -> Result<usize, T> {
        if self.is_shutdown() || self.senders.is_empty() {
            return Err(item);
        }

        let first = self.next_worker.fetch_add(1, Ordering::Relaxed) % self.senders.len();
        let mut item = item;

        for offset in 0..self.senders.len() {
            let worker = (first + offset) % self.senders.len();
            match self.senders[worker].try_send(item) {
                Ok(()) => {
                    trace!(worker, "Routed work item");
                    return Ok(worker);
                }
                Err(TrySendError::Full(returned)) => item = returned,
                Err(TrySendError::Closed(returned)) => return Err(returned),
            }
        }

        trace!(worker = first, "All worker queues full, waiting");
        self.senders[first].send(item).await.map_err(|e| e.0)?;
        Ok(first)
    }

    /// Signals shutdown; later calls to [`route`](Self::route) fail.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        debug!("Work router shutdown signaled");
    }

    /// Whether the router is shut down.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Number of workers.
    pub fn num_workers(&self) -> usize {
        self.senders.len()
    }
}
