//! Worker pool: one transform instance per blocking worker context.

use crate::router::WorkRouter;
use bf_error::{BfError, Result, TransformError};
use bf_traits::RecordTransform;
use bf_types::{Batch, Decision, IndexSpan, IndexedRecord, Outcome, StatsMap};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;
use tokio::sync::{mpsc, OwnedSemaphorePermit};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// A batch handed to a worker, with the in-flight permit it holds.
#[derive(Debug)]
pub struct Work {
    pub batch: Batch,
    pub permit: Option<OwnedSemaphorePermit>,
}

impl Work {
    pub fn new(batch: Batch, permit: OwnedSemaphorePermit) -> Self {
        Self {
            batch,
            permit: Some(permit),
        }
    }
}

/// What a worker returns for one batch.
#[derive(Debug)]
pub struct BatchResult {
    /// Batch sequence number
    pub batch_id: u64,

    /// Input positions the batch covered
    pub span: IndexSpan,

    /// Worker context that processed it
    pub worker: usize,

    /// Non-dropped results in input order
    pub outcomes: Vec<Outcome>,

    /// Records given to the transform
    pub submitted: u64,

    /// Records that failed (error, panic or invalid destination)
    pub failed: u64,

    /// Positions the source could not decode
    pub malformed: u64,

    /// Change in the worker's transform statistics since its previous batch
    pub stats: StatsMap,

    /// In-flight permit, released once the span is resolved
    pub permit: Option<OwnedSemaphorePermit>,
}

/// One worker context: a transform instance and the statistics it last reported.
struct WorkerContext {
    id: usize,
    transform: Box<dyn RecordTransform>,
    destination_count: usize,
    reported: StatsMap,
}

impl WorkerContext {
    fn new(id: usize, transform: Box<dyn RecordTransform>, destination_count: usize) -> Self {
        Self {
            id,
            transform,
            destination_count,
            reported: StatsMap::new(),
        }
    }

    fn process_batch(&mut self, work: Work) -> BatchResult {
        let Work { batch, permit } = work;
        let submitted = batch.records.len() as u64;
        let mut outcomes = Vec::with_capacity(batch.records.len());
        let mut failed = 0u64;

        for record in batch.records {
            let index = record.index;
            match self.apply(record) {
                Ok(Some(outcome)) => outcomes.push(outcome),
                Ok(None) => {}
                Err(e) => {
                    failed += 1;
                    warn!(
                        worker = self.id,
                        index,
                        transform = self.transform.name(),
                        error = %e,
                        "Record failed, dropping"
                    );
                }
            }
        }

        let current = self.transform.current_stats();
        let stats = current.delta_since(&self.reported);
        self.reported = current;

        debug!(
            worker = self.id,
            batch_id = batch.id,
            span = %batch.span,
            submitted,
            emitted = outcomes.len(),
            failed,
            "Processed batch"
        );

        BatchResult {
            batch_id: batch.id,
            span: batch.span,
            worker: self.id,
            outcomes,
            submitted,
            failed,
            malformed: batch.malformed,
            stats,
            permit,
        }
    }

    /// Applies the transform to one record, turning panics into errors.
    fn apply(&mut self, record: IndexedRecord) -> Result<Option<Outcome>> {
        let IndexedRecord { index, record } = record;
        let destination_count = self.destination_count;
        let transform = &mut self.transform;

        let decision = catch_unwind(AssertUnwindSafe(|| {
            transform.process(record, destination_count)
        }))
        .map_err(|payload| TransformError::Panicked(panic_message(payload.as_ref())))??;

        match decision {
            Decision::Drop => Ok(None),
            Decision::Emit {
                record,
                destination,
            } if destination < destination_count => Ok(Some(Outcome {
                index,
                record,
                destination,
            })),
            Decision::Emit { destination, .. } => Err(TransformError::InvalidDestination {
                destination: i64::try_from(destination).unwrap_or(i64::MAX),
                count: destination_count,
            }
            .into()),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// A fixed set of worker contexts running on blocking threads.
///
/// Transforms are CPU-bound, so every context runs on its own blocking
/// thread and talks to the coordinator only through channels: a work queue
/// per context (fed by a [`WorkRouter`]) and one shared results channel.
/// Results arrive in completion order.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.handles.len())
            .finish()
    }
}

impl WorkerPool {
    /// Starts one worker context per transform instance.
    ///
    /// Returns the router feeding the contexts, the results channel and the
    /// pool handle. Contexts exit once the router is dropped and their queues
    /// are drained, or when the results channel is closed.
    pub fn start(
        transforms: Vec<Box<dyn RecordTransform>>,
        destination_count: usize,
        queue_depth: usize,
        result_capacity: usize,
    ) -> (WorkRouter<Work>, mpsc::Receiver<BatchResult>, Self) {
        let (router, receivers) = WorkRouter::new(transforms.len(), queue_depth);
        let (results_tx, results_rx) = mpsc::channel(result_capacity.max(1));

        let handles = transforms
            .into_iter()
            .zip(receivers)
            .enumerate()
            .map(|(id, (transform, rx))| {
                let context = WorkerContext::new(id, transform, destination_count);
                let results = results_tx.clone();
                tokio::task::spawn_blocking(move || worker_loop(context, rx, results))
            })
            .collect();

        (router, results_rx, Self { handles })
    }

    /// Number of worker contexts.
    pub fn num_workers(&self) -> usize {
        self.handles.len()
    }

    /// Waits for every context to exit.
    ///
    /// Blocking threads cannot be aborted, so contexts still running after
    /// `timeout` are left to finish on their own.
    pub async fn join(self, timeout: Duration) -> Result<()> {
        let joined = tokio::time::timeout(timeout, futures::future::join_all(self.handles)).await;

        match joined {
            Ok(results) => {
                let mut panicked = 0;
                for (worker, result) in results.into_iter().enumerate() {
                    if let Err(e) = result {
                        error!(worker, error = %e, "Worker context panicked");
                        panicked += 1;
                    }
                }
                if panicked > 0 {
                    return Err(BfError::Pool(format!("{panicked} worker context(s) panicked")));
                }
                Ok(())
            }
            Err(_) => {
                warn!(timeout_secs = timeout.as_secs(), "Shutdown timeout exceeded, some workers may not have completed");
                Ok(())
            }
        }
    }
}

fn worker_loop(
    mut context: WorkerContext,
    mut rx: mpsc::Receiver<Work>,
    results: mpsc::Sender<BatchResult>,
) {
    debug!(worker = context.id, transform = context.transform.name(), "Worker context started");

    while let Some(work) = rx.blocking_recv() {
        let result = context.process_batch(work);
        if results.blocking_send(result).is_err() {
            debug!(worker = context.id, "Results channel closed, stopping");
            break;
        }
    }

    debug!(worker = context.id, "Worker context stopped");
}
