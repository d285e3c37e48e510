//! The processing coordinator.

use crate::batcher::Batcher;
use crate::checkpoint::CheckpointManager;
use crate::integrator::{create_integrator, ResultIntegrator};
use crate::pool::{BatchResult, Work, WorkerPool};
use crate::router::WorkRouter;
use crate::stats::{write_report, RunTotals, StatsAggregator};
use bf_error::{classify_error, BfError, ErrorCategory, ProcessingStage, Result};
use bf_reader_ndjson::NdjsonSource;
use bf_reader_parquet::ParquetSource;
use bf_traits::{RecordSource, RecordTransform};
use bf_transform::{TransformRegistry, TransformSpec};
use bf_types::{FileFormat, RunConfig, StatsMap};
use bf_writer::{OutputRouter, WriteMode};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Batches queued per worker context beyond the one it is processing.
const WORKER_QUEUE_DEPTH: usize = 2;

/// What a run did.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Index the run started at (the checkpoint it resumed from)
    pub start_index: u64,

    /// Contiguous resolved watermark at the end of the run
    pub next_index: u64,

    /// Batches completed by the worker pool
    pub batches: u64,

    /// Records given to a transform
    pub submitted: u64,

    /// Records written across all outputs
    pub written: u64,

    /// Records written to each output
    pub written_per_destination: Vec<u64>,

    /// Records dropped because the transform failed on them
    pub failed: u64,

    /// Input positions that could not be decoded
    pub malformed: u64,

    /// Wall-clock duration
    pub elapsed: Duration,

    /// The statistics report as written to the stats file
    pub report: StatsMap,
}

impl RunSummary {
    /// Whether any record was lost to a record-level error.
    pub fn has_record_errors(&self) -> bool {
        self.failed > 0 || self.malformed > 0
    }

    /// Records written per second of wall-clock time.
    pub fn rows_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.written as f64 / secs
        } else {
            0.0
        }
    }
}

/// A run that did not complete.
///
/// Carries the stage the error surfaced in and, when processing had
/// started, the summary of what was done before stopping.
#[derive(Debug, Error)]
#[error("{stage} failed: {error}")]
pub struct RunFailure {
    pub stage: ProcessingStage,

    #[source]
    pub error: BfError,

    pub summary: Option<RunSummary>,
}

impl RunFailure {
    pub fn new(stage: ProcessingStage, error: BfError) -> Self {
        Self {
            stage,
            error,
            summary: None,
        }
    }

    fn setup(error: BfError) -> Self {
        Self::new(ProcessingStage::Setup, error)
    }

    fn with_summary(mut self, summary: RunSummary) -> Self {
        self.summary = Some(summary);
        self
    }

    /// How the failure should be reported.
    ///
    /// Only fatal categories are returned; an error that is record-level in
    /// isolation still ended this run, so it counts as a batch failure.
    pub fn category(&self) -> ErrorCategory {
        match classify_error(&self.error, self.stage) {
            ErrorCategory::Record => ErrorCategory::Batch,
            category => category,
        }
    }
}

/// Everything the coordinator owns while batches are flowing.
struct RunState {
    outputs: OutputRouter,
    integrator: Box<dyn ResultIntegrator>,
    aggregator: StatsAggregator,
    checkpoint: CheckpointManager,
    saved: u64,
    write_failed: bool,
}

impl RunState {
    /// Integrates one batch, then flushes and checkpoints if the watermark moved.
    async fn integrate(&mut self, result: BatchResult) -> Result<()> {
        self.aggregator.absorb(&result);

        let resolution = match self.integrator.integrate(result, &mut self.outputs).await {
            Ok(resolution) => resolution,
            Err(e) => {
                self.write_failed = true;
                return Err(e);
            }
        };

        if let Some(next) = resolution.advanced_to {
            if self.outputs.durable_on_flush() {
                if let Err(e) = self.outputs.flush_all().await {
                    self.write_failed = true;
                    return Err(e);
                }
                self.checkpoint.write(next).await?;
                self.saved = next;
            }
        }
        Ok(())
    }
}

/// Runs one input file through the transform into the outputs.
///
/// # Example
///
/// ```ignore
/// let config = RunConfig::new("in.jsonl", vec!["out.jsonl".into()], "stats.json", "passthrough")
///     .with_workers(4)
///     .with_keep_order(true);
///
/// let summary = Processor::new(config).run().await?;
/// println!("{} records written", summary.written);
/// ```
pub struct Processor {
    config: RunConfig,
    registry: TransformRegistry,
    cancel: CancellationToken,
}

impl std::fmt::Debug for Processor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Processor")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl Processor {
    /// Creates a processor using the built-in transforms.
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            registry: TransformRegistry::with_builtins(),
            cancel: CancellationToken::new(),
        }
    }

    /// Uses `registry` to look up the transform.
    pub fn with_registry(mut self, registry: TransformRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Stops the run gracefully when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that stops the run when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Executes the run.
    ///
    /// Setup (config, transforms, input, outputs) completes before any batch
    /// is dispatched. Outputs are closed on every path once opened. On
    /// cancellation, dispatch stops, in-flight batches drain and are written,
    /// and the run fails with [`BfError::Interrupted`].
    pub async fn run(&self) -> std::result::Result<RunSummary, RunFailure> {
        let started = Instant::now();
        let config = &self.config;

        config
            .validate()
            .map_err(|e| RunFailure::setup(BfError::Config(e)))?;
        let format = config
            .effective_format()
            .map_err(|e| RunFailure::setup(BfError::Config(e)))?;

        let spec = TransformSpec::from_run_config(config)
            .await
            .map_err(RunFailure::setup)?;
        let transforms = (0..config.workers)
            .map(|_| self.registry.create(&spec))
            .collect::<Result<Vec<_>>>()
            .map_err(RunFailure::setup)?;

        let checkpoint = CheckpointManager::for_output(&config.output_paths[0]);
        let start_index = if config.resume {
            checkpoint.read().await
        } else {
            0
        };

        let stream = open_source(&config.input_path, format)
            .open(start_index)
            .await
            .map_err(RunFailure::setup)?;

        if !config.resume {
            checkpoint.remove().await.map_err(RunFailure::setup)?;
        }

        let mode = if start_index > 0 {
            WriteMode::Append
        } else {
            WriteMode::Truncate
        };
        let outputs = OutputRouter::open(&config.output_paths, format, mode)
            .await
            .map_err(RunFailure::setup)?;

        info!(
            input = %config.input_path.display(),
            outputs = outputs.len(),
            format = %format,
            transform = %spec.name,
            workers = config.workers,
            batch_size = config.batch_size,
            max_in_flight = config.effective_max_in_flight(),
            keep_order = config.keep_order,
            start_index,
            "Starting run"
        );

        let mut state = RunState {
            outputs,
            integrator: create_integrator(config.keep_order, start_index),
            aggregator: StatsAggregator::new(),
            checkpoint,
            saved: start_index,
            write_failed: false,
        };

        let batcher = Batcher::new(stream, config.batch_size, start_index);
        let driven = self.drive(&mut state, batcher, transforms, started).await;

        let closed = state.outputs.finish_all().await;
        let next_index = state.integrator.next_index();

        // Sinks that are only durable once closed get their checkpoint now
        let mut checkpointed = Ok(());
        if closed.is_ok() && !state.write_failed && next_index > state.saved {
            checkpointed = state.checkpoint.write(next_index).await;
        }

        let elapsed = started.elapsed();
        let written = state.outputs.records_written();
        let report = state.aggregator.report(&RunTotals {
            written,
            start_index,
            next_index,
            elapsed,
        });
        let reported = write_report(&config.stats_path, &report).await;

        let summary = RunSummary {
            start_index,
            next_index,
            batches: state.aggregator.batches(),
            submitted: state.aggregator.submitted(),
            written,
            written_per_destination: state.outputs.written_per_destination(),
            failed: state.aggregator.failed(),
            malformed: state.aggregator.malformed(),
            elapsed,
            report,
        };

        let outcome = driven
            .and_then(|()| closed.map_err(|e| RunFailure::new(ProcessingStage::Write, e)))
            .and_then(|()| checkpointed.map_err(|e| RunFailure::new(ProcessingStage::Checkpoint, e)))
            .and_then(|()| reported.map_err(|e| RunFailure::new(ProcessingStage::Write, e)));

        match outcome {
            Ok(()) => {
                info!(
                    processed = summary.submitted,
                    output = summary.written,
                    failed = summary.failed,
                    malformed = summary.malformed,
                    next_index = summary.next_index,
                    elapsed_secs = %format!("{:.2}", elapsed.as_secs_f64()),
                    "Run completed"
                );
                Ok(summary)
            }
            Err(failure) => {
                warn!(
                    stage = %failure.stage,
                    error = %failure.error,
                    processed = summary.submitted,
                    output = summary.written,
                    next_index = summary.next_index,
                    "Run stopped"
                );
                Err(failure.with_summary(summary))
            }
        }
    }

    /// Streams batches through the pool into the integrator until the input
    /// is exhausted, the run is cancelled, or a fatal error occurs.
    async fn drive(
        &self,
        state: &mut RunState,
        batcher: Batcher,
        transforms: Vec<Box<dyn RecordTransform>>,
        started: Instant,
    ) -> std::result::Result<(), RunFailure> {
        let max_in_flight = self.config.effective_max_in_flight();
        let (router, mut results, pool) = WorkerPool::start(
            transforms,
            state.outputs.len(),
            WORKER_QUEUE_DEPTH,
            max_in_flight,
        );

        let stop = self.cancel.child_token();
        let dispatched = Arc::new(AtomicU64::new(0));
        let dispatcher = tokio::spawn(dispatch(
            batcher,
            router,
            Arc::new(Semaphore::new(max_in_flight)),
            stop.clone(),
            dispatched.clone(),
        ));

        let mut ticker = tokio::time::interval(self.config.progress_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        let mut failure: Option<RunFailure> = None;
        loop {
            tokio::select! {
                received = results.recv() => {
                    let Some(result) = received else { break };
                    if failure.is_some() {
                        // Drain without writing so workers can exit
                        state.aggregator.absorb(&result);
                        continue;
                    }
                    if let Err(e) = state.integrate(result).await {
                        error!(error = %e, "Failed to integrate batch, stopping");
                        stop.cancel();
                        let stage = if matches!(e, BfError::Checkpoint(_)) {
                            ProcessingStage::Checkpoint
                        } else {
                            ProcessingStage::Write
                        };
                        failure = Some(RunFailure::new(stage, e));
                    }
                }
                _ = ticker.tick() => {
                    log_progress(state, dispatched.load(Ordering::Relaxed), started);
                }
            }
        }

        let dispatch_result = dispatcher.await;
        let joined = pool.join(self.config.shutdown_timeout).await;

        if let Some(failure) = failure {
            return Err(failure);
        }

        let dispatched_batches = match dispatch_result {
            Ok(Ok(batches)) => batches,
            Ok(Err(e)) => {
                let stage = if matches!(e, BfError::Pool(_)) {
                    ProcessingStage::Dispatch
                } else {
                    ProcessingStage::Read
                };
                return Err(RunFailure::new(stage, e));
            }
            Err(e) => {
                return Err(RunFailure::new(
                    ProcessingStage::Dispatch,
                    BfError::Pool(format!("dispatcher task failed: {e}")),
                ))
            }
        };
        joined.map_err(|e| RunFailure::new(ProcessingStage::Dispatch, e))?;

        let completed = state.aggregator.batches();
        if completed != dispatched_batches {
            return Err(RunFailure::new(
                ProcessingStage::Dispatch,
                BfError::Pool(format!(
                    "{} of {dispatched_batches} batches never returned",
                    dispatched_batches.saturating_sub(completed)
                )),
            ));
        }

        if let Err(e) = state.integrator.finish(&mut state.outputs).await {
            state.write_failed = true;
            return Err(RunFailure::new(ProcessingStage::Write, e));
        }

        if self.cancel.is_cancelled() {
            info!(batches = completed, "In-flight batches drained after interrupt");
            return Err(RunFailure::new(ProcessingStage::Dispatch, BfError::Interrupted));
        }
        Ok(())
    }
}

fn open_source(path: &Path, format: FileFormat) -> Box<dyn RecordSource> {
    match format {
        FileFormat::Jsonl => Box::new(NdjsonSource::new(path)),
        FileFormat::Parquet => Box::new(ParquetSource::new(path)),
    }
}

/// Pulls batches and routes them to workers, one in-flight permit each.
///
/// Returns the number of batches dispatched.
async fn dispatch(
    mut batcher: Batcher,
    router: WorkRouter<Work>,
    semaphore: Arc<Semaphore>,
    stop: CancellationToken,
    dispatched_records: Arc<AtomicU64>,
) -> Result<u64> {
    let mut batches = 0u64;

    loop {
        let permit = tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            permit = semaphore.clone().acquire_owned() => {
                permit.map_err(|e| BfError::Pool(format!("in-flight limiter closed: {e}")))?
            }
        };

        let batch = tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            next = batcher.next_batch() => match next? {
                Some(batch) => batch,
                None => break,
            },
        };

        let records = batch.len() as u64;
        router
            .route(Work::new(batch, permit))
            .await
            .map_err(|work| {
                BfError::Pool(format!("no worker accepted batch {} ({})", work.batch.id, work.batch.span))
            })?;

        batches += 1;
        dispatched_records.fetch_add(records, Ordering::Relaxed);
    }

    router.shutdown();
    debug!(batches, next_start = batcher.next_start(), "Dispatch finished");
    Ok(batches)
}

fn log_progress(state: &RunState, dispatched: u64, started: Instant) {
    let elapsed = started.elapsed().as_secs_f64();
    let processed = state.aggregator.submitted();
    let rate = if elapsed > 0.0 {
        processed as f64 / elapsed
    } else {
        0.0
    };

    info!(
        processed,
        output = state.outputs.records_written(),
        pending = dispatched.saturating_sub(processed),
        buffered = state.integrator.pending(),
        next_index = state.integrator.next_index(),
        rate = %format!("{rate:.1} rows/s"),
        "Progress"
    );
}
