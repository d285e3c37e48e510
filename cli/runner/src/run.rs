//! Main execution logic for the batchflow CLI.

use bf_error::ErrorCategory;
use bf_processor::{Processor, RunFailure, RunSummary};
use bf_types::RunConfig;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Runs the processor, stopping gracefully on the first Ctrl-C.
pub async fn execute(config: RunConfig) -> Result<RunSummary, RunFailure> {
    info!(
        input = %config.input_path.display(),
        outputs = config.output_paths.len(),
        transform = %config.transform,
        workers = config.workers,
        batch_size = config.batch_size,
        keep_order = config.keep_order,
        resume = config.resume,
        "Starting batchflow"
    );

    let processor = Processor::new(config);
    let interrupts = tokio::spawn(watch_interrupts(processor.cancellation_token()));

    let outcome = processor.run().await;
    interrupts.abort();
    outcome
}

/// Cancels the run on Ctrl-C. A second Ctrl-C exits immediately.
async fn watch_interrupts(token: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_err() {
        warn!("Could not install the Ctrl-C handler");
        return;
    }
    warn!("Interrupt received, finishing in-flight batches (Ctrl-C again to abort)");
    token.cancel();

    if tokio::signal::ctrl_c().await.is_ok() {
        error!("Second interrupt, exiting without a final checkpoint");
        std::process::exit(ErrorCategory::Interrupted.exit_code());
    }
}
