//! Scheduled-mode loop: one full pipeline run per tick.

use tokio::time::{interval, Duration};

use talkless_core::Result;

use crate::orchestrator::Orchestrator;

/// Run the pipeline on a fixed interval until the task is cancelled.
///
/// Non-fatal run errors are logged and the loop continues; a
/// configuration-class error stops the loop (something external broke,
/// e.g. the output directory disappeared).
pub async fn run_scheduled(orchestrator: &Orchestrator, interval_secs: u64) -> Result<()> {
    let mut ticker = interval(Duration::from_secs(interval_secs.max(1)));
    loop {
        ticker.tick().await;
        match orchestrator.run().await {
            Ok(artifacts) => {
                tracing::info!(
                    run = %artifacts.report.run_id,
                    summaries = artifacts.report.counts.summaries_generated,
                    partial = artifacts.report.partial,
                    "scheduled run finished"
                );
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::error!(error = %e, "scheduled run failed, will retry next tick");
            }
        }
    }
}
