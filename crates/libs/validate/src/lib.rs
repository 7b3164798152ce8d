//! RemoteMedia Validate - runtime conformance validation for streaming pipelines
//!
//! This crate watches a running pipeline for behavioural violations and
//! drives it through scripted scenarios:
//!
//! - **Issue catalog**: every known violation, keyed by `area::name`
//! - **Reporters**: named observation points that raise [`Report`]s
//! - **Runner**: thread-safe collector that deduplicates, prints and, when
//!   configured to, aborts on fatal severities
//! - **Scenarios**: position-triggered seek/pause/play/eos actions with
//!   tolerance-checked seek verification
//!
//! # Example
//!
//! ```no_run
//! use remotemedia_validate::{ids, Reporter, Runner, ValidateConfig};
//! use std::sync::Arc;
//!
//! # fn main() -> remotemedia_validate::Result<()> {
//! let config = ValidateConfig::from_env()?;
//! let runner = Arc::new(Runner::new(&config)?);
//!
//! let reporter = Reporter::new("demuxer:video_0", &runner);
//! reporter.report(ids::BUFFER_BEFORE_SEGMENT.as_str(), "pts 0:00:01.000000000")?;
//!
//! runner.print_summary();
//! std::process::exit(runner.exit_status());
//! # }
//! ```

pub mod config;
pub mod error;
pub mod issue;
pub mod report;
pub mod reporter;
pub mod runner;
pub mod scenario;
pub mod sink;
pub mod time;

pub use config::{DebugFlags, ReportingDetails, ValidateConfig};
pub use error::{Error, Result};
pub use issue::{
    global_catalog, ids, install_catalog, lookup_issue, Issue, IssueCatalog, IssueId, Severity,
};
pub use report::{Report, ReportingLevel};
pub use reporter::Reporter;
pub use runner::{FatalHandler, Runner};
pub use scenario::{
    global_action_registry, Pipeline, PipelineError, PipelineState, Scenario, ScenarioConfig,
    ScenarioEngine, ScenarioEvent, ScenarioOutcome,
};
pub use sink::{ChannelSink, OutputSink, SinkError, TerminalSink};

use std::sync::Arc;
use tokio::sync::mpsc;

/// Initialize logging and pin the process clock
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init()
        .map_err(|e| Error::ConfigError(format!("Failed to install tracing subscriber: {}", e)))?;

    time::mark_process_start();
    tracing::info!("RemoteMedia Validate initialized");
    Ok(())
}

/// Run a scenario to completion, then print the runner summary.
///
/// Returns the scenario outcome and the process exit status.
pub async fn run_scenario(
    engine: ScenarioEngine,
    events: mpsc::UnboundedReceiver<ScenarioEvent>,
    runner: &Arc<Runner>,
) -> (ScenarioOutcome, i32) {
    let outcome = engine.run(events).await;
    tracing::info!(
        "Scenario {} finished: {} executed, {} failed, {} pending",
        outcome.scenario,
        outcome.executed,
        outcome.failed,
        outcome.pending
    );
    runner.print_summary();
    (outcome, runner.exit_status())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init() {
        // A second init fails to install the subscriber, which is fine
        init().ok();
        assert!(time::since_process_start() >= std::time::Duration::ZERO);
    }
}
