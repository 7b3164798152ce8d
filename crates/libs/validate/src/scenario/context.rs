//! Executor view of the scenario engine

use super::pipeline::{Pipeline, PipelineState};
use crate::reporter::Reporter;
use std::time::Duration;
use tokio::time::Instant;

/// Pipeline operation scheduled for later on the engine's own loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredOp {
    SetState(PipelineState),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredOperation {
    pub due: Instant,
    pub op: DeferredOp,
}

/// Mutable engine state executors may touch
#[derive(Debug)]
pub(crate) struct EngineShared {
    pub(crate) seeked_position: Option<Duration>,
    pub(crate) seek_tolerance: Duration,
    pub(crate) deferred: Vec<DeferredOperation>,
    pub(crate) description: Option<String>,
}

impl EngineShared {
    pub(crate) fn new(seek_tolerance: Duration) -> Self {
        Self {
            seeked_position: None,
            seek_tolerance,
            deferred: Vec::new(),
            description: None,
        }
    }
}

/// Handed to action executors
pub struct ActionContext<'a> {
    pipeline: &'a dyn Pipeline,
    reporter: &'a Reporter,
    shared: &'a mut EngineShared,
}

impl<'a> ActionContext<'a> {
    pub(crate) fn new(
        pipeline: &'a dyn Pipeline,
        reporter: &'a Reporter,
        shared: &'a mut EngineShared,
    ) -> Self {
        Self {
            pipeline,
            reporter,
            shared,
        }
    }

    pub fn pipeline(&self) -> &dyn Pipeline {
        self.pipeline
    }

    /// The scenario's own reporter
    pub fn reporter(&self) -> &Reporter {
        self.reporter
    }

    /// Raise a report from the scenario reporter
    pub fn report(&self, issue_id: &str, message: impl Into<String>) {
        if let Err(e) = self.reporter.report(issue_id, message) {
            tracing::error!("{}: could not raise report: {}", self.reporter.name(), e);
        }
    }

    /// Record the position the next async-done must land on
    pub fn set_expected_seek_position(&mut self, position: Option<Duration>) {
        self.shared.seeked_position = position;
    }

    pub fn expected_seek_position(&self) -> Option<Duration> {
        self.shared.seeked_position
    }

    pub fn seek_tolerance(&self) -> Duration {
        self.shared.seek_tolerance
    }

    pub fn set_seek_tolerance(&mut self, tolerance: Duration) {
        self.shared.seek_tolerance = tolerance;
    }

    /// Run `op` once `delay` has elapsed
    pub fn defer(&mut self, delay: Duration, op: DeferredOp) {
        self.shared.deferred.push(DeferredOperation {
            due: Instant::now() + delay,
            op,
        });
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.shared.description = Some(description.into());
    }
}
