//! Scenario engine: position-triggered action dispatch
//!
//! The engine owns a loaded [`Scenario`] and drives a [`Pipeline`] through it.
//! Config actions run as soon as the engine is built. Time-triggered actions
//! wait until the pipeline reports readiness (its first async-done), after
//! which every poll tick compares the playback position with the trigger of
//! the next pending action and fires at most one action.
//!
//! The synchronous entry points ([`ScenarioEngine::handle_event`],
//! [`ScenarioEngine::on_tick`], [`ScenarioEngine::run_due_deferred`]) hold all
//! of the logic; [`ScenarioEngine::run`] only multiplexes them on one task.

use super::action::{Action, ActionResult, ActionState};
use super::context::{ActionContext, DeferredOp, EngineShared};
use super::pipeline::{Pipeline, PipelineState, ScenarioEvent};
use super::registry::ActionTypeRegistry;
use super::Scenario;
use crate::issue::ids;
use crate::reporter::Reporter;
use crate::runner::Runner;
use crate::time::{format_clock_time, format_optional_clock_time};
use crate::Error;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};

/// Reporter category used by scenario engines
pub const SCENARIO_CATEGORY: &str = "scenario";

/// Engine timings
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioConfig {
    /// How often the playback position is checked
    pub poll_interval: Duration,
    /// Accepted distance between a seek target and the landing position
    pub seek_tolerance: Duration,
    /// Bound on asynchronous completion, `None` waits forever
    pub async_timeout: Option<Duration>,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
            seek_tolerance: Duration::from_millis(100),
            async_timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// Engine lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioState {
    /// Waiting for the pipeline to become ready
    Loading,
    /// Polling the position for the next trigger
    Running,
    /// An asynchronous action has not completed yet
    AwaitingCompletion,
    /// Every action has been dispatched
    Draining,
    /// The pipeline ended or was interrupted
    Done,
}

/// Whether the engine keeps running after an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineFlow {
    Continue,
    Finished,
}

/// Result of a scenario run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioOutcome {
    pub scenario: String,
    /// Actions that completed successfully
    pub executed: usize,
    /// Actions whose failure was reported
    pub failed: usize,
    /// Actions that never ran or never completed
    pub pending: usize,
    pub interrupted: bool,
}

impl ScenarioOutcome {
    /// Every action ran and none failed
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.pending == 0 && !self.interrupted
    }
}

struct PendingAction {
    action: Action,
    since: Instant,
}

/// Drives a pipeline through a scenario
pub struct ScenarioEngine {
    name: String,
    pipeline: Arc<dyn Pipeline>,
    reporter: Reporter,
    registry: Arc<ActionTypeRegistry>,
    config: ScenarioConfig,

    actions: VecDeque<Action>,
    pending: Option<PendingAction>,
    finished: Vec<Action>,
    shared: EngineShared,

    state: ScenarioState,
    not_ended_reported: bool,
    interrupted: bool,
}

impl ScenarioEngine {
    /// Build an engine and run the scenario's config actions
    pub fn new(
        scenario: Scenario,
        pipeline: Arc<dyn Pipeline>,
        runner: &Arc<Runner>,
        registry: Arc<ActionTypeRegistry>,
        config: ScenarioConfig,
    ) -> Self {
        let Scenario {
            name,
            actions,
            config_actions,
        } = scenario;

        tracing::info!(
            "Running scenario {} on pipeline {} ({} actions)",
            name,
            pipeline.name(),
            actions.len()
        );

        let mut engine = Self {
            reporter: Reporter::with_category(name.clone(), SCENARIO_CATEGORY, runner),
            shared: EngineShared::new(config.seek_tolerance),
            name,
            pipeline,
            registry,
            config,
            actions: actions.into(),
            pending: None,
            finished: Vec::new(),
            state: ScenarioState::Loading,
            not_ended_reported: false,
            interrupted: false,
        };

        for action in config_actions {
            engine.dispatch(action);
        }
        engine
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ScenarioState {
        self.state
    }

    /// The scenario's reporter
    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    /// Actions still queued, plus the one awaiting completion
    pub fn pending_actions(&self) -> usize {
        self.actions.len() + usize::from(self.pending.is_some())
    }

    /// Actions that ran, in completion order
    pub fn finished_actions(&self) -> &[Action] {
        &self.finished
    }

    /// Position the last seek is expected to land on
    pub fn expected_seek_position(&self) -> Option<Duration> {
        self.shared.seeked_position
    }

    pub fn seek_tolerance(&self) -> Duration {
        self.shared.seek_tolerance
    }

    /// Summary set by a `description` action
    pub fn description(&self) -> Option<&str> {
        self.shared.description.as_deref()
    }

    fn report(&self, issue_id: &str, message: String) {
        if let Err(e) = self.reporter.report(issue_id, message) {
            tracing::error!("{}: could not raise report: {}", self.name, e);
        }
    }

    fn refresh_state(&mut self) {
        if self.state == ScenarioState::Done || self.state == ScenarioState::Loading {
            return;
        }
        self.state = if self.pending.is_some() {
            ScenarioState::AwaitingCompletion
        } else if self.actions.is_empty() {
            ScenarioState::Draining
        } else {
            ScenarioState::Running
        };
    }

    fn finish_action(&mut self, mut action: Action, state: ActionState) {
        action.state = state;
        self.finished.push(action);
    }

    fn dispatch(&mut self, mut action: Action) {
        let Some(action_type) = self.registry.get(&action.action_type) else {
            self.report(
                ids::SCENARIO_ACTION_EXECUTION_ISSUE.as_str(),
                format!("Unknown action type '{}': {}", action.action_type, action.describe()),
            );
            self.finish_action(action, ActionState::ErrorReported);
            return;
        };

        tracing::info!("Executing action: {}", action.describe());

        let result = {
            let mut ctx = ActionContext::new(&*self.pipeline, &self.reporter, &mut self.shared);
            action_type.execute(&mut ctx, &action)
        };
        let result = match result {
            Ok(ActionResult::Async) if !action_type.is_async() => Err(Error::action(
                &action.action_type,
                "returned an asynchronous result but is not declared asynchronous",
            )),
            other => other,
        };

        match result {
            Ok(ActionResult::Async) if !action_type.is_config() => {
                action.state = ActionResult::Async.into();
                self.pending = Some(PendingAction {
                    action,
                    since: Instant::now(),
                });
            }
            // Config actions never hold the queue
            Ok(ActionResult::Async) => self.finish_action(action, ActionState::Ok),
            Ok(result) => self.finish_action(action, result.into()),
            Err(e) => {
                self.report(
                    ids::SCENARIO_ACTION_EXECUTION_ERROR.as_str(),
                    format!("Could not execute {}: {}", action.describe(), e),
                );
                self.finish_action(action, ActionState::ErrorReported);
            }
        }
        self.refresh_state();
    }

    /// Process one pipeline notification
    pub fn handle_event(&mut self, event: ScenarioEvent) -> EngineFlow {
        if self.state == ScenarioState::Done {
            return EngineFlow::Finished;
        }

        match event {
            ScenarioEvent::AsyncDone => {
                self.on_async_done();
                EngineFlow::Continue
            }
            ScenarioEvent::Eos => {
                self.end("end of stream");
                EngineFlow::Finished
            }
            ScenarioEvent::Error(message) => {
                tracing::warn!("{}: pipeline error: {}", self.name, message);
                self.end(&format!("pipeline error: {}", message));
                EngineFlow::Finished
            }
            ScenarioEvent::Interrupt => {
                tracing::info!("{}: interrupted, stopping pipeline", self.name);
                if let Err(e) = self.pipeline.set_state(PipelineState::Null) {
                    tracing::warn!("{}: failed to stop pipeline: {}", self.name, e);
                }
                self.interrupted = true;
                self.end("interrupted");
                EngineFlow::Finished
            }
        }
    }

    fn on_async_done(&mut self) {
        self.verify_seek_position();

        if let Some(pending) = self.pending.take() {
            tracing::debug!("Action done: {}", pending.action.describe());
            self.finish_action(pending.action, ActionState::Ok);
        }

        if self.state == ScenarioState::Loading {
            tracing::info!("{}: pipeline ready, starting actions", self.name);
            self.state = ScenarioState::Running;
        }
        self.refresh_state();
        self.on_tick();
    }

    fn verify_seek_position(&mut self) {
        let Some(expected) = self.shared.seeked_position.take() else {
            return;
        };
        let Some(position) = self.pipeline.position() else {
            tracing::warn!("{}: position unavailable after seek", self.name);
            return;
        };

        let tolerance = self.shared.seek_tolerance;
        let low = expected.saturating_sub(tolerance);
        let high = expected + tolerance;
        if position < low || position > high {
            self.report(
                ids::EVENT_SEEK_RESULT_POSITION_WRONG.as_str(),
                format!(
                    "Seeked position {} not in the expected range [{} -- {}]",
                    format_clock_time(position),
                    format_clock_time(low),
                    format_clock_time(high)
                ),
            );
        }
    }

    /// One poll: fire the head action if its trigger has been crossed
    pub fn on_tick(&mut self) {
        match self.state {
            ScenarioState::Loading | ScenarioState::Done => return,
            _ => {}
        }

        if let Some(pending) = &self.pending {
            let expired = self
                .config
                .async_timeout
                .filter(|timeout| pending.since.elapsed() >= *timeout);
            match expired {
                Some(timeout) => self.expire_pending(timeout),
                None => tracing::trace!("Waiting for {} to complete", pending.action.describe()),
            }
            return;
        }

        let Some(head_trigger) = self.actions.front().map(|a| a.playback_time) else {
            if self.state != ScenarioState::Draining {
                tracing::info!("{}: no more actions to execute", self.name);
            }
            self.refresh_state();
            return;
        };

        let Some(position) = self.pipeline.position() else {
            tracing::trace!("Could not query position");
            return;
        };

        if let Some(duration) = self.pipeline.duration() {
            if position > duration {
                self.report(
                    ids::QUERY_POSITION_SUPERIOR_DURATION.as_str(),
                    format!(
                        "Reported position {} > reported duration {}",
                        format_clock_time(position),
                        format_clock_time(duration)
                    ),
                );
                return;
            }
        }

        let trigger = head_trigger.unwrap_or(Duration::ZERO);
        let rate = self.pipeline.rate();
        tracing::trace!(
            "Position {} / trigger {} (rate {})",
            format_clock_time(position),
            format_optional_clock_time(head_trigger),
            rate
        );

        if (rate > 0.0 && position >= trigger) || (rate < 0.0 && position <= trigger) {
            if let Some(action) = self.actions.pop_front() {
                self.dispatch(action);
            }
        }
    }

    fn expire_pending(&mut self, timeout: Duration) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        self.shared.seeked_position = None;
        self.report(
            ids::SCENARIO_ACTION_EXECUTION_ERROR.as_str(),
            format!(
                "{} did not complete within {}",
                pending.action.describe(),
                format_clock_time(timeout)
            ),
        );
        self.finish_action(pending.action, ActionState::ErrorReported);
        self.refresh_state();
    }

    fn end(&mut self, reason: &str) {
        let pending = self.pending_actions();
        if pending > 0 && !self.not_ended_reported {
            let next = self
                .pending
                .as_ref()
                .map(|p| &p.action)
                .or_else(|| self.actions.front())
                .map(Action::describe)
                .unwrap_or_default();
            self.report(
                ids::SCENARIO_NOT_ENDED.as_str(),
                format!(
                    "{} actions were not executed before the pipeline stopped ({}), next was {}",
                    pending, reason, next
                ),
            );
            self.not_ended_reported = true;
        }
        tracing::info!("{}: scenario done ({})", self.name, reason);
        self.state = ScenarioState::Done;
    }

    /// Earliest due deferred operation
    pub fn next_deferred_due(&self) -> Option<Instant> {
        self.shared.deferred.iter().map(|d| d.due).min()
    }

    /// Run deferred operations due at `now`
    pub fn run_due_deferred(&mut self, now: Instant) {
        let (due, later): (Vec<_>, Vec<_>) = std::mem::take(&mut self.shared.deferred)
            .into_iter()
            .partition(|d| d.due <= now);
        self.shared.deferred = later;

        for deferred in due {
            match deferred.op {
                DeferredOp::SetState(state) => {
                    tracing::info!("{}: deferred switch to {}", self.name, state);
                    if let Err(e) = self.pipeline.set_state(state) {
                        self.report(
                            ids::STATE_CHANGE_FAILURE.as_str(),
                            format!("Failed to set state to {}: {}", state, e),
                        );
                    }
                }
            }
        }
    }

    fn polling(&self) -> bool {
        matches!(
            self.state,
            ScenarioState::Running | ScenarioState::AwaitingCompletion
        )
    }

    /// Outcome so far
    pub fn outcome(&self) -> ScenarioOutcome {
        let failed = self
            .finished
            .iter()
            .filter(|a| a.state == ActionState::ErrorReported)
            .count();
        ScenarioOutcome {
            scenario: self.name.clone(),
            executed: self.finished.len() - failed,
            failed,
            pending: self.pending_actions(),
            interrupted: self.interrupted,
        }
    }

    /// Run until the pipeline ends, errors out or is interrupted
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<ScenarioEvent>) -> ScenarioOutcome {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let next_deferred = self.next_deferred_due();
            let deferred_deadline =
                next_deferred.unwrap_or_else(|| Instant::now() + Duration::from_secs(3600));

            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => {
                        if self.handle_event(event) == EngineFlow::Finished {
                            break;
                        }
                    }
                    None => {
                        tracing::debug!("{}: event channel closed", self.name);
                        self.end("event channel closed");
                        break;
                    }
                },
                _ = ticker.tick(), if self.polling() => self.on_tick(),
                _ = tokio::time::sleep_until(deferred_deadline), if next_deferred.is_some() => {
                    self.run_due_deferred(Instant::now());
                }
            }
        }

        self.outcome()
    }
}

/// Forward Ctrl-C to the engine as [`ScenarioEvent::Interrupt`]
pub fn spawn_interrupt_forwarder(
    events: mpsc::UnboundedSender<ScenarioEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Interrupt received, stopping scenario");
                let _ = events.send(ScenarioEvent::Interrupt);
            }
            Err(e) => tracing::warn!("Cannot listen for interrupts: {}", e),
        }
    })
}
