//! Scenario actions

use crate::time::{format_optional_clock_time, seconds_to_duration};
use serde_json::{Map, Value};
use std::time::Duration;

/// Label used when a script line does not name its action
pub const UNNAMED_ACTION: &str = "(no name)";

/// What an executor reports back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionResult {
    /// Done
    Ok,
    /// Completion is signalled by the next async-done
    Async,
    /// The failure was already reported
    ErrorReported,
}

/// Lifecycle of an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActionState {
    #[default]
    Pending,
    Ok,
    Async,
    ErrorReported,
}

impl From<ActionResult> for ActionState {
    fn from(result: ActionResult) -> Self {
        match result {
            ActionResult::Ok => ActionState::Ok,
            ActionResult::Async => ActionState::Async,
            ActionResult::ErrorReported => ActionState::ErrorReported,
        }
    }
}

/// One step of a scenario
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub action_type: String,
    pub name: String,
    pub parameters: Map<String, Value>,
    /// Position at which the action fires; `None` for config actions
    pub playback_time: Option<Duration>,
    pub sequence_number: u32,
    pub state: ActionState,
}

impl Action {
    pub fn new(action_type: impl Into<String>, parameters: Map<String, Value>) -> Self {
        let name = parameters
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(UNNAMED_ACTION)
            .to_string();
        Self {
            action_type: action_type.into(),
            name,
            parameters,
            playback_time: None,
            sequence_number: 0,
            state: ActionState::Pending,
        }
    }

    pub fn with_playback_time(mut self, playback_time: Duration) -> Self {
        self.playback_time = Some(playback_time);
        self
    }

    pub fn has_parameter(&self, key: &str) -> bool {
        self.parameters.contains_key(key)
    }

    /// Numeric parameter, integers included
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.parameters.get(key).and_then(Value::as_f64)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(Value::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.parameters.get(key).and_then(Value::as_bool)
    }

    /// Parameter in seconds converted to a position
    pub fn get_seconds(&self, key: &str) -> Option<Duration> {
        self.get_f64(key).and_then(seconds_to_duration)
    }

    /// `name (type, num N) at H:MM:SS`
    pub fn describe(&self) -> String {
        format!(
            "{} ({}, num {}) at {}",
            self.name,
            self.action_type,
            self.sequence_number,
            format_optional_clock_time(self.playback_time)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_parameter_access() {
        let action = Action::new(
            "seek",
            params(json!({"name": "jump", "start": 5, "rate": -1.5, "flags": "flush", "x": true})),
        );
        assert_eq!(action.name, "jump");
        assert_eq!(action.get_f64("start"), Some(5.0));
        assert_eq!(action.get_seconds("start"), Some(Duration::from_secs(5)));
        assert_eq!(action.get_seconds("rate"), None);
        assert_eq!(action.get_str("flags"), Some("flush"));
        assert_eq!(action.get_bool("x"), Some(true));
        assert!(!action.has_parameter("stop"));
        assert_eq!(action.state, ActionState::Pending);
    }

    #[test]
    fn test_default_name_and_description() {
        let action = Action::new("eos", Map::new()).with_playback_time(Duration::from_secs(3));
        assert_eq!(action.name, UNNAMED_ACTION);
        assert_eq!(action.describe(), "(no name) (eos, num 0) at 0:00:03.000000000");
    }
}
