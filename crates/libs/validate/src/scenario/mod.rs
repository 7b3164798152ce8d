//! Scenarios: scripted, position-triggered pipeline control
//!
//! A scenario is a `.scenario` text file with one action per line. Lines are
//! validated against the [`ActionTypeRegistry`] when loaded; the resulting
//! actions are ordered by trigger position and handed to a
//! [`ScenarioEngine`].

pub mod action;
pub mod builtin;
pub mod context;
pub mod engine;
pub mod parser;
pub mod pipeline;
pub mod registry;

pub use action::{Action, ActionResult, ActionState, UNNAMED_ACTION};
pub use context::{ActionContext, DeferredOp, DeferredOperation};
pub use engine::{
    spawn_interrupt_forwarder, EngineFlow, ScenarioConfig, ScenarioEngine, ScenarioOutcome,
    ScenarioState,
};
pub use pipeline::{
    Pipeline, PipelineError, PipelineState, ScenarioEvent, SeekFlags, SeekFormat, SeekRequest,
    SeekType,
};
pub use registry::{
    create_builtin_action_registry, global_action_registry, ActionExecutor, ActionParameter,
    ActionType, ActionTypeFlags, ActionTypeRegistry,
};

use crate::time::seconds_to_duration;
use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// File extension of scenario scripts
pub const SCENARIO_EXTENSION: &str = "scenario";

/// Subdirectory of the data directories holding scenarios
pub const SCENARIO_DIR: &str = "remotemedia/validate-scenario";

/// A loaded scenario
#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: String,
    /// Time-triggered actions, ordered by trigger position
    pub actions: Vec<Action>,
    /// Actions run once when the engine starts
    pub config_actions: Vec<Action>,
}

impl Scenario {
    /// Parse a scenario script.
    ///
    /// Lines that cannot be used are skipped with a warning; a script without
    /// a single usable line is an error.
    pub fn from_str(name: &str, content: &str, registry: &ActionTypeRegistry) -> Result<Self> {
        let mut actions = Vec::new();
        let mut config_actions = Vec::new();
        let mut sequence_number = 0u32;

        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let structure = match parser::parse_structure(line) {
                Ok(structure) => structure,
                Err(e) => {
                    tracing::warn!("{}:{}: could not parse action '{}': {}", name, line_no + 1, line, e);
                    continue;
                }
            };

            let action_type = registry.get(&structure.name);
            match &action_type {
                Some(action_type) => {
                    let missing = action_type.missing_mandatory(&structure.fields);
                    if !missing.is_empty() {
                        tracing::warn!(
                            "{}:{}: action '{}' is missing mandatory parameters: {}",
                            name,
                            line_no + 1,
                            structure.name,
                            missing.join(", ")
                        );
                        continue;
                    }
                }
                None => tracing::warn!(
                    "{}:{}: we do not handle action type '{}'",
                    name,
                    line_no + 1,
                    structure.name
                ),
            }

            let is_config = action_type.as_ref().is_some_and(|t| t.is_config());
            let playback_time = match structure.fields.get("playback_time") {
                Some(value) => match value.as_f64().and_then(seconds_to_duration) {
                    Some(time) => Some(time),
                    None => {
                        tracing::warn!(
                            "{}:{}: invalid playback_time {} for '{}'",
                            name,
                            line_no + 1,
                            value,
                            structure.name
                        );
                        continue;
                    }
                },
                None => None,
            };

            let mut action = Action::new(structure.name, structure.fields);
            action.sequence_number = sequence_number;
            sequence_number += 1;

            if is_config {
                config_actions.push(action);
                continue;
            }

            match playback_time {
                Some(time) => actions.push(action.with_playback_time(time)),
                None => tracing::warn!(
                    "{}:{}: no playback time for action '{}', skipping",
                    name,
                    line_no + 1,
                    line
                ),
            }
        }

        if actions.is_empty() && config_actions.is_empty() {
            return Err(Error::ScenarioLoad(format!(
                "scenario '{}' contains no usable action",
                name
            )));
        }

        actions.sort_by_key(|a| a.playback_time);

        Ok(Self {
            name: name.to_string(),
            actions,
            config_actions,
        })
    }

    /// Load a scenario file; the scenario is named after the file stem
    pub fn from_file(path: impl AsRef<Path>, registry: &ActionTypeRegistry) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::ScenarioLoad(format!("cannot read {}: {}", path.display(), e))
        })?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("scenario");
        Self::from_str(name, &content, registry)
    }

    /// Find `<name>.scenario` in `search_paths` (first match wins) and load it
    pub fn load(name: &str, search_paths: &[PathBuf], registry: &ActionTypeRegistry) -> Result<Self> {
        let file_name = format!("{}.{}", name, SCENARIO_EXTENSION);
        let path = search_paths
            .iter()
            .map(|dir| dir.join(&file_name))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| {
                Error::ScenarioLoad(format!(
                    "could not find scenario '{}' in {:?}",
                    name, search_paths
                ))
            })?;
        tracing::debug!("Loading scenario {} from {}", name, path.display());
        Self::from_file(path, registry)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of time-triggered actions
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Scenario search path: the user data directory, `extra` directories, then `data/`
pub fn scenario_search_paths(extra: &[PathBuf]) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(data_dir) = dirs::data_dir() {
        paths.push(data_dir.join(SCENARIO_DIR));
    }
    paths.extend(extra.iter().cloned());
    paths.push(PathBuf::from("data"));
    paths
}

/// Names of the scenarios available in `dirs`, sorted and deduplicated
pub fn list_scenarios(dirs: &[PathBuf]) -> Vec<String> {
    let mut names: Vec<String> = dirs
        .iter()
        .filter_map(|dir| std::fs::read_dir(dir).ok())
        .flatten()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == SCENARIO_EXTENSION))
        .filter_map(|path| path.file_stem().and_then(|s| s.to_str()).map(str::to_string))
        .collect();
    names.sort();
    names.dedup();
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const SCRIPT: &str = r#"
# seek forward and stop
description, summary="basic seek"
eos, playback_time=3.0
play, name=Start, playback_time=0.0
seek, name=Jump, playback_time=2.0, start=5.0
pause, name=Hold, playback_time=1.0, duration=0.5
"#;

    #[test]
    fn test_load_sorts_by_trigger() {
        let registry = global_action_registry();
        let scenario = Scenario::from_str("basic", SCRIPT, &registry).unwrap();

        let types: Vec<&str> = scenario.actions.iter().map(|a| a.action_type.as_str()).collect();
        assert_eq!(types, vec!["play", "pause", "seek", "eos"]);
        assert_eq!(scenario.config_actions.len(), 1);
        assert_eq!(scenario.actions[0].name, "Start");
        assert_eq!(scenario.actions[3].name, UNNAMED_ACTION);
        assert_eq!(scenario.actions[2].playback_time, Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_invalid_lines_skipped() {
        let registry = global_action_registry();
        let script = "\
seek, playback_time=1.0
play
pause, playback_time=-2
play, playback_time=\"broken
eos, playback_time=4.0
";
        let scenario = Scenario::from_str("lossy", script, &registry).unwrap();
        assert_eq!(scenario.len(), 1);
        assert_eq!(scenario.actions[0].action_type, "eos");
    }

    #[test]
    fn test_out_of_range_trigger_skipped() {
        let registry = global_action_registry();
        let scenario = Scenario::from_str(
            "huge",
            "play, playback_time=1e30\neos, playback_time=1.0\n",
            &registry,
        )
        .unwrap();
        assert_eq!(scenario.len(), 1);
        assert_eq!(scenario.actions[0].action_type, "eos");
    }

    #[test]
    fn test_unknown_types_kept() {
        let registry = global_action_registry();
        let scenario =
            Scenario::from_str("custom", "teleport, playback_time=1.0", &registry).unwrap();
        assert_eq!(scenario.actions[0].action_type, "teleport");
    }

    #[test]
    fn test_empty_scenario_rejected() {
        let registry = global_action_registry();
        assert!(matches!(
            Scenario::from_str("empty", "# nothing\n\n", &registry),
            Err(Error::ScenarioLoad(_))
        ));
    }

    #[test]
    fn test_load_from_search_path_and_list() {
        let registry = global_action_registry();
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        std::fs::write(second.path().join("seek_forward.scenario"), SCRIPT).unwrap();
        std::fs::write(first.path().join("play_only.scenario"), "play, playback_time=0").unwrap();
        std::fs::write(first.path().join("notes.txt"), "not a scenario").unwrap();

        let dirs = vec![first.path().to_path_buf(), second.path().to_path_buf()];
        let scenario = Scenario::load("seek_forward", &dirs, &registry).unwrap();
        assert_eq!(scenario.name(), "seek_forward");
        assert_eq!(scenario.len(), 4);

        assert_eq!(list_scenarios(&dirs), vec!["play_only", "seek_forward"]);
        assert!(Scenario::load("missing", &dirs, &registry).is_err());
    }

    #[test]
    fn test_search_paths_end_with_data() {
        let extra = vec![PathBuf::from("/opt/scenarios")];
        let paths = scenario_search_paths(&extra);
        assert!(paths.contains(&extra[0]));
        assert_eq!(paths.last(), Some(&PathBuf::from("data")));
    }
}
