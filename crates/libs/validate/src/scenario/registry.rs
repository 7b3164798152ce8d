//! Action type registry
//!
//! Action types map a script keyword to an executor plus the parameter schema
//! used to validate script lines at load time. The process-wide registry holds
//! the built-in types and accepts application-defined ones at startup.

use super::action::{Action, ActionResult};
use super::context::ActionContext;
use crate::{Error, Result};
use bitflags::bitflags;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::{Arc, OnceLock, RwLock};

/// Executor invoked when an action fires
pub type ActionExecutor =
    Arc<dyn Fn(&mut ActionContext<'_>, &Action) -> Result<ActionResult> + Send + Sync>;

bitflags! {
    /// Action type behaviour flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ActionTypeFlags: u32 {
        /// Runs when the scenario starts instead of at a playback time
        const CONFIG = 1 << 0;
        /// May complete asynchronously; `Async` results from other types are errors
        const ASYNC = 1 << 1;
    }
}

/// Schema entry for one action parameter
#[derive(Debug, Clone, PartialEq)]
pub struct ActionParameter {
    pub name: String,
    pub description: String,
    pub mandatory: bool,
    /// Accepted value types, e.g. `double` or `string`
    pub types: String,
    pub possible_variables: Option<String>,
    pub default: Option<String>,
}

impl ActionParameter {
    pub fn mandatory(name: &str, types: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            mandatory: true,
            types: types.to_string(),
            possible_variables: None,
            default: None,
        }
    }

    pub fn optional(name: &str, types: &str, description: &str, default: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            mandatory: false,
            types: types.to_string(),
            possible_variables: None,
            default: default.map(str::to_string),
        }
    }

    pub fn possible_variables(mut self, variables: &str) -> Self {
        self.possible_variables = Some(variables.to_string());
        self
    }
}

/// A named kind of scenario action
#[derive(Clone)]
pub struct ActionType {
    pub name: String,
    pub implementer_namespace: String,
    pub description: String,
    pub parameters: Vec<ActionParameter>,
    pub flags: ActionTypeFlags,
    execute: ActionExecutor,
}

impl std::fmt::Debug for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionType")
            .field("name", &self.name)
            .field("implementer_namespace", &self.implementer_namespace)
            .field("flags", &self.flags)
            .field("parameters", &self.parameters.len())
            .finish()
    }
}

impl ActionType {
    /// Create an action type in the `core` namespace
    pub fn new<F>(name: &str, execute: F) -> Self
    where
        F: Fn(&mut ActionContext<'_>, &Action) -> Result<ActionResult> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            implementer_namespace: "core".to_string(),
            description: String::new(),
            parameters: Vec::new(),
            flags: ActionTypeFlags::empty(),
            execute: Arc::new(execute),
        }
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn namespace(mut self, namespace: &str) -> Self {
        self.implementer_namespace = namespace.to_string();
        self
    }

    pub fn parameter(mut self, parameter: ActionParameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn flags(mut self, flags: ActionTypeFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn is_config(&self) -> bool {
        self.flags.contains(ActionTypeFlags::CONFIG)
    }

    /// Whether the executor may return [`ActionResult::Async`]
    pub fn is_async(&self) -> bool {
        self.flags.contains(ActionTypeFlags::ASYNC)
    }

    /// Run the executor
    pub fn execute(&self, ctx: &mut ActionContext<'_>, action: &Action) -> Result<ActionResult> {
        (self.execute)(ctx, action)
    }

    /// Mandatory parameters absent from `parameters`
    pub fn missing_mandatory<'a>(&'a self, parameters: &Map<String, Value>) -> Vec<&'a str> {
        self.parameters
            .iter()
            .filter(|p| p.mandatory && !parameters.contains_key(&p.name))
            .map(|p| p.name.as_str())
            .collect()
    }

    /// Human-readable description with the parameter table
    pub fn describe(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Action type: {} (implemented in {}){}",
            self.name,
            self.implementer_namespace,
            if self.is_config() { " [config]" } else { "" }
        );
        if !self.description.is_empty() {
            let _ = writeln!(out, "\n  {}", self.description);
        }
        if self.parameters.is_empty() {
            return out;
        }

        let _ = writeln!(out, "\n  Parameters:");
        for p in &self.parameters {
            let _ = writeln!(out, "    {}:", p.name);
            let _ = writeln!(out, "      Mandatory: {}", p.mandatory);
            let _ = writeln!(out, "      Description: {}", p.description);
            let _ = writeln!(out, "      Possible types: {}", p.types);
            if let Some(variables) = &p.possible_variables {
                let _ = writeln!(out, "      Possible variables: {}", variables);
            }
            if let Some(default) = &p.default {
                let _ = writeln!(out, "      Default: {}", default);
            }
        }
        out
    }
}

/// Registry of action types keyed by name
#[derive(Debug, Default)]
pub struct ActionTypeRegistry {
    types: RwLock<HashMap<String, Arc<ActionType>>>,
}

impl ActionTypeRegistry {
    /// Create empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action type; names must be unique
    pub fn register(&self, action_type: ActionType) -> Result<()> {
        let mut types = self
            .types
            .write()
            .map_err(|e| Error::ConfigError(format!("Action registry lock poisoned: {}", e)))?;
        if types.contains_key(&action_type.name) {
            return Err(Error::ConfigError(format!(
                "Action type '{}' is already registered",
                action_type.name
            )));
        }
        tracing::debug!(
            "Registered action type {} ({})",
            action_type.name,
            action_type.implementer_namespace
        );
        types.insert(action_type.name.clone(), Arc::new(action_type));
        Ok(())
    }

    /// Get action type by name
    pub fn get(&self, name: &str) -> Option<Arc<ActionType>> {
        self.types.read().ok()?.get(name).cloned()
    }

    /// Sorted names of every registered type
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = match self.types.read() {
            Ok(types) => types.keys().cloned().collect(),
            Err(_) => Vec::new(),
        };
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.types.read().map(|t| t.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Create registry with all built-in action types
pub fn create_builtin_action_registry() -> ActionTypeRegistry {
    let registry = ActionTypeRegistry::new();
    for action_type in super::builtin::builtin_action_types() {
        if let Err(e) = registry.register(action_type) {
            tracing::error!("Failed to register built-in action type: {}", e);
        }
    }
    registry
}

static GLOBAL_REGISTRY: OnceLock<Arc<ActionTypeRegistry>> = OnceLock::new();

/// The process-wide registry, holding the built-in types
pub fn global_action_registry() -> Arc<ActionTypeRegistry> {
    Arc::clone(GLOBAL_REGISTRY.get_or_init(|| Arc::new(create_builtin_action_registry())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn noop() -> ActionType {
        ActionType::new("noop", |_, _| Ok(ActionResult::Ok))
            .description("Does nothing")
            .namespace("tests")
            .parameter(ActionParameter::mandatory("target", "string", "What to ignore"))
            .parameter(
                ActionParameter::optional("level", "int", "How hard", Some("1"))
                    .possible_variables("1, 2, 3"),
            )
    }

    #[test]
    fn test_register_and_get() {
        let registry = ActionTypeRegistry::new();
        registry.register(noop()).unwrap();

        let ty = registry.get("noop").unwrap();
        assert_eq!(ty.implementer_namespace, "tests");
        assert!(!ty.is_config());
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.names(), vec!["noop"]);
    }

    #[test]
    fn test_duplicate_rejected() {
        let registry = ActionTypeRegistry::new();
        registry.register(noop()).unwrap();
        assert!(matches!(registry.register(noop()), Err(Error::ConfigError(_))));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_missing_mandatory() {
        let ty = noop();
        let with = json!({"target": "x"}).as_object().cloned().unwrap();
        assert!(ty.missing_mandatory(&with).is_empty());
        assert_eq!(ty.missing_mandatory(&Map::new()), vec!["target"]);
    }

    #[test]
    fn test_describe() {
        let text = noop().describe();
        assert!(text.starts_with("Action type: noop (implemented in tests)\n"));
        assert!(text.contains("Does nothing"));
        assert!(text.contains("    target:\n      Mandatory: true"));
        assert!(text.contains("Possible variables: 1, 2, 3"));
        assert!(text.contains("Default: 1"));
    }

    #[test]
    fn test_builtin_registry() {
        let registry = global_action_registry();
        for name in ["seek", "pause", "play", "eos", "stop", "set-seek-tolerance", "description"] {
            assert!(registry.get(name).is_some(), "missing built-in {}", name);
        }
        assert!(registry.get("description").unwrap().is_config());
        assert!(!registry.get("seek").unwrap().is_config());
    }
}
