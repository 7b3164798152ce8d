//! Validation configuration
//!
//! [`ValidateConfig`] can be deserialized from TOML or assembled from the
//! `REMOTEMEDIA_VALIDATE*` environment variables. It is turned into the
//! runner's [`DebugFlags`] and [`ReportingDetails`], the output sinks and the
//! scenario engine timings.

use crate::issue::{IssueId, Severity};
use crate::report::ReportingLevel;
use crate::scenario::ScenarioConfig;
use crate::{Error, Result};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Debug flags (`fatal_*`, `print_*`)
pub const ENV_FLAGS: &str = "REMOTEMEDIA_VALIDATE";
/// Reporting-level configuration string
pub const ENV_REPORTING_DETAILS: &str = "REMOTEMEDIA_VALIDATE_REPORTING_DETAILS";
/// `::`-separated output list
pub const ENV_OUTPUTS: &str = "REMOTEMEDIA_VALIDATE_FILE";
/// Extra scenario directories, separated like `PATH`
pub const ENV_SCENARIOS_PATH: &str = "REMOTEMEDIA_VALIDATE_SCENARIOS_PATH";

bitflags! {
    /// Runner print and abort policy
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DebugFlags: u32 {
        const FATAL_CRITICALS = 1 << 0;
        const FATAL_WARNINGS = 1 << 1;
        const FATAL_ISSUES = 1 << 2;
        const PRINT_ISSUES = 1 << 3;
        const PRINT_WARNINGS = 1 << 4;
        const PRINT_CRITICALS = 1 << 5;

        const FATAL_MASK = Self::FATAL_CRITICALS.bits()
            | Self::FATAL_WARNINGS.bits()
            | Self::FATAL_ISSUES.bits();
        const PRINT_MASK = Self::PRINT_ISSUES.bits()
            | Self::PRINT_WARNINGS.bits()
            | Self::PRINT_CRITICALS.bits();
    }
}

impl DebugFlags {
    fn from_flag_name(name: &str) -> Option<Self> {
        let flag = match name {
            "fatal_criticals" => DebugFlags::FATAL_CRITICALS,
            "fatal_warnings" => DebugFlags::FATAL_WARNINGS,
            "fatal_issues" => DebugFlags::FATAL_ISSUES,
            "print_issues" => DebugFlags::PRINT_ISSUES,
            "print_warnings" => DebugFlags::PRINT_WARNINGS,
            "print_criticals" => DebugFlags::PRINT_CRITICALS,
            "all" => DebugFlags::all(),
            _ => return None,
        };
        Some(flag)
    }

    /// Parse a `,`, `:` or `;` separated flag list. Unknown names are skipped.
    pub fn parse(spec: &str) -> Self {
        spec.split([',', ':', ';'])
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .fold(DebugFlags::empty(), |flags, name| {
                match DebugFlags::from_flag_name(&name.to_ascii_lowercase()) {
                    Some(flag) => flags | flag,
                    None => {
                        tracing::warn!("Ignoring unknown validate flag '{}'", name);
                        flags
                    }
                }
            })
    }
}

/// One `key:level` entry of the reporting-details string
#[derive(Debug, Clone)]
struct LevelEntry {
    key: String,
    pattern: Option<glob::Pattern>,
    level: ReportingLevel,
}

impl LevelEntry {
    fn matches(&self, value: &str) -> bool {
        match &self.pattern {
            Some(pattern) => pattern.matches(value),
            None => self.key == value,
        }
    }
}

/// Parsed reporting-level configuration
///
/// Format: a comma-separated list where a bare level sets the default and
/// `key:level` entries set the level for reporters whose name (or, failing
/// that, category) equals `key`. Keys containing `*`, `?` or `[` are glob
/// patterns. Resolution order is exact name, name pattern, category, default.
#[derive(Debug, Clone)]
pub struct ReportingDetails {
    default_level: ReportingLevel,
    entries: Vec<LevelEntry>,
}

impl Default for ReportingDetails {
    fn default() -> Self {
        Self {
            default_level: ReportingLevel::Synthetic,
            entries: Vec::new(),
        }
    }
}

impl ReportingDetails {
    /// Parse a reporting-details string such as `synthetic,h264parse:all,*sink*:monitor`
    pub fn parse(spec: &str) -> Result<Self> {
        let mut details = Self::default();

        for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            match entry.rsplit_once(':') {
                None => {
                    details.default_level = parse_level(entry)?;
                }
                Some((key, level)) => {
                    let key = key.trim();
                    if key.is_empty() {
                        return Err(Error::ConfigError(format!(
                            "Missing reporter name in reporting details entry '{}'",
                            entry
                        )));
                    }
                    let pattern = if key.contains(['*', '?', '[']) {
                        Some(glob::Pattern::new(key).map_err(|e| {
                            Error::ConfigError(format!("Invalid reporter pattern '{}': {}", key, e))
                        })?)
                    } else {
                        None
                    };
                    details.entries.push(LevelEntry {
                        key: key.to_string(),
                        pattern,
                        level: parse_level(level)?,
                    });
                }
            }
        }

        Ok(details)
    }

    pub fn default_level(&self) -> ReportingLevel {
        self.default_level
    }

    /// Explicitly configured level for a reporter, `Unknown` when nothing matches
    pub fn level_for(&self, name: &str, category: Option<&str>) -> ReportingLevel {
        let exact = self
            .entries
            .iter()
            .find(|e| e.pattern.is_none() && e.key == name);
        let pattern = || {
            self.entries
                .iter()
                .find(|e| e.pattern.is_some() && e.matches(name))
        };
        let by_category = || category.and_then(|c| self.entries.iter().find(|e| e.matches(c)));

        exact
            .or_else(pattern)
            .or_else(by_category)
            .map(|e| e.level)
            .unwrap_or(ReportingLevel::Unknown)
    }

    /// Level a reporter ends up with: the explicit level or the default
    pub fn resolve(&self, name: &str, category: Option<&str>) -> ReportingLevel {
        match self.level_for(name, category) {
            ReportingLevel::Unknown => self.default_level,
            level => level,
        }
    }
}

fn parse_level(name: &str) -> Result<ReportingLevel> {
    ReportingLevel::from_name(name)
        .ok_or_else(|| Error::ConfigError(format!("Unknown reporting level '{}'", name.trim())))
}

/// Validation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateConfig {
    /// Debug flag names (`fatal_criticals`, `print_warnings`, ...)
    #[serde(default)]
    pub flags: Vec<String>,

    /// Reporting-level configuration string
    #[serde(default)]
    pub reporting_details: Option<String>,

    /// Output targets: `stdout`, `stderr` or a file path
    #[serde(default = "default_outputs")]
    pub outputs: Vec<String>,

    /// Scenario poll interval in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Accepted distance between a seek target and the landing position
    #[serde(default = "default_seek_tolerance_ms")]
    pub seek_tolerance_ms: u64,

    /// Bound on asynchronous action completion; `0` waits forever
    #[serde(default = "default_async_timeout_ms")]
    pub async_timeout_ms: u64,

    /// Severity overrides keyed by issue id
    #[serde(default)]
    pub severity_overrides: HashMap<String, Severity>,

    /// Additional directories searched for `<name>.scenario` files
    #[serde(default)]
    pub scenario_paths: Vec<PathBuf>,
}

fn default_outputs() -> Vec<String> {
    vec!["stdout".to_string()]
}

fn default_poll_interval_ms() -> u64 {
    50
}

fn default_seek_tolerance_ms() -> u64 {
    100
}

fn default_async_timeout_ms() -> u64 {
    30_000
}

impl Default for ValidateConfig {
    fn default() -> Self {
        Self {
            flags: Vec::new(),
            reporting_details: None,
            outputs: default_outputs(),
            poll_interval_ms: default_poll_interval_ms(),
            seek_tolerance_ms: default_seek_tolerance_ms(),
            async_timeout_ms: default_async_timeout_ms(),
            severity_overrides: HashMap::new(),
            scenario_paths: Vec::new(),
        }
    }
}

impl ValidateConfig {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Defaults overlaid with the process environment
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Overlay environment values obtained through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(flags) = lookup(ENV_FLAGS) {
            self.flags = flags
                .split(',')
                .map(|f| f.trim().to_string())
                .filter(|f| !f.is_empty())
                .collect();
        }
        if let Some(details) = lookup(ENV_REPORTING_DETAILS) {
            self.reporting_details = Some(details);
        }
        if let Some(outputs) = lookup(ENV_OUTPUTS) {
            self.outputs = outputs
                .split("::")
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }
        if let Some(paths) = lookup(ENV_SCENARIOS_PATH) {
            self.scenario_paths
                .extend(std::env::split_paths(&paths).filter(|p| !p.as_os_str().is_empty()));
        }
    }

    /// Check values that deserialization alone cannot
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(Error::ConfigError(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        for id in self.severity_overrides.keys() {
            if IssueId::new(id.as_str()).components().is_none() {
                return Err(Error::InvalidIssueId(id.clone()));
            }
        }
        self.reporting()?;
        Ok(())
    }

    pub fn debug_flags(&self) -> DebugFlags {
        DebugFlags::parse(&self.flags.join(","))
    }

    pub fn reporting(&self) -> Result<ReportingDetails> {
        match &self.reporting_details {
            Some(spec) => ReportingDetails::parse(spec),
            None => Ok(ReportingDetails::default()),
        }
    }

    /// Severity overrides keyed by typed issue id
    pub fn severity_overrides(&self) -> HashMap<IssueId, Severity> {
        self.severity_overrides
            .iter()
            .map(|(id, severity)| (IssueId::new(id.as_str()), *severity))
            .collect()
    }

    pub fn scenario_config(&self) -> ScenarioConfig {
        ScenarioConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            seek_tolerance: Duration::from_millis(self.seek_tolerance_ms),
            async_timeout: match self.async_timeout_ms {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            },
        }
    }
}
