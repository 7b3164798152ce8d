//! Issue catalog
//!
//! Every conformance violation the framework can report is described by an
//! [`Issue`]: a hierarchical `area::name` identifier, a one-line summary, an
//! optional longer description and a default [`Severity`].
//!
//! Issues live in an [`IssueCatalog`]. The process-wide catalog is built the
//! first time it is touched (built-in issues only) unless an application
//! installs its own catalog beforehand with [`install_catalog`]. After that
//! point the catalog is read-only and lookups need no locking.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::borrow::{Borrow, Cow};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// Report severity
///
/// Lower values are more severe: `Critical < Warning < Issue < Ignore < Unknown`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical = 0,
    Warning = 1,
    Issue = 2,
    Ignore = 3,
    #[default]
    Unknown = 4,
}

impl Severity {
    /// Canonical lowercase name, as printed in reports
    pub fn name(self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Warning => "warning",
            Severity::Issue => "issue",
            Severity::Ignore => "ignore",
            Severity::Unknown => "unknown",
        }
    }

    /// Parse a canonical name; anything unrecognised maps to `Unknown`
    pub fn from_name(name: &str) -> Self {
        match name {
            "critical" => Severity::Critical,
            "warning" => Severity::Warning,
            "issue" => Severity::Issue,
            "ignore" => Severity::Ignore,
            _ => Severity::Unknown,
        }
    }

    /// Map a raw numeric level; out-of-range values map to `Unknown`
    pub fn from_index(index: u32) -> Self {
        match index {
            0 => Severity::Critical,
            1 => Severity::Warning,
            2 => Severity::Issue,
            3 => Severity::Ignore,
            _ => Severity::Unknown,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Hierarchical issue identifier (`area::name`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IssueId(Cow<'static, str>);

impl IssueId {
    /// Identifier backed by a static string (usable in `const` items)
    pub const fn from_static(id: &'static str) -> Self {
        IssueId(Cow::Borrowed(id))
    }

    /// Identifier backed by an owned string
    pub fn new(id: impl Into<String>) -> Self {
        IssueId(Cow::Owned(id.into()))
    }

    /// The full `area::name` string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split into `(area, name)`, or `None` when the id is malformed
    pub fn components(&self) -> Option<(&str, &str)> {
        let (area, name) = self.0.split_once("::")?;
        if area.is_empty() || name.is_empty() || name.contains("::") {
            return None;
        }
        Some((area, name))
    }
}

impl Borrow<str> for IssueId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for IssueId {
    fn from(id: &'static str) -> Self {
        IssueId::from_static(id)
    }
}

impl From<String> for IssueId {
    fn from(id: String) -> Self {
        IssueId::new(id)
    }
}

impl std::fmt::Display for IssueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A known kind of conformance violation
#[derive(Debug, Clone, PartialEq)]
pub struct Issue {
    id: IssueId,
    area: String,
    name: String,
    summary: String,
    description: Option<String>,
    default_severity: Severity,
}

impl Issue {
    /// Create an issue, validating the identifier
    pub fn new(
        id: impl Into<IssueId>,
        summary: impl Into<String>,
        description: Option<&str>,
        default_severity: Severity,
    ) -> Result<Self> {
        let id = id.into();
        let (area, name) = id
            .components()
            .map(|(a, n)| (a.to_string(), n.to_string()))
            .ok_or_else(|| Error::InvalidIssueId(id.to_string()))?;

        Ok(Self {
            id,
            area,
            name,
            summary: summary.into(),
            description: description.map(str::to_string),
            default_severity,
        })
    }

    pub fn id(&self) -> &IssueId {
        &self.id
    }

    /// First identifier component (e.g. `event`)
    pub fn area(&self) -> &str {
        &self.area
    }

    /// Second identifier component (e.g. `seek-not-handled`)
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn default_severity(&self) -> Severity {
        self.default_severity
    }
}

/// Registry of issues keyed by id
#[derive(Debug, Default, Clone)]
pub struct IssueCatalog {
    issues: HashMap<IssueId, Arc<Issue>>,
}

impl IssueCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a catalog holding every built-in issue
    pub fn with_builtin_issues() -> Self {
        let mut catalog = Self::new();
        for (id, severity, summary, description) in BUILTIN_ISSUES {
            let issue = Issue::new(id.clone(), *summary, *description, *severity)
                .and_then(|issue| catalog.register(issue));
            if let Err(e) = issue {
                panic!("built-in issue table is inconsistent: {}", e);
            }
        }
        catalog
    }

    /// Register an issue; the id must not already be present
    pub fn register(&mut self, issue: Issue) -> Result<()> {
        if self.issues.contains_key(issue.id()) {
            return Err(Error::DuplicateIssue(issue.id().to_string()));
        }
        self.issues.insert(issue.id().clone(), Arc::new(issue));
        Ok(())
    }

    /// Change the default severity of a registered issue before the catalog is installed
    pub fn set_default_severity(&mut self, id: &str, severity: Severity) -> Result<()> {
        let issue = self
            .issues
            .get_mut(id)
            .ok_or_else(|| Error::UnknownIssue(id.to_string()))?;
        tracing::info!(
            "Setting issue {} default severity to {}",
            id,
            severity.name()
        );
        Arc::make_mut(issue).default_severity = severity;
        Ok(())
    }

    /// Look up an issue by id
    pub fn lookup(&self, id: &str) -> Option<Arc<Issue>> {
        self.issues.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Iterate over all registered issues (unordered)
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Issue>> {
        self.issues.values()
    }
}

static GLOBAL_CATALOG: OnceLock<IssueCatalog> = OnceLock::new();

/// The process-wide catalog, initialized with the built-in issues on first access
pub fn global_catalog() -> &'static IssueCatalog {
    GLOBAL_CATALOG.get_or_init(IssueCatalog::with_builtin_issues)
}

/// Install a custom process-wide catalog.
///
/// Must happen before anything reads the global catalog.
pub fn install_catalog(catalog: IssueCatalog) -> Result<()> {
    GLOBAL_CATALOG
        .set(catalog)
        .map_err(|_| Error::CatalogInitialized)
}

/// Look up an issue in the process-wide catalog
pub fn lookup_issue(id: &str) -> Option<Arc<Issue>> {
    global_catalog().lookup(id)
}

/// Identifiers of the built-in issues
pub mod ids {
    use super::IssueId;

    pub const BUFFER_BEFORE_SEGMENT: IssueId = IssueId::from_static("buffer::before-segment");
    pub const BUFFER_IS_OUT_OF_SEGMENT: IssueId =
        IssueId::from_static("buffer::is-out-of-segment");
    pub const BUFFER_TIMESTAMP_OUT_OF_RECEIVED_RANGE: IssueId =
        IssueId::from_static("buffer::timestamp-out-of-received-range");
    pub const WRONG_FLOW_RETURN: IssueId = IssueId::from_static("buffer::wrong-flow-return");
    pub const BUFFER_AFTER_EOS: IssueId = IssueId::from_static("buffer::after-eos");
    pub const WRONG_BUFFER: IssueId = IssueId::from_static("buffer::not-expected-one");
    pub const FIRST_BUFFER_RUNNING_TIME_IS_NOT_ZERO: IssueId =
        IssueId::from_static("buffer::first-buffer-running-time-is-not-zero");

    pub const CAPS_IS_MISSING_FIELD: IssueId = IssueId::from_static("caps::is-missing-field");
    pub const CAPS_FIELD_HAS_BAD_TYPE: IssueId = IssueId::from_static("caps::field-has-bad-type");
    pub const CAPS_EXPECTED_FIELD_NOT_FOUND: IssueId =
        IssueId::from_static("caps::expected-field-not-found");
    pub const GET_CAPS_NOT_PROXYING_FIELDS: IssueId =
        IssueId::from_static("caps::not-proxying-fields");
    pub const CAPS_FIELD_UNEXPECTED_VALUE: IssueId =
        IssueId::from_static("caps::field-unexpected-value");

    pub const EVENT_NEWSEGMENT_NOT_PUSHED: IssueId =
        IssueId::from_static("event::newsegment-not-pushed");
    pub const SERIALIZED_EVENT_WASNT_PUSHED_IN_TIME: IssueId =
        IssueId::from_static("event::serialized-event-wasnt-pushed-in-time");
    pub const EVENT_HAS_WRONG_SEQNUM: IssueId = IssueId::from_static("event::has-wrong-seqnum");
    pub const EVENT_SERIALIZED_OUT_OF_ORDER: IssueId =
        IssueId::from_static("event::serialized-out-of-order");
    pub const EVENT_NEW_SEGMENT_MISMATCH: IssueId = IssueId::from_static("event::segment-mismatch");
    pub const EVENT_FLUSH_START_UNEXPECTED: IssueId =
        IssueId::from_static("event::flush-start-unexpected");
    pub const EVENT_FLUSH_STOP_UNEXPECTED: IssueId =
        IssueId::from_static("event::flush-stop-unexpected");
    pub const EVENT_CAPS_DUPLICATE: IssueId = IssueId::from_static("event::caps-duplicate");
    pub const EVENT_SEEK_NOT_HANDLED: IssueId = IssueId::from_static("event::seek-not-handled");
    pub const EVENT_SEEK_RESULT_POSITION_WRONG: IssueId =
        IssueId::from_static("event::seek-result-position-wrong");
    pub const EVENT_EOS_WITHOUT_SEGMENT: IssueId =
        IssueId::from_static("event::eos-without-segment");

    pub const STATE_CHANGE_FAILURE: IssueId = IssueId::from_static("state::change-failure");

    pub const FILE_NO_STREAM_ID: IssueId = IssueId::from_static("file-checking::no-stream-id");
    pub const FILE_TAG_DETECTION_INCORRECT: IssueId =
        IssueId::from_static("file-checking::tag-detection-incorrect");
    pub const FILE_SIZE_INCORRECT: IssueId = IssueId::from_static("file-checking::size-incorrect");
    pub const FILE_DURATION_INCORRECT: IssueId =
        IssueId::from_static("file-checking::duration-incorrect");
    pub const FILE_SEEKABLE_INCORRECT: IssueId =
        IssueId::from_static("file-checking::seekable-incorrect");
    pub const FILE_PROFILE_INCORRECT: IssueId =
        IssueId::from_static("file-checking::profile-incorrect");

    pub const ALLOCATION_FAILURE: IssueId = IssueId::from_static("runtime::allocation-failure");
    pub const MISSING_PLUGIN: IssueId = IssueId::from_static("runtime::missing-plugin");
    pub const WARNING_ON_BUS: IssueId = IssueId::from_static("runtime::warning-on-bus");
    pub const ERROR_ON_BUS: IssueId = IssueId::from_static("runtime::error-on-bus");

    pub const QUERY_POSITION_SUPERIOR_DURATION: IssueId =
        IssueId::from_static("query::position-superior-duration");
    pub const QUERY_POSITION_OUT_OF_SEGMENT: IssueId =
        IssueId::from_static("query::position-out-of-segment");

    pub const SCENARIO_NOT_ENDED: IssueId = IssueId::from_static("scenario::not-ended");
    pub const SCENARIO_ACTION_EXECUTION_ERROR: IssueId =
        IssueId::from_static("scenario::execution-error");
    pub const SCENARIO_ACTION_EXECUTION_ISSUE: IssueId =
        IssueId::from_static("scenario::execution-issue");

    pub const LOG_ISSUE: IssueId = IssueId::from_static("log::issue");
    pub const LOG_WARNING: IssueId = IssueId::from_static("log::warning");
    pub const LOG_CRITICAL: IssueId = IssueId::from_static("log::critical");
}

type BuiltinIssue = (IssueId, Severity, &'static str, Option<&'static str>);

static BUILTIN_ISSUES: &[BuiltinIssue] = &[
    (
        ids::BUFFER_BEFORE_SEGMENT,
        Severity::Warning,
        "buffer was received before a segment",
        Some("in push mode, a segment event must be received before a buffer"),
    ),
    (
        ids::BUFFER_IS_OUT_OF_SEGMENT,
        Severity::Issue,
        "buffer is out of the segment range",
        Some(
            "buffer being pushed is out of the current segment's start-stop range, \
             meaning it is going to be discarded downstream without any use",
        ),
    ),
    (
        ids::BUFFER_TIMESTAMP_OUT_OF_RECEIVED_RANGE,
        Severity::Warning,
        "buffer timestamp is out of the received buffer timestamps' range",
        Some(
            "a buffer leaving a node should have its timestamps in the range of the \
             received buffers timestamps",
        ),
    ),
    (
        ids::FIRST_BUFFER_RUNNING_TIME_IS_NOT_ZERO,
        Severity::Warning,
        "first buffer's running time isn't 0",
        Some("the first buffer's received running time is expected to be 0"),
    ),
    (
        ids::WRONG_BUFFER,
        Severity::Warning,
        "received buffer does not correspond to wanted one",
        Some(
            "when checking playback against a media descriptor, buffers reaching the \
             decoders should carry the expected metadata and content hash",
        ),
    ),
    (
        ids::WRONG_FLOW_RETURN,
        Severity::Critical,
        "flow return from pad push doesn't match expected value",
        Some(
            "flow return from a 1:1 sink/src pad node is as simple as returning what \
             downstream returned; nodes with multiple src pads should combine flow returns",
        ),
    ),
    (
        ids::BUFFER_AFTER_EOS,
        Severity::Issue,
        "buffer was received after EOS",
        Some("a pad shouldn't receive any more buffers after it gets EOS"),
    ),
    (
        ids::CAPS_IS_MISSING_FIELD,
        Severity::Issue,
        "caps is missing a required field for its type",
        Some(
            "some caps types are expected to contain a set of basic fields, raw video \
             for example should have width, height, framerate and pixel-aspect-ratio",
        ),
    ),
    (
        ids::CAPS_FIELD_HAS_BAD_TYPE,
        Severity::Warning,
        "caps field has an unexpected type",
        Some("some common caps fields should always use the same expected types"),
    ),
    (
        ids::CAPS_EXPECTED_FIELD_NOT_FOUND,
        Severity::Warning,
        "caps expected field wasn't present",
        Some(
            "a field that should be present in the caps wasn't found; fields set on a \
             sink pad caps should be propagated downstream when it makes sense",
        ),
    ),
    (
        ids::GET_CAPS_NOT_PROXYING_FIELDS,
        Severity::Critical,
        "getcaps function isn't proxying downstream fields correctly",
        Some(
            "nodes should set downstream caps restrictions on their caps when replying \
             to upstream caps queries",
        ),
    ),
    (
        ids::CAPS_FIELD_UNEXPECTED_VALUE,
        Severity::Critical,
        "a field in caps has an unexpected value",
        Some("fields set on a sink pad should be propagated downstream via set caps"),
    ),
    (
        ids::EVENT_NEWSEGMENT_NOT_PUSHED,
        Severity::Warning,
        "new segment event wasn't propagated downstream",
        Some("segments received from upstream should be pushed downstream"),
    ),
    (
        ids::SERIALIZED_EVENT_WASNT_PUSHED_IN_TIME,
        Severity::Warning,
        "a serialized event received should be pushed in the same 'time' as it was received",
        Some(
            "serialized events should be pushed in the same order they are received and \
             serialized with buffers",
        ),
    ),
    (
        ids::EVENT_HAS_WRONG_SEQNUM,
        Severity::Issue,
        "events that are part of the same pipeline 'operation' should have the same seqnum",
        Some(
            "when events are created from another event, they should have their seqnums \
             set to the original event seqnum",
        ),
    ),
    (
        ids::EVENT_SERIALIZED_OUT_OF_ORDER,
        Severity::Warning,
        "a serialized event received should be pushed in the same order as it was received",
        Some("serialized events should be pushed in the same order they are received"),
    ),
    (
        ids::EVENT_NEW_SEGMENT_MISMATCH,
        Severity::Warning,
        "a new segment event has different value than the received one",
        Some(
            "when receiving a new segment, a node should push an equivalent segment \
             downstream",
        ),
    ),
    (
        ids::EVENT_FLUSH_START_UNEXPECTED,
        Severity::Warning,
        "received an unexpected flush start event",
        None,
    ),
    (
        ids::EVENT_FLUSH_STOP_UNEXPECTED,
        Severity::Warning,
        "received an unexpected flush stop event",
        None,
    ),
    (
        ids::EVENT_CAPS_DUPLICATE,
        Severity::Warning,
        "received the same caps twice",
        None,
    ),
    (
        ids::EVENT_SEEK_NOT_HANDLED,
        Severity::Critical,
        "seek event wasn't handled",
        None,
    ),
    (
        ids::EVENT_SEEK_RESULT_POSITION_WRONG,
        Severity::Critical,
        "position after a seek is wrong",
        None,
    ),
    (
        ids::EVENT_EOS_WITHOUT_SEGMENT,
        Severity::Warning,
        "EOS received without segment event before",
        Some("a segment event should always be sent before data flow, EOS included"),
    ),
    (
        ids::STATE_CHANGE_FAILURE,
        Severity::Critical,
        "state change failed",
        None,
    ),
    (
        ids::FILE_SIZE_INCORRECT,
        Severity::Warning,
        "resulting file size wasn't within the expected values",
        None,
    ),
    (
        ids::FILE_DURATION_INCORRECT,
        Severity::Warning,
        "resulting file duration wasn't within the expected values",
        None,
    ),
    (
        ids::FILE_SEEKABLE_INCORRECT,
        Severity::Warning,
        "resulting file wasn't seekable or not seekable as expected",
        None,
    ),
    (
        ids::FILE_PROFILE_INCORRECT,
        Severity::Critical,
        "resulting file stream profiles didn't match expected values",
        None,
    ),
    (
        ids::FILE_TAG_DETECTION_INCORRECT,
        Severity::Issue,
        "detected tags are different than expected ones",
        None,
    ),
    (
        ids::FILE_NO_STREAM_ID,
        Severity::Warning,
        "the discoverer found a stream that had no stream ID",
        None,
    ),
    (
        ids::ALLOCATION_FAILURE,
        Severity::Critical,
        "a memory allocation failed during the validation run",
        None,
    ),
    (
        ids::MISSING_PLUGIN,
        Severity::Critical,
        "a plugin is missing and prevented validation from running",
        None,
    ),
    (
        ids::WARNING_ON_BUS,
        Severity::Warning,
        "a warning message was posted by the pipeline",
        None,
    ),
    (
        ids::ERROR_ON_BUS,
        Severity::Critical,
        "an error message was posted by the pipeline",
        None,
    ),
    (
        ids::QUERY_POSITION_SUPERIOR_DURATION,
        Severity::Warning,
        "query position reported a value superior than what query duration returned",
        None,
    ),
    (
        ids::QUERY_POSITION_OUT_OF_SEGMENT,
        Severity::Warning,
        "query position reported a value outside of the current expected segment",
        None,
    ),
    (
        ids::SCENARIO_NOT_ENDED,
        Severity::Critical,
        "all the actions were not executed before the program stopped",
        None,
    ),
    (
        ids::SCENARIO_ACTION_EXECUTION_ERROR,
        Severity::Critical,
        "the execution of an action did not properly happen",
        None,
    ),
    (
        ids::SCENARIO_ACTION_EXECUTION_ISSUE,
        Severity::Issue,
        "an issue happened during the execution of a scenario",
        None,
    ),
    (ids::LOG_WARNING, Severity::Warning, "a warning was logged", None),
    (
        ids::LOG_CRITICAL,
        Severity::Critical,
        "a critical issue was logged",
        None,
    ),
    (ids::LOG_ISSUE, Severity::Issue, "an issue was logged", None),
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_severity_names_round_trip() {
        for severity in [
            Severity::Critical,
            Severity::Warning,
            Severity::Issue,
            Severity::Ignore,
            Severity::Unknown,
        ] {
            assert_eq!(Severity::from_name(severity.name()), severity);
        }
        assert_eq!(Severity::from_name("fatal"), Severity::Unknown);
        assert_eq!(Severity::from_index(42), Severity::Unknown);
        assert!(Severity::Critical < Severity::Warning);
    }

    #[test]
    fn test_issue_id_validation() {
        assert!(Issue::new("event::seek", "s", None, Severity::Issue).is_ok());
        for bad in ["event", "::seek", "event::", "a::b::c", ""] {
            let err = Issue::new(IssueId::new(bad), "s", None, Severity::Issue).unwrap_err();
            assert!(matches!(err, Error::InvalidIssueId(_)), "{} accepted", bad);
        }
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let mut catalog = IssueCatalog::new();
        catalog
            .register(Issue::new("custom::one", "first", None, Severity::Warning).unwrap())
            .unwrap();
        let err = catalog
            .register(Issue::new("custom::one", "again", None, Severity::Issue).unwrap())
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateIssue(_)));
        assert_eq!(catalog.lookup("custom::one").unwrap().summary(), "first");
    }

    #[test]
    fn test_builtin_lookup_returns_registered_issue() {
        let catalog = global_catalog();
        let mut seen = HashSet::new();
        for issue in catalog.iter() {
            assert!(seen.insert(issue.id().clone()));
            let found = lookup_issue(issue.id().as_str()).unwrap();
            assert_eq!(found.as_ref(), issue.as_ref());
        }
        assert_eq!(seen.len(), BUILTIN_ISSUES.len());

        let seek = lookup_issue(ids::EVENT_SEEK_RESULT_POSITION_WRONG.as_str()).unwrap();
        assert_eq!(seek.area(), "event");
        assert_eq!(seek.name(), "seek-result-position-wrong");
        assert_eq!(seek.default_severity(), Severity::Critical);
    }

    #[test]
    fn test_set_default_severity() {
        let mut catalog = IssueCatalog::with_builtin_issues();
        catalog
            .set_default_severity(ids::EVENT_CAPS_DUPLICATE.as_str(), Severity::Ignore)
            .unwrap();
        assert_eq!(
            catalog
                .lookup(ids::EVENT_CAPS_DUPLICATE.as_str())
                .unwrap()
                .default_severity(),
            Severity::Ignore
        );
        assert!(catalog.set_default_severity("nope::nope", Severity::Issue).is_err());
    }
}
