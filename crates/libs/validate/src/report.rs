//! Reports: single occurrences of cataloged issues
//!
//! A [`Report`] is created by a reporter the moment an invariant violation is
//! detected and is shared through `Arc` between the reporter, the runner and
//! the shadow/repeat lists of other reports. The last holder to drop it frees
//! it together with the reports it links to.
//!
//! Two kinds of linking keep output bounded:
//! - **shadow reports**: the same underlying event seen by another reporter is
//!   folded under a master report (see [`Report::set_master_report`]);
//! - **repeated reports**: the same issue raised again by the same reporter is
//!   appended to the first report (see [`Report::add_repeated_report`]).

use crate::issue::{Issue, IssueId, Severity};
use crate::time;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::{Arc, Weak};
use std::time::Duration;

/// How much detail is kept for reports raised by a reporter
///
/// Ordered from least to most verbose; `Unknown` means "use the global default".
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum ReportingLevel {
    #[default]
    Unknown = 0,
    /// Reports are neither retained nor printed
    None = 1,
    /// One summary block per issue, without details
    Synthetic = 2,
    /// The same event seen on several reporters is folded under one report
    Subchain = 3,
    /// Every distinct reporter keeps its own report
    Monitor = 4,
    /// Even repeated issues on the same reporter are kept separately
    All = 5,
}

impl ReportingLevel {
    pub fn name(self) -> &'static str {
        match self {
            ReportingLevel::Unknown => "unknown",
            ReportingLevel::None => "none",
            ReportingLevel::Synthetic => "synthetic",
            ReportingLevel::Subchain => "subchain",
            ReportingLevel::Monitor => "monitor",
            ReportingLevel::All => "all",
        }
    }

    /// Parse a level name or its numeric value
    pub fn from_name(name: &str) -> Option<Self> {
        let level = match name.trim() {
            "none" | "1" => ReportingLevel::None,
            "synthetic" | "2" => ReportingLevel::Synthetic,
            "subchain" | "3" => ReportingLevel::Subchain,
            "monitor" | "4" => ReportingLevel::Monitor,
            "all" | "5" => ReportingLevel::All,
            "unknown" | "0" => ReportingLevel::Unknown,
            _ => return None,
        };
        Some(level)
    }
}

impl std::fmt::Display for ReportingLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One recorded occurrence of an issue
#[derive(Debug)]
pub struct Report {
    issue: Arc<Issue>,
    reporter: String,
    message: String,
    timestamp: Duration,
    severity: Severity,
    reporting_level: ReportingLevel,

    master: Mutex<Option<Weak<Report>>>,
    /// Guards only this report's shadow list
    shadow_reports: Mutex<Vec<Arc<Report>>>,
    repeated_reports: Mutex<Vec<Arc<Report>>>,
}

impl Report {
    /// Create a report with the issue's default severity, timestamped now
    pub fn new(issue: Arc<Issue>, reporter: impl Into<String>, message: impl Into<String>) -> Self {
        let severity = issue.default_severity();
        Self {
            issue,
            reporter: reporter.into(),
            message: message.into(),
            timestamp: time::since_process_start(),
            severity,
            reporting_level: ReportingLevel::Unknown,
            master: Mutex::new(None),
            shadow_reports: Mutex::new(Vec::new()),
            repeated_reports: Mutex::new(Vec::new()),
        }
    }

    /// Override the severity inherited from the issue
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Record the reporting level this report is filtered under
    pub fn with_reporting_level(mut self, level: ReportingLevel) -> Self {
        self.reporting_level = level;
        self
    }

    pub fn issue(&self) -> &Arc<Issue> {
        &self.issue
    }

    pub fn issue_id(&self) -> &IssueId {
        self.issue.id()
    }

    /// Name of the reporter that raised this report
    pub fn reporter(&self) -> &str {
        &self.reporter
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Offset from process start at which the report was raised
    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn reporting_level(&self) -> ReportingLevel {
        self.reporting_level
    }

    /// Fold this report under `master` as a shadow report.
    ///
    /// Refused (returns `false`) once the master is kept at `Monitor` level or
    /// above, where every reporter's report stands on its own. A second shadow
    /// from the same reporter is not inserted, but the fold still counts.
    pub fn set_master_report(self: &Arc<Self>, master: &Arc<Report>) -> bool {
        if master.reporting_level >= ReportingLevel::Monitor {
            return false;
        }

        *self.master.lock() = Some(Arc::downgrade(master));

        let mut shadows = master.shadow_reports.lock();
        if !shadows.iter().any(|s| s.reporter == self.reporter) {
            shadows.push(Arc::clone(self));
        }
        true
    }

    /// The report this one was folded under, if it is still alive
    pub fn master_report(&self) -> Option<Arc<Report>> {
        self.master.lock().as_ref().and_then(Weak::upgrade)
    }

    /// Whether this report was folded under a master report
    pub fn is_shadow(&self) -> bool {
        self.master.lock().is_some()
    }

    /// Snapshot of the shadow reports folded under this one
    pub fn shadow_reports(&self) -> Vec<Arc<Report>> {
        self.shadow_reports.lock().clone()
    }

    /// Append a re-occurrence of the same issue on the same reporter
    pub fn add_repeated_report(&self, repeated: Arc<Report>) {
        self.repeated_reports.lock().push(repeated);
    }

    /// Snapshot of the repeated reports, oldest first
    pub fn repeated_reports(&self) -> Vec<Arc<Report>> {
        self.repeated_reports.lock().clone()
    }

    /// Reporter names listed on the "Detected on" line
    pub fn detected_on(&self) -> Vec<String> {
        let mut names = vec![self.reporter.clone()];
        names.extend(
            self.shadow_reports
                .lock()
                .iter()
                .map(|shadow| shadow.reporter.clone()),
        );
        names
    }

    /// One-line form: `timestamp <reporter>: id (severity) : area: summary: message`
    pub fn short_description(&self) -> String {
        format!(
            "{} <{}>: {} ({}) : {}: {}: {}",
            time::format_clock_time(self.timestamp),
            self.reporter,
            self.issue.id(),
            self.issue.default_severity(),
            self.issue.area(),
            self.issue.summary(),
            self.message
        )
    }

    /// Render the full human-readable block
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.append_severity_line(&mut out);
        append_detected_on_line(&mut out, &self.detected_on());
        append_details_line(&mut out, &self.message);
        for repeated in self.repeated_reports.lock().iter() {
            append_details_line(&mut out, &repeated.message);
        }
        self.append_description_line(&mut out);
        out.push('\n');
        out
    }

    pub(crate) fn append_severity_line(&self, out: &mut String) {
        let _ = writeln!(out, "{:>10} : {}", self.severity.name(), self.issue.summary());
    }

    pub(crate) fn append_description_line(&self, out: &mut String) {
        if let Some(description) = self.issue.description() {
            let _ = writeln!(out, "{:12} Description : {}", "", description);
        }
    }
}

pub(crate) fn append_detected_on_line(out: &mut String, reporters: &[String]) {
    let _ = writeln!(out, "{:12} Detected on <{}>", "", reporters.join(", "));
}

fn append_details_line(out: &mut String, message: &str) {
    if !message.is_empty() {
        let _ = writeln!(out, "{:12} Details : {}", "", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::{ids, lookup_issue};

    fn report(reporter: &str, message: &str, level: ReportingLevel) -> Arc<Report> {
        let issue = lookup_issue(ids::EVENT_SERIALIZED_OUT_OF_ORDER.as_str()).unwrap();
        Arc::new(Report::new(issue, reporter, message).with_reporting_level(level))
    }

    #[test]
    fn test_new_report_uses_issue_defaults() {
        let r = report("decoder:src", "late", ReportingLevel::Subchain);
        assert_eq!(r.severity(), Severity::Warning);
        assert_eq!(r.issue_id(), &ids::EVENT_SERIALIZED_OUT_OF_ORDER);
        assert!(!r.is_shadow());

        let overridden = Report::new(r.issue().clone(), "x", "").with_severity(Severity::Critical);
        assert_eq!(overridden.severity(), Severity::Critical);
    }

    #[test]
    fn test_set_master_report_folds_once_per_reporter() {
        let master = report("demux:src", "m", ReportingLevel::Subchain);
        let a = report("parser:src", "a", ReportingLevel::Subchain);
        let b = report("parser:src", "b", ReportingLevel::Subchain);

        assert!(a.set_master_report(&master));
        assert!(b.set_master_report(&master));
        assert!(a.is_shadow());
        assert_eq!(master.shadow_reports().len(), 1);
        assert!(Arc::ptr_eq(&a.master_report().unwrap(), &master));
        assert_eq!(master.detected_on(), vec!["demux:src", "parser:src"]);
    }

    #[test]
    fn test_set_master_report_refused_at_monitor_level() {
        for level in [ReportingLevel::Monitor, ReportingLevel::All] {
            let master = report("demux:src", "m", level);
            let other = report("parser:src", "o", level);
            assert!(!other.set_master_report(&master));
            assert!(!other.is_shadow());
            assert!(master.shadow_reports().is_empty());
        }
    }

    #[test]
    fn test_render_lists_shadows_and_repeats() {
        let master = report("demux:src", "first", ReportingLevel::Subchain);
        let shadow = report("parser:src", "shadowed", ReportingLevel::Subchain);
        shadow.set_master_report(&master);
        master.add_repeated_report(report("demux:src", "second", ReportingLevel::Subchain));

        let text = master.render();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "   warning : a serialized event received should be pushed in the same order as it was received"
        );
        assert_eq!(lines[1], "             Detected on <demux:src, parser:src>");
        assert_eq!(lines[2], "             Details : first");
        assert_eq!(lines[3], "             Details : second");
        assert!(lines[4].starts_with("             Description : serialized events"));
        assert!(text.ends_with("\n\n"));
    }

    #[test]
    fn test_dropping_master_releases_links() {
        let master = report("demux:src", "m", ReportingLevel::Subchain);
        let shadow = report("parser:src", "s", ReportingLevel::Subchain);
        shadow.set_master_report(&master);
        assert_eq!(Arc::strong_count(&shadow), 2);

        drop(master);
        assert_eq!(Arc::strong_count(&shadow), 1);
        assert!(shadow.master_report().is_none());
        assert!(shadow.is_shadow());
    }

    #[test]
    fn test_reporting_level_names() {
        assert_eq!(ReportingLevel::from_name("monitor"), Some(ReportingLevel::Monitor));
        assert_eq!(ReportingLevel::from_name("3"), Some(ReportingLevel::Subchain));
        assert_eq!(ReportingLevel::from_name("loud"), None);
        assert!(ReportingLevel::All > ReportingLevel::Monitor);
    }
}
