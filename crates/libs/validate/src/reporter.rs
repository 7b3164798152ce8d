//! Reporters: named observation points raising reports
//!
//! Anything that checks pipeline behaviour (a pad monitor, an element
//! monitor, the scenario engine) owns a [`Reporter`]. The reporter resolves
//! its reporting level once, applies severity overrides, turns repeated
//! issues into repeated reports and hands everything else to the runner.

use crate::issue::lookup_issue;
use crate::report::{Report, ReportingLevel};
use crate::runner::Runner;
use crate::{Error, IssueId, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

/// Named source of reports attached to a [`Runner`]
#[derive(Debug)]
pub struct Reporter {
    name: String,
    category: Option<String>,
    runner: Weak<Runner>,
    reporting_level: ReportingLevel,
    /// First report raised for each issue
    reports: Mutex<HashMap<IssueId, Arc<Report>>>,
}

impl Reporter {
    /// Create a reporter attached to `runner`
    pub fn new(name: impl Into<String>, runner: &Arc<Runner>) -> Self {
        Self::build(name.into(), None, runner)
    }

    /// Create a reporter whose category can carry its own reporting level
    pub fn with_category(
        name: impl Into<String>,
        category: impl Into<String>,
        runner: &Arc<Runner>,
    ) -> Self {
        Self::build(name.into(), Some(category.into()), runner)
    }

    fn build(name: String, category: Option<String>, runner: &Arc<Runner>) -> Self {
        let reporting_level = runner.explicit_reporting_level(&name, category.as_deref());
        Self {
            name,
            category,
            runner: Arc::downgrade(runner),
            reporting_level,
            reports: Mutex::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    /// Explicitly configured level, `Unknown` when the runner default applies
    pub fn reporting_level(&self) -> ReportingLevel {
        self.reporting_level
    }

    /// Override the reporting level resolved from the configuration
    pub fn set_reporting_level(&mut self, level: ReportingLevel) {
        self.reporting_level = level;
    }

    /// The runner this reporter feeds, if it is still alive
    pub fn runner(&self) -> Option<Arc<Runner>> {
        self.runner.upgrade()
    }

    /// Raise a report for `issue_id`.
    ///
    /// Fails only when the issue is not in the catalog.
    pub fn report(&self, issue_id: &str, message: impl Into<String>) -> Result<Arc<Report>> {
        self.submit(issue_id, message.into(), None)
    }

    /// Raise a report describing the same event as `master`, seen from this reporter.
    ///
    /// Below `Monitor` level the report is folded under `master` and never
    /// listed on its own.
    pub fn report_shadowed(
        &self,
        issue_id: &str,
        message: impl Into<String>,
        master: &Arc<Report>,
    ) -> Result<Arc<Report>> {
        self.submit(issue_id, message.into(), Some(master))
    }

    fn submit(
        &self,
        issue_id: &str,
        message: String,
        master: Option<&Arc<Report>>,
    ) -> Result<Arc<Report>> {
        let issue = lookup_issue(issue_id).ok_or_else(|| Error::UnknownIssue(issue_id.to_string()))?;
        let runner = self.runner.upgrade();

        let (severity, level) = match &runner {
            Some(runner) => (
                runner.severity_for(&issue),
                match self.reporting_level {
                    ReportingLevel::Unknown => runner.default_reporting_level(),
                    level => level,
                },
            ),
            None => (issue.default_severity(), self.reporting_level),
        };

        let report = Arc::new(
            Report::new(Arc::clone(&issue), self.name.as_str(), message)
                .with_severity(severity)
                .with_reporting_level(level),
        );

        {
            let mut reports = self.reports.lock();
            match reports.get(issue.id()) {
                Some(previous) if level != ReportingLevel::All => {
                    tracing::trace!(
                        "{}: repeated report for {} folded into the first one",
                        self.name,
                        issue.id()
                    );
                    previous.add_repeated_report(Arc::clone(&report));
                    return Ok(report);
                }
                Some(_) => {}
                None => {
                    reports.insert(issue.id().clone(), Arc::clone(&report));
                }
            }
        }

        if let Some(master) = master {
            if report.set_master_report(master) {
                tracing::debug!("{}: {} folded under <{}>", self.name, issue.id(), master.reporter());
            }
        }

        match runner {
            Some(runner) => runner.add_report(Arc::clone(&report)),
            None => tracing::warn!(
                "{}: runner is gone, report {} not collected",
                self.name,
                issue.id()
            ),
        }

        Ok(report)
    }

    /// First report raised for `issue_id`
    pub fn get_report(&self, issue_id: &str) -> Option<Arc<Report>> {
        self.reports.lock().get(issue_id).cloned()
    }

    /// Number of distinct issues this reporter raised
    pub fn reports_count(&self) -> usize {
        self.reports.lock().len()
    }
}
