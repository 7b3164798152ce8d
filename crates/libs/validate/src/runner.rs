//! Runner: process-wide collector of reports
//!
//! Reporters submit [`Report`]s concurrently through [`Runner::add_report`].
//! The runner keeps the authoritative list of top-level reports, prints them
//! according to the [`DebugFlags`], aborts on fatal severities and renders the
//! end-of-run summary.

use crate::config::{DebugFlags, ReportingDetails, ValidateConfig};
use crate::issue::{Issue, IssueId, Severity};
use crate::report::{append_detected_on_line, Report, ReportingLevel};
use crate::sink::{sinks_from_outputs, OutputSink};
use crate::time;
use crate::Result;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Called once when a report crosses a fatal threshold
pub type FatalHandler = Box<dyn Fn(&Report) + Send + Sync>;

fn abort_process(report: &Report) {
    tracing::error!(
        "Fatal report received: {}, aborting",
        report.short_description()
    );
    std::process::abort();
}

/// Thread-safe report collector
pub struct Runner {
    reports: Mutex<Vec<Arc<Report>>>,
    flags: DebugFlags,
    reporting: ReportingDetails,
    severity_overrides: HashMap<IssueId, Severity>,
    sinks: RwLock<Vec<Arc<dyn OutputSink>>>,
    fatal_handler: FatalHandler,
    aborted: AtomicBool,
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("flags", &self.flags)
            .field("reporting", &self.reporting)
            .field("reports", &self.reports.lock().len())
            .field("aborted", &self.aborted.load(Ordering::Relaxed))
            .finish()
    }
}

impl Runner {
    /// Create a runner from configuration, opening its output sinks
    pub fn new(config: &ValidateConfig) -> Result<Self> {
        time::mark_process_start();
        let sinks = sinks_from_outputs(&config.outputs)?;
        Ok(Self {
            reports: Mutex::new(Vec::new()),
            flags: config.debug_flags(),
            reporting: config.reporting()?,
            severity_overrides: config.severity_overrides(),
            sinks: RwLock::new(sinks),
            fatal_handler: Box::new(abort_process),
            aborted: AtomicBool::new(false),
        })
    }

    /// Replace the default fatal handler, which aborts the process
    pub fn with_fatal_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Report) + Send + Sync + 'static,
    {
        self.fatal_handler = Box::new(handler);
        self
    }

    /// Attach another output sink
    pub fn add_sink(&self, sink: Arc<dyn OutputSink>) {
        self.sinks.write().push(sink);
    }

    pub fn flags(&self) -> DebugFlags {
        self.flags
    }

    /// Whether a fatal report stopped report processing
    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    pub fn default_reporting_level(&self) -> ReportingLevel {
        self.reporting.default_level()
    }

    /// Level configured for a reporter name or category, `Unknown` if none
    pub fn explicit_reporting_level(&self, name: &str, category: Option<&str>) -> ReportingLevel {
        self.reporting.level_for(name, category)
    }

    /// Effective level for a reporter: explicit name, then category, then default
    pub fn resolve_reporting_level(&self, name: &str, category: Option<&str>) -> ReportingLevel {
        self.reporting.resolve(name, category)
    }

    /// Severity a new report of `issue` gets, after overrides
    pub fn severity_for(&self, issue: &Issue) -> Severity {
        self.severity_overrides
            .get(issue.id())
            .copied()
            .unwrap_or_else(|| issue.default_severity())
    }

    /// Collect a report.
    ///
    /// Reports with `Ignore` severity, and anything arriving after a fatal
    /// report, are dropped. Shadow reports and reports filtered at level
    /// `None` are not retained.
    pub fn add_report(&self, report: Arc<Report>) {
        if report.severity() == Severity::Ignore || self.is_aborted() {
            return;
        }

        let (retained, fatal) = {
            let mut reports = self.reports.lock();
            if self.is_aborted() {
                return;
            }

            let retained =
                !report.is_shadow() && report.reporting_level() != ReportingLevel::None;
            if retained {
                reports.push(Arc::clone(&report));
            }

            let fatal = self.check_abort(&report);
            if fatal {
                self.aborted.store(true, Ordering::Release);
            }
            (retained, fatal)
        };

        if retained && self.should_print(&report) {
            self.print_report(&report);
        }

        if fatal {
            self.close_sinks();
            (self.fatal_handler)(&report);
        }
    }

    /// Whether the print flags select this report
    ///
    /// With no print flag set every report is printed.
    pub fn should_print(&self, report: &Report) -> bool {
        if !self.flags.intersects(DebugFlags::PRINT_MASK) {
            return true;
        }
        exceeds_threshold(
            report.severity(),
            self.flags,
            DebugFlags::PRINT_ISSUES,
            DebugFlags::PRINT_WARNINGS,
            DebugFlags::PRINT_CRITICALS,
        )
    }

    /// Whether the fatal flags select this report
    pub fn check_abort(&self, report: &Report) -> bool {
        exceeds_threshold(
            report.severity(),
            self.flags,
            DebugFlags::FATAL_ISSUES,
            DebugFlags::FATAL_WARNINGS,
            DebugFlags::FATAL_CRITICALS,
        )
    }

    /// Render a report and write it to every sink
    pub fn print_report(&self, report: &Report) {
        self.write_to_sinks(&report.render());
    }

    fn write_to_sinks(&self, text: &str) {
        for sink in self.sinks.read().iter() {
            if let Err(e) = sink.write(text) {
                tracing::warn!("Failed to write report output: {}", e);
            }
        }
    }

    fn close_sinks(&self) {
        for sink in self.sinks.read().iter() {
            if let Err(e) = sink.close() {
                tracing::warn!("Failed to close report output: {}", e);
            }
        }
    }

    /// Snapshot of the retained top-level reports
    pub fn reports(&self) -> Vec<Arc<Report>> {
        self.reports.lock().clone()
    }

    pub fn count_reports(&self) -> usize {
        self.reports.lock().len()
    }

    /// Number of distinct issues among the retained reports
    pub fn count_distinct_issues(&self) -> usize {
        self.reports
            .lock()
            .iter()
            .map(|r| r.issue_id().clone())
            .collect::<HashSet<_>>()
            .len()
    }

    /// Process exit status: the number of retained criticals, capped at 255
    pub fn exit_status(&self) -> i32 {
        let criticals = self
            .reports
            .lock()
            .iter()
            .filter(|r| r.severity() == Severity::Critical)
            .count();
        criticals.min(255) as i32
    }

    /// Render the end-of-run summary
    ///
    /// At the `Synthetic` default level, reports sharing an issue collapse
    /// into one block listing every reporter and no details.
    pub fn render_summary(&self) -> String {
        let reports = self.reports();
        let mut out = String::new();

        if reports.is_empty() {
            out.push_str("\n==== No issues found ====\n\n");
            return out;
        }

        out.push_str(&format!("\n==== {} issues found ====\n", reports.len()));
        let status = self.exit_status();
        if status > 0 {
            out.push_str(&format!(
                "==== Got criticals. Return value set to {} ====\n",
                status
            ));
        }
        out.push('\n');

        if self.default_reporting_level() == ReportingLevel::Synthetic {
            let mut groups: Vec<(IssueId, Vec<Arc<Report>>)> = Vec::new();
            for report in reports {
                match groups.iter_mut().find(|(id, _)| *id == *report.issue_id()) {
                    Some((_, group)) => group.push(report),
                    None => groups.push((report.issue_id().clone(), vec![report])),
                }
            }
            for (_, group) in groups {
                render_synthetic_block(&mut out, &group);
            }
        } else {
            for report in reports {
                out.push_str(&report.render());
            }
        }

        out
    }

    /// Write the summary to every sink and return the number of retained reports
    pub fn print_summary(&self) -> usize {
        let summary = self.render_summary();
        self.write_to_sinks(&summary);
        self.count_reports()
    }
}

fn exceeds_threshold(
    severity: Severity,
    flags: DebugFlags,
    issues: DebugFlags,
    warnings: DebugFlags,
    criticals: DebugFlags,
) -> bool {
    (severity <= Severity::Issue && flags.contains(issues))
        || (severity <= Severity::Warning && flags.contains(warnings))
        || (severity <= Severity::Critical && flags.contains(criticals))
}

fn render_synthetic_block(out: &mut String, group: &[Arc<Report>]) {
    let Some(first) = group.first() else {
        return;
    };

    let mut reporters: Vec<String> = Vec::new();
    for name in group.iter().flat_map(|r| r.detected_on()) {
        if !reporters.contains(&name) {
            reporters.push(name);
        }
    }

    first.append_severity_line(out);
    append_detected_on_line(out, &reporters);
    first.append_description_line(out);
    out.push('\n');
}
