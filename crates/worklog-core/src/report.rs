//! Failure classification and run reporting.
//!
//! Every failure recorded in a [`SyncRun`] is classified as critical or
//! normal. Whether a report is sent depends on the critical failures, the
//! number of failures and the notification settings. Sending a report never
//! changes the outcome of the run.

use crate::config::NotifyConfig;
use crate::error::{RemoteError, RunError, SyncError};
use crate::notify_state::{NotifyState, current_timestamp_secs};
use crate::provider::Notifier;
use crate::sync_engine_types::{FailedEntry, Stage, SyncRun, SyncSummary};
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::Path;
use tracing::{info, warn};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum Severity {
    Normal,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Normal => "normal",
            Severity::Critical => "critical",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ClassifiedFailure {
    pub external_id: String,
    pub issue: String,
    pub stage: Stage,
    pub error: SyncError,
    pub severity: Severity,
}

impl ClassifiedFailure {
    /// Stable key used to suppress repeated notifications for the same
    /// kind of problem.
    pub fn error_key(&self) -> String {
        match self.error.remote() {
            Some(remote) => format!("{}:{}:{}", self.error.kind(), remote.service(), remote.kind()),
            None => self.error.kind().to_string(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Classification {
    pub critical: Vec<ClassifiedFailure>,
    pub normal: Vec<ClassifiedFailure>,
}

impl Classification {
    pub fn total(&self) -> usize {
        self.critical.len() + self.normal.len()
    }

    pub fn critical_keys(&self) -> BTreeSet<String> {
        self.critical.iter().map(ClassifiedFailure::error_key).collect()
    }
}

/// Splits the failures of a run into critical and normal ones.
///
/// Write errors and authentication errors are always critical.
/// Connectivity errors become critical once a run has seen at least
/// `repeated_connectivity_threshold` of them. Everything else is normal.
pub fn classify(failures: &[FailedEntry], config: &NotifyConfig) -> Classification {
    let connectivity = failures
        .iter()
        .filter(|entry| entry.error.remote().is_some_and(RemoteError::is_connectivity))
        .count();
    let repeated_connectivity = config.repeated_connectivity_threshold > 0
        && connectivity >= config.repeated_connectivity_threshold as usize;

    let mut classification = Classification::default();
    for entry in failures {
        let severity = severity_for(&entry.error, repeated_connectivity);
        let failure = ClassifiedFailure {
            external_id: entry.worklog.external_id.clone(),
            issue: entry.worklog.issue.to_string(),
            stage: entry.stage,
            error: entry.error.clone(),
            severity,
        };
        match severity {
            Severity::Critical => classification.critical.push(failure),
            Severity::Normal => classification.normal.push(failure),
        }
    }
    classification
}

fn severity_for(error: &SyncError, repeated_connectivity: bool) -> Severity {
    if matches!(error, SyncError::Write(_)) {
        return Severity::Critical;
    }
    match error.remote() {
        Some(remote) if remote.is_auth() => Severity::Critical,
        Some(remote) if remote.is_connectivity() && repeated_connectivity => Severity::Critical,
        _ => Severity::Normal,
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NotifyReason {
    CriticalErrors,
    FailureThreshold,
    AlwaysNotify,
    RunAborted,
    PeriodicSummary,
}

impl NotifyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotifyReason::CriticalErrors => "critical_errors",
            NotifyReason::FailureThreshold => "failure_threshold",
            NotifyReason::AlwaysNotify => "always_notify",
            NotifyReason::RunAborted => "run_aborted",
            NotifyReason::PeriodicSummary => "periodic_summary",
        }
    }
}

pub fn notify_reason(classification: &Classification, config: &NotifyConfig) -> Option<NotifyReason> {
    if !classification.critical.is_empty() {
        Some(NotifyReason::CriticalErrors)
    } else {
        fallback_reason(classification, config)
    }
}

/// Reasons that hold regardless of critical errors. These are never subject
/// to repeat suppression.
fn fallback_reason(classification: &Classification, config: &NotifyConfig) -> Option<NotifyReason> {
    if classification.total() > config.failed_worklog_threshold as usize {
        Some(NotifyReason::FailureThreshold)
    } else if config.always_notify {
        Some(NotifyReason::AlwaysNotify)
    } else {
        None
    }
}

/// Message handed to a [`Notifier`].
#[derive(Clone, Debug, PartialEq)]
pub struct RunReport {
    pub subject: String,
    pub body: String,
    pub severity: Severity,
    pub reason: NotifyReason,
    pub summary: Option<SyncSummary>,
    pub critical: Vec<ClassifiedFailure>,
    pub normal: Vec<ClassifiedFailure>,
}

impl RunReport {
    pub fn for_run(
        run: &SyncRun,
        classification: &Classification,
        reason: NotifyReason,
        prefix: &str,
    ) -> Self {
        let severity = if classification.critical.is_empty() {
            Severity::Normal
        } else {
            Severity::Critical
        };
        let subject = match severity {
            Severity::Critical => format!(
                "{prefix} CRITICAL: {} critical error(s) during sync",
                classification.critical.len()
            ),
            Severity::Normal => format!(
                "{prefix} Sync report: {} created, {} failed",
                run.summary.created, run.summary.failed
            ),
        };
        Self {
            subject,
            body: render_report_body(run, classification),
            severity,
            reason,
            summary: Some(run.summary),
            critical: classification.critical.clone(),
            normal: classification.normal.clone(),
        }
    }

    /// Report for a run that never processed a worklog.
    pub fn aborted(error: &RemoteError, prefix: &str) -> Self {
        let mut body = String::new();
        let _ = writeln!(body, "The sync run was aborted before any worklog was processed.");
        let _ = writeln!(body);
        let _ = writeln!(body, "Service: {}", error.service());
        let _ = writeln!(body, "Error:   {error}");
        Self {
            subject: format!("{prefix} CRITICAL: sync run aborted ({} {})", error.service(), error.kind()),
            body,
            severity: Severity::Critical,
            reason: NotifyReason::RunAborted,
            summary: None,
            critical: Vec::new(),
            normal: Vec::new(),
        }
    }
}

/// Human-readable summary of a run: outcome counts and failure lines.
pub fn render_summary(run: &SyncRun) -> String {
    let summary = &run.summary;
    let mut out = String::new();
    let _ = writeln!(out, "Run {} for {}", run.run_id, run.window);
    let _ = writeln!(out, "  fetched:            {}", run.fetched);
    if run.dropped > 0 {
        let _ = writeln!(out, "  unreadable:         {} (dropped by the worklog source)", run.dropped);
    }
    let _ = writeln!(out, "  created:            {}", summary.created);
    let _ = writeln!(out, "  skipped duplicate:  {}", summary.skipped_duplicate);
    let _ = writeln!(
        out,
        "  skipped unresolved: {} (no task reference: {}, task missing: {})",
        summary.skipped_unresolved, summary.unresolved_no_match, summary.unresolved_task_not_found
    );
    let _ = writeln!(out, "  failed:             {}", summary.failed);
    let _ = writeln!(out, "  duration:           {:.1}s", run.duration_secs());
    out
}

fn render_report_body(run: &SyncRun, classification: &Classification) -> String {
    let mut out = render_summary(run);
    render_failures(&mut out, "Critical errors", &classification.critical);
    render_failures(&mut out, "Other errors", &classification.normal);
    out
}

fn render_failures(out: &mut String, title: &str, failures: &[ClassifiedFailure]) {
    if failures.is_empty() {
        return;
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "{title} ({}):", failures.len());
    for failure in failures {
        let _ = writeln!(
            out,
            "  - worklog {} on {} [{}]: {}",
            failure.external_id,
            failure.issue,
            failure.stage.as_str(),
            failure.error
        );
    }
}

/// What the reporter did at the end of a run.
#[derive(Clone, Debug, PartialEq)]
pub struct ReportDecision {
    pub classification: Classification,
    pub reason: Option<NotifyReason>,
    pub sent: bool,
    pub suppressed: bool,
}

/// Classifies failures, decides whether to notify and delivers the report.
/// Notification problems are logged and never surface as errors.
pub struct Reporter<'a> {
    config: &'a NotifyConfig,
    notifier: &'a dyn Notifier,
    state_path: Option<&'a Path>,
}

impl<'a> Reporter<'a> {
    pub fn new(config: &'a NotifyConfig, notifier: &'a dyn Notifier) -> Self {
        Self {
            config,
            notifier,
            state_path: None,
        }
    }

    /// Persist sent notifications so repeats within `repeat_hours` are
    /// suppressed across runs.
    pub fn with_state_path(mut self, path: &'a Path) -> Self {
        self.state_path = Some(path);
        self
    }

    pub async fn finish_run(&self, run: &SyncRun) -> ReportDecision {
        self.finish_run_at(run, current_timestamp_secs()).await
    }

    pub async fn finish_run_at(&self, run: &SyncRun, now: u64) -> ReportDecision {
        let classification = classify(&run.failures, self.config);
        let reason = notify_reason(&classification, self.config);
        let mut state = self.load_state();
        let keys = classification.critical_keys();

        let mut decision = ReportDecision {
            classification,
            reason,
            sent: false,
            suppressed: false,
        };
        let Some(mut reason) = reason else {
            if let Some(state) = state.as_mut()
                && !state.errors.is_empty()
            {
                state.clear();
                self.save_state(state);
            }
            return decision;
        };

        if reason == NotifyReason::CriticalErrors
            && let Some(state) = state.as_ref()
            && state.all_recently_sent(keys.iter().map(String::as_str), now, self.repeat_secs())
        {
            match fallback_reason(&decision.classification, self.config) {
                Some(fallback) => {
                    info!(
                        run_id = %run.run_id,
                        reason = fallback.as_str(),
                        "critical errors already reported recently; reporting for another reason"
                    );
                    reason = fallback;
                    decision.reason = Some(fallback);
                }
                None => {
                    info!(run_id = %run.run_id, "critical errors already reported recently; notification suppressed");
                    decision.suppressed = true;
                    return decision;
                }
            }
        }

        let report = RunReport::for_run(
            run,
            &decision.classification,
            reason,
            &self.config.subject_prefix,
        );
        decision.sent = self.deliver(&report).await;

        if let Some(state) = state.as_mut() {
            if decision.classification.critical.is_empty() {
                state.clear();
            } else if decision.sent {
                for failure in &decision.classification.critical {
                    state.record_sent(&failure.error_key(), now, Some(failure.error.to_string()));
                }
            }
            self.save_state(state);
        }
        decision
    }

    /// Reports a run that could not start. Returns whether a report went out.
    pub async fn report_fatal(&self, error: &RunError) -> bool {
        self.report_fatal_at(error, current_timestamp_secs()).await
    }

    pub async fn report_fatal_at(&self, error: &RunError, now: u64) -> bool {
        let RunError::SourceUnavailable(remote) = error;
        let key = format!("aborted:{}:{}", remote.service(), remote.kind());
        let mut state = self.load_state();
        if let Some(state) = state.as_ref()
            && state.all_recently_sent([key.as_str()], now, self.repeat_secs())
        {
            info!(error = %remote, "run abort already reported recently; notification suppressed");
            return false;
        }
        let report = RunReport::aborted(remote, &self.config.subject_prefix);
        let sent = self.deliver(&report).await;
        if sent && let Some(state) = state.as_mut() {
            state.record_sent(&key, now, Some(remote.to_string()));
            self.save_state(state);
        }
        sent
    }

    async fn deliver(&self, report: &RunReport) -> bool {
        if !self.notifier.is_configured() {
            info!(subject = %report.subject, "no notifier configured; report logged only");
            return false;
        }
        match self.notifier.send_report(report).await {
            Ok(()) => {
                info!(subject = %report.subject, reason = report.reason.as_str(), "report sent");
                true
            }
            Err(err) => {
                warn!(error = %err, subject = %report.subject, "could not send report");
                false
            }
        }
    }

    fn repeat_secs(&self) -> u64 {
        self.config.repeat_hours.saturating_mul(3600)
    }

    fn load_state(&self) -> Option<NotifyState> {
        let path = self.state_path?;
        match NotifyState::load(path) {
            Ok(state) => Some(state),
            Err(err) => {
                warn!(error = %err, path = %path.display(), "notification state unreadable; starting fresh");
                Some(NotifyState::new())
            }
        }
    }

    fn save_state(&self, state: &NotifyState) {
        let Some(path) = self.state_path else {
            return;
        };
        if let Err(err) = state.save(path) {
            warn!(error = %err, path = %path.display(), "could not save notification state");
        }
    }
}

#[cfg(test)]
mod tests;
