use super::*;
use crate::memory::MemoryNotifier;
use crate::model::{IssueReference, Service, TimeWindow, WorklogRecord};
use crate::provider::{DisabledNotifier, block_on, connectivity_error};
use crate::sync_engine_types::SyncOutcome;
use tempfile::TempDir;
use time::macros::date;

fn worklog(id: &str) -> WorklogRecord {
    WorklogRecord {
        external_id: id.into(),
        issue: IssueReference::new("PROJ-7"),
        time_spent_seconds: 1800,
        date: date!(2025 - 03 - 04),
        author: Some("Ada".into()),
        description: String::new(),
    }
}

fn run_with(failures: Vec<(Stage, SyncError)>) -> SyncRun {
    let mut run = SyncRun::start(TimeWindow::new(date!(2025 - 03 - 03), date!(2025 - 03 - 04)).unwrap());
    for (index, (stage, error)) in failures.into_iter().enumerate() {
        run.summary.record(SyncOutcome::Failed);
        run.failures.push(FailedEntry {
            worklog: worklog(&format!("T-{index}")),
            stage,
            error,
        });
    }
    run
}

fn write_rejected() -> (Stage, SyncError) {
    (
        Stage::Writing,
        SyncError::Write(RemoteError::Rejected {
            service: Service::Erp,
            message: "date outside allowed period".into(),
        }),
    )
}

fn transport_timeout() -> (Stage, SyncError) {
    (
        Stage::CheckingDuplicate,
        SyncError::Transport(connectivity_error(Service::Erp, "timed out")),
    )
}

fn issue_auth() -> (Stage, SyncError) {
    (
        Stage::Resolving,
        SyncError::Resolution {
            issue: IssueReference::new("PROJ-7"),
            source: RemoteError::Auth {
                service: Service::Issues,
                message: "HTTP 401".into(),
            },
        },
    )
}

#[test]
fn write_and_auth_errors_are_critical() {
    let run = run_with(vec![write_rejected(), issue_auth(), transport_timeout()]);
    let classification = classify(&run.failures, &NotifyConfig::default());
    assert_eq!(classification.critical.len(), 2);
    assert_eq!(classification.normal.len(), 1);
    assert_eq!(classification.normal[0].stage, Stage::CheckingDuplicate);
}

#[test]
fn repeated_connectivity_becomes_critical() {
    let config = NotifyConfig {
        repeated_connectivity_threshold: 2,
        ..NotifyConfig::default()
    };
    let single = run_with(vec![transport_timeout()]);
    assert!(classify(&single.failures, &config).critical.is_empty());

    let repeated = run_with(vec![transport_timeout(), transport_timeout()]);
    let classification = classify(&repeated.failures, &config);
    assert_eq!(classification.critical.len(), 2);
    assert_eq!(
        classification.critical_keys().into_iter().collect::<Vec<_>>(),
        vec!["transport:erp:connectivity".to_string()]
    );
}

#[test]
fn notify_rules() {
    let config = NotifyConfig {
        failed_worklog_threshold: 1,
        ..NotifyConfig::default()
    };
    let clean = Classification::default();
    assert_eq!(notify_reason(&clean, &config), None);

    let two_normal = classify(&run_with(vec![transport_timeout(), transport_timeout()]).failures, &config);
    assert_eq!(notify_reason(&two_normal, &config), Some(NotifyReason::FailureThreshold));

    let critical = classify(&run_with(vec![write_rejected()]).failures, &config);
    assert_eq!(notify_reason(&critical, &config), Some(NotifyReason::CriticalErrors));

    let always = NotifyConfig {
        always_notify: true,
        ..NotifyConfig::default()
    };
    assert_eq!(notify_reason(&clean, &always), Some(NotifyReason::AlwaysNotify));
}

#[test]
fn report_lists_failing_worklogs() {
    let run = run_with(vec![write_rejected()]);
    let classification = classify(&run.failures, &NotifyConfig::default());
    let report = RunReport::for_run(&run, &classification, NotifyReason::CriticalErrors, "[SYNC]");
    assert!(report.subject.starts_with("[SYNC] CRITICAL"));
    assert_eq!(report.severity, Severity::Critical);
    assert!(report.body.contains("worklog T-0 on PROJ-7 [writing]"));
    assert!(report.body.contains("date outside allowed period"));
}

#[test]
fn summary_lists_counts() {
    let run = run_with(vec![transport_timeout()]);
    let text = render_summary(&run);
    assert!(text.contains("failed:             1"));
    assert!(text.contains("2025-03-03..2025-03-04"));
}

#[test]
fn reporter_sends_critical_once_per_interval() {
    let tmp = TempDir::new().unwrap();
    let state_path = tmp.path().join("notify_state.json");
    let config = NotifyConfig::default();
    let notifier = MemoryNotifier::new();
    let reporter = Reporter::new(&config, &notifier).with_state_path(&state_path);
    let run = run_with(vec![write_rejected()]);

    let first = block_on(reporter.finish_run_at(&run, 10_000));
    assert!(first.sent);
    let second = block_on(reporter.finish_run_at(&run, 10_000 + 3600));
    assert!(second.suppressed);
    assert!(!second.sent);
    let third = block_on(reporter.finish_run_at(&run, 10_000 + 25 * 3600));
    assert!(third.sent);
    assert_eq!(notifier.sent().len(), 2);
}

#[test]
fn always_notify_is_not_silenced_by_repeats() {
    let tmp = TempDir::new().unwrap();
    let state_path = tmp.path().join("notify_state.json");
    let config = NotifyConfig {
        always_notify: true,
        ..NotifyConfig::default()
    };
    let notifier = MemoryNotifier::new();
    let reporter = Reporter::new(&config, &notifier).with_state_path(&state_path);
    let run = run_with(vec![write_rejected()]);

    let first = block_on(reporter.finish_run_at(&run, 10_000));
    assert_eq!(first.reason, Some(NotifyReason::CriticalErrors));
    let second = block_on(reporter.finish_run_at(&run, 10_000 + 3600));
    assert!(second.sent);
    assert!(!second.suppressed);
    assert_eq!(second.reason, Some(NotifyReason::AlwaysNotify));
    assert_eq!(notifier.sent().len(), 2);
}

#[test]
fn failure_threshold_is_not_silenced_by_repeats() {
    let tmp = TempDir::new().unwrap();
    let state_path = tmp.path().join("notify_state.json");
    let config = NotifyConfig {
        failed_worklog_threshold: 1,
        ..NotifyConfig::default()
    };
    let notifier = MemoryNotifier::new();
    let reporter = Reporter::new(&config, &notifier).with_state_path(&state_path);
    let run = run_with(vec![write_rejected(), transport_timeout()]);

    assert!(block_on(reporter.finish_run_at(&run, 10_000)).sent);
    let second = block_on(reporter.finish_run_at(&run, 10_000 + 3600));
    assert!(second.sent);
    assert_eq!(second.reason, Some(NotifyReason::FailureThreshold));
    assert_eq!(notifier.sent()[1].reason, NotifyReason::FailureThreshold);
}

#[test]
fn clean_run_clears_suppression() {
    let tmp = TempDir::new().unwrap();
    let state_path = tmp.path().join("notify_state.json");
    let config = NotifyConfig::default();
    let notifier = MemoryNotifier::new();
    let reporter = Reporter::new(&config, &notifier).with_state_path(&state_path);

    block_on(reporter.finish_run_at(&run_with(vec![write_rejected()]), 100));
    let clean = block_on(reporter.finish_run_at(&run_with(Vec::new()), 200));
    assert_eq!(clean.reason, None);
    let again = block_on(reporter.finish_run_at(&run_with(vec![write_rejected()]), 300));
    assert!(again.sent);
    assert_eq!(notifier.sent().len(), 2);
}

#[test]
fn notifier_failure_is_swallowed() {
    let config = NotifyConfig::default();
    let notifier = MemoryNotifier::failing();
    let reporter = Reporter::new(&config, &notifier);
    let decision = block_on(reporter.finish_run_at(&run_with(vec![write_rejected()]), 1));
    assert_eq!(decision.reason, Some(NotifyReason::CriticalErrors));
    assert!(!decision.sent);
}

#[test]
fn disabled_notifier_only_logs() {
    let config = NotifyConfig::default();
    let reporter = Reporter::new(&config, &DisabledNotifier);
    let decision = block_on(reporter.finish_run_at(&run_with(vec![write_rejected()]), 1));
    assert!(!decision.sent);
    assert!(!decision.suppressed);
}

#[test]
fn fatal_run_is_reported() {
    let config = NotifyConfig::default();
    let notifier = MemoryNotifier::new();
    let reporter = Reporter::new(&config, &notifier);
    let error = RunError::SourceUnavailable(connectivity_error(Service::Worklogs, "dns failure"));
    assert!(block_on(reporter.report_fatal_at(&error, 1)));
    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].reason, NotifyReason::RunAborted);
    assert!(sent[0].subject.contains("worklogs connectivity"));
}
