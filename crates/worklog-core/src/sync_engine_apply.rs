use crate::error::SyncError;
use crate::model::WorklogRecord;
use crate::sync_engine::SyncProgressReporter;
use crate::sync_engine_status::{action_from_outcome, emit_sync_status};
use crate::sync_engine_types::{
    FailedEntry, RecordOutcome, Stage, StatusEmitterState, SyncOutcome, SyncRun, outcome_for_error,
};
use tracing::{info, warn};

pub(crate) fn apply_success_outcome(
    run: &mut SyncRun,
    state: &mut StatusEmitterState,
    progress: Option<&SyncProgressReporter<'_>>,
    worklog: &WorklogRecord,
    outcome: SyncOutcome,
) {
    info!(
        external_id = %worklog.external_id,
        issue = %worklog.issue,
        outcome = outcome.as_str(),
        "worklog sync outcome"
    );
    record(run, state, progress, worklog, outcome);
}

/// Unresolvable worklogs end as skipped; everything else is a failure kept
/// for the report.
pub(crate) fn apply_failed_outcome(
    run: &mut SyncRun,
    state: &mut StatusEmitterState,
    progress: Option<&SyncProgressReporter<'_>>,
    worklog: &WorklogRecord,
    stage: Stage,
    error: SyncError,
) {
    let outcome = outcome_for_error(&error);
    if error.is_unresolved() {
        info!(
            external_id = %worklog.external_id,
            issue = %worklog.issue,
            reason = error.kind(),
            "worklog skipped: {error}"
        );
    } else {
        warn!(
            external_id = %worklog.external_id,
            issue = %worklog.issue,
            stage = stage.as_str(),
            error = %error,
            "worklog sync failed"
        );
        run.failures.push(FailedEntry {
            worklog: worklog.clone(),
            stage,
            error,
        });
    }
    record(run, state, progress, worklog, outcome);
}

fn record(
    run: &mut SyncRun,
    state: &mut StatusEmitterState,
    progress: Option<&SyncProgressReporter<'_>>,
    worklog: &WorklogRecord,
    outcome: SyncOutcome,
) {
    run.summary.record(outcome);
    run.outcomes.push(RecordOutcome {
        external_id: worklog.external_id.clone(),
        issue: worklog.issue.clone(),
        outcome,
    });
    state.processed += 1;
    emit_sync_status(
        progress,
        state,
        action_from_outcome(outcome),
        Some(worklog),
        run.summary,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteError;
    use crate::model::{IssueReference, Service, TimeWindow};
    use crate::sync_engine::SyncProgress;
    use std::cell::RefCell;
    use time::macros::date;

    fn worklog() -> WorklogRecord {
        WorklogRecord {
            external_id: "T-1".into(),
            issue: IssueReference::new("PROJ-1"),
            time_spent_seconds: 60,
            date: date!(2025 - 01 - 02),
            author: None,
            description: String::new(),
        }
    }

    fn run() -> SyncRun {
        SyncRun::start(TimeWindow::new(date!(2025 - 01 - 01), date!(2025 - 01 - 02)).unwrap())
    }

    #[test]
    fn unresolved_is_skipped_not_failed() {
        let mut run = run();
        let mut state = StatusEmitterState {
            total: 1,
            processed: 0,
        };
        let error = SyncError::NoMatch {
            issue: IssueReference::new("PROJ-1"),
        };
        apply_failed_outcome(&mut run, &mut state, None, &worklog(), Stage::Resolving, error);
        assert_eq!(run.summary.skipped_unresolved, 1);
        assert_eq!(run.summary.failed, 0);
        assert!(run.failures.is_empty());
        assert_eq!(state.processed, 1);
    }

    #[test]
    fn failure_is_recorded_and_reported_to_progress() {
        let mut run = run();
        let mut state = StatusEmitterState {
            total: 1,
            processed: 0,
        };
        let seen = RefCell::new(Vec::new());
        let progress = |update: SyncProgress| seen.borrow_mut().push(update);
        let error = SyncError::Write(RemoteError::Rejected {
            service: Service::Erp,
            message: "validation".into(),
        });
        apply_failed_outcome(
            &mut run,
            &mut state,
            Some(&progress),
            &worklog(),
            Stage::Writing,
            error,
        );
        assert_eq!(run.summary.failed, 1);
        assert_eq!(run.failures.len(), 1);
        assert_eq!(run.failures[0].stage, Stage::Writing);
        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].processed, 1);
        assert_eq!(seen[0].external_id.as_deref(), Some("T-1"));
    }
}
