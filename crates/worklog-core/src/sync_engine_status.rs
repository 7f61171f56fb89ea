use crate::sync_engine::{SyncAction, SyncProgress, SyncProgressReporter};
use crate::sync_engine_types::{StatusEmitterState, SyncOutcome, SyncSummary};
use crate::model::WorklogRecord;

pub(crate) fn action_from_outcome(outcome: SyncOutcome) -> SyncAction {
    match outcome {
        SyncOutcome::Created { .. } => SyncAction::Created,
        SyncOutcome::SkippedDuplicate => SyncAction::SkippedDuplicate,
        SyncOutcome::SkippedUnresolved { .. } => SyncAction::SkippedUnresolved,
        SyncOutcome::Failed => SyncAction::Failed,
    }
}

pub(crate) fn emit_sync_status(
    progress: Option<&SyncProgressReporter<'_>>,
    state: &StatusEmitterState,
    action: SyncAction,
    worklog: Option<&WorklogRecord>,
    summary: SyncSummary,
) {
    let Some(progress) = progress else {
        return;
    };
    progress(SyncProgress {
        total: state.total,
        processed: state.processed,
        action,
        external_id: worklog.map(|worklog| worklog.external_id.clone()),
        issue: worklog.map(|worklog| worklog.issue.to_string()),
        summary,
    });
}
