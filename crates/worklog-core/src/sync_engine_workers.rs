use crate::dedup::DuplicateChecker;
use crate::error::SyncError;
use crate::matcher::TaskMatcher;
use crate::model::WorklogRecord;
use crate::resolver::IssueResolver;
use crate::sync_engine::{SyncAction, SyncEngine, SyncProgressReporter};
use crate::sync_engine_apply::{apply_failed_outcome, apply_success_outcome};
use crate::sync_engine_status::emit_sync_status;
use crate::sync_engine_types::{Stage, StatusEmitterState, SyncOutcome, SyncRun};
use crate::writer::TimesheetWriter;
use tracing::debug;

/// Processes worklogs one at a time in fetch order. A failing worklog only
/// ends its own pipeline.
pub(crate) async fn run_work_items(
    engine: &SyncEngine<'_>,
    run: &mut SyncRun,
    state: &mut StatusEmitterState,
    progress: Option<&SyncProgressReporter<'_>>,
    worklogs: Vec<WorklogRecord>,
) {
    for worklog in worklogs {
        emit_sync_status(
            progress,
            state,
            SyncAction::Processing,
            Some(&worklog),
            run.summary,
        );
        match process_worklog(engine, &worklog).await {
            Ok(outcome) => apply_success_outcome(run, state, progress, &worklog, outcome),
            Err((stage, error)) => {
                apply_failed_outcome(run, state, progress, &worklog, stage, error)
            }
        }
    }
}

async fn process_worklog(
    engine: &SyncEngine<'_>,
    worklog: &WorklogRecord,
) -> Result<SyncOutcome, (Stage, SyncError)> {
    let at = |stage: Stage| move |error: SyncError| (stage, error);

    if worklog.external_id.trim().is_empty() {
        return Err((
            Stage::Validating,
            SyncError::InvalidRecord(format!("worklog on {} has no identifier", worklog.issue)),
        ));
    }

    // An existing line wins over whatever the issue resolves to now.
    debug!(external_id = %worklog.external_id, stage = "checking_duplicate", "worklog state");
    let duplicate = DuplicateChecker::new(engine.erp)
        .already_synced(&worklog.external_id)
        .await
        .map_err(at(Stage::CheckingDuplicate))?;
    if duplicate {
        return Ok(SyncOutcome::SkippedDuplicate);
    }

    debug!(external_id = %worklog.external_id, stage = "resolving", "worklog state");
    let resolver = IssueResolver::new(engine.issues, &engine.rule, engine.follow_parent);
    let candidate = resolver
        .resolve(&worklog.issue)
        .await
        .map_err(at(Stage::Resolving))?;

    debug!(external_id = %worklog.external_id, task_id = %candidate.task_id, stage = "matching", "worklog state");
    let task = TaskMatcher::new(engine.erp)
        .confirm(candidate.task_id)
        .await
        .map_err(at(Stage::Matching))?;

    debug!(external_id = %worklog.external_id, stage = "writing", "worklog state");
    let line_id = TimesheetWriter::new(engine.erp)
        .write(worklog, &task)
        .await
        .map_err(at(Stage::Writing))?;
    Ok(SyncOutcome::Created { line_id })
}
