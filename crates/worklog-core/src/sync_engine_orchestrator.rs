use crate::error::RunError;
use crate::model::{TimeWindow, WorklogRecord};
use crate::sync_engine::{SyncAction, SyncEngine, SyncProgressReporter};
use crate::sync_engine_status::emit_sync_status;
use crate::sync_engine_types::{StatusEmitterState, SyncRun};
use crate::sync_engine_workers::run_work_items;
use time::OffsetDateTime;
use tracing::{error, info, warn};

pub(crate) async fn run_sync_orchestrated(
    engine: &SyncEngine<'_>,
    window: &TimeWindow,
    progress: Option<&SyncProgressReporter<'_>>,
) -> Result<SyncRun, RunError> {
    let mut state = SyncRunState {
        run: SyncRun::start(*window),
        status: StatusEmitterState {
            total: 0,
            processed: 0,
        },
    };
    emit_lifecycle_status(&state, progress, SyncAction::Starting);
    info!(run_id = %state.run.run_id, window = %window, "starting sync run");

    let worklogs = fetch_phase(engine, window, progress, &mut state).await?;
    let SyncRunState { run, status } = &mut state;
    run_work_items(engine, run, status, progress, worklogs).await;
    Ok(finalize_phase(progress, state))
}

async fn fetch_phase(
    engine: &SyncEngine<'_>,
    window: &TimeWindow,
    progress: Option<&SyncProgressReporter<'_>>,
    state: &mut SyncRunState,
) -> Result<Vec<WorklogRecord>, RunError> {
    let batch = engine
        .worklogs
        .fetch_worklogs(window)
        .await
        .map_err(|err| {
            error!(run_id = %state.run.run_id, error = %err, "could not fetch worklogs; aborting run");
            RunError::SourceUnavailable(err)
        })?;
    info!(run_id = %state.run.run_id, count = batch.records.len(), "fetched worklogs");
    if batch.dropped > 0 {
        warn!(run_id = %state.run.run_id, dropped = batch.dropped, "worklog source returned unreadable entries");
    }
    state.run.fetched = batch.records.len();
    state.run.dropped = batch.dropped;
    state.status.total = batch.records.len();
    emit_lifecycle_status(state, progress, SyncAction::Fetched);
    Ok(batch.records)
}

fn finalize_phase(progress: Option<&SyncProgressReporter<'_>>, mut state: SyncRunState) -> SyncRun {
    state.run.finished_at = Some(OffsetDateTime::now_utc());
    emit_lifecycle_status(&state, progress, SyncAction::Done);
    let summary = state.run.summary;
    info!(
        run_id = %state.run.run_id,
        created = summary.created,
        skipped_duplicate = summary.skipped_duplicate,
        skipped_unresolved = summary.skipped_unresolved,
        failed = summary.failed,
        duration_secs = state.run.duration_secs(),
        "sync run completed"
    );
    state.run
}

fn emit_lifecycle_status(
    state: &SyncRunState,
    progress: Option<&SyncProgressReporter<'_>>,
    action: SyncAction,
) {
    emit_sync_status(progress, &state.status, action, None, state.run.summary);
}

struct SyncRunState {
    run: SyncRun,
    status: StatusEmitterState,
}
