use crate::error::SyncError;
use crate::model::{ResolvedTask, TimesheetLine, WorklogRecord};
use crate::provider::ErpClient;
use tracing::info;

const UNKNOWN_AUTHOR: &str = "Unknown";

/// Seconds to hours, rounded to two decimals (±0.01h of the exact value).
pub fn seconds_to_hours(seconds: u64) -> f64 {
    (seconds as f64 / 3600.0 * 100.0).round() / 100.0
}

/// Builds the line for a worklog. The external id stamp is what the
/// duplicate checker looks up on later runs.
pub fn build_line(worklog: &WorklogRecord, task: &ResolvedTask) -> TimesheetLine {
    let author = worklog
        .author
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty() && *name != UNKNOWN_AUTHOR)
        .map(str::to_string);
    let base = match worklog.description.trim() {
        "" => format!("Work on {}", worklog.issue),
        text => text.to_string(),
    };
    let name = match &author {
        Some(author) => format!("{base} (by {author})"),
        None => base,
    };
    TimesheetLine {
        task_id: task.task_id,
        project_id: task.project_id,
        hours: seconds_to_hours(worklog.time_spent_seconds),
        date: worklog.date,
        name,
        author,
        external_id: worklog.external_id.clone(),
    }
}

pub struct TimesheetWriter<'a> {
    erp: &'a dyn ErpClient,
}

impl<'a> TimesheetWriter<'a> {
    pub fn new(erp: &'a dyn ErpClient) -> Self {
        Self { erp }
    }

    pub async fn write(
        &self,
        worklog: &WorklogRecord,
        task: &ResolvedTask,
    ) -> Result<u64, SyncError> {
        let line = build_line(worklog, task);
        let line_id = self
            .erp
            .create_timesheet_line(&line)
            .await
            .map_err(SyncError::Write)?;
        info!(
            external_id = %line.external_id,
            task_id = %line.task_id,
            hours = line.hours,
            line_id,
            "created timesheet line"
        );
        Ok(line_id)
    }
}
