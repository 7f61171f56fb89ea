use crate::error::SyncError;
use crate::provider::ErpClient;
use tracing::debug;

/// Looks up an existing timesheet line by the exact worklog id.
///
/// This query is what makes re-running a window idempotent, so an error is
/// returned as-is and never treated as "not synced yet".
pub struct DuplicateChecker<'a> {
    erp: &'a dyn ErpClient,
}

impl<'a> DuplicateChecker<'a> {
    pub fn new(erp: &'a dyn ErpClient) -> Self {
        Self { erp }
    }

    pub async fn already_synced(&self, external_id: &str) -> Result<bool, SyncError> {
        let existing = self
            .erp
            .find_timesheet_by_external_id(external_id)
            .await
            .map_err(SyncError::Transport)?;
        if let Some(line) = &existing {
            debug!(external_id, line_id = line.line_id, "timesheet line already exists");
        }
        Ok(existing.is_some())
    }
}
