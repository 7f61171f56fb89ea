use crate::error::SyncError;
use crate::model::{ResolvedTask, TaskId};
use crate::provider::ErpClient;

/// Confirms a candidate id against the ERP task table. Never creates tasks.
pub struct TaskMatcher<'a> {
    erp: &'a dyn ErpClient,
}

impl<'a> TaskMatcher<'a> {
    pub fn new(erp: &'a dyn ErpClient) -> Self {
        Self { erp }
    }

    pub async fn confirm(&self, task_id: TaskId) -> Result<ResolvedTask, SyncError> {
        self.erp
            .find_task(task_id)
            .await
            .map_err(SyncError::Transport)?
            .ok_or(SyncError::TaskNotFound { task_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryErp;
    use crate::provider::block_on;

    #[test]
    fn confirms_existing_task() {
        let erp = MemoryErp::new().with_task(42, Some(3), "Website");
        let task = block_on(TaskMatcher::new(&erp).confirm(TaskId(42))).unwrap();
        assert_eq!(task.project_id, Some(3));
        assert_eq!(task.name, "Website");
    }

    #[test]
    fn unknown_task_is_not_found() {
        let erp = MemoryErp::new();
        let err = block_on(TaskMatcher::new(&erp).confirm(TaskId(42))).unwrap_err();
        assert_eq!(err, SyncError::TaskNotFound { task_id: TaskId(42) });
    }

    #[test]
    fn lookup_failure_is_transport() {
        let erp = MemoryErp::new();
        erp.set_offline(true);
        let err = block_on(TaskMatcher::new(&erp).confirm(TaskId(42))).unwrap_err();
        assert!(matches!(err, SyncError::Transport(_)));
    }
}
