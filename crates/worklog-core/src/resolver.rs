use crate::error::SyncError;
use crate::extract::{ExtractRule, extract_task_id};
use crate::model::{IssueMetadata, IssueReference, TaskId};
use crate::provider::IssueSource;
use tracing::{debug, info};

#[derive(Clone, Debug, PartialEq)]
pub struct TaskCandidate {
    pub task_id: TaskId,
    /// Parent issue the id was taken from, when the issue itself had none.
    pub via_parent: Option<String>,
}

pub struct IssueResolver<'a> {
    issues: &'a dyn IssueSource,
    rule: &'a ExtractRule,
    follow_parent: bool,
}

impl<'a> IssueResolver<'a> {
    pub fn new(issues: &'a dyn IssueSource, rule: &'a ExtractRule, follow_parent: bool) -> Self {
        Self {
            issues,
            rule,
            follow_parent,
        }
    }

    pub async fn resolve(&self, issue: &IssueReference) -> Result<TaskCandidate, SyncError> {
        let no_match = || SyncError::NoMatch {
            issue: issue.clone(),
        };
        let Some(metadata) = self.fetch(issue, issue).await? else {
            info!(issue = %issue, "issue not found in tracker");
            return Err(no_match());
        };
        if let Some(task_id) = extract_task_id(&metadata, self.rule) {
            return Ok(TaskCandidate {
                task_id,
                via_parent: None,
            });
        }

        let parent = metadata.parent_key.filter(|_| self.follow_parent);
        if let Some(parent_key) = parent {
            debug!(issue = %issue, parent = %parent_key, "checking parent issue for task link");
            let parent_ref = IssueReference::new(parent_key.clone());
            if let Some(parent_meta) = self.fetch(&parent_ref, issue).await?
                && let Some(task_id) = extract_task_id(&parent_meta, self.rule)
            {
                return Ok(TaskCandidate {
                    task_id,
                    via_parent: Some(parent_key),
                });
            }
        }
        Err(no_match())
    }

    async fn fetch(
        &self,
        target: &IssueReference,
        origin: &IssueReference,
    ) -> Result<Option<IssueMetadata>, SyncError> {
        self.issues
            .fetch_issue(target)
            .await
            .map_err(|source| SyncError::Resolution {
                issue: origin.clone(),
                source,
            })
    }
}
