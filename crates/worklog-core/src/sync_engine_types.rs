use crate::error::SyncError;
use crate::model::{IssueReference, TimeWindow, WorklogRecord};
use serde::Serialize;
use time::OffsetDateTime;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedReason {
    NoMatch,
    TaskNotFound,
}

/// Terminal state of one worklog in one run.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SyncOutcome {
    Created { line_id: u64 },
    SkippedDuplicate,
    SkippedUnresolved { reason: UnresolvedReason },
    Failed,
}

impl SyncOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncOutcome::Created { .. } => "created",
            SyncOutcome::SkippedDuplicate => "skipped_duplicate",
            SyncOutcome::SkippedUnresolved { .. } => "skipped_unresolved",
            SyncOutcome::Failed => "failed",
        }
    }
}

/// Pipeline step a worklog was in when it stopped.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validating,
    CheckingDuplicate,
    Resolving,
    Matching,
    Writing,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Validating => "validating",
            Stage::Resolving => "resolving",
            Stage::Matching => "matching",
            Stage::CheckingDuplicate => "checking_duplicate",
            Stage::Writing => "writing",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FailedEntry {
    pub worklog: WorklogRecord,
    pub stage: Stage,
    pub error: SyncError,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RecordOutcome {
    pub external_id: String,
    pub issue: IssueReference,
    pub outcome: SyncOutcome,
}

#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Serialize)]
pub struct SyncSummary {
    pub created: u32,
    pub skipped_duplicate: u32,
    pub skipped_unresolved: u32,
    pub unresolved_no_match: u32,
    pub unresolved_task_not_found: u32,
    pub failed: u32,
}

impl SyncSummary {
    pub(crate) fn record(&mut self, outcome: SyncOutcome) {
        match outcome {
            SyncOutcome::Created { .. } => self.created += 1,
            SyncOutcome::SkippedDuplicate => self.skipped_duplicate += 1,
            SyncOutcome::SkippedUnresolved { reason } => {
                self.skipped_unresolved += 1;
                match reason {
                    UnresolvedReason::NoMatch => self.unresolved_no_match += 1,
                    UnresolvedReason::TaskNotFound => self.unresolved_task_not_found += 1,
                }
            }
            SyncOutcome::Failed => self.failed += 1,
        }
    }

    pub fn processed(&self) -> u32 {
        self.created + self.skipped_duplicate + self.skipped_unresolved + self.failed
    }
}

pub fn new_run_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Statistics of one run. Owned by the orchestrator until the run ends.
#[derive(Clone, Debug)]
pub struct SyncRun {
    pub run_id: String,
    pub window: TimeWindow,
    pub started_at: OffsetDateTime,
    pub finished_at: Option<OffsetDateTime>,
    pub fetched: usize,
    /// Entries the worklog source could not read; never processed.
    pub dropped: usize,
    pub summary: SyncSummary,
    pub outcomes: Vec<RecordOutcome>,
    pub failures: Vec<FailedEntry>,
}

impl SyncRun {
    pub(crate) fn start(window: TimeWindow) -> Self {
        Self {
            run_id: new_run_id(),
            window,
            started_at: OffsetDateTime::now_utc(),
            finished_at: None,
            fetched: 0,
            dropped: 0,
            summary: SyncSummary::default(),
            outcomes: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn duration_secs(&self) -> f64 {
        self.finished_at
            .map(|end| (end - self.started_at).as_seconds_f64())
            .unwrap_or_default()
    }

    pub fn outcome_for(&self, external_id: &str) -> Option<SyncOutcome> {
        self.outcomes
            .iter()
            .find(|record| record.external_id == external_id)
            .map(|record| record.outcome)
    }
}

pub(crate) struct StatusEmitterState {
    pub(crate) total: usize,
    pub(crate) processed: usize,
}

pub(crate) fn outcome_for_error(error: &SyncError) -> SyncOutcome {
    match error {
        SyncError::NoMatch { .. } => SyncOutcome::SkippedUnresolved {
            reason: UnresolvedReason::NoMatch,
        },
        SyncError::TaskNotFound { .. } => SyncOutcome::SkippedUnresolved {
            reason: UnresolvedReason::TaskNotFound,
        },
        _ => SyncOutcome::Failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteError;
    use crate::model::{Service, TaskId};

    #[test]
    fn summary_counts_unresolved_reasons() {
        let mut summary = SyncSummary::default();
        summary.record(SyncOutcome::Created { line_id: 1 });
        summary.record(SyncOutcome::SkippedUnresolved {
            reason: UnresolvedReason::NoMatch,
        });
        summary.record(SyncOutcome::SkippedUnresolved {
            reason: UnresolvedReason::TaskNotFound,
        });
        summary.record(SyncOutcome::Failed);
        assert_eq!(summary.skipped_unresolved, 2);
        assert_eq!(summary.unresolved_no_match, 1);
        assert_eq!(summary.unresolved_task_not_found, 1);
        assert_eq!(summary.processed(), 4);
    }

    #[test]
    fn errors_map_to_outcomes() {
        let missing = SyncError::TaskNotFound { task_id: TaskId(4) };
        assert_eq!(
            outcome_for_error(&missing),
            SyncOutcome::SkippedUnresolved {
                reason: UnresolvedReason::TaskNotFound
            }
        );
        let write = SyncError::Write(RemoteError::Rejected {
            service: Service::Erp,
            message: "bad".into(),
        });
        assert_eq!(outcome_for_error(&write), SyncOutcome::Failed);
    }
}
