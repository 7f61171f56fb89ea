//! Reconciliation of one worklog batch into ERP timesheet lines.
//!
//! A run assumes it is the only run working on its time window; overlapping
//! runs are prevented by the caller (see [`crate::daemon`]), not here. The
//! duplicate-check query against the ERP is what keeps re-runs idempotent.

use crate::config::SyncConfig;
use crate::error::RunError;
use crate::extract::ExtractRule;
use crate::model::{Service, TimeWindow};
use crate::provider::{ErpClient, IssueSource, WorklogSource};
use crate::sync_engine_orchestrator::run_sync_orchestrated;
use crate::sync_engine_types::{SyncRun, SyncSummary};
use tracing::warn;

pub type SyncProgressReporter<'a> = dyn Fn(SyncProgress) + 'a;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SyncAction {
    Starting,
    Fetched,
    Processing,
    Created,
    SkippedDuplicate,
    SkippedUnresolved,
    Failed,
    Done,
}

impl SyncAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncAction::Starting => "starting",
            SyncAction::Fetched => "fetched",
            SyncAction::Processing => "processing",
            SyncAction::Created => "created",
            SyncAction::SkippedDuplicate => "skipped_duplicate",
            SyncAction::SkippedUnresolved => "skipped_unresolved",
            SyncAction::Failed => "failed",
            SyncAction::Done => "done",
        }
    }
}

#[derive(Clone, Debug)]
pub struct SyncProgress {
    pub total: usize,
    pub processed: usize,
    pub action: SyncAction,
    pub external_id: Option<String>,
    pub issue: Option<String>,
    pub summary: SyncSummary,
}

pub struct SyncEngine<'a> {
    pub(crate) worklogs: &'a dyn WorklogSource,
    pub(crate) issues: &'a dyn IssueSource,
    pub(crate) erp: &'a dyn ErpClient,
    pub(crate) rule: ExtractRule,
    pub(crate) follow_parent: bool,
}

impl<'a> SyncEngine<'a> {
    pub fn new(
        worklogs: &'a dyn WorklogSource,
        issues: &'a dyn IssueSource,
        erp: &'a dyn ErpClient,
        config: &SyncConfig,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            worklogs,
            issues,
            erp,
            rule: config.extract_rule()?,
            follow_parent: config.follow_parent,
        })
    }

    pub async fn run_sync(&self, window: &TimeWindow) -> Result<SyncRun, RunError> {
        run_sync_orchestrated(self, window, None).await
    }

    pub async fn run_sync_with_progress(
        &self,
        window: &TimeWindow,
        progress: &SyncProgressReporter<'_>,
    ) -> Result<SyncRun, RunError> {
        run_sync_orchestrated(self, window, Some(progress)).await
    }

    /// Probes each remote service once; never fails as a whole.
    pub async fn test_connections(&self) -> ConnectionReport {
        let checks = [
            (Service::Worklogs, self.worklogs.health_check().await),
            (Service::Issues, self.issues.health_check().await),
            (Service::Erp, self.erp.health_check().await),
        ];
        let services = checks
            .into_iter()
            .map(|(service, result)| match result {
                Ok(()) => ServiceHealth {
                    service,
                    ok: true,
                    error: None,
                },
                Err(err) => {
                    warn!(service = %service, error = %err, "connection check failed");
                    ServiceHealth {
                        service,
                        ok: false,
                        error: Some(err.to_string()),
                    }
                }
            })
            .collect();
        ConnectionReport { services }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ServiceHealth {
    pub service: Service,
    pub ok: bool,
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ConnectionReport {
    pub services: Vec<ServiceHealth>,
}

impl ConnectionReport {
    pub fn all_ok(&self) -> bool {
        self.services.iter().all(|health| health.ok)
    }

    pub fn is_ok(&self, service: Service) -> bool {
        self.services
            .iter()
            .any(|health| health.service == service && health.ok)
    }
}
