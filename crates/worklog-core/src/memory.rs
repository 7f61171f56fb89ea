//! In-memory collaborators for tests and offline dry runs.

use crate::error::RemoteError;
use crate::model::{
    ExistingLine, IssueMetadata, IssueReference, ResolvedTask, Service, TaskId, TimeWindow,
    TimesheetLine, WorklogBatch, WorklogRecord,
};
use crate::provider::{
    ErpClient, IssueSource, Notifier, RemoteFuture, WorklogSource, connectivity_error,
};
use crate::report::RunReport;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

#[derive(Default)]
pub struct MemoryWorklogSource {
    worklogs: Vec<WorklogRecord>,
    dropped: usize,
    failure: Option<RemoteError>,
}

impl MemoryWorklogSource {
    pub fn new(worklogs: Vec<WorklogRecord>) -> Self {
        Self {
            worklogs,
            dropped: 0,
            failure: None,
        }
    }

    /// Reports `dropped` unusable entries alongside the records.
    pub fn with_dropped(mut self, dropped: usize) -> Self {
        self.dropped = dropped;
        self
    }

    pub fn failing(error: RemoteError) -> Self {
        Self {
            worklogs: Vec::new(),
            dropped: 0,
            failure: Some(error),
        }
    }
}

impl WorklogSource for MemoryWorklogSource {
    fn fetch_worklogs<'a>(
        &'a self,
        window: &'a TimeWindow,
    ) -> RemoteFuture<'a, WorklogBatch> {
        Box::pin(async move {
            if let Some(err) = &self.failure {
                return Err(err.clone());
            }
            Ok(WorklogBatch {
                records: self
                    .worklogs
                    .iter()
                    .filter(|worklog| window.contains(worklog.date))
                    .cloned()
                    .collect(),
                dropped: self.dropped,
            })
        })
    }

    fn health_check(&self) -> RemoteFuture<'_, ()> {
        Box::pin(async move {
            match &self.failure {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            }
        })
    }
}

#[derive(Default)]
pub struct MemoryIssueSource {
    issues: HashMap<String, IssueMetadata>,
    failures: HashMap<String, RemoteError>,
    fetches: Cell<usize>,
}

impl MemoryIssueSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_issue(mut self, issue: IssueMetadata) -> Self {
        self.issues.insert(issue.key.clone(), issue);
        self
    }

    pub fn with_failure(mut self, key: &str, error: RemoteError) -> Self {
        self.failures.insert(key.to_string(), error);
        self
    }

    pub fn fetches(&self) -> usize {
        self.fetches.get()
    }
}

impl IssueSource for MemoryIssueSource {
    fn fetch_issue<'a>(
        &'a self,
        issue: &'a IssueReference,
    ) -> RemoteFuture<'a, Option<IssueMetadata>> {
        Box::pin(async move {
            self.fetches.set(self.fetches.get() + 1);
            if let Some(err) = self.failures.get(issue.as_str()) {
                return Err(err.clone());
            }
            Ok(self.issues.get(issue.as_str()).cloned())
        })
    }

    fn health_check(&self) -> RemoteFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }
}

#[derive(Default)]
pub struct MemoryErp {
    tasks: HashMap<u64, ResolvedTask>,
    existing: RefCell<Vec<ExistingLine>>,
    lines: RefCell<Vec<(u64, TimesheetLine)>>,
    create_failures: HashMap<String, RemoteError>,
    create_calls: Cell<usize>,
    offline: Cell<bool>,
    next_id: Cell<u64>,
}

impl MemoryErp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_task(mut self, task_id: u64, project_id: Option<u64>, name: &str) -> Self {
        self.tasks.insert(
            task_id,
            ResolvedTask {
                task_id: TaskId(task_id),
                project_id,
                name: name.to_string(),
            },
        );
        self
    }

    /// Registers a line that was created before this client existed.
    pub fn with_existing_line(self, external_id: &str) -> Self {
        let line_id = self.allocate_id();
        self.existing.borrow_mut().push(ExistingLine {
            line_id,
            external_id: external_id.to_string(),
        });
        self
    }

    pub fn with_create_failure(mut self, external_id: &str, error: RemoteError) -> Self {
        self.create_failures.insert(external_id.to_string(), error);
        self
    }

    /// Every call fails with a connectivity error while offline.
    pub fn set_offline(&self, offline: bool) {
        self.offline.set(offline);
    }

    pub fn lines(&self) -> Vec<(u64, TimesheetLine)> {
        self.lines.borrow().clone()
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.get()
    }

    fn allocate_id(&self) -> u64 {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        id
    }

    fn check_online(&self) -> Result<(), RemoteError> {
        if self.offline.get() {
            return Err(connectivity_error(Service::Erp, "connection refused"));
        }
        Ok(())
    }
}

impl ErpClient for MemoryErp {
    fn find_task(&self, task_id: TaskId) -> RemoteFuture<'_, Option<ResolvedTask>> {
        Box::pin(async move {
            self.check_online()?;
            Ok(self.tasks.get(&task_id.0).cloned())
        })
    }

    fn find_timesheet_by_external_id<'a>(
        &'a self,
        external_id: &'a str,
    ) -> RemoteFuture<'a, Option<ExistingLine>> {
        Box::pin(async move {
            self.check_online()?;
            let existing = self
                .existing
                .borrow()
                .iter()
                .find(|line| line.external_id == external_id)
                .cloned();
            let created = || {
                self.lines
                    .borrow()
                    .iter()
                    .find(|(_, line)| line.external_id == external_id)
                    .map(|(line_id, line)| ExistingLine {
                        line_id: *line_id,
                        external_id: line.external_id.clone(),
                    })
            };
            Ok(existing.or_else(created))
        })
    }

    fn create_timesheet_line<'a>(&'a self, line: &'a TimesheetLine) -> RemoteFuture<'a, u64> {
        Box::pin(async move {
            self.create_calls.set(self.create_calls.get() + 1);
            self.check_online()?;
            if let Some(err) = self.create_failures.get(&line.external_id) {
                return Err(err.clone());
            }
            let line_id = self.allocate_id();
            self.lines.borrow_mut().push((line_id, line.clone()));
            Ok(line_id)
        })
    }

    fn health_check(&self) -> RemoteFuture<'_, ()> {
        Box::pin(async move { self.check_online() })
    }
}

#[derive(Default)]
pub struct MemoryNotifier {
    sent: RefCell<Vec<RunReport>>,
    fail: bool,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            sent: RefCell::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<RunReport> {
        self.sent.borrow().clone()
    }
}

impl Notifier for MemoryNotifier {
    fn send_report<'a>(&'a self, report: &'a RunReport) -> RemoteFuture<'a, ()> {
        Box::pin(async move {
            if self.fail {
                return Err(connectivity_error(Service::Notifier, "smtp relay refused"));
            }
            self.sent.borrow_mut().push(report.clone());
            Ok(())
        })
    }
}
