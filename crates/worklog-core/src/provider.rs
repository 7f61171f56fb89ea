use crate::error::RemoteError;
use crate::model::{
    ExistingLine, IssueMetadata, IssueReference, ResolvedTask, Service, TaskId, TimeWindow,
    TimesheetLine, WorklogBatch,
};
use crate::report::RunReport;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

pub type RemoteFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, RemoteError>> + 'a>>;

fn noop_raw_waker() -> RawWaker {
    unsafe fn clone(_: *const ()) -> RawWaker {
        noop_raw_waker()
    }
    unsafe fn wake(_: *const ()) {}
    unsafe fn wake_by_ref(_: *const ()) {}
    unsafe fn drop(_: *const ()) {}
    RawWaker::new(
        std::ptr::null(),
        &RawWakerVTable::new(clone, wake, wake_by_ref, drop),
    )
}

/// Drives a future on the current thread. Only suitable for futures that do
/// not depend on a reactor, such as the in-memory collaborators.
pub fn block_on<F: Future>(future: F) -> F::Output {
    let waker = unsafe { Waker::from_raw(noop_raw_waker()) };
    let mut future = std::pin::pin!(future);
    let mut cx = Context::from_waker(&waker);
    loop {
        match Future::poll(future.as_mut(), &mut cx) {
            Poll::Ready(value) => return value,
            Poll::Pending => std::thread::yield_now(),
        }
    }
}

pub trait WorklogSource {
    fn fetch_worklogs<'a>(&'a self, window: &'a TimeWindow) -> RemoteFuture<'a, WorklogBatch>;
    fn health_check(&self) -> RemoteFuture<'_, ()>;
}

pub trait IssueSource {
    /// `Ok(None)` when the tracker reports that the issue does not exist.
    fn fetch_issue<'a>(
        &'a self,
        issue: &'a IssueReference,
    ) -> RemoteFuture<'a, Option<IssueMetadata>>;
    fn health_check(&self) -> RemoteFuture<'_, ()>;
}

pub trait ErpClient {
    fn find_task(&self, task_id: TaskId) -> RemoteFuture<'_, Option<ResolvedTask>>;
    fn find_timesheet_by_external_id<'a>(
        &'a self,
        external_id: &'a str,
    ) -> RemoteFuture<'a, Option<ExistingLine>>;
    fn create_timesheet_line<'a>(&'a self, line: &'a TimesheetLine) -> RemoteFuture<'a, u64>;
    fn health_check(&self) -> RemoteFuture<'_, ()>;
}

pub trait Notifier {
    fn send_report<'a>(&'a self, report: &'a RunReport) -> RemoteFuture<'a, ()>;
    fn is_configured(&self) -> bool {
        true
    }
}

/// Notifier used when no transport is configured; reports are only logged.
pub struct DisabledNotifier;

impl Notifier for DisabledNotifier {
    fn send_report<'a>(&'a self, report: &'a RunReport) -> RemoteFuture<'a, ()> {
        Box::pin(async move {
            tracing::info!(subject = %report.subject, "notifications disabled; report not sent");
            Ok(())
        })
    }

    fn is_configured(&self) -> bool {
        false
    }
}

pub fn connectivity_error(service: Service, message: impl Into<String>) -> RemoteError {
    RemoteError::Connectivity {
        service,
        message: message.into(),
    }
}
