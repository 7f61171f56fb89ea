use crate::model::{IssueReference, Service, TaskId};
use thiserror::Error;

/// Failure reported by one of the remote collaborators.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum RemoteError {
    #[error("{service} authentication failed: {message}")]
    Auth { service: Service, message: String },
    #[error("{service} unreachable: {message}")]
    Connectivity { service: Service, message: String },
    #[error("{service} rejected the request: {message}")]
    Rejected { service: Service, message: String },
    #[error("{service} returned an unexpected response: {message}")]
    Protocol { service: Service, message: String },
}

impl RemoteError {
    pub fn service(&self) -> Service {
        match self {
            RemoteError::Auth { service, .. }
            | RemoteError::Connectivity { service, .. }
            | RemoteError::Rejected { service, .. }
            | RemoteError::Protocol { service, .. } => *service,
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, RemoteError::Auth { .. })
    }

    pub fn is_connectivity(&self) -> bool {
        matches!(self, RemoteError::Connectivity { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RemoteError::Auth { .. } => "auth",
            RemoteError::Connectivity { .. } => "connectivity",
            RemoteError::Rejected { .. } => "rejected",
            RemoteError::Protocol { .. } => "protocol",
        }
    }
}

/// Per-worklog failure. Converted into an outcome by the orchestrator and
/// never propagated out of a run.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum SyncError {
    #[error("could not fetch issue {issue}: {source}")]
    Resolution {
        issue: IssueReference,
        #[source]
        source: RemoteError,
    },
    #[error("no ERP task reference found on issue {issue}")]
    NoMatch { issue: IssueReference },
    #[error("ERP task {task_id} does not exist")]
    TaskNotFound { task_id: TaskId },
    #[error("ERP request failed: {0}")]
    Transport(#[source] RemoteError),
    #[error("timesheet write failed: {0}")]
    Write(#[source] RemoteError),
    #[error("invalid worklog record: {0}")]
    InvalidRecord(String),
}

impl SyncError {
    /// NoMatch and TaskNotFound end a worklog as Skipped-Unresolved.
    pub fn is_unresolved(&self) -> bool {
        matches!(self, SyncError::NoMatch { .. } | SyncError::TaskNotFound { .. })
    }

    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            SyncError::Resolution { source, .. } => Some(source),
            SyncError::Transport(source) | SyncError::Write(source) => Some(source),
            SyncError::NoMatch { .. }
            | SyncError::TaskNotFound { .. }
            | SyncError::InvalidRecord(_) => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::Resolution { .. } => "resolution",
            SyncError::NoMatch { .. } => "no_match",
            SyncError::TaskNotFound { .. } => "task_not_found",
            SyncError::Transport(_) => "transport",
            SyncError::Write(_) => "write",
            SyncError::InvalidRecord(_) => "invalid_record",
        }
    }
}

/// Failure that prevents a run from starting at all.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum RunError {
    #[error("worklog batch could not be fetched: {0}")]
    SourceUnavailable(#[source] RemoteError),
}
