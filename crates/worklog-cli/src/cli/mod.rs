use crate::logging;
use anyhow::Context;
use clap::Parser;
use std::cell::Cell;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use time::{Date, OffsetDateTime};
use tracing::{info, warn};
use worklog_core::config::{
    AppConfig, SyncConfig, default_config_path, default_history_dir, default_lock_path,
    default_state_path,
};
use worklog_core::daemon::{DaemonSchedule, LockedRun, run_once_with_lock};
use worklog_core::history::{HistoryEntry, RunHistory};
use worklog_core::lockfile::lock_holder;
use worklog_core::model::{TimeWindow, format_date, parse_date};
use worklog_core::provider::{DisabledNotifier, Notifier};
use worklog_core::report::{ReportDecision, Reporter, render_summary};
use worklog_core::sync_engine::{ConnectionReport, SyncAction, SyncProgress};
use worklog_core::sync_engine_types::{SyncRun, new_run_id};
use worklog_providers::{Collaborators, notifier_for};

mod app;
mod args;
mod config_cmd;
mod daemon_cmd;
mod health_cmd;
mod history_cmd;
mod shared;
mod sync_cmd;

use args::*;

use config_cmd::handle_config;
use daemon_cmd::handle_daemon;
use health_cmd::handle_health;
use history_cmd::handle_history;
use shared::{RunContext, execute_run, load_config, resolve_path, resolve_window};
use sync_cmd::handle_sync;

/// How a command ended, mapped onto the process exit status.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Outcome {
    /// The command did its work; skipped or failed worklogs still count.
    Completed,
    /// A run could not start, or a connection check failed.
    RunFatal,
}

pub(crate) const EXIT_USAGE: u8 = 1;
pub(crate) const EXIT_RUN_FATAL: u8 = 2;

impl Outcome {
    pub(crate) fn exit_code(self) -> u8 {
        match self {
            Outcome::Completed => 0,
            Outcome::RunFatal => EXIT_RUN_FATAL,
        }
    }
}

pub async fn run() -> ExitCode {
    app::run().await
}
