use crate::error::RunError;
use crate::model::format_date;
use crate::report::{NotifyReason, RunReport, Severity};
use crate::sync_engine_types::SyncRun;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::warn;

const MAX_BYTES: u64 = 10 * 1024 * 1024;

/// One line of the run history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub ts: String,
    pub run_id: String,
    pub status: RunStatus,
    pub window_from: String,
    pub window_to: String,
    pub fetched: usize,
    pub created: u32,
    pub skipped_duplicate: u32,
    pub skipped_unresolved: u32,
    pub failed: u32,
    pub duration_secs: f64,
    #[serde(default)]
    pub projects: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Aborted,
}

impl HistoryEntry {
    pub fn from_run(run: &SyncRun) -> anyhow::Result<Self> {
        let projects: BTreeSet<String> = run
            .outcomes
            .iter()
            .filter_map(|outcome| outcome.issue.project().map(str::to_string))
            .collect();
        Ok(Self {
            ts: timestamp(run.finished_at.unwrap_or(run.started_at))?,
            run_id: run.run_id.clone(),
            status: RunStatus::Completed,
            window_from: format_date(run.window.from),
            window_to: format_date(run.window.to),
            fetched: run.fetched,
            created: run.summary.created,
            skipped_duplicate: run.summary.skipped_duplicate,
            skipped_unresolved: run.summary.skipped_unresolved,
            failed: run.summary.failed,
            duration_secs: run.duration_secs(),
            projects: projects.into_iter().collect(),
            error: None,
        })
    }

    pub fn aborted(
        run_id: &str,
        window_from: &str,
        window_to: &str,
        error: &RunError,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            ts: timestamp(OffsetDateTime::now_utc())?,
            run_id: run_id.to_string(),
            status: RunStatus::Aborted,
            window_from: window_from.to_string(),
            window_to: window_to.to_string(),
            fetched: 0,
            created: 0,
            skipped_duplicate: 0,
            skipped_unresolved: 0,
            failed: 0,
            duration_secs: 0.0,
            projects: Vec::new(),
            error: Some(error.to_string()),
        })
    }

    fn recorded_at(&self) -> Option<OffsetDateTime> {
        OffsetDateTime::parse(&self.ts, &Rfc3339).ok()
    }
}

/// Append-only JSONL store of run summaries, one file per day, rotated by
/// size.
#[derive(Clone)]
pub struct RunHistory {
    base_dir: PathBuf,
    max_bytes: u64,
}

impl RunHistory {
    pub fn new(base_dir: PathBuf) -> anyhow::Result<Self> {
        Self::new_with_limit(base_dir, MAX_BYTES)
    }

    pub fn new_with_limit(base_dir: PathBuf, max_bytes: u64) -> anyhow::Result<Self> {
        fs::create_dir_all(&base_dir).context("create history dir")?;
        Ok(Self {
            base_dir,
            max_bytes,
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn append(&self, entry: &HistoryEntry) -> anyhow::Result<PathBuf> {
        let date = OffsetDateTime::now_utc()
            .format(&time::format_description::parse("[year][month][day]")?)
            .context("format date")?;
        let path = next_history_path(&self.base_dir, &date, self.max_bytes);
        let line = serde_json::to_string(entry).context("serialize history entry")?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("open history file {}", path.display()))?;
        writeln!(file, "{line}").context("write history entry")?;
        Ok(path)
    }

    /// Entries recorded at or after `since`. Unparseable lines are skipped.
    pub fn entries_since(&self, since: OffsetDateTime) -> anyhow::Result<Vec<HistoryEntry>> {
        let mut files: Vec<PathBuf> = fs::read_dir(&self.base_dir)
            .with_context(|| format!("read history dir {}", self.base_dir.display()))?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| is_history_file(path))
            .collect();
        files.sort();

        let mut entries = Vec::new();
        for path in files {
            let file = fs::File::open(&path)
                .with_context(|| format!("open history file {}", path.display()))?;
            for (index, line) in BufReader::new(file).lines().enumerate() {
                let line = line.with_context(|| format!("read history file {}", path.display()))?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<HistoryEntry>(&line) {
                    Ok(entry) if entry.recorded_at().is_some_and(|ts| ts >= since) => {
                        entries.push(entry)
                    }
                    Ok(_) => {}
                    Err(err) => {
                        warn!(path = %path.display(), line = index + 1, error = %err, "skipping malformed history line")
                    }
                }
            }
        }
        Ok(entries)
    }

    pub fn summarize_days(&self, days: u32, now: OffsetDateTime) -> anyhow::Result<HistorySummary> {
        let since = now - time::Duration::days(i64::from(days));
        let entries = self.entries_since(since)?;
        Ok(HistorySummary::from_entries(days, &entries))
    }
}

/// Aggregate over a number of recorded runs.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct HistorySummary {
    pub days: u32,
    pub runs: u32,
    pub aborted: u32,
    pub created: u64,
    pub skipped_duplicate: u64,
    pub skipped_unresolved: u64,
    pub failed: u64,
    pub mean_duration_secs: f64,
    pub projects: BTreeSet<String>,
}

impl HistorySummary {
    pub fn from_entries(days: u32, entries: &[HistoryEntry]) -> Self {
        let mut summary = Self {
            days,
            ..Self::default()
        };
        let mut completed_duration = 0.0;
        let mut completed = 0u32;
        for entry in entries {
            summary.runs += 1;
            match entry.status {
                RunStatus::Aborted => summary.aborted += 1,
                RunStatus::Completed => {
                    completed += 1;
                    completed_duration += entry.duration_secs;
                }
            }
            summary.created += u64::from(entry.created);
            summary.skipped_duplicate += u64::from(entry.skipped_duplicate);
            summary.skipped_unresolved += u64::from(entry.skipped_unresolved);
            summary.failed += u64::from(entry.failed);
            summary.projects.extend(entry.projects.iter().cloned());
        }
        if completed > 0 {
            summary.mean_duration_secs = completed_duration / f64::from(completed);
        }
        summary
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Sync activity over the last {} day(s)", self.days);
        let _ = writeln!(out, "  runs:               {} ({} aborted)", self.runs, self.aborted);
        let _ = writeln!(out, "  created:            {}", self.created);
        let _ = writeln!(out, "  skipped duplicate:  {}", self.skipped_duplicate);
        let _ = writeln!(out, "  skipped unresolved: {}", self.skipped_unresolved);
        let _ = writeln!(out, "  failed:             {}", self.failed);
        let _ = writeln!(out, "  mean duration:      {:.1}s", self.mean_duration_secs);
        if self.projects.is_empty() {
            let _ = writeln!(out, "  projects:           none");
        } else {
            let projects: Vec<&str> = self.projects.iter().map(String::as_str).collect();
            let _ = writeln!(out, "  projects:           {}", projects.join(", "));
        }
        out
    }

    pub fn to_report(&self, prefix: &str) -> RunReport {
        RunReport {
            subject: format!("{prefix} Sync summary: last {} day(s)", self.days),
            body: self.render(),
            severity: Severity::Normal,
            reason: NotifyReason::PeriodicSummary,
            summary: None,
            critical: Vec::new(),
            normal: Vec::new(),
        }
    }
}

fn timestamp(at: OffsetDateTime) -> anyhow::Result<String> {
    at.format(&Rfc3339).context("format timestamp")
}

fn is_history_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with("history-") && name.ends_with(".jsonl"))
}

fn next_history_path(base_dir: &Path, date: &str, max_bytes: u64) -> PathBuf {
    let mut suffix = 0;
    loop {
        let name = if suffix == 0 {
            format!("history-{date}.jsonl")
        } else {
            format!("history-{date}-{suffix}.jsonl")
        };
        let path = base_dir.join(name);
        if let Ok(metadata) = fs::metadata(&path)
            && metadata.len() >= max_bytes
        {
            suffix += 1;
            continue;
        }
        return path;
    }
}
