use serde::{Deserialize, Serialize};
use std::fmt;
use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Service {
    Worklogs,
    Issues,
    Erp,
    Notifier,
}

impl Service {
    pub fn as_str(&self) -> &'static str {
        match self {
            Service::Worklogs => "worklogs",
            Service::Issues => "issues",
            Service::Erp => "erp",
            Service::Notifier => "notifier",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Issue key (`PROJ-5`) or numeric issue id; the tracker accepts either.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct IssueReference(String);

impl IssueReference {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Project prefix of a `PROJ-5` style key.
    pub fn project(&self) -> Option<&str> {
        self.0
            .split_once('-')
            .map(|(prefix, _)| prefix)
            .filter(|prefix| !prefix.is_empty())
    }
}

impl fmt::Display for IssueReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct WorklogRecord {
    pub external_id: String,
    pub issue: IssueReference,
    pub time_spent_seconds: u64,
    pub date: Date,
    pub author: Option<String>,
    pub description: String,
}

/// One fetched batch. `dropped` counts entries the source returned but could
/// not turn into records.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WorklogBatch {
    pub records: Vec<WorklogRecord>,
    pub dropped: usize,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct IssueMetadata {
    pub key: String,
    pub summary: String,
    pub description: String,
    /// Value of the dedicated task-link custom field, when set.
    pub task_link: Option<String>,
    pub parent_key: Option<String>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedTask {
    pub task_id: TaskId,
    pub project_id: Option<u64>,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExistingLine {
    pub line_id: u64,
    pub external_id: String,
}

/// Everything the ERP needs to create one timesheet line.
#[derive(Clone, Debug, PartialEq)]
pub struct TimesheetLine {
    pub task_id: TaskId,
    pub project_id: Option<u64>,
    pub hours: f64,
    pub date: Date,
    pub name: String,
    pub author: Option<String>,
    pub external_id: String,
}

/// Inclusive range of worklog dates fetched by one run.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TimeWindow {
    pub from: Date,
    pub to: Date,
}

impl TimeWindow {
    pub fn new(from: Date, to: Date) -> anyhow::Result<Self> {
        if from > to {
            anyhow::bail!("time window start {from} is after end {to}");
        }
        Ok(Self { from, to })
    }

    pub fn lookback(now: OffsetDateTime, hours: u32) -> Self {
        let start = now - Duration::hours(i64::from(hours));
        Self {
            from: start.date(),
            to: now.date(),
        }
    }

    pub fn contains(&self, date: Date) -> bool {
        self.from <= date && date <= self.to
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", format_date(self.from), format_date(self.to))
    }
}

pub fn format_date(date: Date) -> String {
    date.format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| date.to_string())
}

pub fn parse_date(value: &str) -> anyhow::Result<Date> {
    Date::parse(value, format_description!("[year]-[month]-[day]"))
        .map_err(|err| anyhow::anyhow!("invalid date {value:?}: {err}"))
}
