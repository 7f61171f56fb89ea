//! Locates the ERP task id embedded in issue metadata.
//!
//! Pure functions only; the resolver owns all I/O around them.

use crate::model::{IssueMetadata, TaskId};
use regex::Regex;

pub const DEFAULT_PATH_SEGMENT: &str = "task";
pub const DEFAULT_TASK_MODEL: &str = "project.task";

#[derive(Clone, Debug)]
pub struct ExtractRule {
    model: String,
    segment_id: Regex,
    param_id: Regex,
    param_model: Regex,
}

impl ExtractRule {
    pub fn new(path_segment: &str, model: &str) -> anyhow::Result<Self> {
        let segment = path_segment.trim_matches('/');
        if segment.is_empty() {
            anyhow::bail!("task path segment must not be empty");
        }
        Ok(Self {
            model: model.to_string(),
            segment_id: Regex::new(&format!(r"/{}/(\d+)(?:[/?#&]|$)", regex::escape(segment)))?,
            param_id: Regex::new(r"[#?&]id=(\d+)(?:&|$)")?,
            param_model: Regex::new(r"[#?&]model=([^&#\s]+)")?,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn from_link(&self, link: &str) -> Option<TaskId> {
        if let Some(model) = self.param_model.captures(link).map(|caps| caps[1].to_string()) {
            let model = model.replace("%2E", ".").replace("%2e", ".");
            if model != self.model {
                return None;
            }
        }
        self.segment_id
            .captures(link)
            .or_else(|| self.param_id.captures(link))
            .and_then(|caps| caps[1].parse::<u64>().ok())
            .filter(|id| *id > 0)
            .map(TaskId)
    }
}

/// Returns the first task id found, checking the dedicated field before the
/// description text.
pub fn extract_task_id(issue: &IssueMetadata, rule: &ExtractRule) -> Option<TaskId> {
    if let Some(link) = issue.task_link.as_deref().map(str::trim)
        && !link.is_empty()
    {
        if let Ok(id) = link.parse::<u64>()
            && id > 0
        {
            return Some(TaskId(id));
        }
        if let Some(id) = rule.from_link(link) {
            return Some(id);
        }
    }
    issue
        .description
        .split_whitespace()
        .map(trim_token)
        .find_map(|token| rule.from_link(token))
}

fn trim_token(token: &str) -> &str {
    token.trim_matches(|c: char| matches!(c, '(' | ')' | '[' | ']' | '<' | '>' | '"' | '\'' | ',' | ';'))
}
