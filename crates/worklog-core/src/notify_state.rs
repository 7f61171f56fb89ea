use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

const VERSION: u32 = 1;

/// Remembers which critical errors were already reported, so a failure that
/// persists across scheduled runs is mailed once per repeat interval.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct NotifyState {
    pub version: u32,
    #[serde(default)]
    pub errors: HashMap<String, ErrorRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorRecord {
    pub first_occurrence: u64,
    pub last_sent: u64,
    pub count: u32,
    #[serde(default)]
    pub last_error: Option<String>,
}

impl Default for NotifyState {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyState {
    pub fn new() -> Self {
        Self {
            version: VERSION,
            errors: HashMap::new(),
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let data = fs::read_to_string(path).context("read notification state")?;
        let state: Self = serde_json::from_str(&data).context("parse notification state")?;
        if state.version != VERSION {
            anyhow::bail!("unsupported notification state version {}", state.version);
        }
        Ok(state)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("create state directory")?;
        }
        let data = serde_json::to_string_pretty(self).context("serialize notification state")?;
        fs::write(path, data).context("write notification state")?;
        Ok(())
    }

    /// True when every key was reported less than `interval_secs` ago.
    pub fn all_recently_sent<'a, I>(&self, keys: I, now: u64, interval_secs: u64) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut any = false;
        for key in keys {
            any = true;
            let recent = self
                .errors
                .get(key)
                .is_some_and(|record| now.saturating_sub(record.last_sent) < interval_secs);
            if !recent {
                return false;
            }
        }
        any
    }

    pub fn record_sent(&mut self, key: &str, now: u64, error: Option<String>) {
        let record = self.errors.entry(key.to_string()).or_insert(ErrorRecord {
            first_occurrence: now,
            last_sent: now,
            count: 0,
            last_error: None,
        });
        record.count = record.count.saturating_add(1);
        record.last_sent = now;
        record.last_error = error;
    }

    pub fn is_recurring(&self, key: &str) -> Option<u64> {
        self.errors.get(key).map(|record| record.first_occurrence)
    }

    pub fn clear(&mut self) {
        self.errors.clear();
    }
}

pub fn current_timestamp_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn state_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state").join("notify_state.json");
        let mut state = NotifyState::new();
        state.record_sent("write:erp:rejected", 100, Some("bad date".into()));
        state.save(&path).unwrap();
        let loaded = NotifyState::load(&path).unwrap();
        assert_eq!(loaded, state);
        assert_eq!(loaded.errors["write:erp:rejected"].count, 1);
    }

    #[test]
    fn recency_requires_every_key() {
        let mut state = NotifyState::new();
        state.record_sent("a", 89_000, None);
        state.record_sent("b", 0, None);
        assert!(state.all_recently_sent(["a"], 90_000, 86_400));
        assert!(!state.all_recently_sent(["b"], 90_000, 86_400));
        assert!(!state.all_recently_sent(["a", "b"], 90_000, 86_400));
        assert!(!state.all_recently_sent(["a", "c"], 90_000, 86_400));
        assert!(!state.all_recently_sent([], 90_000, 86_400));
    }

    #[test]
    fn repeated_sends_keep_first_occurrence() {
        let mut state = NotifyState::new();
        state.record_sent("a", 10, None);
        state.record_sent("a", 20, None);
        assert_eq!(state.is_recurring("a"), Some(10));
        assert_eq!(state.errors["a"].count, 2);
        assert_eq!(state.errors["a"].last_sent, 20);
        state.clear();
        assert_eq!(state.is_recurring("a"), None);
    }

    #[test]
    fn unknown_version_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("notify_state.json");
        fs::write(&path, r#"{"version": 9, "errors": {}}"#).unwrap();
        assert!(NotifyState::load(&path).is_err());
    }
}
