use crate::extract::{DEFAULT_PATH_SEGMENT, DEFAULT_TASK_MODEL, ExtractRule};
use anyhow::Context;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const QUALIFIER: &str = "com";
const APP: &str = "worklog-sync";

#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub tempo: TempoConfig,
    pub jira: JiraConfig,
    pub erp: ErpConfig,
    pub sync: SyncConfig,
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TempoConfig {
    pub base_url: String,
    pub api_token: Option<String>,
    pub page_limit: u32,
}

impl Default for TempoConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.tempo.io/4".to_string(),
            api_token: None,
            page_limit: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct JiraConfig {
    pub base_url: Option<String>,
    pub user: Option<String>,
    pub api_token: Option<String>,
    /// Custom field holding the ERP task link.
    pub task_link_field: String,
    /// Legacy epic-link field consulted when the issue has no `parent`.
    pub epic_link_field: Option<String>,
}

impl Default for JiraConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            user: None,
            api_token: None,
            task_link_field: "customfield_10134".to_string(),
            epic_link_field: Some("customfield_10014".to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ErpConfig {
    pub url: Option<String>,
    pub db: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub employee_id: Option<u64>,
    /// Timesheet line field stamped with the worklog id.
    pub external_id_field: String,
}

impl Default for ErpConfig {
    fn default() -> Self {
        Self {
            url: None,
            db: None,
            username: None,
            password: None,
            employee_id: None,
            external_id_field: "x_jira_worklog_id".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncConfig {
    pub lookback_hours: u32,
    pub task_path_segment: String,
    pub task_model: String,
    pub follow_parent: bool,
    pub request_timeout_secs: u64,
    pub interval_minutes: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            lookback_hours: 24,
            task_path_segment: DEFAULT_PATH_SEGMENT.to_string(),
            task_model: DEFAULT_TASK_MODEL.to_string(),
            follow_parent: true,
            request_timeout_secs: 30,
            interval_minutes: 60,
        }
    }
}

impl SyncConfig {
    pub fn extract_rule(&self) -> anyhow::Result<ExtractRule> {
        ExtractRule::new(&self.task_path_segment, &self.task_model)
            .context("build task extraction rule")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NotifyConfig {
    pub always_notify: bool,
    /// Notify once the number of failed worklogs, critical or normal,
    /// exceeds this value. Any critical error notifies regardless.
    #[serde(alias = "failure_threshold")]
    pub failed_worklog_threshold: u32,
    /// Connectivity failures in one run at or above this count are critical.
    pub repeated_connectivity_threshold: u32,
    pub repeat_hours: u64,
    pub subject_prefix: String,
    pub smtp: Option<SmtpConfig>,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            always_notify: false,
            failed_worklog_threshold: 10,
            repeated_connectivity_threshold: 3,
            repeat_hours: 24,
            subject_prefix: "[JIRA-SYNC]".to_string(),
            smtp: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

fn default_smtp_port() -> u16 {
    587
}

impl AppConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(path).context("read config")?;
        let config = serde_json::from_str(&data).context("parse config")?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("create config directory")?;
        }
        let data = serde_json::to_string_pretty(self).context("serialize config")?;
        fs::write(path, data).context("write config")?;
        Ok(())
    }

    /// Overlays values from the environment variable names used by
    /// deployments (`JIRA_BASE_URL`, `ODOO_URL`, `EMAIL_*`, ...).
    pub fn apply_env<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(value) = var("TEMPO_BASE_URL") {
            self.tempo.base_url = value;
        }
        set_opt(&mut self.tempo.api_token, var("TEMPO_API_TOKEN"));
        set_opt(&mut self.jira.base_url, var("JIRA_BASE_URL"));
        set_opt(&mut self.jira.user, var("JIRA_USER"));
        set_opt(&mut self.jira.api_token, var("JIRA_API_TOKEN"));
        set_opt(&mut self.erp.url, var("ODOO_URL"));
        set_opt(&mut self.erp.db, var("ODOO_DB"));
        set_opt(&mut self.erp.username, var("ODOO_USERNAME"));
        set_opt(&mut self.erp.password, var("ODOO_PASSWORD"));
        if let Some(value) = var("ODOO_EMPLOYEE_ID") {
            self.erp.employee_id = Some(value.parse().context("parse ODOO_EMPLOYEE_ID")?);
        }
        if let Some(value) = var("LOOKBACK_HOURS") {
            self.sync.lookback_hours = value.parse().context("parse LOOKBACK_HOURS")?;
        }

        let email_enabled = var("EMAIL_ENABLED").map(|value| value.eq_ignore_ascii_case("true"));
        if email_enabled == Some(false) {
            self.notify.smtp = None;
        } else if let (Some(host), Some(from), Some(to)) =
            (var("EMAIL_SMTP_SERVER"), var("EMAIL_FROM"), var("EMAIL_TO"))
        {
            let port = match var("EMAIL_SMTP_PORT") {
                Some(value) => value.parse().context("parse EMAIL_SMTP_PORT")?,
                None => default_smtp_port(),
            };
            self.notify.smtp = Some(SmtpConfig {
                host,
                port,
                username: Some(from.clone()),
                from,
                to,
                password: var("EMAIL_PASSWORD"),
            });
        }
        if let Some(value) = var("EMAIL_SUBJECT_PREFIX") {
            self.notify.subject_prefix = value;
        }
        Ok(())
    }

    pub fn missing_required(&self) -> Vec<&'static str> {
        let checks: [(&'static str, bool); 8] = [
            ("jira.base_url", self.jira.base_url.is_some()),
            ("jira.user", self.jira.user.is_some()),
            ("jira.api_token", self.jira.api_token.is_some()),
            ("tempo.api_token", self.tempo.api_token.is_some()),
            ("erp.url", self.erp.url.is_some()),
            ("erp.db", self.erp.db.is_some()),
            ("erp.username", self.erp.username.is_some()),
            ("erp.password", self.erp.password.is_some()),
        ];
        checks
            .into_iter()
            .filter(|(_, present)| !present)
            .map(|(name, _)| name)
            .collect()
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let missing = self.missing_required();
        if !missing.is_empty() {
            anyhow::bail!("missing configuration: {}", missing.join(", "));
        }
        self.sync.extract_rule()?;
        if self.sync.request_timeout_secs == 0 {
            anyhow::bail!("sync.request_timeout_secs must be greater than zero");
        }
        Ok(())
    }
}

fn set_opt(slot: &mut Option<String>, value: Option<String>) {
    if value.is_some() {
        *slot = value;
    }
}

fn project_dirs() -> anyhow::Result<ProjectDirs> {
    ProjectDirs::from(QUALIFIER, APP, APP).context("resolve project dirs")
}

pub fn default_config_path() -> anyhow::Result<PathBuf> {
    Ok(project_dirs()?.config_dir().join("config.json"))
}

pub fn default_state_path() -> anyhow::Result<PathBuf> {
    Ok(project_dirs()?.cache_dir().join("notify_state.json"))
}

pub fn default_history_dir() -> anyhow::Result<PathBuf> {
    Ok(project_dirs()?.data_local_dir().join("history"))
}

pub fn default_lock_path() -> anyhow::Result<PathBuf> {
    let project = project_dirs()?;
    Ok(project
        .runtime_dir()
        .unwrap_or(project.cache_dir())
        .join("sync.lock"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn load_missing_file_yields_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = AppConfig::load(&tmp.path().join("absent.json")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.sync.lookback_hours, 24);
        assert_eq!(config.erp.external_id_field, "x_jira_worklog_id");
    }

    #[test]
    fn save_then_load_preserves_sections() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("config.json");
        let mut config = AppConfig::default();
        config.jira.base_url = Some("https://example.atlassian.net".into());
        config.erp.employee_id = Some(21);
        config.save(&path).unwrap();
        assert_eq!(AppConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        fs::write(&path, r#"{"sync": {"lookback_hours": 48}}"#).unwrap();
        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.sync.lookback_hours, 48);
        assert!(config.sync.follow_parent);
        assert_eq!(config.tempo.page_limit, 1000);
    }

    #[test]
    fn older_threshold_name_is_accepted() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        fs::write(&path, r#"{"notify": {"failure_threshold": 3}}"#).unwrap();
        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.notify.failed_worklog_threshold, 3);
        assert_eq!(config.notify.repeat_hours, 24);
    }

    #[test]
    fn env_overrides_and_validation() {
        let mut config = AppConfig::default();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("jira.base_url"));
        assert!(err.contains("erp.password"));

        config
            .apply_env(env(&[
                ("JIRA_BASE_URL", "https://jira"),
                ("JIRA_USER", "bot@example.com"),
                ("JIRA_API_TOKEN", "j"),
                ("TEMPO_API_TOKEN", "t"),
                ("ODOO_URL", "https://odoo"),
                ("ODOO_DB", "prod"),
                ("ODOO_USERNAME", "sync"),
                ("ODOO_PASSWORD", "secret"),
                ("LOOKBACK_HOURS", "72"),
                ("EMAIL_ENABLED", "true"),
                ("EMAIL_SMTP_SERVER", "smtp.example.com"),
                ("EMAIL_FROM", "sync@example.com"),
                ("EMAIL_TO", "ops@example.com"),
            ]))
            .unwrap();
        config.validate().unwrap();
        assert_eq!(config.sync.lookback_hours, 72);
        let smtp = config.notify.smtp.unwrap();
        assert_eq!(smtp.port, 587);
        assert_eq!(smtp.username.as_deref(), Some("sync@example.com"));
    }

    #[test]
    fn email_disabled_clears_smtp() {
        let mut config = AppConfig::default();
        config.notify.smtp = Some(SmtpConfig {
            host: "smtp".into(),
            port: 25,
            from: "a@b".into(),
            to: "c@d".into(),
            username: None,
            password: None,
        });
        config.apply_env(env(&[("EMAIL_ENABLED", "false")])).unwrap();
        assert!(config.notify.smtp.is_none());
    }

    #[test]
    fn bad_numeric_env_is_an_error() {
        let mut config = AppConfig::default();
        assert!(config.apply_env(env(&[("LOOKBACK_HOURS", "a day")])).is_err());
    }
}
