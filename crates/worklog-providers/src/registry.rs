use crate::http::build_client;
use crate::jira::JiraClient;
use crate::odoo::{OdooClient, OdooSettings};
use crate::smtp::SmtpNotifier;
use crate::tempo::TempoClient;
use anyhow::Context;
use std::time::Duration;
use worklog_core::config::{AppConfig, NotifyConfig};
use worklog_core::provider::{DisabledNotifier, Notifier};
use worklog_core::sync_engine::SyncEngine;

/// The real remote collaborators for one configuration.
pub struct Collaborators {
    pub worklogs: TempoClient,
    pub issues: JiraClient,
    pub erp: OdooClient,
    pub notifier: Box<dyn Notifier>,
}

impl Collaborators {
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let client = build_client(Duration::from_secs(config.sync.request_timeout_secs))
            .context("build HTTP client")?;

        let worklogs = TempoClient::new(
            client.clone(),
            &config.tempo.base_url,
            required(&config.tempo.api_token, "tempo.api_token")?,
            config.tempo.page_limit,
        );
        let issues = JiraClient::new(
            client.clone(),
            required(&config.jira.base_url, "jira.base_url")?,
            required(&config.jira.user, "jira.user")?,
            required(&config.jira.api_token, "jira.api_token")?,
            &config.jira.task_link_field,
            config.jira.epic_link_field.as_deref(),
        );
        let erp = OdooClient::new(
            client,
            OdooSettings {
                url: required(&config.erp.url, "erp.url")?.to_string(),
                db: required(&config.erp.db, "erp.db")?.to_string(),
                username: required(&config.erp.username, "erp.username")?.to_string(),
                password: required(&config.erp.password, "erp.password")?.to_string(),
                employee_id: config.erp.employee_id,
                external_id_field: config.erp.external_id_field.clone(),
            },
        );
        Ok(Self {
            worklogs,
            issues,
            erp,
            notifier: notifier_for(&config.notify),
        })
    }

    pub fn engine(&self, config: &AppConfig) -> anyhow::Result<SyncEngine<'_>> {
        SyncEngine::new(&self.worklogs, &self.issues, &self.erp, &config.sync)
    }
}

pub fn notifier_for(config: &NotifyConfig) -> Box<dyn Notifier> {
    match &config.smtp {
        Some(smtp) => Box::new(SmtpNotifier::new(smtp.clone())),
        None => Box::new(DisabledNotifier),
    }
}

fn required<'a>(value: &'a Option<String>, name: &str) -> anyhow::Result<&'a str> {
    value
        .as_deref()
        .with_context(|| format!("missing configuration: {name}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use worklog_core::config::SmtpConfig;

    fn complete_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.tempo.api_token = Some("tempo".into());
        config.jira.base_url = Some("https://example.atlassian.net".into());
        config.jira.user = Some("bot@example.com".into());
        config.jira.api_token = Some("jira".into());
        config.erp.url = Some("https://erp.example.com".into());
        config.erp.db = Some("prod".into());
        config.erp.username = Some("bot".into());
        config.erp.password = Some("secret".into());
        config
    }

    #[test]
    fn incomplete_config_is_refused() {
        let mut config = complete_config();
        config.erp.password = None;
        let err = Collaborators::from_config(&config).err().unwrap();
        assert!(err.to_string().contains("erp.password"));
    }

    #[test]
    fn complete_config_builds_engine() {
        let config = complete_config();
        let collaborators = Collaborators::from_config(&config).unwrap();
        assert!(!collaborators.notifier.is_configured());
        assert!(collaborators.engine(&config).is_ok());
    }

    #[test]
    fn smtp_section_enables_mail() {
        let mut notify = NotifyConfig::default();
        notify.smtp = Some(SmtpConfig {
            host: "smtp.example.com".into(),
            port: 587,
            from: "a@example.com".into(),
            to: "b@example.com".into(),
            username: None,
            password: None,
        });
        assert!(notifier_for(&notify).is_configured());
    }
}
