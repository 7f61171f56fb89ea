use crate::http::{read_json, send_with_retry};
use crate::jira_models::{FieldNames, JiraIssue, JiraMyself};
use reqwest::{Client, StatusCode};
use tracing::{debug, info};
use worklog_core::model::{IssueMetadata, IssueReference, Service};
use worklog_core::provider::{IssueSource, RemoteFuture};

pub struct JiraClient {
    client: Client,
    base_url: String,
    user: String,
    token: String,
    fields: FieldNames,
}

impl JiraClient {
    pub fn new(
        client: Client,
        base_url: &str,
        user: &str,
        token: &str,
        task_link_field: &str,
        epic_link_field: Option<&str>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            user: user.to_string(),
            token: token.to_string(),
            fields: FieldNames {
                task_link: task_link_field.to_string(),
                epic_link: epic_link_field.map(str::to_string),
            },
        }
    }

    fn requested_fields(&self) -> String {
        let mut fields = vec!["summary", "description", "parent", self.fields.task_link.as_str()];
        if let Some(epic) = &self.fields.epic_link {
            fields.push(epic);
        }
        fields.join(",")
    }
}

impl IssueSource for JiraClient {
    fn fetch_issue<'a>(&'a self, issue: &'a IssueReference) -> RemoteFuture<'a, Option<IssueMetadata>> {
        Box::pin(async move {
            let url = format!("{}/rest/api/3/issue/{}", self.base_url, issue.as_str());
            let fields = self.requested_fields();
            let response = send_with_retry(Service::Issues, &[StatusCode::NOT_FOUND], || {
                self.client
                    .get(&url)
                    .basic_auth(&self.user, Some(&self.token))
                    .header("Accept", "application/json")
                    .query(&[("fields", fields.as_str())])
            })
            .await?;
            if response.status() == StatusCode::NOT_FOUND {
                info!(issue = %issue, "issue not found in Jira");
                return Ok(None);
            }
            let payload: JiraIssue = read_json(Service::Issues, response).await?;
            let meta = payload.into_metadata(&self.fields);
            debug!(issue = %issue, has_link = meta.task_link.is_some(), parent = ?meta.parent_key, "fetched issue");
            Ok(Some(meta))
        })
    }

    fn health_check(&self) -> RemoteFuture<'_, ()> {
        Box::pin(async move {
            let url = format!("{}/rest/api/3/myself", self.base_url);
            let response = send_with_retry(Service::Issues, &[], || {
                self.client
                    .get(&url)
                    .basic_auth(&self.user, Some(&self.token))
                    .header("Accept", "application/json")
            })
            .await?;
            let me: JiraMyself = read_json(Service::Issues, response).await?;
            info!(user = me.display_name.as_deref().unwrap_or("unknown"), "Jira credentials accepted");
            Ok(())
        })
    }
}
