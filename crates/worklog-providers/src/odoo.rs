use crate::http::{read_json, send_with_retry};
use crate::odoo_models::{LineRow, RpcRequest, RpcResponse, TaskRow, parse_created_id, parse_uid};
use reqwest::Client;
use serde_json::{Value, json};
use std::cell::Cell;
use tracing::{debug, info};
use worklog_core::error::RemoteError;
use worklog_core::model::{ExistingLine, ResolvedTask, Service, TaskId, TimesheetLine, format_date};
use worklog_core::provider::{ErpClient, RemoteFuture};

const TASK_MODEL: &str = "project.task";
const LINE_MODEL: &str = "account.analytic.line";

#[derive(Debug, Clone)]
pub struct OdooSettings {
    pub url: String,
    pub db: String,
    pub username: String,
    pub password: String,
    pub employee_id: Option<u64>,
    pub external_id_field: String,
}

/// Odoo over JSON-RPC. The uid from `authenticate` is cached for the
/// lifetime of the client.
pub struct OdooClient {
    client: Client,
    endpoint: String,
    settings: OdooSettings,
    uid: Cell<Option<u64>>,
    next_id: Cell<u64>,
}

impl OdooClient {
    pub fn new(client: Client, settings: OdooSettings) -> Self {
        Self {
            client,
            endpoint: format!("{}/jsonrpc", settings.url.trim_end_matches('/')),
            settings,
            uid: Cell::new(None),
            next_id: Cell::new(0),
        }
    }

    async fn call(&self, service: &str, method: &str, args: Vec<Value>) -> Result<Value, RemoteError> {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        let request = RpcRequest::call(id, service, method, args);
        let response = send_with_retry(Service::Erp, &[], || self.client.post(&self.endpoint).json(&request)).await?;
        let payload: RpcResponse = read_json(Service::Erp, response).await?;
        payload.into_result()
    }

    async fn authenticate(&self) -> Result<u64, RemoteError> {
        let result = self
            .call(
                "common",
                "authenticate",
                vec![
                    json!(self.settings.db),
                    json!(self.settings.username),
                    json!(self.settings.password),
                    json!({}),
                ],
            )
            .await?;
        let uid = parse_uid(&result)?;
        debug!(uid, db = %self.settings.db, "authenticated with Odoo");
        self.uid.set(Some(uid));
        Ok(uid)
    }

    async fn uid(&self) -> Result<u64, RemoteError> {
        match self.uid.get() {
            Some(uid) => Ok(uid),
            None => self.authenticate().await,
        }
    }

    async fn execute_kw(
        &self,
        model: &str,
        method: &str,
        args: Value,
        kwargs: Value,
    ) -> Result<Value, RemoteError> {
        let uid = self.uid().await?;
        let result = self
            .call(
                "object",
                "execute_kw",
                vec![
                    json!(self.settings.db),
                    json!(uid),
                    json!(self.settings.password),
                    json!(model),
                    json!(method),
                    args,
                    kwargs,
                ],
            )
            .await;
        if let Err(err) = &result
            && err.is_auth()
        {
            self.uid.set(None);
        }
        result
    }

    fn line_values(&self, line: &TimesheetLine) -> Value {
        let mut values = json!({
            "task_id": line.task_id.0,
            "name": line.name,
            "unit_amount": line.hours,
            "date": format_date(line.date),
        });
        if let Some(map) = values.as_object_mut() {
            if let Some(project_id) = line.project_id {
                map.insert("project_id".to_string(), json!(project_id));
            }
            if let Some(employee_id) = self.settings.employee_id {
                map.insert("employee_id".to_string(), json!(employee_id));
            }
            map.insert(self.settings.external_id_field.clone(), json!(line.external_id));
        }
        values
    }
}

fn decode_rows<T: serde::de::DeserializeOwned>(value: Value) -> Result<Vec<T>, RemoteError> {
    serde_json::from_value(value).map_err(|err| RemoteError::Protocol {
        service: Service::Erp,
        message: format!("decode records: {err}"),
    })
}

impl ErpClient for OdooClient {
    fn find_task(&self, task_id: TaskId) -> RemoteFuture<'_, Option<ResolvedTask>> {
        Box::pin(async move {
            let rows = self
                .execute_kw(
                    TASK_MODEL,
                    "search_read",
                    json!([[["id", "=", task_id.0]]]),
                    json!({ "fields": ["name", "project_id"], "limit": 1 }),
                )
                .await?;
            let rows: Vec<TaskRow> = decode_rows(rows)?;
            Ok(rows.into_iter().next().map(TaskRow::into_task))
        })
    }

    fn find_timesheet_by_external_id<'a>(
        &'a self,
        external_id: &'a str,
    ) -> RemoteFuture<'a, Option<ExistingLine>> {
        Box::pin(async move {
            let field = self.settings.external_id_field.as_str();
            let rows = self
                .execute_kw(
                    LINE_MODEL,
                    "search_read",
                    json!([[[field, "=", external_id]]]),
                    json!({ "fields": ["id", field], "limit": 1 }),
                )
                .await?;
            let rows: Vec<LineRow> = decode_rows(rows)?;
            Ok(rows
                .into_iter()
                .next()
                .map(|row| row.into_existing(field, external_id)))
        })
    }

    fn create_timesheet_line<'a>(&'a self, line: &'a TimesheetLine) -> RemoteFuture<'a, u64> {
        Box::pin(async move {
            let values = self.line_values(line);
            let result = self
                .execute_kw(LINE_MODEL, "create", json!([values]), json!({}))
                .await?;
            let line_id = parse_created_id(&result)?;
            info!(line_id, task_id = %line.task_id, external_id = %line.external_id, hours = line.hours, "created timesheet line");
            Ok(line_id)
        })
    }

    fn health_check(&self) -> RemoteFuture<'_, ()> {
        Box::pin(async move {
            self.authenticate().await?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn client(employee_id: Option<u64>) -> OdooClient {
        OdooClient::new(
            Client::new(),
            OdooSettings {
                url: "https://erp.example.com/".into(),
                db: "prod".into(),
                username: "sync@example.com".into(),
                password: "secret".into(),
                employee_id,
                external_id_field: "x_jira_worklog_id".into(),
            },
        )
    }

    fn line(project_id: Option<u64>) -> TimesheetLine {
        TimesheetLine {
            task_id: TaskId(42),
            project_id,
            hours: 1.5,
            date: date!(2025 - 04 - 01),
            name: "Work on PROJ-1".into(),
            author: None,
            external_id: "T-100".into(),
        }
    }

    #[test]
    fn endpoint_is_derived_from_url() {
        assert_eq!(client(None).endpoint, "https://erp.example.com/jsonrpc");
    }

    #[test]
    fn line_values_carry_external_id_and_optional_fields() {
        let values = client(Some(21)).line_values(&line(Some(7)));
        assert_eq!(
            values,
            json!({
                "task_id": 42,
                "project_id": 7,
                "employee_id": 21,
                "name": "Work on PROJ-1",
                "unit_amount": 1.5,
                "date": "2025-04-01",
                "x_jira_worklog_id": "T-100"
            })
        );
        let minimal = client(None).line_values(&line(None));
        assert!(minimal.get("project_id").is_none());
        assert!(minimal.get("employee_id").is_none());
    }
}
