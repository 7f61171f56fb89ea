use serde::{Deserialize, Serialize};
use serde_json::Value;
use worklog_core::error::RemoteError;
use worklog_core::model::{ExistingLine, ResolvedTask, Service, TaskId};

#[derive(Debug, Serialize)]
pub(crate) struct RpcRequest<'a> {
    pub(crate) jsonrpc: &'static str,
    pub(crate) method: &'static str,
    pub(crate) params: RpcParams<'a>,
    pub(crate) id: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct RpcParams<'a> {
    pub(crate) service: &'a str,
    pub(crate) method: &'a str,
    pub(crate) args: Vec<Value>,
}

impl<'a> RpcRequest<'a> {
    pub(crate) fn call(id: u64, service: &'a str, method: &'a str, args: Vec<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            method: "call",
            params: RpcParams {
                service,
                method,
                args,
            },
            id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RpcResponse {
    #[serde(default)]
    pub(crate) result: Option<Value>,
    #[serde(default)]
    pub(crate) error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RpcError {
    #[serde(default)]
    pub(crate) message: String,
    #[serde(default)]
    pub(crate) data: Option<RpcErrorData>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RpcErrorData {
    #[serde(default)]
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) message: String,
}

impl RpcResponse {
    pub(crate) fn into_result(self) -> Result<Value, RemoteError> {
        if let Some(error) = self.error {
            return Err(error.into_remote());
        }
        self.result.ok_or_else(|| RemoteError::Protocol {
            service: Service::Erp,
            message: "response has neither result nor error".to_string(),
        })
    }
}

impl RpcError {
    fn into_remote(self) -> RemoteError {
        let (name, detail) = match self.data {
            Some(data) => (data.name, data.message),
            None => (String::new(), String::new()),
        };
        let message = match (detail.is_empty(), name.is_empty()) {
            (false, _) => detail,
            (true, false) => name.clone(),
            (true, true) => self.message,
        };
        if name.ends_with("AccessDenied") || name.ends_with("AccessError") || name.contains("SessionExpired") {
            RemoteError::Auth {
                service: Service::Erp,
                message,
            }
        } else {
            RemoteError::Rejected {
                service: Service::Erp,
                message,
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct TaskRow {
    pub(crate) id: u64,
    #[serde(default)]
    pub(crate) name: Value,
    #[serde(default)]
    pub(crate) project_id: Value,
}

impl TaskRow {
    pub(crate) fn into_task(self) -> ResolvedTask {
        ResolvedTask {
            task_id: TaskId(self.id),
            project_id: many2one_id(&self.project_id),
            name: self.name.as_str().unwrap_or_default().to_string(),
        }
    }
}

/// Many2one values arrive as `[id, "display name"]` or `false`.
pub(crate) fn many2one_id(value: &Value) -> Option<u64> {
    value.as_array()?.first()?.as_u64()
}

#[derive(Debug, Deserialize)]
pub(crate) struct LineRow {
    pub(crate) id: u64,
    #[serde(flatten)]
    pub(crate) fields: serde_json::Map<String, Value>,
}

impl LineRow {
    pub(crate) fn into_existing(self, field: &str, fallback: &str) -> ExistingLine {
        let external_id = self
            .fields
            .get(field)
            .and_then(Value::as_str)
            .unwrap_or(fallback)
            .to_string();
        ExistingLine {
            line_id: self.id,
            external_id,
        }
    }
}

/// `authenticate` answers with the numeric uid, or `false` when refused.
pub(crate) fn parse_uid(value: &Value) -> Result<u64, RemoteError> {
    match value {
        Value::Number(number) => number.as_u64().filter(|uid| *uid > 0).ok_or_else(|| RemoteError::Protocol {
            service: Service::Erp,
            message: format!("unexpected uid {number}"),
        }),
        Value::Bool(false) => Err(RemoteError::Auth {
            service: Service::Erp,
            message: "login refused for the configured user".to_string(),
        }),
        other => Err(RemoteError::Protocol {
            service: Service::Erp,
            message: format!("unexpected authenticate result {other}"),
        }),
    }
}

/// `create` returns the new id, or a one-element list on newer servers.
pub(crate) fn parse_created_id(value: &Value) -> Result<u64, RemoteError> {
    value
        .as_u64()
        .or_else(|| value.as_array()?.first()?.as_u64())
        .ok_or_else(|| RemoteError::Protocol {
            service: Service::Erp,
            message: format!("unexpected create result {value}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_serializes_as_jsonrpc_call() {
        let request = RpcRequest::call(3, "common", "authenticate", vec![json!("db"), json!("u")]);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "jsonrpc": "2.0",
                "method": "call",
                "params": { "service": "common", "method": "authenticate", "args": ["db", "u"] },
                "id": 3
            })
        );
    }

    #[test]
    fn access_denied_is_auth_error() {
        let response: RpcResponse = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {
                "code": 200,
                "message": "Odoo Server Error",
                "data": { "name": "odoo.exceptions.AccessDenied", "message": "Access Denied" }
            }
        }))
        .unwrap();
        let err = response.into_result().unwrap_err();
        assert!(err.is_auth());
        assert!(err.to_string().contains("Access Denied"));
    }

    #[test]
    fn validation_error_is_rejected() {
        let response: RpcResponse = serde_json::from_value(json!({
            "error": { "message": "Odoo Server Error", "data": { "name": "odoo.exceptions.ValidationError", "message": "bad date" } }
        }))
        .unwrap();
        assert_eq!(response.into_result().unwrap_err().kind(), "rejected");
    }

    #[test]
    fn task_row_reads_project() {
        let row: TaskRow = serde_json::from_value(json!({
            "id": 42, "name": "Implementation", "project_id": [7, "Website"]
        }))
        .unwrap();
        let task = row.into_task();
        assert_eq!(task.task_id, TaskId(42));
        assert_eq!(task.project_id, Some(7));
        assert_eq!(task.name, "Implementation");

        let orphan: TaskRow = serde_json::from_value(json!({ "id": 5, "name": "x", "project_id": false })).unwrap();
        assert_eq!(orphan.into_task().project_id, None);
    }

    #[test]
    fn uid_and_created_id_parsing() {
        assert_eq!(parse_uid(&json!(2)).unwrap(), 2);
        assert!(parse_uid(&json!(false)).unwrap_err().is_auth());
        assert_eq!(parse_created_id(&json!(99)).unwrap(), 99);
        assert_eq!(parse_created_id(&json!([100])).unwrap(), 100);
        assert!(parse_created_id(&json!("x")).is_err());
    }

    #[test]
    fn line_row_reads_external_id_field() {
        let row: LineRow = serde_json::from_value(json!({ "id": 11, "x_jira_worklog_id": "T-1" })).unwrap();
        let line = row.into_existing("x_jira_worklog_id", "fallback");
        assert_eq!(line.line_id, 11);
        assert_eq!(line.external_id, "T-1");
    }
}
