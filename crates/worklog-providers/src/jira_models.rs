use serde::Deserialize;
use serde_json::{Map, Value};
use worklog_core::model::IssueMetadata;

#[derive(Debug, Deserialize)]
pub(crate) struct JiraIssue {
    pub(crate) key: String,
    #[serde(default)]
    pub(crate) fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JiraMyself {
    #[serde(default)]
    pub(crate) display_name: Option<String>,
}

/// Custom-field names that differ between Jira sites.
#[derive(Debug, Clone)]
pub(crate) struct FieldNames {
    pub(crate) task_link: String,
    pub(crate) epic_link: Option<String>,
}

impl JiraIssue {
    pub(crate) fn into_metadata(self, names: &FieldNames) -> IssueMetadata {
        let summary = self
            .fields
            .get("summary")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let description = self
            .fields
            .get("description")
            .map(field_text)
            .unwrap_or_default();
        let task_link = self
            .fields
            .get(&names.task_link)
            .map(field_text)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty());
        let parent_key = self
            .fields
            .get("parent")
            .and_then(issue_key)
            .or_else(|| {
                names
                    .epic_link
                    .as_ref()
                    .and_then(|field| self.fields.get(field))
                    .and_then(issue_key)
            });
        IssueMetadata {
            key: self.key,
            summary,
            description,
            task_link,
            parent_key,
        }
    }
}

/// Text of a field value: plain strings, numbers, option objects and
/// Atlassian document format bodies.
pub(crate) fn field_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        Value::Object(map) if map.get("type").and_then(Value::as_str) == Some("doc") => {
            adf_to_text(value)
        }
        Value::Object(map) => map
            .get("value")
            .or_else(|| map.get("url"))
            .map(field_text)
            .unwrap_or_default(),
        _ => String::new(),
    }
}

fn issue_key(value: &Value) -> Option<String> {
    let key = match value {
        Value::String(key) => key.clone(),
        Value::Object(map) => map.get("key")?.as_str()?.to_string(),
        _ => return None,
    };
    let key = key.trim().to_string();
    (!key.is_empty()).then_some(key)
}

/// Flattens an ADF document to plain text. Link targets and smart-card URLs
/// are kept next to their text so references inside links stay visible.
pub(crate) fn adf_to_text(node: &Value) -> String {
    let mut out = String::new();
    write_adf(node, &mut out);
    out.trim().to_string()
}

fn write_adf(node: &Value, out: &mut String) {
    let Some(kind) = node.get("type").and_then(Value::as_str) else {
        return;
    };
    match kind {
        "text" => {
            if let Some(text) = node.get("text").and_then(Value::as_str) {
                out.push_str(text);
            }
            for href in link_targets(node) {
                out.push(' ');
                out.push_str(href);
            }
        }
        "inlineCard" | "blockCard" | "embedCard" => {
            if let Some(url) = node.pointer("/attrs/url").and_then(Value::as_str) {
                out.push(' ');
                out.push_str(url);
                out.push(' ');
            }
        }
        "hardBreak" => out.push('\n'),
        "mention" => {
            if let Some(text) = node.pointer("/attrs/text").and_then(Value::as_str) {
                out.push_str(text);
            }
        }
        _ => {
            if let Some(children) = node.get("content").and_then(Value::as_array) {
                for child in children {
                    write_adf(child, out);
                }
            }
            if is_block(kind) && !out.ends_with('\n') {
                out.push('\n');
            }
        }
    }
}

fn link_targets(node: &Value) -> impl Iterator<Item = &str> {
    node.get("marks")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter(|mark| mark.get("type").and_then(Value::as_str) == Some("link"))
        .filter_map(|mark| mark.pointer("/attrs/href").and_then(Value::as_str))
}

fn is_block(kind: &str) -> bool {
    matches!(
        kind,
        "paragraph" | "heading" | "listItem" | "codeBlock" | "blockquote" | "tableRow" | "panel"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn names() -> FieldNames {
        FieldNames {
            task_link: "customfield_10134".into(),
            epic_link: Some("customfield_10014".into()),
        }
    }

    #[test]
    fn issue_with_link_field_and_parent() {
        let value = json!({
            "id": "10001",
            "key": "PROJ-12",
            "fields": {
                "summary": "Build importer",
                "customfield_10134": "https://erp.example.com/web#id=7346&model=project.task",
                "parent": { "id": "10000", "key": "PROJ-1" },
                "description": null
            }
        });
        let issue: JiraIssue = serde_json::from_value(value).unwrap();
        let meta = issue.into_metadata(&names());
        assert_eq!(meta.key, "PROJ-12");
        assert_eq!(meta.summary, "Build importer");
        assert_eq!(
            meta.task_link.as_deref(),
            Some("https://erp.example.com/web#id=7346&model=project.task")
        );
        assert_eq!(meta.parent_key.as_deref(), Some("PROJ-1"));
        assert_eq!(meta.description, "");
    }

    #[test]
    fn epic_link_field_used_without_parent() {
        let value = json!({
            "key": "PROJ-13",
            "fields": { "summary": "x", "customfield_10134": null, "customfield_10014": "PROJ-2" }
        });
        let issue: JiraIssue = serde_json::from_value(value).unwrap();
        let meta = issue.into_metadata(&names());
        assert_eq!(meta.task_link, None);
        assert_eq!(meta.parent_key.as_deref(), Some("PROJ-2"));
    }

    #[test]
    fn adf_description_keeps_link_targets() {
        let doc = json!({
            "type": "doc",
            "version": 1,
            "content": [
                { "type": "paragraph", "content": [
                    { "type": "text", "text": "See " },
                    { "type": "text", "text": "the task", "marks": [
                        { "type": "link", "attrs": { "href": "https://erp.example.com/odoo/task/42" } }
                    ]}
                ]},
                { "type": "paragraph", "content": [
                    { "type": "inlineCard", "attrs": { "url": "https://erp.example.com/web#id=9&model=project.task" } }
                ]}
            ]
        });
        let text = adf_to_text(&doc);
        assert!(text.contains("See the task https://erp.example.com/odoo/task/42"));
        assert!(text.contains("https://erp.example.com/web#id=9&model=project.task"));
        assert!(text.contains('\n'));
    }

    #[test]
    fn field_text_handles_option_objects() {
        assert_eq!(field_text(&json!({ "value": "42" })), "42");
        assert_eq!(field_text(&json!(42)), "42");
        assert_eq!(field_text(&json!(null)), "");
    }

    #[test]
    fn myself_decodes_display_name() {
        let me: JiraMyself = serde_json::from_value(json!({ "accountId": "a", "displayName": "Sync Bot" })).unwrap();
        assert_eq!(me.display_name.as_deref(), Some("Sync Bot"));
    }
}
