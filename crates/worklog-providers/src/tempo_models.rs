use serde::Deserialize;
use tracing::warn;
use worklog_core::model::{IssueReference, WorklogRecord, parse_date};

#[derive(Debug, Deserialize)]
pub(crate) struct WorklogPage {
    #[serde(default)]
    pub(crate) metadata: PageMetadata,
    #[serde(default)]
    pub(crate) results: Vec<TempoWorklog>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct PageMetadata {
    #[serde(default)]
    pub(crate) next: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TempoWorklog {
    pub(crate) tempo_worklog_id: Option<u64>,
    pub(crate) issue: Option<TempoIssue>,
    #[serde(default)]
    pub(crate) time_spent_seconds: u64,
    pub(crate) start_date: Option<String>,
    #[serde(default)]
    pub(crate) description: Option<String>,
    pub(crate) author: Option<TempoAuthor>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TempoIssue {
    pub(crate) id: Option<u64>,
    pub(crate) key: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TempoAuthor {
    pub(crate) account_id: Option<String>,
    pub(crate) display_name: Option<String>,
}

impl TempoWorklog {
    /// Converts to a core record. Records without an id, issue or date are
    /// dropped with a warning.
    pub(crate) fn into_record(self) -> Option<WorklogRecord> {
        let Some(id) = self.tempo_worklog_id else {
            warn!("dropping worklog without tempoWorklogId");
            return None;
        };
        let issue = self.issue.and_then(|issue| {
            issue
                .key
                .filter(|key| !key.trim().is_empty())
                .or_else(|| issue.id.map(|id| id.to_string()))
        });
        let Some(issue) = issue else {
            warn!(worklog_id = id, "dropping worklog without issue");
            return None;
        };
        let date = match self.start_date.as_deref().map(parse_date) {
            Some(Ok(date)) => date,
            Some(Err(err)) => {
                warn!(worklog_id = id, error = %err, "dropping worklog with invalid start date");
                return None;
            }
            None => {
                warn!(worklog_id = id, "dropping worklog without start date");
                return None;
            }
        };
        let author = self
            .author
            .and_then(|author| author.display_name.or(author.account_id));
        Some(WorklogRecord {
            external_id: id.to_string(),
            issue: IssueReference::new(issue),
            time_spent_seconds: self.time_spent_seconds,
            date,
            author,
            description: self.description.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::date;

    #[test]
    fn page_decodes_worklogs_and_next_link() {
        let value = json!({
            "self": "https://api.tempo.io/4/worklogs?offset=0",
            "metadata": { "count": 1, "offset": 0, "limit": 1, "next": "https://api.tempo.io/4/worklogs?offset=1" },
            "results": [{
                "tempoWorklogId": 1234,
                "issue": { "self": "https://x.atlassian.net/rest/api/3/issue/10001", "id": 10001, "key": "PROJ-9" },
                "timeSpentSeconds": 5400,
                "startDate": "2025-02-03",
                "description": "Pairing",
                "author": { "accountId": "abc", "displayName": "Lin" }
            }]
        });
        let page: WorklogPage = serde_json::from_value(value).unwrap();
        assert!(page.metadata.next.is_some());
        let record = page.results.into_iter().next().unwrap().into_record().unwrap();
        assert_eq!(record.external_id, "1234");
        assert_eq!(record.issue.as_str(), "PROJ-9");
        assert_eq!(record.date, date!(2025 - 02 - 03));
        assert_eq!(record.author.as_deref(), Some("Lin"));
        assert_eq!(record.description, "Pairing");
    }

    #[test]
    fn issue_id_is_used_when_key_missing() {
        let value = json!({
            "tempoWorklogId": 7,
            "issue": { "id": 10042 },
            "timeSpentSeconds": 60,
            "startDate": "2025-02-03",
            "author": { "accountId": "acc-1" }
        });
        let worklog: TempoWorklog = serde_json::from_value(value).unwrap();
        let record = worklog.into_record().unwrap();
        assert_eq!(record.issue.as_str(), "10042");
        assert_eq!(record.author.as_deref(), Some("acc-1"));
        assert_eq!(record.description, "");
    }

    #[test]
    fn incomplete_worklogs_are_dropped() {
        let no_id: TempoWorklog = serde_json::from_value(json!({
            "issue": { "key": "PROJ-1" }, "startDate": "2025-02-03"
        }))
        .unwrap();
        assert!(no_id.into_record().is_none());
        let bad_date: TempoWorklog = serde_json::from_value(json!({
            "tempoWorklogId": 1, "issue": { "key": "PROJ-1" }, "startDate": "03/02/2025"
        }))
        .unwrap();
        assert!(bad_date.into_record().is_none());
    }

    #[test]
    fn empty_page_has_no_next() {
        let page: WorklogPage = serde_json::from_value(json!({ "results": [] })).unwrap();
        assert!(page.metadata.next.is_none());
        assert!(page.results.is_empty());
    }
}
