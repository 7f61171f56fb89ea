use crate::http::{read_json, send_with_retry};
use crate::tempo_models::WorklogPage;
use reqwest::Client;
use tracing::{debug, info};
use worklog_core::error::RemoteError;
use worklog_core::model::{Service, TimeWindow, WorklogBatch, format_date};
use worklog_core::provider::{RemoteFuture, WorklogSource};

/// Upper bound on followed pages, guarding against a looping `next` link.
const MAX_PAGES: usize = 500;

pub struct TempoClient {
    client: Client,
    base_url: String,
    token: String,
    page_limit: u32,
}

impl TempoClient {
    pub fn new(client: Client, base_url: &str, token: &str, page_limit: u32) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            page_limit: page_limit.max(1),
        }
    }

    async fn fetch_page(&self, url: &str, query: &[(&str, String)]) -> Result<WorklogPage, RemoteError> {
        let response = send_with_retry(Service::Worklogs, &[], || {
            self.client
                .get(url)
                .bearer_auth(&self.token)
                .header("Accept", "application/json")
                .query(query)
        })
        .await?;
        read_json(Service::Worklogs, response).await
    }
}

impl WorklogSource for TempoClient {
    fn fetch_worklogs<'a>(&'a self, window: &'a TimeWindow) -> RemoteFuture<'a, WorklogBatch> {
        Box::pin(async move {
            let first_url = format!("{}/worklogs", self.base_url);
            let first_query = [
                ("from", format_date(window.from)),
                ("to", format_date(window.to)),
                ("limit", self.page_limit.to_string()),
            ];
            let mut page = self.fetch_page(&first_url, &first_query).await?;
            let mut batch = WorklogBatch::default();
            let mut pages = 1;
            loop {
                let received = page.results.len();
                let before = batch.records.len();
                batch
                    .records
                    .extend(page.results.into_iter().filter_map(|worklog| worklog.into_record()));
                batch.dropped += received - (batch.records.len() - before);
                debug!(page = pages, received, "fetched worklog page");
                let Some(next) = page.metadata.next.filter(|next| !next.is_empty()) else {
                    break;
                };
                if pages >= MAX_PAGES {
                    return Err(RemoteError::Protocol {
                        service: Service::Worklogs,
                        message: format!("pagination did not end after {MAX_PAGES} pages"),
                    });
                }
                page = self.fetch_page(&next, &[]).await?;
                pages += 1;
            }
            info!(
                window = %window,
                count = batch.records.len(),
                dropped = batch.dropped,
                pages,
                "fetched worklogs from Tempo"
            );
            Ok(batch)
        })
    }

    fn health_check(&self) -> RemoteFuture<'_, ()> {
        Box::pin(async move {
            let url = format!("{}/worklogs", self.base_url);
            self.fetch_page(&url, &[("limit", "1".to_string())]).await.map(|_| ())
        })
    }
}
