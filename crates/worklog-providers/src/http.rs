use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use reqwest::{Client, RequestBuilder, Response};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::debug;
use worklog_core::error::RemoteError;
use worklog_core::model::Service;

const MAX_ATTEMPTS: u32 = 3;
const MAX_RETRY_DELAY_SECS: u64 = 60;

pub(crate) fn build_client(timeout: Duration) -> anyhow::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("worklog-sync/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(Into::into)
}

/// Sends the request built by `build`, retrying on 429 and 503. Statuses in
/// `allowed` are returned to the caller instead of being mapped to errors.
pub(crate) async fn send_with_retry<F>(
    service: Service,
    allowed: &[StatusCode],
    mut build: F,
) -> Result<Response, RemoteError>
where
    F: FnMut() -> RequestBuilder,
{
    let mut attempt = 1;
    loop {
        let response = build()
            .send()
            .await
            .map_err(|err| transport_error(service, &err))?;
        let status = response.status();
        if status.is_success() || allowed.contains(&status) {
            return Ok(response);
        }
        if is_retryable(status) && attempt < MAX_ATTEMPTS {
            let delay = retry_delay_from_headers(response.headers()).unwrap_or(Duration::from_secs(1));
            let _ = response.bytes().await;
            debug!(service = %service, status = %status, attempt, delay_secs = delay.as_secs(), "retrying request");
            tokio::time::sleep(delay).await;
            attempt += 1;
            continue;
        }
        let body = response.text().await.unwrap_or_default();
        return Err(status_error(service, status, &body));
    }
}

pub(crate) async fn read_json<T: serde::de::DeserializeOwned>(
    service: Service,
    response: Response,
) -> Result<T, RemoteError> {
    response.json::<T>().await.map_err(|err| RemoteError::Protocol {
        service,
        message: format!("decode response: {err}"),
    })
}

pub(crate) fn transport_error(service: Service, err: &reqwest::Error) -> RemoteError {
    if err.is_decode() {
        return RemoteError::Protocol {
            service,
            message: err.to_string(),
        };
    }
    RemoteError::Connectivity {
        service,
        message: err.to_string(),
    }
}

pub(crate) fn status_error(service: Service, status: StatusCode, body: &str) -> RemoteError {
    let message = match snippet(body) {
        Some(detail) => format!("HTTP {status}: {detail}"),
        None => format!("HTTP {status}"),
    };
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::Auth { service, message },
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            RemoteError::Connectivity { service, message }
        }
        status if status.is_server_error() => RemoteError::Connectivity { service, message },
        status if status.is_client_error() => RemoteError::Rejected { service, message },
        _ => RemoteError::Protocol { service, message },
    }
}

fn snippet(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    let mut text: String = trimmed.chars().take(200).collect();
    if trimmed.chars().count() > 200 {
        text.push_str("...");
    }
    Some(text)
}

fn is_retryable(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE
    )
}

fn retry_delay_from_headers(headers: &HeaderMap) -> Option<Duration> {
    retry_after_seconds(headers)
        .or_else(|| ratelimit_reset_seconds(headers))
        .map(|secs| Duration::from_secs(secs.min(MAX_RETRY_DELAY_SECS)))
}

fn retry_after_seconds(headers: &HeaderMap) -> Option<u64> {
    headers
        .get("retry-after")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
}

fn ratelimit_reset_seconds(headers: &HeaderMap) -> Option<u64> {
    let reset = headers
        .get("x-ratelimit-reset")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok())?;
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    reset.checked_sub(now).filter(|delay| *delay > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn retry_after_parses_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("5"));
        assert_eq!(retry_delay_from_headers(&headers), Some(Duration::from_secs(5)));
    }

    #[test]
    fn retry_delay_is_capped() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("900"));
        assert_eq!(
            retry_delay_from_headers(&headers),
            Some(Duration::from_secs(MAX_RETRY_DELAY_SECS))
        );
    }

    #[test]
    fn ratelimit_reset_uses_future_time() {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-ratelimit-reset",
            HeaderValue::from_str(&(now + 10).to_string()).unwrap(),
        );
        assert!(ratelimit_reset_seconds(&headers).unwrap() > 0);
        headers.insert("x-ratelimit-reset", HeaderValue::from_static("1"));
        assert_eq!(ratelimit_reset_seconds(&headers), None);
    }

    #[test]
    fn statuses_map_to_error_kinds() {
        let auth = status_error(Service::Issues, StatusCode::UNAUTHORIZED, "");
        assert!(auth.is_auth());
        assert_eq!(auth.to_string(), "issues authentication failed: HTTP 401 Unauthorized");
        assert!(status_error(Service::Erp, StatusCode::BAD_GATEWAY, "").is_connectivity());
        assert_eq!(
            status_error(Service::Worklogs, StatusCode::BAD_REQUEST, "bad from").kind(),
            "rejected"
        );
    }
}
