//! Shared HTTP plumbing for adapters: throttling, retries, status mapping.

use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::http::{HttpHeaders, HttpRequest, HttpResponse, HttpTransport, header_get};
use crate::retry::{RetryConfig, with_retry};

use super::errors::FetchError;
use super::rate_limit::ApiRateLimiter;

pub const DEFAULT_USER_AGENT: &str = concat!("siphon/", env!("CARGO_PKG_VERSION"));

/// Issues `GET` requests for an adapter.
#[derive(Clone)]
pub struct HttpFetcher {
    transport: Arc<dyn HttpTransport>,
    rate_limiter: Option<ApiRateLimiter>,
    retry: RetryConfig,
    user_agent: String,
}

impl HttpFetcher {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            rate_limiter: None,
            retry: RetryConfig::default(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    #[must_use]
    pub fn with_rate_limiter(mut self, rate_limiter: Option<ApiRateLimiter>) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Send a request, retrying transient failures, and map non-2xx statuses
    /// to [`FetchError`].
    pub async fn get(&self, request: HttpRequest) -> Result<HttpResponse, FetchError> {
        let request = if header_get(&request.headers, "user-agent").is_some() {
            request
        } else {
            request.header("User-Agent", self.user_agent.clone())
        };
        let url = request.url.clone();

        with_retry(
            || {
                let request = request.clone();
                let url = &url;
                async move {
                    if let Some(limiter) = &self.rate_limiter {
                        limiter.wait().await;
                    }
                    let response = self.transport.send(request).await?;
                    check_status(response, url)
                }
            },
            &self.retry,
            FetchError::is_retryable,
            &url,
        )
        .await
    }

    /// [`get`](Self::get) and decode the body as JSON.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        request: HttpRequest,
    ) -> Result<(T, HttpHeaders), FetchError> {
        let request = if header_get(&request.headers, "accept").is_some() {
            request
        } else {
            request.header("Accept", "application/json")
        };
        let response = self.get(request).await?;
        let body = serde_json::from_slice(&response.body)
            .map_err(|e| FetchError::malformed(format!("invalid JSON: {e}")))?;
        Ok((body, response.headers))
    }
}

fn check_status(response: HttpResponse, url: &str) -> Result<HttpResponse, FetchError> {
    if response.is_success() {
        return Ok(response);
    }
    // GitHub signals exhausted quotas with 403 plus a zero remaining count.
    let quota_exhausted = response.status == 403
        && response.header("x-ratelimit-remaining").map(str::trim) == Some("0");
    if response.status == 429 || quota_exhausted {
        let retry_after = response
            .header("retry-after")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(std::time::Duration::from_secs);
        return Err(FetchError::RateLimited { retry_after });
    }
    Err(FetchError::from_status(
        response.status,
        url,
        &response.text(),
    ))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::{Value, json};

    use super::*;
    use crate::http::MockTransport;

    fn fetcher(transport: &MockTransport) -> HttpFetcher {
        HttpFetcher::new(Arc::new(transport.clone())).with_retry(
            RetryConfig::new(Duration::from_millis(1), Duration::from_millis(5), 2)
                .with_jitter(false),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn get_retries_server_errors_then_succeeds() {
        let transport = MockTransport::new();
        let url = "https://api.example.com/items";
        transport.push_json(url, 502, &[], json!({}));
        transport.push_transport_error(url, "connection reset");
        transport.push_json(url, 200, &[], json!({"ok": true}));

        let (body, _): (Value, _) = fetcher(&transport)
            .get_json(HttpRequest::get(url))
            .await
            .expect("third attempt succeeds");
        assert_eq!(body, json!({"ok": true}));
        assert_eq!(transport.requests().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn get_does_not_retry_not_found() {
        let transport = MockTransport::new();
        let url = "https://api.example.com/missing";
        transport.push_json(url, 404, &[], json!({"message": "Not Found"}));

        let err = fetcher(&transport)
            .get(HttpRequest::get(url))
            .await
            .expect_err("404");
        assert!(matches!(err, FetchError::NotFound { .. }));
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn get_reports_rate_limit_after_retries_exhausted() {
        let transport = MockTransport::new();
        let url = "https://api.example.com/busy";
        for _ in 0..3 {
            transport.push_json(url, 429, &[("Retry-After", "30")], json!({}));
        }

        let err = fetcher(&transport)
            .get(HttpRequest::get(url))
            .await
            .expect_err("rate limited");
        match err {
            FetchError::RateLimited { retry_after } => {
                assert_eq!(retry_after, Some(Duration::from_secs(30)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn exhausted_quota_is_rate_limited_not_auth() {
        let transport = MockTransport::new();
        let url = "https://api.github.com/repos/o/r/releases";
        transport.push_json(url, 403, &[("X-RateLimit-Remaining", "0")], json!({}));

        let err = HttpFetcher::new(Arc::new(transport.clone()))
            .with_retry(RetryConfig::disabled())
            .get(HttpRequest::get(url))
            .await
            .expect_err("rate limited");
        assert!(matches!(err, FetchError::RateLimited { .. }));
    }

    #[tokio::test]
    async fn get_sets_default_user_agent_once() {
        let transport = MockTransport::new();
        let url = "https://example.com/feed";
        transport.push_json(url, 200, &[], json!({}));
        transport.push_json(url, 200, &[], json!({}));

        let fetcher = fetcher(&transport);
        fetcher.get(HttpRequest::get(url)).await.expect("ok");
        fetcher
            .get(HttpRequest::get(url).header("user-agent", "custom"))
            .await
            .expect("ok");

        let requests = transport.requests();
        assert_eq!(
            header_get(&requests[0].headers, "User-Agent"),
            Some(DEFAULT_USER_AGENT)
        );
        assert_eq!(header_get(&requests[1].headers, "User-Agent"), Some("custom"));
    }

    #[tokio::test]
    async fn get_json_rejects_invalid_bodies_without_retry() {
        let transport = MockTransport::new();
        let url = "https://example.com/broken";
        transport.push_response(
            url,
            HttpResponse {
                status: 200,
                headers: Vec::new(),
                body: b"<html>".to_vec(),
            },
        );

        let err = fetcher(&transport)
            .get_json::<Value>(HttpRequest::get(url))
            .await
            .expect_err("malformed");
        assert!(matches!(err, FetchError::Malformed { .. }));
        assert!(!err.is_retryable());
    }
}
