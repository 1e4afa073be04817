//! HTTP client with bounded retries and an optional response cache.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use vinaya_notes_shared::{FetchConfig, Result, VinayaError};

use crate::cache::ResponseCache;

/// User-Agent string for API requests.
const USER_AGENT: &str = concat!("vinaya-notes/", env!("CARGO_PKG_VERSION"));

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 5;

/// Backoff stops doubling after this many attempts.
const MAX_BACKOFF_EXPONENT: u32 = 5;

/// GET client that retries transient failures a bounded number of times.
///
/// Transient: connect/timeout/body errors, HTTP 429, HTTP 5xx.
/// Everything else (including 404) fails on the first attempt.
#[derive(Debug, Clone)]
pub struct RetryingClient {
    client: Client,
    max_retries: u32,
    retry_backoff: Duration,
    cache: Option<ResponseCache>,
    refresh: bool,
}

/// A failed attempt and whether it is worth repeating.
struct AttemptError {
    error: VinayaError,
    transient: bool,
}

impl RetryingClient {
    /// Build a client from the runtime fetch configuration.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(config.timeout)
            .build()
            .map_err(|e| VinayaError::fetch("-", None, format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_retries: config.max_retries,
            retry_backoff: config.retry_backoff,
            cache: config.cache_dir.as_ref().map(ResponseCache::new),
            refresh: config.refresh,
        })
    }

    /// Fetch `url` as text, consulting the cache first unless refreshing.
    pub async fn get_text(&self, url: &str) -> Result<String> {
        if !self.refresh {
            if let Some(body) = self.cache.as_ref().and_then(|c| c.get(url)) {
                return Ok(body);
            }
        }

        let body = self.get_with_retry(url).await?;

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.put(url, &body) {
                warn!(%url, error = %e, "failed to cache response");
            }
        }

        Ok(body)
    }

    async fn get_with_retry(&self, url: &str) -> Result<String> {
        let mut attempt: u32 = 0;
        loop {
            match self.try_get(url).await {
                Ok(body) => return Ok(body),
                Err(failure) if failure.transient && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.retry_backoff(attempt);
                    warn!(
                        %url,
                        attempt,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis(),
                        error = %failure.error,
                        "transient fetch failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(failure) => return Err(failure.error),
            }
        }
    }

    async fn try_get(&self, url: &str) -> std::result::Result<String, AttemptError> {
        debug!(%url, "GET");

        let response = self.client.get(url).send().await.map_err(|e| AttemptError {
            transient: is_retryable_error(&e),
            error: VinayaError::fetch(url, None, e.to_string()),
        })?;

        let status = response.status();
        if !status.is_success() {
            let message = if status == StatusCode::NOT_FOUND {
                "not found".to_string()
            } else {
                format!("HTTP {status}")
            };
            return Err(AttemptError {
                transient: should_retry(status),
                error: VinayaError::fetch(url, Some(status.as_u16()), message),
            });
        }

        response.text().await.map_err(|e| AttemptError {
            transient: true,
            error: VinayaError::fetch(url, Some(status.as_u16()), format!("body read failed: {e}")),
        })
    }

    fn retry_backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
        self.retry_backoff * (1u32 << exponent)
    }
}

fn should_retry(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_body() || err.is_request()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(retries: u32) -> FetchConfig {
        FetchConfig {
            api_base: "http://localhost".into(),
            max_retries: retries,
            retry_backoff: Duration::from_millis(100),
            concurrency: 1,
            timeout: Duration::from_secs(5),
            cache_dir: None,
            refresh: false,
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let client = RetryingClient::new(&config(3)).unwrap();
        assert_eq!(client.retry_backoff(1), Duration::from_millis(100));
        assert_eq!(client.retry_backoff(2), Duration::from_millis(200));
        assert_eq!(client.retry_backoff(3), Duration::from_millis(400));
        assert_eq!(client.retry_backoff(20), Duration::from_millis(3200));
    }

    #[test]
    fn retryable_statuses() {
        assert!(should_retry(StatusCode::SERVICE_UNAVAILABLE));
        assert!(should_retry(StatusCode::TOO_MANY_REQUESTS));
        assert!(!should_retry(StatusCode::NOT_FOUND));
        assert!(!should_retry(StatusCode::FORBIDDEN));
    }

    #[tokio::test]
    async fn get_text_retries_then_succeeds() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/scidmap.json"))
            .respond_with(ResponseTemplate::new(502))
            .up_to_n_times(2)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/scidmap.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .mount(&server)
            .await;

        let mut cfg = config(2);
        cfg.retry_backoff = Duration::from_millis(1);
        let client = RetryingClient::new(&cfg).unwrap();
        let body = client
            .get_text(&format!("{}/scidmap.json", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, "{}");
    }
}
