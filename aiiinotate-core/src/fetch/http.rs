//! HTTP manifest fetcher with retry and exponential backoff.
//!
//! The configured fetch timeout is the budget for one manifest, retries
//! included. It is split evenly between the first attempt and at most
//! `fetch_max_retries` retries.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use backoff::{future::retry_notify, ExponentialBackoff};
use reqwest::{header, Client, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use super::ManifestFetcher;
use crate::config::CoreConfig;
use crate::error::{FetchError, Result};

pub struct HttpManifestFetcher {
    client: Client,
    timeout: Duration,
    attempt_timeout: Duration,
    max_retries: u32,
    initial_interval: Duration,
    max_interval: Duration,
}

impl std::fmt::Debug for HttpManifestFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpManifestFetcher")
            .field("timeout", &self.timeout)
            .field("attempt_timeout", &self.attempt_timeout)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl HttpManifestFetcher {
    pub fn new(config: &CoreConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.fetch_timeout)
            .user_agent(concat!("aiiinotate/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Transport {
                uri: String::new(),
                message: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            timeout: config.fetch_timeout,
            attempt_timeout: config.fetch_timeout / (config.fetch_max_retries + 1),
            max_retries: config.fetch_max_retries,
            initial_interval: config.fetch_initial_interval,
            max_interval: config.fetch_max_interval,
        })
    }

    async fn fetch_once(&self, uri: &str) -> std::result::Result<Value, backoff::Error<FetchError>> {
        let start = Instant::now();

        let response = self
            .client
            .get(uri)
            .timeout(self.attempt_timeout)
            .header(header::ACCEPT, "application/ld+json, application/json")
            .send()
            .await
            .map_err(|e| {
                let latency_ms = start.elapsed().as_millis() as u64;
                let err = if e.is_timeout() {
                    FetchError::Timeout {
                        uri: uri.to_string(),
                        timeout_ms: self.attempt_timeout.as_millis() as u64,
                    }
                } else {
                    FetchError::Transport {
                        uri: uri.to_string(),
                        message: e.to_string(),
                    }
                };
                if is_transient_error(&e) {
                    debug!(manifest_uri = %uri, error = %e, latency_ms, "Transient fetch error, will retry");
                    backoff::Error::transient(err)
                } else {
                    backoff::Error::permanent(err)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let err = FetchError::Status {
                uri: uri.to_string(),
                status: status.as_u16(),
            };
            return if is_transient_status(status) {
                debug!(manifest_uri = %uri, status = %status, "Transient HTTP status, will retry");
                Err(backoff::Error::transient(err))
            } else {
                Err(backoff::Error::permanent(err))
            };
        }

        let body: Value = response.json().await.map_err(|e| {
            backoff::Error::permanent(FetchError::Json {
                uri: uri.to_string(),
                message: e.to_string(),
            })
        })?;

        debug!(
            manifest_uri = %uri,
            latency_ms = start.elapsed().as_millis() as u64,
            "Manifest fetched"
        );
        Ok(body)
    }

    fn build_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_interval,
            max_interval: self.max_interval,
            max_elapsed_time: Some(self.timeout),
            ..Default::default()
        }
    }
}

#[async_trait]
impl ManifestFetcher for HttpManifestFetcher {
    async fn fetch(&self, uri: &str) -> std::result::Result<Value, FetchError> {
        retry_limited(self.build_backoff(), self.max_retries, uri, || self.fetch_once(uri)).await
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Run `operation` until it succeeds, fails permanently, or has been retried
/// `max_retries` times.
async fn retry_limited<T, Op, Fut>(
    backoff: ExponentialBackoff,
    max_retries: u32,
    uri: &str,
    mut operation: Op,
) -> std::result::Result<T, FetchError>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, backoff::Error<FetchError>>>,
{
    let attempts = AtomicU32::new(0);
    retry_notify(
        backoff,
        || {
            let attempt = attempts.fetch_add(1, Ordering::Relaxed) + 1;
            let outcome = operation();
            async move {
                match outcome.await {
                    Err(backoff::Error::Transient { err, .. }) if attempt > max_retries => {
                        debug!(manifest_uri = %uri, attempt, "Retry limit reached");
                        Err(backoff::Error::permanent(err))
                    }
                    other => other,
                }
            }
        },
        |err: FetchError, duration: Duration| {
            warn!(
                manifest_uri = %uri,
                error = %err,
                retry_after_ms = duration.as_millis() as u64,
                "Manifest fetch retry scheduled"
            );
        },
    )
    .await
}

/// Whether a transport error is worth retrying.
pub fn is_transient_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}

pub fn is_transient_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
            | StatusCode::BAD_GATEWAY
    )
}
