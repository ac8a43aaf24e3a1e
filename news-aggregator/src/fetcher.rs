use crate::config::{ProxyRoute, ResponseShape};
use crate::types::{AggregatorError, Result};
use chrono::Utc;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Why a single route attempt was abandoned.
#[derive(Debug, thiserror::Error)]
pub enum AttemptError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("HTTP status {0}")]
    Status(u16),
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("empty body")]
    Empty,
    #[error("wrapped field `{0}` missing")]
    MissingField(String),
    #[error("wrapper is not JSON: {0}")]
    Wrapper(#[from] serde_json::Error),
    #[error("body rejected")]
    Rejected,
}

/// Fetches a target through an ordered chain of alternate routes.
///
/// Every failure mode of an attempt (status, timeout, transport, decode,
/// rejection) moves on to the next route. Exhausting the chain yields `None`.
#[derive(Clone)]
pub struct ProxyChainFetcher {
    client: Client,
}

impl ProxyChainFetcher {
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| AggregatorError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    pub async fn fetch<T, F>(
        &self,
        target: &str,
        routes: &[ProxyRoute],
        timeout: Duration,
        accept: F,
    ) -> Option<T>
    where
        F: Fn(String) -> Option<T>,
    {
        let started = Instant::now();

        for route in routes {
            let request_url = route.resolve(target, Utc::now().timestamp_millis());
            debug!("Fetching {} via {}", target, route.name);

            let attempt = match tokio::time::timeout(timeout, self.attempt(&request_url, &route.shape)).await {
                Ok(result) => result,
                Err(_) => Err(AttemptError::Timeout(timeout)),
            };

            let outcome = attempt.and_then(|body| accept(body).ok_or(AttemptError::Rejected));
            match outcome {
                Ok(value) => {
                    info!(
                        "Fetched {} via {} in {}ms",
                        target,
                        route.name,
                        started.elapsed().as_millis()
                    );
                    return Some(value);
                }
                Err(e) => {
                    debug!("Route {} failed for {}: {}", route.name, target, e);
                }
            }
        }

        warn!("All {} routes failed for {}", routes.len(), target);
        None
    }

    /// One request plus body read. The caller bounds it with a timeout.
    async fn attempt(&self, request_url: &str, shape: &ResponseShape) -> std::result::Result<String, AttemptError> {
        let response = self.client.get(request_url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        let body = match shape {
            ResponseShape::Text => body,
            ResponseShape::JsonWrapped { field } => {
                let wrapper: serde_json::Value = serde_json::from_str(&body)?;
                wrapper
                    .get(field)
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
                    .ok_or_else(|| AttemptError::MissingField(field.clone()))?
            }
        };

        if body.trim().is_empty() {
            return Err(AttemptError::Empty);
        }
        Ok(body)
    }
}
