//! HTTP client for the annotation service.

use std::future::Future;
use std::time::Duration;

use glean_core::text::is_blank;
use glean_core::types::{AnnotateRequest, Annotation, BatchRequest, BatchResponse, HealthStatus};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::breaker::{BreakerConfig, CircuitBreaker, CircuitState};
use crate::error::ClientError;
use crate::limiter::{RateLimit, RateLimiter};

/// Default service endpoint.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:5000/nlp";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Timeout for single-document calls.
    pub timeout: Duration,
    /// Timeout for batch calls.
    pub batch_timeout: Duration,
    pub rate_limit: RateLimit,
    pub batch_rate_limit: RateLimit,
    pub breaker: BreakerConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            batch_timeout: Duration::from_secs(30),
            rate_limit: RateLimit::new(20.0, 30),
            batch_rate_limit: RateLimit::new(5.0, 10),
            breaker: BreakerConfig::default(),
        }
    }
}

/// Client for `POST /nlp`, `POST /nlp/batch` and `GET /health`.
///
/// `endpoint` is the single-document URL, e.g. `http://localhost:5000/nlp`.
/// Batch calls go to `{endpoint}/batch`; the health check replaces a trailing
/// `/nlp` with `/health`.
pub struct NlpClient {
    http: reqwest::Client,
    endpoint: String,
    config: ClientConfig,
    breaker: CircuitBreaker,
    limiter: RateLimiter,
    batch_limiter: RateLimiter,
}

impl NlpClient {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_config(endpoint, ClientConfig::default())
    }

    pub fn with_config(
        endpoint: impl Into<String>,
        config: ClientConfig,
    ) -> Result<Self, ClientError> {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        Ok(Self {
            http: reqwest::Client::builder().build()?,
            breaker: CircuitBreaker::new(endpoint.clone(), config.breaker.clone()),
            limiter: RateLimiter::new(config.rate_limit),
            batch_limiter: RateLimiter::new(config.batch_rate_limit),
            endpoint,
            config,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn batch_url(&self) -> String {
        format!("{}/batch", self.endpoint)
    }

    pub fn health_url(&self) -> String {
        let base = self.endpoint.strip_suffix("/nlp").unwrap_or(&self.endpoint);
        format!("{base}/health")
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.state()
    }

    /// Annotate one document. Blank text never leaves the process.
    pub async fn annotate(&self, request: &AnnotateRequest) -> Result<Annotation, ClientError> {
        if is_blank(&request.text) {
            return Ok(Annotation::empty_for(request));
        }
        self.limiter.acquire().await;
        self.guarded(self.post_json(&self.endpoint, request, self.config.timeout))
            .await
    }

    /// Annotate several documents in one call; `result[i]` belongs to `requests[i]`.
    pub async fn annotate_batch(
        &self,
        requests: &[AnnotateRequest],
    ) -> Result<Vec<Annotation>, ClientError> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }
        self.batch_limiter.acquire().await;

        let body = BatchRequest {
            documents: requests.to_vec(),
        };
        let url = self.batch_url();
        let response: BatchResponse = self
            .guarded(self.post_json(&url, &body, self.config.batch_timeout))
            .await?;

        if response.results.len() != requests.len() {
            warn!(
                expected = requests.len(),
                got = response.results.len(),
                "batch result count mismatch"
            );
            return Err(ClientError::ResultCount {
                expected: requests.len(),
                got: response.results.len(),
            });
        }
        Ok(response.results)
    }

    /// `GET /health`. Bypasses the breaker and the rate limiter.
    pub async fn health(&self) -> Result<HealthStatus, ClientError> {
        let resp = self
            .http
            .get(self.health_url())
            .timeout(self.config.timeout)
            .send()
            .await?;
        decode(resp).await
    }

    async fn guarded<T>(
        &self,
        call: impl Future<Output = Result<T, ClientError>>,
    ) -> Result<T, ClientError> {
        if !self.breaker.allow_request() {
            return Err(ClientError::CircuitOpen);
        }
        match call.await {
            Ok(value) => {
                self.breaker.record_success();
                Ok(value)
            }
            Err(e) => {
                self.breaker.record_failure();
                Err(e)
            }
        }
    }

    async fn post_json<B, T>(&self, url: &str, body: &B, timeout: Duration) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!(url, "posting to annotation service");
        let resp = self
            .http
            .post(url)
            .timeout(timeout)
            .json(body)
            .send()
            .await?;
        decode(resp).await
    }
}

async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ClientError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ClientError::Server {
            status: status.as_u16(),
            body,
        });
    }
    let bytes = resp.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glean_core::types::Entity;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client(server: &MockServer) -> NlpClient {
        NlpClient::new(server.url("/nlp/")).unwrap()
    }

    #[test]
    fn derived_urls() {
        let c = NlpClient::new("http://svc:5000/nlp/").unwrap();
        assert_eq!(c.endpoint(), "http://svc:5000/nlp");
        assert_eq!(c.batch_url(), "http://svc:5000/nlp/batch");
        assert_eq!(c.health_url(), "http://svc:5000/health");

        let c = NlpClient::new("http://svc:5000").unwrap();
        assert_eq!(c.health_url(), "http://svc:5000/health");
    }

    #[tokio::test]
    async fn annotate_posts_request() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/nlp")
                .json_body(json!({"text": "Acme in Paris", "needs_summary": false, "needs_embedding": false}));
            then.status(200).json_body(json!({
                "entities": [{"text": "Paris", "label": "GPE"}],
                "keyphrases": ["acme"]
            }));
        });

        let annotation = client(&server)
            .annotate(&AnnotateRequest::new("Acme in Paris").with_summary(false))
            .await
            .unwrap();

        mock.assert();
        assert_eq!(annotation.entities, vec![Entity::new("Paris", "GPE")]);
        assert_eq!(annotation.keyphrases, vec!["acme".to_string()]);
        assert!(annotation.summary.is_none());
    }

    #[tokio::test]
    async fn blank_text_skips_the_network() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/nlp");
            then.status(500);
        });

        let annotation = client(&server)
            .annotate(&AnnotateRequest::new("  "))
            .await
            .unwrap();

        mock.assert_hits(0);
        assert_eq!(annotation.summary.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn server_error_carries_body() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/nlp");
            then.status(500).body("model crashed");
        });

        let err = client(&server)
            .annotate(&AnnotateRequest::new("text"))
            .await
            .unwrap_err();
        match err {
            ClientError::Server { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "model crashed");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn batch_posts_to_batch_url() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/nlp/batch");
            then.status(200).json_body(json!({"results": [
                {"entities": [], "keyphrases": ["first"]},
                {"entities": [], "keyphrases": ["second"]}
            ]}));
        });

        let results = client(&server)
            .annotate_batch(&[AnnotateRequest::new("one"), AnnotateRequest::new("two")])
            .await
            .unwrap();

        mock.assert();
        assert_eq!(results[0].keyphrases, vec!["first".to_string()]);
        assert_eq!(results[1].keyphrases, vec!["second".to_string()]);
    }

    #[tokio::test]
    async fn batch_count_mismatch_is_an_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/nlp/batch");
            then.status(200)
                .json_body(json!({"results": [{"entities": [], "keyphrases": []}]}));
        });

        let err = client(&server)
            .annotate_batch(&[AnnotateRequest::new("one"), AnnotateRequest::new("two")])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::ResultCount {
                expected: 2,
                got: 1
            }
        ));
    }

    #[tokio::test]
    async fn breaker_opens_after_repeated_failures() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/nlp");
            then.status(503);
        });

        let c = NlpClient::with_config(
            server.url("/nlp"),
            ClientConfig {
                breaker: BreakerConfig {
                    failure_threshold: 2,
                    ..BreakerConfig::default()
                },
                ..ClientConfig::default()
            },
        )
        .unwrap();

        let request = AnnotateRequest::new("text");
        for _ in 0..2 {
            assert!(matches!(
                c.annotate(&request).await,
                Err(ClientError::Server { status: 503, .. })
            ));
        }
        assert_eq!(c.circuit_state(), CircuitState::Open);
        assert!(matches!(
            c.annotate(&request).await,
            Err(ClientError::CircuitOpen)
        ));
        mock.assert_hits(2);
    }

    #[tokio::test]
    async fn health_check() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/health");
            then.status(200).json_body(json!({"status": "ok"}));
        });

        let status = client(&server).health().await.unwrap();
        assert_eq!(status, HealthStatus::ok());
    }
}
