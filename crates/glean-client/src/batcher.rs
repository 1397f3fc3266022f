//! Coalesces single-document submissions into batch calls.
//!
//! One background task owns the pending queue. It flushes when `batch_size`
//! items are waiting or when `batch_timeout` passes, whichever comes first,
//! and again on shutdown. Each caller gets its own result back through a
//! oneshot channel, matched by position in the batch.

use std::sync::Arc;
use std::time::Duration;

use glean_core::text::is_blank;
use glean_core::types::{AnnotateRequest, Annotation};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::client::NlpClient;
use crate::error::ClientError;

#[derive(Debug, Clone)]
pub struct BatcherConfig {
    pub batch_size: usize,
    pub batch_timeout: Duration,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            batch_timeout: Duration::from_millis(500),
        }
    }
}

struct Pending {
    request: AnnotateRequest,
    reply: oneshot::Sender<Result<Annotation, ClientError>>,
}

/// Handle for submitting documents. Dropping every handle (or calling
/// [`Batcher::shutdown`]) flushes what is queued and stops the task.
pub struct Batcher {
    tx: mpsc::Sender<Pending>,
    task: JoinHandle<()>,
}

impl Batcher {
    pub fn spawn(client: Arc<NlpClient>, config: BatcherConfig) -> Self {
        let batch_size = config.batch_size.max(1);
        let (tx, rx) = mpsc::channel(batch_size * 4);
        let task = tokio::spawn(run(client, rx, batch_size, config.batch_timeout));
        Self { tx, task }
    }

    /// Queue a document and wait for its annotation.
    pub async fn submit(&self, request: AnnotateRequest) -> Result<Annotation, ClientError> {
        if is_blank(&request.text) {
            return Ok(Annotation::empty_for(&request));
        }
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Pending { request, reply })
            .await
            .map_err(|_| ClientError::Closed)?;
        rx.await.map_err(|_| ClientError::Closed)?
    }

    /// Stop accepting work, flush the queue, and wait for the task to finish.
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.task.await {
            warn!(error = %e, "batcher task ended abnormally");
        }
    }
}

async fn run(
    client: Arc<NlpClient>,
    mut rx: mpsc::Receiver<Pending>,
    batch_size: usize,
    batch_timeout: Duration,
) {
    let mut queue: Vec<Pending> = Vec::with_capacity(batch_size);
    let mut ticker = tokio::time::interval(batch_timeout.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        tokio::select! {
            item = rx.recv() => match item {
                Some(item) => {
                    queue.push(item);
                    if queue.len() >= batch_size {
                        flush(&client, &mut queue).await;
                        ticker.reset();
                    }
                }
                None => {
                    flush(&client, &mut queue).await;
                    debug!("batcher stopped");
                    return;
                }
            },
            _ = ticker.tick() => {
                flush(&client, &mut queue).await;
            }
        }
    }
}

async fn flush(client: &NlpClient, queue: &mut Vec<Pending>) {
    if queue.is_empty() {
        return;
    }
    let items = std::mem::take(queue);
    let requests: Vec<AnnotateRequest> = items.iter().map(|p| p.request.clone()).collect();
    debug!(size = requests.len(), "flushing batch");

    match client.annotate_batch(&requests).await {
        Ok(results) => {
            for (item, result) in items.into_iter().zip(results) {
                let _ = item.reply.send(Ok(result));
            }
        }
        Err(e) => {
            warn!(error = %e, size = items.len(), "batch failed");
            for item in items {
                let err = match &e {
                    ClientError::CircuitOpen => ClientError::CircuitOpen,
                    other => ClientError::BatchFailed(other.to_string()),
                };
                let _ = item.reply.send(Err(err));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn results(keyphrases: &[&str]) -> serde_json::Value {
        let results: Vec<_> = keyphrases
            .iter()
            .map(|k| json!({"entities": [], "keyphrases": [k]}))
            .collect();
        json!({ "results": results })
    }

    #[tokio::test]
    async fn full_batch_flushes_and_each_caller_gets_its_result() {
        let server = MockServer::start();
        // Replies follow document order, so either queue order maps alpha to "a".
        let alpha_first = server.mock(|when, then| {
            when.method(POST)
                .path("/nlp/batch")
                .body_contains(r#""documents":[{"text":"alpha""#);
            then.status(200).json_body(results(&["a", "b"]));
        });
        let beta_first = server.mock(|when, then| {
            when.method(POST)
                .path("/nlp/batch")
                .body_contains(r#""documents":[{"text":"beta""#);
            then.status(200).json_body(results(&["b", "a"]));
        });

        let client = Arc::new(NlpClient::new(server.url("/nlp")).unwrap());
        let batcher = Batcher::spawn(
            client,
            BatcherConfig {
                batch_size: 2,
                batch_timeout: Duration::from_secs(60),
            },
        );

        let (a, b) = tokio::join!(
            batcher.submit(AnnotateRequest::new("alpha")),
            batcher.submit(AnnotateRequest::new("beta")),
        );
        assert_eq!(alpha_first.hits() + beta_first.hits(), 1);

        assert_eq!(a.unwrap().keyphrases, vec!["a".to_string()]);
        assert_eq!(b.unwrap().keyphrases, vec!["b".to_string()]);
        batcher.shutdown().await;
    }

    #[tokio::test]
    async fn timeout_flushes_partial_batch() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/nlp/batch");
            then.status(200).json_body(results(&["only"]));
        });

        let client = Arc::new(NlpClient::new(server.url("/nlp")).unwrap());
        let batcher = Batcher::spawn(
            client,
            BatcherConfig {
                batch_size: 10,
                batch_timeout: Duration::from_millis(50),
            },
        );

        let annotation = batcher.submit(AnnotateRequest::new("lonely")).await.unwrap();
        assert_eq!(annotation.keyphrases, vec!["only".to_string()]);
        mock.assert_hits(1);
        batcher.shutdown().await;
    }

    #[tokio::test]
    async fn failures_reach_every_caller() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/nlp/batch");
            then.status(500).body("down");
        });

        let client = Arc::new(NlpClient::new(server.url("/nlp")).unwrap());
        let batcher = Batcher::spawn(
            client,
            BatcherConfig {
                batch_size: 2,
                batch_timeout: Duration::from_secs(60),
            },
        );

        let (a, b) = tokio::join!(
            batcher.submit(AnnotateRequest::new("one")),
            batcher.submit(AnnotateRequest::new("two")),
        );
        assert!(matches!(a, Err(ClientError::BatchFailed(_))));
        assert!(matches!(b, Err(ClientError::BatchFailed(_))));
        batcher.shutdown().await;
    }

    #[tokio::test]
    async fn blank_submissions_resolve_locally() {
        let server = MockServer::start();
        let client = Arc::new(NlpClient::new(server.url("/nlp")).unwrap());
        let batcher = Batcher::spawn(client, BatcherConfig::default());

        let annotation = batcher.submit(AnnotateRequest::new("")).await.unwrap();
        assert!(annotation.is_empty());
        batcher.shutdown().await;
    }
}
