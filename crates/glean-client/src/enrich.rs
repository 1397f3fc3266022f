//! Projection of an annotation onto an indexed document.

use chrono::{DateTime, Utc};
use glean_core::text::is_blank;
use glean_core::types::{AnnotateRequest, Annotation, Entity};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::client::NlpClient;
use crate::error::ClientError;

/// Document metadata derived from an annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrichment {
    /// `"LABEL: text"`, e.g. `"GPE: London"`.
    pub entities: Vec<String>,
    pub keywords: Vec<String>,
    pub summary: String,
    pub enriched_at: DateTime<Utc>,
}

impl Enrichment {
    pub fn from_annotation(annotation: Annotation, enriched_at: DateTime<Utc>) -> Self {
        Self {
            entities: annotation.entities.iter().map(format_entity).collect(),
            keywords: annotation.keyphrases,
            summary: annotation.summary.unwrap_or_default(),
            enriched_at,
        }
    }
}

pub fn format_entity(entity: &Entity) -> String {
    format!("{}: {}", entity.label, entity.text)
}

/// Annotate `text` for indexing.
///
/// Enrichment is best-effort: blank text, an open circuit, or any service
/// error yields `None` and the document is indexed without it.
pub async fn enrich(client: &NlpClient, text: &str) -> Option<Enrichment> {
    if is_blank(text) {
        return None;
    }
    match client.annotate(&AnnotateRequest::new(text)).await {
        Ok(annotation) => Some(Enrichment::from_annotation(annotation, Utc::now())),
        Err(ClientError::CircuitOpen) => {
            warn!("skipping enrichment, circuit breaker open");
            None
        }
        Err(e) => {
            warn!(error = %e, "enrichment failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[test]
    fn entity_formatting() {
        assert_eq!(format_entity(&Entity::new("London", "GPE")), "GPE: London");
    }

    #[test]
    fn missing_summary_becomes_empty() {
        let annotation = Annotation {
            entities: vec![Entity::new("Acme Corp", "ORG")],
            keyphrases: vec!["widgets".into()],
            summary: None,
            embedding: None,
        };
        let at = Utc::now();
        let enrichment = Enrichment::from_annotation(annotation, at);
        assert_eq!(enrichment.entities, vec!["ORG: Acme Corp".to_string()]);
        assert_eq!(enrichment.keywords, vec!["widgets".to_string()]);
        assert_eq!(enrichment.summary, "");
        assert_eq!(enrichment.enriched_at, at);
    }

    #[tokio::test]
    async fn enriches_from_service() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/nlp");
            then.status(200).json_body(json!({
                "entities": [{"text": "Berlin", "label": "GPE"}],
                "keyphrases": ["rust meetup"],
                "summary": "A meetup in Berlin."
            }));
        });

        let client = NlpClient::new(server.url("/nlp")).unwrap();
        let enrichment = enrich(&client, "A meetup in Berlin.").await.unwrap();
        assert_eq!(enrichment.entities, vec!["GPE: Berlin".to_string()]);
        assert_eq!(enrichment.keywords, vec!["rust meetup".to_string()]);
        assert_eq!(enrichment.summary, "A meetup in Berlin.");
    }

    #[tokio::test]
    async fn failures_are_swallowed() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/nlp");
            then.status(502);
        });

        let client = NlpClient::new(server.url("/nlp")).unwrap();
        assert!(enrich(&client, "some text").await.is_none());
        assert!(enrich(&client, "   ").await.is_none());
    }
}
