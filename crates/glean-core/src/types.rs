//! JSON envelopes exchanged between the annotation service and its clients.

use serde::{Deserialize, Serialize};

/// A tagged text span, e.g. `{"text": "London", "label": "GPE"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub text: String,
    pub label: String,
}

impl Entity {
    pub fn new(text: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            label: label.into(),
        }
    }
}

/// Body of `POST /nlp` and one element of a batch.
///
/// Every field is optional on the wire. A missing `needs_summary` means
/// `true`, matching what older callers expect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotateRequest {
    pub text: String,
    pub needs_summary: bool,
    pub needs_embedding: bool,
}

impl Default for AnnotateRequest {
    fn default() -> Self {
        Self {
            text: String::new(),
            needs_summary: true,
            needs_embedding: false,
        }
    }
}

impl AnnotateRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_summary(mut self, needs_summary: bool) -> Self {
        self.needs_summary = needs_summary;
        self
    }

    pub fn with_embedding(mut self, needs_embedding: bool) -> Self {
        self.needs_embedding = needs_embedding;
        self
    }
}

/// Derived annotations for one document.
///
/// `summary` and `embedding` are only present when the request asked for them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub keyphrases: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Annotation {
    /// The result for blank input: every requested field present and empty.
    pub fn empty_for(request: &AnnotateRequest) -> Self {
        Self {
            entities: Vec::new(),
            keyphrases: Vec::new(),
            summary: request.needs_summary.then(String::new),
            embedding: request.needs_embedding.then(Vec::new),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
            && self.keyphrases.is_empty()
            && self.summary.as_deref().is_none_or(str::is_empty)
            && self.embedding.as_ref().is_none_or(Vec::is_empty)
    }
}

/// Body of `POST /nlp/batch`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchRequest {
    #[serde(default)]
    pub documents: Vec<AnnotateRequest>,
}

/// Response of `POST /nlp/batch`; `results[i]` belongs to `documents[i]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResponse {
    pub results: Vec<Annotation>,
}

/// Response of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

impl HealthStatus {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}
