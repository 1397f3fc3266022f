pub mod config;
pub mod text;
pub mod types;

pub use config::{ConfigError, KeyphraseConfig, ServiceConfig, SummaryConfig};
pub use text::{Span, Token, is_blank, normalize_whitespace, sentences, truncate_words, words};
pub use types::{AnnotateRequest, Annotation, BatchRequest, BatchResponse, Entity, HealthStatus};
