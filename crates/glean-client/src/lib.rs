//! Client side of the annotation service: an HTTP client guarded by a
//! circuit breaker and token-bucket rate limiters, a batcher that coalesces
//! single-document submissions, and document enrichment.

pub mod batcher;
pub mod breaker;
pub mod client;
pub mod enrich;
pub mod error;
pub mod limiter;

pub use batcher::{Batcher, BatcherConfig};
pub use breaker::{BreakerConfig, CircuitBreaker, CircuitState};
pub use client::{ClientConfig, DEFAULT_ENDPOINT, NlpClient};
pub use enrich::{Enrichment, enrich, format_entity};
pub use error::ClientError;
pub use limiter::{RateLimit, RateLimiter};
