//! Request handlers. Model work runs on the blocking pool so HTTP workers
//! stay free to accept connections.

use std::sync::Arc;
use std::time::Instant;

use actix_web::web;
use glean_core::text::is_blank;
use glean_core::types::{AnnotateRequest, Annotation, BatchRequest, BatchResponse, HealthStatus};
use tracing::{info, instrument};

use crate::error::ApiError;
use crate::state::AppState;

/// `POST /nlp`
#[instrument(skip_all, fields(bytes = body.text.len(), summary = body.needs_summary))]
pub async fn annotate(
    state: web::Data<AppState>,
    body: web::Json<AnnotateRequest>,
) -> Result<web::Json<Annotation>, ApiError> {
    let request = body.into_inner();
    if is_blank(&request.text) {
        return Ok(web::Json(Annotation::empty_for(&request)));
    }

    let started = Instant::now();
    let annotator = Arc::clone(&state.annotator);
    let annotation = web::block(move || annotator.annotate(&request)).await??;

    info!(
        entities = annotation.entities.len(),
        keyphrases = annotation.keyphrases.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "annotated document"
    );
    Ok(web::Json(annotation))
}

/// `POST /nlp/batch`
#[instrument(skip_all, fields(documents = body.documents.len()))]
pub async fn annotate_batch(
    state: web::Data<AppState>,
    body: web::Json<BatchRequest>,
) -> Result<web::Json<BatchResponse>, ApiError> {
    let BatchRequest { documents } = body.into_inner();
    if documents.is_empty() {
        return Ok(web::Json(BatchResponse::default()));
    }

    let max = state.max_batch_size;
    if documents.len() > max {
        info!(received = documents.len(), max, "batch truncated to cap");
    }

    let started = Instant::now();
    let annotator = Arc::clone(&state.annotator);
    let results = web::block(move || annotator.annotate_batch(&documents, max)).await??;

    info!(
        results = results.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "annotated batch"
    );
    Ok(web::Json(BatchResponse { results }))
}

/// `GET /health`
pub async fn health() -> web::Json<HealthStatus> {
    web::Json(HealthStatus::ok())
}
