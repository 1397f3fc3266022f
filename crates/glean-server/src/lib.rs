//! HTTP front end for the annotator.
//!
//! | route | body | response |
//! |---|---|---|
//! | `POST /nlp` | `AnnotateRequest` | `Annotation` |
//! | `POST /nlp/batch` | `BatchRequest` | `BatchResponse` |
//! | `GET /health` | | `{"status": "ok"}` |

pub mod error;
pub mod handlers;
pub mod state;

use std::io;
use std::sync::Arc;

use actix_web::dev::Server;
use actix_web::middleware::Logger;
use actix_web::{App, HttpServer, web};
use glean_ai::Annotator;
use glean_core::config::ServiceConfig;
use tracing::info;

pub use error::ApiError;
pub use state::AppState;

/// Largest accepted JSON body. Batches of long documents add up.
const JSON_LIMIT: usize = 8 * 1024 * 1024;

/// Register the routes on an app or scope.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().limit(JSON_LIMIT))
        .route("/nlp", web::post().to(handlers::annotate))
        .route("/nlp/batch", web::post().to(handlers::annotate_batch))
        .route("/health", web::get().to(handlers::health));
}

/// Bind the annotation server. The returned future runs until shutdown.
pub fn server(config: &ServiceConfig, annotator: Arc<Annotator>) -> io::Result<Server> {
    let addr = config
        .bind_addr()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let workers = config.worker_count();
    let state = web::Data::new(AppState::new(annotator, config.max_batch_size));

    info!(%addr, workers, max_batch_size = config.max_batch_size, "starting annotation server");
    Ok(HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .workers(workers)
    .bind(addr)?
    .run())
}
