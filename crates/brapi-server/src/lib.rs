//! BrAPI Server Library
//!
//! HTTP shell around the VCF ingestion pipeline.
//!
//! # Routes
//!
//! - `POST /brapi/v2/upload`: multipart upload (field `file`), ingested within
//!   the request. Answers with a BrAPI envelope whose `result` is the
//!   ingestion report.
//! - `GET /static/*`: the raw uploaded files, at the URLs recorded as
//!   `file_url` in `vcf_metadata`.
//! - `GET /health`: storage backend ping.
//!
//! Every error body uses the same envelope with an `ERROR` status entry.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use brapi_ingest::IngestPipeline;
use tower::ServiceBuilder;
use tower_http::services::ServeDir;

pub mod api;
pub mod config;
pub mod error;
pub mod middleware;

pub use config::Config;
pub use error::AppError;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub pipeline: IngestPipeline,
}

impl AppState {
    pub fn new(pipeline: IngestPipeline) -> Self {
        Self { pipeline }
    }
}

/// Create the application router with all routes and middleware
pub fn create_router(state: AppState, config: &config::ServerConfig) -> Router {
    let static_files = ServeDir::new(state.pipeline.static_area().root());

    let upload_routes = Router::new()
        .route("/brapi/v2/upload", post(api::upload::upload_vcf))
        .layer(
            ServiceBuilder::new()
                .layer(DefaultBodyLimit::disable())
                .layer(middleware::upload_limit_layer(config.max_upload_bytes)),
        );

    Router::new()
        .route("/health", get(api::health::health_check))
        .merge(upload_routes)
        .nest_service("/static", static_files)
        .with_state(state)
        .layer(middleware::tracing_layer())
}
