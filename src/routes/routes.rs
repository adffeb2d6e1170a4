//! Defines the HTTP surface of the results service.
//!
//! ## Structure
//! - `POST /v1/report`: upload a check report, 201 + `Location` link
//! - `POST /v1/raw`: upload base64 raw check output, 201 + `Location` link
//! - `GET  /v1/reports/{date}/{scan}/{check}`: download a report
//! - `GET  /v1/logs/{date}/{scan}/{check}`: download a raw log
//! - `GET  /healthcheck`: liveness
//!
//! Any failed upload or download answers 400. Upload bodies are not size
//! capped: raw logs are arbitrary blobs.

use crate::{
    handlers::{
        health_handlers::healthcheck,
        results_handlers::{download_log, download_report, upload_raw, upload_report},
    },
    middleware::{
        metrics::track_request_metrics,
        recovery::create_catch_panic_layer,
        trace::{create_propagate_request_id_layer, create_request_id_layer, create_trace_layer},
    },
    services::artifact_store::ArtifactStore,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};
use tower::ServiceBuilder;

/// Build the router for all results routes.
///
/// The router carries the shared [`ArtifactStore`] to all handlers.
pub fn routes() -> Router<ArtifactStore> {
    Router::new()
        .route("/healthcheck", get(healthcheck))
        .route("/v1/report", post(upload_report))
        .route("/v1/raw", post(upload_raw))
        .route("/v1/reports/{date}/{scan}/{check}", get(download_report))
        .route("/v1/logs/{date}/{scan}/{check}", get(download_log))
}

/// The routes with their state and the request ID, trace, metrics and panic
/// recovery layers.
pub fn app(artifacts: ArtifactStore) -> Router {
    routes()
        .with_state(artifacts)
        .layer(DefaultBodyLimit::disable())
        .layer(create_catch_panic_layer())
        .layer(middleware::from_fn(track_request_metrics))
        .layer(
            ServiceBuilder::new()
                .layer(create_request_id_layer())
                .layer(create_trace_layer())
                .layer(create_propagate_request_id_layer()),
        )
}
