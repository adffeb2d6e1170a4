//! `GET /healthcheck`: liveness probe, always 200 with an empty body.

use axum::http::StatusCode;

/// Never performs I/O.
pub async fn healthcheck() -> StatusCode {
    StatusCode::OK
}
