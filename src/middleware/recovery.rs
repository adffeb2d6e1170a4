//! Panic recovery.
//!
//! A panicking handler answers 500 with the usual JSON error body instead of
//! dropping the connection.

use crate::errors::AppError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::any::Any;
use tower_http::catch_panic::CatchPanicLayer;

/// Tracing target for panic recovery.
const TRACING_TARGET_PANIC: &str = "scan_results::recovery::panic";

type Panic = Box<dyn Any + Send + 'static>;

pub fn create_catch_panic_layer() -> CatchPanicLayer<fn(Panic) -> Response> {
    CatchPanicLayer::custom(catch_panic as fn(Panic) -> Response)
}

fn catch_panic(err: Panic) -> Response {
    let message = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic type");

    tracing::error!(
        target: TRACING_TARGET_PANIC,
        message = %message,
        "service panic"
    );

    AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "An unexpected panic occurred").into_response()
}
