//! HTTP middleware: request IDs, request tracing, panic recovery and request
//! metrics.

pub mod metrics;
pub mod recovery;
pub mod trace;
