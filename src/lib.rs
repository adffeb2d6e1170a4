//! Storage service for scan check results.
//!
//! Checks upload a JSON report and their raw log output; both are stored
//! under a date/scan/check key and handed back as links. Reports with
//! findings are also kept gzip-compressed in a dedicated bucket.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
