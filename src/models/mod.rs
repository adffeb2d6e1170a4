//! Data models for the scan results service.
//!
//! - [`scan`] and [`artifact`] describe what gets stored and under which identity.
//! - [`payload`] holds the inbound request bodies.
//! - [`report`] is the structured check report and its storage normalization.
//! - [`bucket`] and [`object`] are the metadata rows of the local object store.

pub mod artifact;
pub mod bucket;
pub mod object;
pub mod payload;
pub mod report;
pub mod scan;
