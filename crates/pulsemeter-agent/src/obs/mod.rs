//! Application-level instrumentation.
//!
//! - [`http`]: per-request hook and the axum middleware that drives it
//! - [`business`]: domain event counters
//! - [`catalog`]: gauges backed by the persistence layer

pub mod business;
pub mod catalog;
pub mod http;

pub use business::BusinessMetrics;
pub use catalog::{register_catalog_gauges, CatalogStats};
pub use http::{status_bucket, track_requests, ClientKind, RequestGuard, RequestMetrics};
