//! Catalog gauges read from the persistence layer at scrape time.

use std::sync::Arc;

use pulsemeter_core::{MetricDescriptor, MetricRegistry, Result};

/// Counts the persistence layer can answer. Errors degrade to the gauge fallback.
pub trait CatalogStats: Send + Sync {
    fn total_users(&self) -> Result<u64>;

    fn total_stores(&self) -> Result<u64>;

    /// Mean over every rating of every store; 0 when there are none.
    fn average_rating(&self) -> Result<f64>;
}

pub fn register_catalog_gauges(registry: &MetricRegistry, stats: Arc<dyn CatalogStats>) -> Result<()> {
    let s = Arc::clone(&stats);
    registry
        .register_gauge(MetricDescriptor::gauge("total_users", "Total users in the system"))?
        .add_callback(move || Ok(Some(s.total_users()? as f64)))?;

    let s = Arc::clone(&stats);
    registry
        .register_gauge(MetricDescriptor::gauge("total_stores", "Total stores in the system"))?
        .add_callback(move || Ok(Some(s.total_stores()? as f64)))?;

    registry
        .register_gauge(MetricDescriptor::gauge(
            "current_average_rating",
            "Current average rating across all stores",
        ))?
        .add_callback(move || Ok(Some(stats.average_rating()?)))?;

    Ok(())
}
