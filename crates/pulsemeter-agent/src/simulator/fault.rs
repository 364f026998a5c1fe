//! Fault-model state: synthetic system conditions perturbed by scenarios.
//!
//! Scenarios are the only writers (mutators are crate-private); gauges and
//! everything else read through the public getters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashSet;

use pulsemeter_core::{MetricDescriptor, MetricRegistry, Result};

pub const BASELINE_DB_CONNECTIONS: u64 = 5;

#[derive(Debug)]
pub struct FaultModel {
    db_connections: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    queue_length: AtomicU64,
    active_user_ids: DashSet<String>,
    leaked_allocation_units: AtomicU64,
}

impl Default for FaultModel {
    fn default() -> Self {
        Self {
            db_connections: AtomicU64::new(BASELINE_DB_CONNECTIONS),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            queue_length: AtomicU64::new(0),
            active_user_ids: DashSet::new(),
            leaked_allocation_units: AtomicU64::new(0),
        }
    }
}

impl FaultModel {
    pub fn db_connections(&self) -> u64 {
        self.db_connections.load(Ordering::Relaxed)
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn cache_misses(&self) -> u64 {
        self.cache_misses.load(Ordering::Relaxed)
    }

    /// Hit share in percent; `None` before any cache traffic.
    pub fn cache_hit_ratio(&self) -> Option<f64> {
        let hits = self.cache_hits() as f64;
        let total = hits + self.cache_misses() as f64;
        (total > 0.0).then(|| hits * 100.0 / total)
    }

    pub fn queue_length(&self) -> u64 {
        self.queue_length.load(Ordering::Relaxed)
    }

    pub fn active_users(&self) -> usize {
        self.active_user_ids.len()
    }

    pub fn is_active_user(&self, id: &str) -> bool {
        self.active_user_ids.contains(id)
    }

    pub fn leaked_allocation_units(&self) -> u64 {
        self.leaked_allocation_units.load(Ordering::Relaxed)
    }

    /// Returns the new value.
    pub(crate) fn add_db_connections(&self, n: u64) -> u64 {
        self.db_connections.fetch_add(n, Ordering::Relaxed) + n
    }

    pub(crate) fn set_db_connections(&self, n: u64) {
        self.db_connections.store(n, Ordering::Relaxed);
    }

    pub(crate) fn set_cache_hits(&self, n: u64) {
        self.cache_hits.store(n, Ordering::Relaxed);
    }

    /// Returns the new value.
    pub(crate) fn add_cache_misses(&self, n: u64) -> u64 {
        self.cache_misses.fetch_add(n, Ordering::Relaxed) + n
    }

    pub(crate) fn set_cache_misses(&self, n: u64) {
        self.cache_misses.store(n, Ordering::Relaxed);
    }

    /// Returns the new value.
    pub(crate) fn add_queue_length(&self, n: u64) -> u64 {
        self.queue_length.fetch_add(n, Ordering::Relaxed) + n
    }

    /// Subtract down to zero; returns the new value.
    pub(crate) fn drain_queue(&self, n: u64) -> u64 {
        let prev = self
            .queue_length
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |q| Some(q.saturating_sub(n)))
            .unwrap_or_else(|q| q);
        prev.saturating_sub(n)
    }

    pub(crate) fn add_active_user(&self, id: String) {
        self.active_user_ids.insert(id);
    }

    pub(crate) fn remove_active_user(&self, id: &str) {
        self.active_user_ids.remove(id);
    }

    /// Returns the new value.
    pub(crate) fn add_leaked_units(&self, n: u64) -> u64 {
        self.leaked_allocation_units.fetch_add(n, Ordering::Relaxed) + n
    }

    pub(crate) fn set_leaked_units(&self, n: u64) {
        self.leaked_allocation_units.store(n, Ordering::Relaxed);
    }

    /// Expose the model through observable gauges.
    pub fn register_gauges(self: &Arc<Self>, registry: &MetricRegistry) -> Result<()> {
        let fault = Arc::clone(self);
        registry
            .register_gauge(MetricDescriptor::gauge(
                "database_connections_active",
                "Number of active database connections",
            ))?
            .add_callback(move || Ok(Some(fault.db_connections() as f64)))?;

        let fault = Arc::clone(self);
        registry
            .register_gauge(
                MetricDescriptor::gauge("cache_hit_ratio", "Cache hit ratio as a percentage")
                    .with_unit("percent"),
            )?
            .add_callback(move || Ok(fault.cache_hit_ratio()))?;

        let fault = Arc::clone(self);
        registry
            .register_gauge(MetricDescriptor::gauge(
                "background_queue_length",
                "Length of background job queue",
            ))?
            .add_callback(move || Ok(Some(fault.queue_length() as f64)))?;

        let fault = Arc::clone(self);
        registry
            .register_gauge(MetricDescriptor::gauge(
                "active_users_count",
                "Number of distinct active user ids",
            ))?
            .add_callback(move || Ok(Some(fault.active_users() as f64)))?;

        let fault = Arc::clone(self);
        registry
            .register_gauge(MetricDescriptor::gauge(
                "leaked_allocation_units",
                "Allocation units held by the simulated leak",
            ))?
            .add_callback(move || Ok(Some(fault.leaked_allocation_units() as f64)))?;

        Ok(())
    }
}
