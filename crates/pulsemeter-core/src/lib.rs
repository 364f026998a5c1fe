//! pulsemeter core: metric type model, registry and text exposition.
//!
//! This crate defines the instruments (counters, histograms, observable
//! gauges), the registry that owns them, and the exposition format used by the
//! scrape endpoint. It carries no async runtime dependency so samplers and
//! HTTP wiring live in `pulsemeter-agent`.
//!
//! # Guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here. Gauge callbacks are
//! isolated with `catch_unwind`, so a misbehaving sampler degrades to a logged
//! warning and a fallback observation instead of failing the scrape.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod descriptor;
pub mod error;
pub mod exposition;
pub mod labels;
pub mod metrics;
pub mod registry;

pub use descriptor::{MetricDescriptor, MetricKind, DEFAULT_BUCKETS};
pub use error::{ErrorCode, Result, TelemetryError};
pub use labels::LabelSet;
pub use metrics::{
    Counter, GaugeCallback, Histogram, HistogramSnapshot, ObservableGauge, Sample, SampleValue,
    GAUGE_FALLBACK,
};
pub use registry::{Instrument, MetricRegistry};
