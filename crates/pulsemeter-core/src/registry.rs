//! Metric registry: owns every instrument and serves scrapes.
//!
//! One registry is constructed at startup and shared via `Arc`; there is no
//! process-global instance.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use crate::descriptor::{MetricDescriptor, MetricKind};
use crate::error::{Result, TelemetryError};
use crate::exposition;
use crate::metrics::{Counter, Histogram, ObservableGauge, Sample, SampleValue};

/// Default time budget for the gauge callbacks of one scrape.
pub const DEFAULT_CALLBACK_BUDGET: Duration = Duration::from_millis(250);

/// Handle returned by [`MetricRegistry::register`].
#[derive(Clone)]
pub enum Instrument {
    Counter(Counter),
    Histogram(Histogram),
    Gauge(ObservableGauge),
}

impl Instrument {
    pub fn descriptor(&self) -> &MetricDescriptor {
        match self {
            Instrument::Counter(c) => c.descriptor(),
            Instrument::Histogram(h) => h.descriptor(),
            Instrument::Gauge(g) => g.descriptor(),
        }
    }

    fn descriptor_arc(&self) -> Arc<MetricDescriptor> {
        match self {
            Instrument::Counter(c) => c.shared_descriptor(),
            Instrument::Histogram(h) => h.shared_descriptor(),
            Instrument::Gauge(g) => g.shared_descriptor(),
        }
    }
}

pub struct MetricRegistry {
    // registration order is scrape order
    instruments: RwLock<Vec<Instrument>>,
    callback_budget: Duration,
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self::with_callback_budget(DEFAULT_CALLBACK_BUDGET)
    }

    pub fn with_callback_budget(callback_budget: Duration) -> Self {
        Self {
            instruments: RwLock::new(Vec::new()),
            callback_budget,
        }
    }

    /// Register a new instrument. Fails with `DuplicateMetric` on a repeated name.
    pub fn register(&self, descriptor: MetricDescriptor) -> Result<Instrument> {
        descriptor.validate()?;

        let mut instruments = self
            .instruments
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if instruments
            .iter()
            .any(|i| i.descriptor().name == descriptor.name)
        {
            return Err(TelemetryError::DuplicateMetric(descriptor.name));
        }

        let kind = descriptor.kind;
        let descriptor = Arc::new(descriptor);
        let instrument = match kind {
            MetricKind::Counter => Instrument::Counter(Counter::new(descriptor)),
            MetricKind::Histogram => Instrument::Histogram(Histogram::new(descriptor)),
            MetricKind::ObservableGauge => Instrument::Gauge(ObservableGauge::new(descriptor)),
        };
        tracing::debug!(metric = %instrument.descriptor().name, kind = kind.as_str(), "metric registered");
        instruments.push(instrument.clone());
        Ok(instrument)
    }

    pub fn register_counter(&self, descriptor: MetricDescriptor) -> Result<Counter> {
        expect_kind(&descriptor, MetricKind::Counter)?;
        match self.register(descriptor)? {
            Instrument::Counter(c) => Ok(c),
            other => Err(kind_mismatch(other.descriptor())),
        }
    }

    pub fn register_histogram(&self, descriptor: MetricDescriptor) -> Result<Histogram> {
        expect_kind(&descriptor, MetricKind::Histogram)?;
        match self.register(descriptor)? {
            Instrument::Histogram(h) => Ok(h),
            other => Err(kind_mismatch(other.descriptor())),
        }
    }

    pub fn register_gauge(&self, descriptor: MetricDescriptor) -> Result<ObservableGauge> {
        expect_kind(&descriptor, MetricKind::ObservableGauge)?;
        match self.register(descriptor)? {
            Instrument::Gauge(g) => Ok(g),
            other => Err(kind_mismatch(other.descriptor())),
        }
    }

    fn lookup(&self, name: &str) -> Option<Instrument> {
        self.instruments
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|i| i.descriptor().name == name)
            .cloned()
    }

    /// Look up a counter. Missing name or other kind is `UnknownMetric`.
    pub fn counter(&self, name: &str) -> Result<Counter> {
        match self.lookup(name) {
            Some(Instrument::Counter(c)) => Ok(c),
            _ => Err(TelemetryError::UnknownMetric(name.to_string())),
        }
    }

    pub fn histogram(&self, name: &str) -> Result<Histogram> {
        match self.lookup(name) {
            Some(Instrument::Histogram(h)) => Ok(h),
            _ => Err(TelemetryError::UnknownMetric(name.to_string())),
        }
    }

    pub fn gauge(&self, name: &str) -> Result<ObservableGauge> {
        match self.lookup(name) {
            Some(Instrument::Gauge(g)) => Ok(g),
            _ => Err(TelemetryError::UnknownMetric(name.to_string())),
        }
    }

    pub fn descriptors(&self) -> Vec<MetricDescriptor> {
        self.instruments
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|i| i.descriptor().clone())
            .collect()
    }

    /// Read every instrument.
    ///
    /// All gauge callbacks start together on worker threads and share one
    /// deadline, so a scrape waits at most the callback budget for them.
    ///
    /// Updates racing with the scrape may or may not be included; the result
    /// is not a transactional snapshot across metrics.
    pub fn scrape(&self) -> Vec<Sample> {
        let instruments: Vec<Instrument> = self
            .instruments
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let pending: Vec<_> = instruments
            .iter()
            .map(|i| match i {
                Instrument::Gauge(g) => Some(g.begin()),
                _ => None,
            })
            .collect();
        let deadline = Instant::now() + self.callback_budget;

        let mut out = Vec::new();
        for (instrument, pending) in instruments.into_iter().zip(pending) {
            let descriptor = instrument.descriptor_arc();
            match &instrument {
                Instrument::Counter(c) => {
                    out.extend(c.collect().into_iter().map(|(labels, v)| Sample {
                        descriptor: Arc::clone(&descriptor),
                        labels,
                        value: SampleValue::Counter(v),
                    }));
                }
                Instrument::Histogram(h) => {
                    out.extend(h.collect().into_iter().map(|(labels, snap)| Sample {
                        descriptor: Arc::clone(&descriptor),
                        labels,
                        value: SampleValue::Histogram(snap),
                    }));
                }
                Instrument::Gauge(_) => {
                    let observed = pending.map(|p| p.finish(deadline)).unwrap_or_default();
                    out.extend(observed.into_iter().map(|(labels, v)| Sample {
                        descriptor: Arc::clone(&descriptor),
                        labels,
                        value: SampleValue::Gauge(v),
                    }));
                }
            }
        }
        out
    }

    /// Scrape and render in the text exposition format.
    pub fn render(&self) -> String {
        exposition::render(&self.scrape())
    }
}

fn expect_kind(descriptor: &MetricDescriptor, kind: MetricKind) -> Result<()> {
    if descriptor.kind != kind {
        return Err(TelemetryError::InvalidDescriptor(format!(
            "{}: expected {} descriptor, got {}",
            descriptor.name,
            kind.as_str(),
            descriptor.kind.as_str()
        )));
    }
    Ok(())
}

fn kind_mismatch(descriptor: &MetricDescriptor) -> TelemetryError {
    TelemetryError::Internal(format!("{}: registered with unexpected kind", descriptor.name))
}
