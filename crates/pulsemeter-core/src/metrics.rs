//! Counter, histogram and observable-gauge instruments.
//!
//! Push instruments keep one accumulator per label set in a `DashMap`, created
//! lazily on first observation and never evicted. Handles are cheap `Arc`
//! clones, so callers resolve them once and keep them.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, PoisonError, RwLock};
use std::thread;
use std::time::{Duration, Instant};

use atomic_float::AtomicF64;
use dashmap::DashMap;

use crate::descriptor::MetricDescriptor;
use crate::error::{Result, TelemetryError};
use crate::labels::{LabelSet, HISTOGRAM_BUCKET_LABEL};

/// Observation substituted when a gauge callback fails or overruns its budget.
pub const GAUGE_FALLBACK: f64 = 0.0;

/// One scraped value.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleValue {
    Counter(f64),
    Gauge(f64),
    Histogram(HistogramSnapshot),
}

/// Point-in-time histogram state for one label set.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramSnapshot {
    pub count: u64,
    pub sum: f64,
    /// `(upper bound, cumulative count)`; the last bound is `+Inf`.
    pub buckets: Vec<(f64, u64)>,
}

/// A `(descriptor, labels, value)` triple produced by a scrape.
#[derive(Debug, Clone)]
pub struct Sample {
    pub descriptor: Arc<MetricDescriptor>,
    pub labels: LabelSet,
    pub value: SampleValue,
}

// --------------------
// Counter
// --------------------

struct CounterCore {
    descriptor: Arc<MetricDescriptor>,
    map: DashMap<LabelSet, AtomicF64>,
}

/// Monotonic counter handle.
#[derive(Clone)]
pub struct Counter(Arc<CounterCore>);

impl Counter {
    pub(crate) fn new(descriptor: Arc<MetricDescriptor>) -> Self {
        Self(Arc::new(CounterCore {
            descriptor,
            map: DashMap::new(),
        }))
    }

    pub fn descriptor(&self) -> &MetricDescriptor {
        &self.0.descriptor
    }

    pub(crate) fn shared_descriptor(&self) -> Arc<MetricDescriptor> {
        Arc::clone(&self.0.descriptor)
    }

    /// Increment by 1. Malformed label keys drop the increment.
    pub fn inc(&self, labels: &[(&str, &str)]) {
        let key = LabelSet::from_pairs(labels);
        if let Err(e) = key.check_keys(&[]) {
            tracing::warn!(metric = %self.0.descriptor.name, error = %e, "dropping increment");
            return;
        }
        self.accumulate(key, 1.0);
    }

    /// Increment by a non-negative, finite delta.
    pub fn add(&self, delta: f64, labels: &[(&str, &str)]) -> Result<()> {
        if !delta.is_finite() || delta < 0.0 {
            return Err(TelemetryError::InvalidDelta(delta));
        }
        let key = LabelSet::from_pairs(labels);
        key.check_keys(&[])?;
        self.accumulate(key, delta);
        Ok(())
    }

    fn accumulate(&self, key: LabelSet, delta: f64) {
        let total = self.0.map.entry(key).or_insert_with(|| AtomicF64::new(0.0));
        total.fetch_add(delta, Ordering::Relaxed);
    }

    pub(crate) fn collect(&self) -> Vec<(LabelSet, f64)> {
        let mut series: Vec<(LabelSet, f64)> = self
            .0
            .map
            .iter()
            .map(|r| (r.key().clone(), r.value().load(Ordering::Relaxed)))
            .collect();
        series.sort_by(|a, b| a.0.cmp(&b.0));
        series
    }
}

// --------------------
// Histogram
// --------------------

/// Per-bucket (non-cumulative) counts; the extra trailing slot is `+Inf`.
/// Cumulative counts are derived at scrape time, so a concurrent scrape can
/// never observe a decreasing bucket sequence.
struct HistogramSeries {
    sum: AtomicF64,
    buckets: Box<[AtomicU64]>,
}

impl HistogramSeries {
    fn new(bounds: usize) -> Self {
        Self {
            sum: AtomicF64::new(0.0),
            buckets: (0..=bounds).map(|_| AtomicU64::new(0)).collect(),
        }
    }
}

struct HistogramCore {
    descriptor: Arc<MetricDescriptor>,
    map: DashMap<LabelSet, HistogramSeries>,
}

/// Fixed-bucket histogram handle.
#[derive(Clone)]
pub struct Histogram(Arc<HistogramCore>);

impl Histogram {
    pub(crate) fn new(descriptor: Arc<MetricDescriptor>) -> Self {
        Self(Arc::new(HistogramCore {
            descriptor,
            map: DashMap::new(),
        }))
    }

    pub fn descriptor(&self) -> &MetricDescriptor {
        &self.0.descriptor
    }

    pub(crate) fn shared_descriptor(&self) -> Arc<MetricDescriptor> {
        Arc::clone(&self.0.descriptor)
    }

    /// Record one observation. NaN observations and malformed label keys
    /// (including the reserved `le`) are dropped.
    pub fn record(&self, value: f64, labels: &[(&str, &str)]) {
        if value.is_nan() {
            tracing::debug!(metric = %self.0.descriptor.name, "dropping NaN observation");
            return;
        }
        let key = LabelSet::from_pairs(labels);
        if let Err(e) = key.check_keys(&[HISTOGRAM_BUCKET_LABEL]) {
            tracing::warn!(metric = %self.0.descriptor.name, error = %e, "dropping observation");
            return;
        }
        let bounds = &self.0.descriptor.buckets;
        // smallest bound >= value; past the end means +Inf
        let idx = bounds.partition_point(|b| *b < value);

        let series = self
            .0
            .map
            .entry(key)
            .or_insert_with(|| HistogramSeries::new(bounds.len()));
        series.buckets[idx].fetch_add(1, Ordering::Relaxed);
        series.sum.fetch_add(value, Ordering::Relaxed);
    }

    /// Record a duration in seconds.
    pub fn record_duration(&self, d: Duration, labels: &[(&str, &str)]) {
        self.record(d.as_secs_f64(), labels);
    }

    pub(crate) fn collect(&self) -> Vec<(LabelSet, HistogramSnapshot)> {
        let bounds = &self.0.descriptor.buckets;
        let mut series: Vec<(LabelSet, HistogramSnapshot)> = self
            .0
            .map
            .iter()
            .map(|r| {
                let s = r.value();
                let mut cumulative = 0u64;
                let buckets = s
                    .buckets
                    .iter()
                    .enumerate()
                    .map(|(i, c)| {
                        cumulative += c.load(Ordering::Relaxed);
                        let le = bounds.get(i).copied().unwrap_or(f64::INFINITY);
                        (le, cumulative)
                    })
                    .collect();
                let snap = HistogramSnapshot {
                    count: cumulative,
                    sum: s.sum.load(Ordering::Relaxed),
                    buckets,
                };
                (r.key().clone(), snap)
            })
            .collect();
        series.sort_by(|a, b| a.0.cmp(&b.0));
        series
    }
}

// --------------------
// Observable gauge
// --------------------

/// A pull-based sampling function invoked at scrape time.
///
/// `Ok(None)` means "no observation this scrape" and the series is omitted.
pub trait GaugeCallback: Send + Sync {
    fn observe(&self) -> Result<Option<f64>>;
}

impl<F> GaugeCallback for F
where
    F: Fn() -> Result<Option<f64>> + Send + Sync,
{
    fn observe(&self) -> Result<Option<f64>> {
        self()
    }
}

#[derive(Clone)]
struct Registered {
    labels: LabelSet,
    callback: Arc<dyn GaugeCallback>,
    /// Set while a worker is inside `observe`; a hung callback is not re-run.
    busy: Arc<AtomicBool>,
}

type Observation = Result<Option<f64>>;

impl Registered {
    /// Run the callback on its own worker thread.
    fn spawn_observation(&self) -> Result<mpsc::Receiver<Observation>> {
        if self.busy.swap(true, Ordering::AcqRel) {
            return Err(TelemetryError::CallbackFailure(
                "previous invocation still running".into(),
            ));
        }
        let (tx, rx) = mpsc::sync_channel(1);
        let callback = Arc::clone(&self.callback);
        let busy = Arc::clone(&self.busy);
        let spawned = thread::Builder::new()
            .name("pulsemeter-gauge".into())
            .spawn(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback.observe()))
                    .unwrap_or_else(|_| {
                        Err(TelemetryError::CallbackFailure("callback panicked".into()))
                    });
                busy.store(false, Ordering::Release);
                // the scrape may have given up already
                let _ = tx.send(outcome);
            });
        if let Err(e) = spawned {
            self.busy.store(false, Ordering::Release);
            return Err(TelemetryError::CallbackFailure(format!(
                "gauge worker spawn failed: {e}"
            )));
        }
        Ok(rx)
    }
}

struct GaugeCore {
    descriptor: Arc<MetricDescriptor>,
    callbacks: RwLock<Vec<Registered>>,
}

/// Observable gauge handle.
#[derive(Clone)]
pub struct ObservableGauge(Arc<GaugeCore>);

impl ObservableGauge {
    pub(crate) fn new(descriptor: Arc<MetricDescriptor>) -> Self {
        Self(Arc::new(GaugeCore {
            descriptor,
            callbacks: RwLock::new(Vec::new()),
        }))
    }

    pub fn descriptor(&self) -> &MetricDescriptor {
        &self.0.descriptor
    }

    pub(crate) fn shared_descriptor(&self) -> Arc<MetricDescriptor> {
        Arc::clone(&self.0.descriptor)
    }

    /// Register an unlabeled callback.
    pub fn add_callback<F>(&self, callback: F) -> Result<()>
    where
        F: Fn() -> Result<Option<f64>> + Send + Sync + 'static,
    {
        self.add_observer(&[], Arc::new(callback))
    }

    /// Register a callback whose observation is reported under `labels`.
    pub fn add_callback_with_labels<F>(&self, labels: &[(&str, &str)], callback: F) -> Result<()>
    where
        F: Fn() -> Result<Option<f64>> + Send + Sync + 'static,
    {
        self.add_observer(labels, Arc::new(callback))
    }

    /// Register a sampler object implementing [`GaugeCallback`].
    ///
    /// Each callback owns one series: malformed label keys and a label set
    /// already taken by another callback are rejected with `InvalidDescriptor`.
    pub fn add_observer(
        &self,
        labels: &[(&str, &str)],
        observer: Arc<dyn GaugeCallback>,
    ) -> Result<()> {
        let labels = LabelSet::from_pairs(labels);
        labels.check_keys(&[])?;

        let mut callbacks = self
            .0
            .callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if callbacks.iter().any(|r| r.labels == labels) {
            return Err(TelemetryError::InvalidDescriptor(format!(
                "{}: a callback already reports {{{}}}",
                self.0.descriptor.name,
                labels.render()
            )));
        }
        callbacks.push(Registered {
            labels,
            callback: observer,
            busy: Arc::new(AtomicBool::new(false)),
        });
        Ok(())
    }

    pub fn callback_count(&self) -> usize {
        self.0
            .callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Start every callback, each on its own worker thread.
    pub(crate) fn begin(&self) -> PendingObservations {
        let callbacks: Vec<Registered> = self
            .0
            .callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        PendingObservations {
            descriptor: Arc::clone(&self.0.descriptor),
            pending: callbacks
                .into_iter()
                .map(|r| {
                    let rx = r.spawn_observation();
                    (r.labels, rx)
                })
                .collect(),
        }
    }
}

/// Gauge observations in flight for one scrape.
pub(crate) struct PendingObservations {
    descriptor: Arc<MetricDescriptor>,
    pending: Vec<(LabelSet, Result<mpsc::Receiver<Observation>>)>,
}

impl PendingObservations {
    /// Wait for the observations until `deadline`.
    ///
    /// Errors, panics and observations still missing at the deadline are
    /// logged and replaced with [`GAUGE_FALLBACK`]. A callback that has not
    /// returned by the next scrape is not invoked again until it does.
    pub(crate) fn finish(self, deadline: Instant) -> Vec<(LabelSet, f64)> {
        let name = &self.descriptor.name;
        let mut out = Vec::with_capacity(self.pending.len());
        for (labels, rx) in self.pending {
            let outcome = rx.and_then(|rx| {
                match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
                    Ok(outcome) => outcome,
                    Err(RecvTimeoutError::Timeout) => Err(TelemetryError::CallbackFailure(
                        "no observation before the scrape deadline".into(),
                    )),
                    Err(RecvTimeoutError::Disconnected) => Err(TelemetryError::CallbackFailure(
                        "gauge worker exited without an observation".into(),
                    )),
                }
            });

            let value = match outcome {
                Ok(None) => continue,
                Ok(Some(v)) => v,
                Err(e) => {
                    tracing::warn!(metric = %name, error = %e, "gauge callback failed; using fallback");
                    GAUGE_FALLBACK
                }
            };
            out.push((labels, value));
        }
        out
    }
}
