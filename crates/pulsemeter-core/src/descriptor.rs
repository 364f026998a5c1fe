//! Metric descriptors: immutable name/kind/help metadata.

use crate::error::{Result, TelemetryError};

/// Default histogram bucket upper bounds (seconds scale).
pub const DEFAULT_BUCKETS: [f64; 11] = [
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Instrument kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Histogram,
    ObservableGauge,
}

impl MetricKind {
    /// Exposition `# TYPE` token.
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Histogram => "histogram",
            MetricKind::ObservableGauge => "gauge",
        }
    }
}

/// Metric metadata. Created once at startup and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricDescriptor {
    pub name: String,
    pub kind: MetricKind,
    pub description: String,
    pub unit: Option<String>,
    /// Finite bucket upper bounds; histograms only. `+Inf` is implicit.
    pub buckets: Vec<f64>,
}

impl MetricDescriptor {
    pub fn new(name: impl Into<String>, kind: MetricKind, description: impl Into<String>) -> Self {
        let buckets = match kind {
            MetricKind::Histogram => DEFAULT_BUCKETS.to_vec(),
            _ => Vec::new(),
        };
        Self {
            name: name.into(),
            kind,
            description: description.into(),
            unit: None,
            buckets,
        }
    }

    pub fn counter(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, MetricKind::Counter, description)
    }

    pub fn histogram(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, MetricKind::Histogram, description)
    }

    pub fn gauge(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, MetricKind::ObservableGauge, description)
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Replace the bucket layout of a histogram descriptor.
    pub fn with_buckets(mut self, buckets: impl Into<Vec<f64>>) -> Self {
        self.buckets = buckets.into();
        self
    }

    /// Check name syntax and, for histograms, the bucket layout.
    pub fn validate(&self) -> Result<()> {
        if !is_valid_name(&self.name) {
            return Err(TelemetryError::InvalidDescriptor(format!(
                "invalid metric name: {:?}",
                self.name
            )));
        }
        match self.kind {
            MetricKind::Histogram => {
                if self.buckets.is_empty() {
                    return Err(TelemetryError::InvalidDescriptor(format!(
                        "{}: histogram needs at least one bucket",
                        self.name
                    )));
                }
                if self.buckets.iter().any(|b| !b.is_finite()) {
                    return Err(TelemetryError::InvalidDescriptor(format!(
                        "{}: bucket bounds must be finite (+Inf is implicit)",
                        self.name
                    )));
                }
                if self.buckets.windows(2).any(|w| w[0] >= w[1]) {
                    return Err(TelemetryError::InvalidDescriptor(format!(
                        "{}: bucket bounds must be strictly increasing",
                        self.name
                    )));
                }
            }
            _ => {
                if !self.buckets.is_empty() {
                    return Err(TelemetryError::InvalidDescriptor(format!(
                        "{}: buckets only apply to histograms",
                        self.name
                    )));
                }
            }
        }
        Ok(())
    }
}

/// `[a-zA-Z_:][a-zA-Z0-9_:]*`
fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}
