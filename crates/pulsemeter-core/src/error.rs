//! Shared error type across pulsemeter crates.

use thiserror::Error;

/// Stable machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// A metric with the same name is already registered.
    DuplicateMetric,
    /// No metric with that name (or not of the requested kind).
    UnknownMetric,
    /// Negative or non-finite counter increment.
    InvalidDelta,
    /// Malformed metric name, label or bucket layout.
    InvalidDescriptor,
    /// Transient OS/runtime query failure inside a sampler.
    SamplerReadFailure,
    /// A gauge callback failed or panicked.
    CallbackFailure,
    /// No scenario registered under that name.
    UnknownScenario,
    /// The scenario is already running.
    ScenarioActive,
    /// Invalid configuration.
    Config,
    /// Internal error.
    Internal,
}

impl ErrorCode {
    /// String representation used in logs and JSON responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::DuplicateMetric => "DUPLICATE_METRIC",
            ErrorCode::UnknownMetric => "UNKNOWN_METRIC",
            ErrorCode::InvalidDelta => "INVALID_DELTA",
            ErrorCode::InvalidDescriptor => "INVALID_DESCRIPTOR",
            ErrorCode::SamplerReadFailure => "SAMPLER_READ_FAILURE",
            ErrorCode::CallbackFailure => "CALLBACK_FAILURE",
            ErrorCode::UnknownScenario => "UNKNOWN_SCENARIO",
            ErrorCode::ScenarioActive => "SCENARIO_ACTIVE",
            ErrorCode::Config => "CONFIG",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Unified error type used by core and agent.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("duplicate metric: {0}")]
    DuplicateMetric(String),
    #[error("unknown metric: {0}")]
    UnknownMetric(String),
    #[error("invalid counter delta: {0}")]
    InvalidDelta(f64),
    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),
    #[error("sampler read failed: {0}")]
    SamplerReadFailure(String),
    #[error("gauge callback failed: {0}")]
    CallbackFailure(String),
    #[error("unknown scenario: {0}")]
    UnknownScenario(String),
    #[error("scenario already active: {0}")]
    ScenarioActive(String),
    #[error("config: {0}")]
    Config(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl TelemetryError {
    /// Map the error to its stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            TelemetryError::DuplicateMetric(_) => ErrorCode::DuplicateMetric,
            TelemetryError::UnknownMetric(_) => ErrorCode::UnknownMetric,
            TelemetryError::InvalidDelta(_) => ErrorCode::InvalidDelta,
            TelemetryError::InvalidDescriptor(_) => ErrorCode::InvalidDescriptor,
            TelemetryError::SamplerReadFailure(_) => ErrorCode::SamplerReadFailure,
            TelemetryError::CallbackFailure(_) => ErrorCode::CallbackFailure,
            TelemetryError::UnknownScenario(_) => ErrorCode::UnknownScenario,
            TelemetryError::ScenarioActive(_) => ErrorCode::ScenarioActive,
            TelemetryError::Config(_) => ErrorCode::Config,
            TelemetryError::Internal(_) => ErrorCode::Internal,
        }
    }
}
