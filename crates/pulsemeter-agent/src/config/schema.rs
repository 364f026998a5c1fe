use serde::Deserialize;
use pulsemeter_core::error::{Result, TelemetryError};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    pub version: u32,

    #[serde(default)]
    pub scrape: ScrapeSection,

    #[serde(default)]
    pub samplers: SamplerSection,

    #[serde(default)]
    pub simulator: SimulatorSection,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            version: 1,
            scrape: ScrapeSection::default(),
            samplers: SamplerSection::default(),
            simulator: SimulatorSection::default(),
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(TelemetryError::Config(format!(
                "unsupported config version {}",
                self.version
            )));
        }
        self.scrape.validate()?;
        self.samplers.validate()?;
        self.simulator.validate()?;
        if self.samplers.callback_budget_ms >= self.scrape.timeout_ms {
            return Err(TelemetryError::Config(
                "samplers.callback_budget_ms must be below scrape.timeout_ms".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScrapeSection {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_path")]
    pub path: String,

    /// Upper bound on one full scrape (all gauge callbacks included).
    #[serde(default = "default_scrape_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ScrapeSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            path: default_path(),
            timeout_ms: default_scrape_timeout_ms(),
        }
    }
}

impl ScrapeSection {
    pub fn validate(&self) -> Result<()> {
        if !self.path.starts_with('/') || self.path.len() < 2 {
            return Err(TelemetryError::Config(
                "scrape.path must start with '/' and name a route".into(),
            ));
        }
        if self.path.contains(':') || self.path.contains('*') {
            return Err(TelemetryError::Config(
                "scrape.path must be a literal path".into(),
            ));
        }
        if self.path == "/healthz" || self.path.starts_with("/v1/anomalies") {
            return Err(TelemetryError::Config(
                "scrape.path collides with an operational route".into(),
            ));
        }
        if !(100..=60000).contains(&self.timeout_ms) {
            return Err(TelemetryError::Config(
                "scrape.timeout_ms must be between 100 and 60000".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SamplerSection {
    #[serde(default = "default_cpu_interval_ms")]
    pub cpu_interval_ms: u64,

    /// Expected wakeup interval of the lag probe.
    #[serde(default = "default_lag_probe_interval_ms")]
    pub lag_probe_interval_ms: u64,

    /// Sampling resolution of the continuous lag monitor.
    #[serde(default = "default_lag_resolution_ms")]
    pub lag_resolution_ms: u64,

    /// How often the monitor flushes its rolling mean into the histogram.
    #[serde(default = "default_lag_flush_ms")]
    pub lag_flush_ms: u64,

    #[serde(default = "default_callback_budget_ms")]
    pub callback_budget_ms: u64,

    /// Pause-duration histogram bounds, seconds.
    #[serde(default = "default_pause_buckets")]
    pub pause_buckets: Vec<f64>,
}

impl Default for SamplerSection {
    fn default() -> Self {
        Self {
            cpu_interval_ms: default_cpu_interval_ms(),
            lag_probe_interval_ms: default_lag_probe_interval_ms(),
            lag_resolution_ms: default_lag_resolution_ms(),
            lag_flush_ms: default_lag_flush_ms(),
            callback_budget_ms: default_callback_budget_ms(),
            pause_buckets: default_pause_buckets(),
        }
    }
}

impl SamplerSection {
    pub fn validate(&self) -> Result<()> {
        if !(100..=600000).contains(&self.cpu_interval_ms) {
            return Err(TelemetryError::Config(
                "samplers.cpu_interval_ms must be between 100 and 600000".into(),
            ));
        }
        if !(10..=60000).contains(&self.lag_probe_interval_ms) {
            return Err(TelemetryError::Config(
                "samplers.lag_probe_interval_ms must be between 10 and 60000".into(),
            ));
        }
        if !(1..=1000).contains(&self.lag_resolution_ms) {
            return Err(TelemetryError::Config(
                "samplers.lag_resolution_ms must be between 1 and 1000".into(),
            ));
        }
        if self.lag_flush_ms <= self.lag_resolution_ms || self.lag_flush_ms > 600000 {
            return Err(TelemetryError::Config(
                "samplers.lag_flush_ms must exceed lag_resolution_ms and be at most 600000".into(),
            ));
        }
        if !(1..=10000).contains(&self.callback_budget_ms) {
            return Err(TelemetryError::Config(
                "samplers.callback_budget_ms must be between 1 and 10000".into(),
            ));
        }
        if self.pause_buckets.is_empty()
            || self.pause_buckets.iter().any(|b| !b.is_finite() || *b <= 0.0)
            || self.pause_buckets.windows(2).any(|w| w[0] >= w[1])
        {
            return Err(TelemetryError::Config(
                "samplers.pause_buckets must be positive, finite and strictly increasing".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulatorSection {
    #[serde(default = "default_simulator_enabled")]
    pub enabled: bool,

    /// Divides every scenario duration; 1 runs in real time.
    #[serde(default = "default_speedup")]
    pub speedup: u32,
}

impl Default for SimulatorSection {
    fn default() -> Self {
        Self {
            enabled: default_simulator_enabled(),
            speedup: default_speedup(),
        }
    }
}

impl SimulatorSection {
    pub fn validate(&self) -> Result<()> {
        if !(1..=10000).contains(&self.speedup) {
            return Err(TelemetryError::Config(
                "simulator.speedup must be between 1 and 10000".into(),
            ));
        }
        Ok(())
    }
}

fn default_listen() -> String {
    "0.0.0.0:9464".into()
}
fn default_path() -> String {
    "/metrics".into()
}
fn default_scrape_timeout_ms() -> u64 {
    2000
}
fn default_cpu_interval_ms() -> u64 {
    10000
}
fn default_lag_probe_interval_ms() -> u64 {
    100
}
fn default_lag_resolution_ms() -> u64 {
    20
}
fn default_lag_flush_ms() -> u64 {
    5000
}
fn default_callback_budget_ms() -> u64 {
    250
}
fn default_pause_buckets() -> Vec<f64> {
    vec![0.001, 0.01, 0.1, 1.0, 2.0, 5.0]
}
fn default_simulator_enabled() -> bool {
    true
}
fn default_speedup() -> u32 {
    1
}
