//! Agent config loader (strict parsing).

pub mod schema;

use std::fs;
use std::io::ErrorKind;

use pulsemeter_core::error::{Result, TelemetryError};

pub use schema::{AgentConfig, SamplerSection, ScrapeSection, SimulatorSection};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "PULSEMETER_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "pulsemeter.yaml";

pub fn load_from_file(path: &str) -> Result<AgentConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| TelemetryError::Config(format!("read config failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<AgentConfig> {
    let cfg: AgentConfig = serde_yaml::from_str(s)
        .map_err(|e| TelemetryError::Config(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Load `$PULSEMETER_CONFIG` (or `pulsemeter.yaml`); a missing file means defaults.
pub fn load_from_env() -> Result<AgentConfig> {
    let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    match fs::read_to_string(&path) {
        Ok(s) => load_from_str(&s),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::info!(%path, "config file not found; using defaults");
            Ok(AgentConfig::default())
        }
        Err(e) => Err(TelemetryError::Config(format!("read config failed ({path}): {e}"))),
    }
}
