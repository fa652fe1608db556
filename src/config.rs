//! Layered configuration: defaults -> TOML file -> `EFAIR_*` environment overrides,
//! in the same override ordering the donor workspace's configuration crate documents.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{EfairError, Result};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Human,
    Json,
}

impl Default for LogFormat {
    fn default() -> Self {
        LogFormat::Human
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GovernorPaths {
    pub min_freq: String,
    pub max_freq: String,
    pub cur_freq: String,
    pub available_frequencies: String,
    pub power_sensor: String,
}

impl Default for GovernorPaths {
    fn default() -> Self {
        let base = "/sys/devices/17000000.gp10b/devfreq/17000000.gp10b";
        Self {
            min_freq: format!("{base}/min_freq"),
            max_freq: format!("{base}/max_freq"),
            cur_freq: format!("{base}/cur_freq"),
            available_frequencies: format!("{base}/available_frequencies"),
            power_sensor: "/sys/bus/i2c/drivers/ina3221x/0-0040/iio:device0/in_power0_input"
                .to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Total wall-time quantum budget per scheduling round, in microseconds.
    pub total_quantum_size_us: u64,
    /// Blend factor in (0, 1] between weight-proportional share and energy-aware refinement.
    pub alpha: f64,
    /// Refinement granularity for the energy-aware slice allocator, in microseconds.
    pub min_sched_unit_us: u64,
    pub governor: GovernorPaths,
    pub rpc_addr: String,
    pub log_format: LogFormat,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            total_quantum_size_us: 30_000,
            alpha: 0.5,
            min_sched_unit_us: 1_000,
            governor: GovernorPaths::default(),
            rpc_addr: "127.0.0.1:50051".to_string(),
            log_format: LogFormat::default(),
        }
    }
}

impl SchedulerConfig {
    /// Load defaults, merge in a TOML config file if present, then apply `EFAIR_*`
    /// environment overrides. Never fails for a missing file; fails `Fail` for a
    /// malformed one.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) if p.exists() => {
                let content = std::fs::read_to_string(p)
                    .map_err(|e| EfairError::Fail(format!("reading config {p:?}: {e}")))?;
                toml::from_str(&content)
                    .map_err(|e| EfairError::Fail(format!("parsing config {p:?}: {e}")))?
            }
            _ => SchedulerConfig::default(),
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("EFAIR_TOTAL_QUANTUM_US") {
            if let Ok(v) = v.parse() {
                self.total_quantum_size_us = v;
            }
        }
        if let Ok(v) = std::env::var("EFAIR_ALPHA") {
            if let Ok(v) = v.parse() {
                self.alpha = v;
            }
        }
        if let Ok(v) = std::env::var("EFAIR_MIN_SCHED_UNIT_US") {
            if let Ok(v) = v.parse() {
                self.min_sched_unit_us = v;
            }
        }
        if let Ok(v) = std::env::var("EFAIR_RPC_ADDR") {
            self.rpc_addr = v;
        }
        if let Ok(v) = std::env::var("EFAIR_LOG_FORMAT") {
            self.log_format = match v.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                _ => LogFormat::Human,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_have_alpha_in_range() {
        let cfg = SchedulerConfig::default();
        assert!(cfg.alpha > 0.0 && cfg.alpha <= 1.0);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = SchedulerConfig::load(Some(Path::new("/nonexistent/efair.toml"))).unwrap();
        assert_eq!(cfg.total_quantum_size_us, 30_000);
    }

    #[test]
    fn env_override_wins_over_default() {
        std::env::set_var("EFAIR_ALPHA", "1.0");
        let cfg = SchedulerConfig::load(None).unwrap();
        assert_eq!(cfg.alpha, 1.0);
        std::env::remove_var("EFAIR_ALPHA");
    }

    #[test]
    fn loads_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("efair.toml");
        std::fs::write(&path, "total_quantum_size_us = 50000\nalpha = 0.25\nmin_sched_unit_us = 500\nrpc_addr = \"0.0.0.0:9000\"\nlog_format = \"json\"\n\n[governor]\nmin_freq = \"/tmp/min\"\nmax_freq = \"/tmp/max\"\ncur_freq = \"/tmp/cur\"\navailable_frequencies = \"/tmp/avail\"\npower_sensor = \"/tmp/power\"\n").unwrap();

        let cfg = SchedulerConfig::load(Some(&path)).unwrap();
        assert_eq!(cfg.total_quantum_size_us, 50_000);
        assert_eq!(cfg.alpha, 0.25);
        assert_eq!(cfg.log_format, LogFormat::Json);
    }
}
