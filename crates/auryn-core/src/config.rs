//! Configuration — YAML config + env var overrides.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::bus::HISTORY_CAPACITY;

/// Pulse loop tuning. Every field has a fixed default; the cadences are not meant to be
/// changed casually since downstream listeners expect them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PulseConfig {
    /// Milliseconds between pulses
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Energy regained per pulse
    #[serde(default = "default_energy_regen_step")]
    pub energy_regen_step: i64,

    /// Negative moods revert to calm on every Nth pulse
    #[serde(default = "default_stabilization_cadence")]
    pub stabilization_cadence: u64,

    /// An EmotionalPulse is published on every Nth pulse
    #[serde(default = "default_emotional_pulse_cadence")]
    pub emotional_pulse_cadence: u64,

    /// Energy assumed when the store has none
    #[serde(default = "default_pulse_energy")]
    pub default_energy: i64,

    /// Intensity reported when no emotion collaborator is attached
    #[serde(default = "default_intensity")]
    pub default_intensity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusConfig {
    /// Size of the event lookback ring
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub pulse: PulseConfig,

    #[serde(default)]
    pub bus: BusConfig,

    /// tracing EnvFilter directive used when RUST_LOG is unset
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_interval_ms() -> u64 {
    5000
}
fn default_energy_regen_step() -> i64 {
    1
}
fn default_stabilization_cadence() -> u64 {
    3
}
fn default_emotional_pulse_cadence() -> u64 {
    3
}
fn default_pulse_energy() -> i64 {
    70
}
fn default_intensity() -> f64 {
    0.5
}
fn default_history_capacity() -> usize {
    HISTORY_CAPACITY
}
fn default_log_filter() -> String {
    "info".into()
}

impl PulseConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval_ms == 0 {
            anyhow::bail!("pulse.interval_ms must be greater than zero");
        }
        if self.stabilization_cadence == 0 || self.emotional_pulse_cadence == 0 {
            anyhow::bail!("pulse cadences must be greater than zero");
        }
        Ok(())
    }
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            energy_regen_step: default_energy_regen_step(),
            stabilization_cadence: default_stabilization_cadence(),
            emotional_pulse_cadence: default_emotional_pulse_cadence(),
            default_energy: default_pulse_energy(),
            default_intensity: default_intensity(),
        }
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            history_capacity: default_history_capacity(),
        }
    }
}

impl Config {
    /// Load config from a YAML file with env var overrides.
    pub fn load(config_path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config: {}", config_path.display()))?;

        let mut config: Config =
            serde_yaml::from_str(&content).context("Failed to parse config.yaml")?;

        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from the default location (project_root/config.yaml)
    pub fn load_from_dir(project_root: &Path) -> Result<Self> {
        Self::load(&project_root.join("config.yaml"))
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(ms) = std::env::var("AURYN_PULSE_INTERVAL_MS") {
            self.pulse.interval_ms = ms
                .trim()
                .parse()
                .with_context(|| format!("AURYN_PULSE_INTERVAL_MS is not a number: {}", ms))?;
        }
        if let Ok(filter) = std::env::var("AURYN_LOG") {
            self.log_filter = filter;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.pulse.validate()?;
        if self.bus.history_capacity == 0 {
            anyhow::bail!("bus.history_capacity must be greater than zero");
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pulse: PulseConfig::default(),
            bus: BusConfig::default(),
            log_filter: default_log_filter(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_defaults() {
        let mut tmp = NamedTempFile::new().unwrap();
        writeln!(tmp, "log_filter: debug").unwrap();

        let config = Config::load(tmp.path()).unwrap();
        assert_eq!(config.log_filter, "debug");
        assert_eq!(config.pulse.interval_ms, 5000);
        assert_eq!(config.pulse.stabilization_cadence, 3);
        assert_eq!(config.pulse.emotional_pulse_cadence, 3);
        assert_eq!(config.pulse.default_energy, 70);
        assert_eq!(config.bus.history_capacity, 100);
    }

    #[test]
    fn test_load_config_custom_values() {
        let mut tmp = NamedTempFile::new().unwrap();
        writeln!(
            tmp,
            "pulse:\n  interval_ms: 250\n  energy_regen_step: 2\nbus:\n  history_capacity: 10"
        )
        .unwrap();

        let config = Config::load(tmp.path()).unwrap();
        assert_eq!(config.pulse.interval(), Duration::from_millis(250));
        assert_eq!(config.pulse.energy_regen_step, 2);
        assert_eq!(config.pulse.stabilization_cadence, 3);
        assert_eq!(config.bus.history_capacity, 10);
    }

    #[test]
    fn test_zero_cadence_fails() {
        let mut tmp = NamedTempFile::new().unwrap();
        writeln!(tmp, "pulse:\n  stabilization_cadence: 0").unwrap();
        assert!(Config::load(tmp.path()).is_err());
    }

    #[test]
    fn test_zero_history_fails() {
        let mut tmp = NamedTempFile::new().unwrap();
        writeln!(tmp, "bus:\n  history_capacity: 0").unwrap();
        assert!(Config::load(tmp.path()).is_err());
    }

    #[test]
    fn test_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load_from_dir(dir.path()).is_err());
    }

    #[test]
    fn test_default_is_valid() {
        assert!(Config::default().validate().is_ok());
    }
}
