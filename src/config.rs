//! YAML configuration for the exporter process.
//!
//! Parsing is strict: an unknown key anywhere in the file is an error, so a
//! typo cannot silently disable a pin. Defaults mirror the fields' documented
//! values; everything else must be spelled out.

use anyhow::Context;
use serde::Deserialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::transport::DeviceSelector;

/// Process-level configuration: one HTTP listener, any number of boards.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
    pub devices: Vec<DeviceConfig>,
}

/// One board to poll. A `bus`/`device` of zero matches any board.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceConfig {
    #[serde(default)]
    pub bus: u8,
    #[serde(default)]
    pub device: u8,
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default = "default_read_delay_ms")]
    pub read_delay_ms: u64,
    pub pins: Vec<PinConfig>,
}

/// One digital input to sample and publish.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PinConfig {
    /// Metric name suffix; the full name is `<prefix>_<name>`.
    pub name: String,
    /// Metric help text.
    #[serde(default)]
    pub help: String,
    /// Port letter, `A`..`E`, case-insensitive.
    pub port: String,
    /// Pin number within the port, 0..=7.
    pub pin: u8,
    /// Enable the internal pull-up resistor (port B only).
    #[serde(default)]
    pub pull_up: bool,
    /// Publish the complement of the sampled bit.
    #[serde(default)]
    pub revert: bool,
    /// Constant labels attached to the metric.
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Config> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config = serde_yaml::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }
}

impl DeviceConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.read_delay_ms)
    }

    pub fn selector(&self) -> DeviceSelector {
        DeviceSelector {
            bus: self.bus,
            device: self.device,
        }
    }
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_prefix() -> String {
    "ioboard".to_string()
}

fn default_read_delay_ms() -> u64 {
    1000
}
