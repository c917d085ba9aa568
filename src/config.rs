//! Configuration management.

use crate::error::LinkError;
use config::Config;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level application settings.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Settings {
    /// Log level filter for diagnostic tracing (e.g. "info", "debug").
    pub log_level: String,
    pub link: LinkSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            link: LinkSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file, falling back to defaults for any
    /// missing keys.
    pub fn load(path: &Path) -> Result<Self, LinkError> {
        let s = Config::builder()
            .add_source(config::File::from(path))
            .build()
            .map_err(LinkError::Config)?;

        s.try_deserialize().map_err(LinkError::Config)
    }
}

/// Serial link parameters.
///
/// The firmware side is fixed at 115200 baud, 8-N-1, newline-terminated
/// ASCII; the defaults here match it.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LinkSettings {
    /// Baud rate for the serial channel.
    pub baud_rate: u32,

    /// Upper bound for a single blocking read on the port, in milliseconds.
    pub read_timeout_ms: u64,

    /// Delay between empty read polls in the reader task, in milliseconds.
    /// Keeps CPU usage bounded without adding perceptible latency.
    pub idle_poll_ms: u64,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            read_timeout_ms: 1_000,
            idle_poll_ms: 10,
        }
    }
}

impl LinkSettings {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }
}
