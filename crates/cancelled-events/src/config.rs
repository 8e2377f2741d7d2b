/*
[INPUT]:  YAML configuration file (optional)
[OUTPUT]: Parsed demo timing configuration
[POS]:    Configuration layer - job delays and run length
[UPDATE]: When adding new configuration options
*/

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::reducer::JobTimings;

const MAX_SHUTDOWN_TIMEOUT_SECS: u64 = 3_600;

/// Timing configuration for the demo.
///
/// Every delay is expressed in abstract time units; `time_unit_ms` decides
/// how long one unit lasts on the wall clock.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DemoConfig {
    /// Length of one time unit in milliseconds
    pub time_unit_ms: u64,
    /// Units before the detached job asks for a destination change
    pub change_destination_after: u64,
    /// Units the scoped long-running job sleeps
    pub long_running: u64,
    /// Units the detached opted-out job sleeps
    pub opted_out: u64,
    /// Units the binary runs before shutting itself down
    pub run_for: u64,
    /// Upper bound for joining background jobs on shutdown
    pub shutdown_timeout_secs: u64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            time_unit_ms: 1_000,
            change_destination_after: 5,
            long_running: 10,
            opted_out: 10,
            run_for: 15,
            shutdown_timeout_secs: 30,
        }
    }
}

impl DemoConfig {
    /// Load configuration from YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content).context("parse yaml config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.time_unit_ms > 0, "time_unit_ms must be positive");
        ensure!(
            self.change_destination_after > 0,
            "change_destination_after must be positive"
        );
        ensure!(self.long_running > 0, "long_running must be positive");
        ensure!(self.opted_out > 0, "opted_out must be positive");
        ensure!(
            self.shutdown_timeout_secs > 0,
            "shutdown_timeout_secs must be positive"
        );
        ensure!(
            self.shutdown_timeout_secs <= MAX_SHUTDOWN_TIMEOUT_SECS,
            "shutdown_timeout_secs must be at most {MAX_SHUTDOWN_TIMEOUT_SECS}"
        );
        Ok(())
    }

    /// Convert a number of units into a wall-clock duration.
    pub fn units(&self, count: u64) -> Duration {
        Duration::from_millis(self.time_unit_ms.saturating_mul(count))
    }

    pub fn job_timings(&self) -> JobTimings {
        JobTimings {
            change_destination_after: self.units(self.change_destination_after),
            long_running: self.units(self.long_running),
            opted_out: self.units(self.opted_out),
        }
    }

    pub fn run_for(&self) -> Duration {
        self.units(self.run_for)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}
