//! Limiter configuration types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Shortest wall-clock limit the limiter will arm, in seconds
pub const MIN_TIME_LIMIT_SECS: f64 = 1.0;

/// Default watchdog memory polling interval
pub const POLL_INTERVAL_MS: u64 = 25;

/// When the wall-clock limit is enforced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeadlineMode {
    /// Enforce only when called from the main thread.
    ///
    /// The main thread is recognised by its name, so any spawned thread
    /// named `main` is treated as the main thread too.
    Auto,

    /// Always enforce
    Enforced,

    /// Never enforce; the deadline only feeds unit planning
    Advisory,
}

impl fmt::Display for DeadlineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeadlineMode::Auto => f.write_str("auto"),
            DeadlineMode::Enforced => f.write_str("enforced"),
            DeadlineMode::Advisory => f.write_str("advisory"),
        }
    }
}

impl FromStr for DeadlineMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(DeadlineMode::Auto),
            "enforced" => Ok(DeadlineMode::Enforced),
            "advisory" => Ok(DeadlineMode::Advisory),
            other => Err(format!(
                "unknown deadline mode '{}' (expected auto, enforced or advisory)",
                other
            )),
        }
    }
}

/// Resource limiter configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimiterConfig {
    /// Deadline enforcement policy (default: auto)
    pub deadline_mode: DeadlineMode,

    /// Lower bound on an armed wall-clock limit (default: 1.0)
    pub min_time_limit_secs: f64,

    /// Also lower the process soft address-space limit (default: false)
    pub address_space_ceiling: bool,

    /// Memory polling interval in milliseconds (default: 25)
    pub poll_interval_ms: u64,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            deadline_mode: DeadlineMode::Auto,
            min_time_limit_secs: MIN_TIME_LIMIT_SECS,
            address_space_ceiling: false,
            poll_interval_ms: POLL_INTERVAL_MS,
        }
    }
}

impl LimiterConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Clamp a requested time limit to the configured minimum
    pub fn effective_time_limit(&self, requested: Duration) -> Duration {
        let floor = Duration::try_from_secs_f64(self.min_time_limit_secs.max(0.0))
            .unwrap_or(Duration::ZERO);
        requested.max(floor)
    }
}
