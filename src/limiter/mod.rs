//! Scoped resource limits around a training call
//!
//! A [`ResourceLimiter`] arms a watchdog (and optionally an address-space
//! ceiling) for the duration of one closure, then restores everything on the
//! way out, including on error and unwind.

pub mod address_space;
pub mod token;
pub mod types;
pub mod watchdog;

pub use address_space::AddressSpaceGuard;
pub use token::{AbortReason, AbortToken};
pub use types::{DeadlineMode, LimiterConfig};
pub use watchdog::{Watchdog, WatchdogSpec};

use crate::errors::{FitError, Result};
use crate::telemetry::SharedProbe;
use log::{debug, warn};
use std::thread;
use std::time::{Duration, Instant};

/// Memory and wall-clock limits for one scope
pub struct ResourceLimiter {
    memory_limit: Option<u64>,
    time_limit: Option<Duration>,
    config: LimiterConfig,
    probe: Option<SharedProbe>,
}

impl ResourceLimiter {
    /// Limits in bytes and wall-clock time; `None` (or zero bytes) leaves
    /// that resource unlimited
    pub fn new(memory_limit: Option<u64>, time_limit: Option<Duration>) -> Self {
        Self {
            memory_limit: memory_limit.filter(|&bytes| bytes > 0),
            time_limit,
            config: LimiterConfig::default(),
            probe: None,
        }
    }

    pub fn with_config(mut self, config: LimiterConfig) -> Self {
        self.config = config;
        self
    }

    /// Probe used to watch process RSS against the memory limit
    pub fn with_probe(mut self, probe: Option<SharedProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn memory_limit(&self) -> Option<u64> {
        self.memory_limit
    }

    /// Wall-clock limit after the configured minimum is applied
    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit
            .map(|limit| self.config.effective_time_limit(limit))
    }

    /// Whether the wall-clock limit is armed from the calling thread. Under
    /// [`DeadlineMode::Auto`] this compares the thread name against `main`.
    pub fn deadline_enforced(&self) -> bool {
        match self.config.deadline_mode {
            DeadlineMode::Enforced => true,
            DeadlineMode::Advisory => false,
            DeadlineMode::Auto => thread::current().name() == Some("main"),
        }
    }

    /// Run `op` under the limits.
    ///
    /// `op` receives the abort token the watchdog trips. If the token tripped
    /// the result of `op` is discarded in favour of
    /// [`FitError::DeadlineExceeded`] or [`FitError::ResourceExceeded`].
    pub fn run<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&AbortToken) -> Result<T>,
    {
        let token = AbortToken::new();
        let started = Instant::now();

        let _address_space = match self.memory_limit {
            Some(limit) if self.config.address_space_ceiling => {
                match AddressSpaceGuard::lower(limit) {
                    Ok(guard) => guard,
                    Err(e) => {
                        warn!("could not lower address-space limit: {}", e);
                        None
                    }
                }
            }
            _ => None,
        };

        let time_limit = self.time_limit();
        let enforce_deadline = time_limit.is_some() && self.deadline_enforced();
        if time_limit.is_some() && !enforce_deadline {
            debug!("time limit is advisory on thread {:?}", thread::current().name());
        }

        let spec = WatchdogSpec {
            deadline: time_limit
                .filter(|_| enforce_deadline)
                .and_then(|limit| started.checked_add(limit)),
            memory_ceiling: self.memory_limit.filter(|_| self.probe.is_some()),
            probe: self.probe.clone(),
            poll_interval: self.config.poll_interval(),
        };

        let watchdog = if spec.is_active() {
            match Watchdog::arm(spec, token.clone()) {
                Ok(watchdog) => Some(watchdog),
                Err(e) => {
                    warn!("could not start resource watchdog: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let result = op(&token);

        if let Some(watchdog) = watchdog {
            watchdog.disarm();
        }

        match token.tripped() {
            Some(AbortReason::Deadline) => Err(FitError::DeadlineExceeded {
                budget_ms: time_limit.map(|t| t.as_millis() as u64).unwrap_or(0),
            }),
            Some(AbortReason::Memory { used }) => Err(FitError::ResourceExceeded {
                used,
                ceiling: self.memory_limit.unwrap_or(0),
            }),
            None => result,
        }
    }
}
