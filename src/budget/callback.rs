//! Per-unit abort callback for backends with a native training hook

use crate::backend::UnitCallback;
use crate::budget::types::{CallbackState, StopReason, UnitSignal};
use crate::limiter::AbortToken;
use crate::telemetry::SharedProbe;
use log::debug;
use std::time::Instant;

/// Stops training when the next unit would overrun the deadline, when free
/// memory runs low, or when the limiter trips its abort token.
pub struct ResourceLimitCallback {
    state: CallbackState,
    free_mem_ratio: f64,
    probe: Option<SharedProbe>,
    abort: Option<AbortToken>,
    stopped: Option<(usize, StopReason)>,
}

impl ResourceLimitCallback {
    pub fn new(start_time: Instant, deadline: Option<Instant>, free_mem_ratio: f64) -> Self {
        Self {
            state: CallbackState::new(start_time, deadline),
            free_mem_ratio,
            probe: None,
            abort: None,
            stopped: None,
        }
    }

    pub fn with_probe(mut self, probe: Option<SharedProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_abort_token(mut self, token: AbortToken) -> Self {
        self.abort = Some(token);
        self
    }

    pub fn state(&self) -> &CallbackState {
        &self.state
    }

    /// Unit index and reason of the stop request, if one was made
    pub fn stopped(&self) -> Option<(usize, StopReason)> {
        self.stopped
    }

    /// Decide whether training continues after `unit` finished at `now`.
    ///
    /// The time of the first unit, measured from the start of the fit call,
    /// is taken as the cost of every later unit.
    pub fn evaluate(&mut self, unit: usize, now: Instant) -> UnitSignal {
        let signal = self.decide(unit, now);
        if let UnitSignal::Stop(reason) = signal {
            if self.stopped.is_none() {
                debug!("stopping after unit {}: {}", unit, reason);
                self.stopped = Some((unit, reason));
            }
        }
        signal
    }

    fn decide(&mut self, unit: usize, now: Instant) -> UnitSignal {
        if self.abort.as_ref().map_or(false, AbortToken::is_tripped) {
            return UnitSignal::Stop(StopReason::Aborted);
        }

        if unit == 0 || self.state.time_per_unit.is_none() {
            self.state.time_per_unit = Some(now.saturating_duration_since(self.state.start_time));
        }

        if let (Some(deadline), Some(per_unit)) = (self.state.deadline, self.state.time_per_unit) {
            if now.checked_add(per_unit).map_or(true, |next| next > deadline) {
                return UnitSignal::Stop(StopReason::Deadline);
            }
        }

        if let Some(probe) = &self.probe {
            if probe.snapshot().available_fraction() < self.free_mem_ratio {
                return UnitSignal::Stop(StopReason::LowMemory);
            }
        }

        UnitSignal::Continue
    }
}

impl UnitCallback for ResourceLimitCallback {
    fn after_unit(&mut self, unit: usize) -> UnitSignal {
        self.evaluate(unit, Instant::now())
    }
}
