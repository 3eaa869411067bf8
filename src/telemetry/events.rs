//! Fit event collection
//!
//! Records what the budget controller decided during each fit so callers (and
//! tests) can see whether calibration ran, which cap was chosen and whether
//! training stopped early or fell back.

use crate::budget::types::StopReason;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Fit event types
#[derive(Debug, Clone)]
pub enum FitEvent {
    /// A short calibration run finished
    CalibrationPass {
        units: usize,
        elapsed: Duration,
        timestamp: Instant,
    },
    /// Cached per-unit costs were reused instead of calibrating
    CalibrationReused {
        rows: usize,
        timestamp: Instant,
    },
    /// A unit cap was projected from measured costs
    CapProjected {
        requested: usize,
        cap: usize,
        timestamp: Instant,
    },
    /// The abort callback asked the backend to stop
    EarlyStop {
        unit: usize,
        reason: StopReason,
        timestamp: Instant,
    },
    /// Resource pressure replaced the model with a constant one
    Fallback {
        reason: String,
        timestamp: Instant,
    },
    /// A fit call returned
    FitCompleted {
        units: usize,
        elapsed: Duration,
        timestamp: Instant,
    },
}

/// Aggregated fit statistics
#[derive(Debug, Clone, Default)]
pub struct FitStats {
    pub calibration_passes: usize,
    pub calibrations_reused: usize,
    pub caps_projected: usize,
    pub early_stops: usize,
    pub fallbacks: usize,
    pub fits_completed: usize,
}

/// Fit telemetry collector
#[derive(Clone)]
pub struct FitTelemetry {
    events: Arc<Mutex<Vec<FitEvent>>>,
    stats: Arc<Mutex<FitStats>>,
    start_time: Instant,
}

impl FitTelemetry {
    /// Create a new collector
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            stats: Arc::new(Mutex::new(FitStats::default())),
            start_time: Instant::now(),
        }
    }

    /// Record an event
    pub fn record(&self, event: FitEvent) {
        {
            let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
            match &event {
                FitEvent::CalibrationPass { .. } => stats.calibration_passes += 1,
                FitEvent::CalibrationReused { .. } => stats.calibrations_reused += 1,
                FitEvent::CapProjected { .. } => stats.caps_projected += 1,
                FitEvent::EarlyStop { .. } => stats.early_stops += 1,
                FitEvent::Fallback { .. } => stats.fallbacks += 1,
                FitEvent::FitCompleted { .. } => stats.fits_completed += 1,
            }
        }

        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    /// Get current statistics
    pub fn get_stats(&self) -> FitStats {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Get elapsed time since the collector was created
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Get event count
    pub fn event_count(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Get recent events (last n)
    pub fn recent_events(&self, n: usize) -> Vec<FitEvent> {
        let events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        let start = events.len().saturating_sub(n);
        events[start..].to_vec()
    }

    /// Share of completed fits that had to fall back to a constant model
    pub fn fallback_rate(&self) -> f64 {
        let stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        if stats.fits_completed == 0 {
            0.0
        } else {
            stats.fallbacks as f64 / stats.fits_completed as f64
        }
    }
}

impl Default for FitTelemetry {
    fn default() -> Self {
        Self::new()
    }
}
