//! Budget system type definitions

use crate::errors::{FitError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// Fraction of memory that must stay free while training
pub const FREE_MEM_RATIO: f64 = 0.2;

/// Units trained by the second calibration pass
pub const CALIBRATION_UNITS: usize = 4;

/// Row-count drift tolerated before cached unit costs are discarded
pub const SIZE_TOLERANCE_ROWS: usize = 4;

/// Floor for a per-unit time estimate, in seconds
pub const MIN_TIME_PER_UNIT: f64 = 0.001;

/// Configuration for budgeted training
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    /// Fraction of available memory kept free (default: 0.2)
    pub free_mem_ratio: f64,

    /// Units trained in the second calibration pass (default: 4)
    pub calibration_units: usize,

    /// Row-count delta that invalidates cached costs (default: 4)
    pub size_tolerance_rows: usize,

    /// Per-unit time floor in seconds (default: 0.001)
    pub min_time_per_unit: f64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            free_mem_ratio: FREE_MEM_RATIO,
            calibration_units: CALIBRATION_UNITS,
            size_tolerance_rows: SIZE_TOLERANCE_ROWS,
            min_time_per_unit: MIN_TIME_PER_UNIT,
        }
    }
}

/// Time and memory limits for one fit call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingBudget {
    /// When the fit call started
    start: Instant,

    /// Length of the time budget, if bounded
    budget: Option<Duration>,

    /// Memory ceiling in bytes, if any
    memory_ceiling: Option<u64>,
}

impl TrainingBudget {
    /// Budget starting at `start` with an optional length in seconds.
    ///
    /// Negative, NaN and infinite budgets are rejected; `Some(0.0)` is a
    /// valid (already exhausted) budget. Budgets too long for a `Duration`
    /// saturate, and a deadline past what `Instant` can hold is unbounded.
    pub fn new(start: Instant, seconds: Option<f64>) -> Result<Self> {
        let budget = match seconds {
            Some(s) if !s.is_finite() || s < 0.0 => return Err(FitError::InvalidBudget(s)),
            Some(s) => Some(Duration::try_from_secs_f64(s).unwrap_or(Duration::MAX)),
            None => None,
        };
        Ok(Self {
            start,
            budget,
            memory_ceiling: None,
        })
    }

    /// Unbounded budget starting now
    pub fn unbounded() -> Self {
        Self {
            start: Instant::now(),
            budget: None,
            memory_ceiling: None,
        }
    }

    /// Attach a memory ceiling in bytes
    pub fn with_memory_ceiling(mut self, bytes: Option<u64>) -> Self {
        self.memory_ceiling = bytes;
        self
    }

    pub fn start(&self) -> Instant {
        self.start
    }

    /// Budget length in seconds
    pub fn seconds(&self) -> Option<f64> {
        self.budget.map(|b| b.as_secs_f64())
    }

    pub fn duration(&self) -> Option<Duration> {
        self.budget
    }

    /// Absolute deadline, `None` when unbounded or not representable
    pub fn deadline(&self) -> Option<Instant> {
        self.budget.and_then(|b| self.start.checked_add(b))
    }

    pub fn memory_ceiling(&self) -> Option<u64> {
        self.memory_ceiling
    }

    pub fn is_bounded(&self) -> bool {
        self.budget.is_some()
    }

    /// Seconds left before the deadline at `now` (negative once passed)
    pub fn remaining_secs(&self, now: Instant) -> Option<f64> {
        self.budget.map(|b| {
            let elapsed = now.saturating_duration_since(self.start).as_secs_f64();
            b.as_secs_f64() - elapsed
        })
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Outcome of the calibrated unit planning for one fit call
#[derive(Debug, Clone, PartialEq)]
pub struct IterationPlan {
    /// Units the caller asked for
    pub requested_units: usize,

    /// Units trained by the last calibration pass of this call (0 if none ran)
    pub calibrated_units: usize,

    /// Units of the model left in place when planning finished
    pub final_units: usize,

    /// Measured seconds per unit, once known
    pub measured_time_per_unit: Option<f64>,

    /// Measured bytes per unit, once known and positive
    pub measured_mem_per_unit: Option<f64>,

    /// Projected cap, when a projection ran
    pub unit_cap: Option<usize>,
}

impl IterationPlan {
    pub fn new(requested_units: usize) -> Self {
        Self {
            requested_units,
            calibrated_units: 0,
            final_units: 0,
            measured_time_per_unit: None,
            measured_mem_per_unit: None,
            unit_cap: None,
        }
    }

    /// Whether fewer units were trained than requested
    pub fn was_capped(&self) -> bool {
        self.final_units < self.requested_units
    }
}

/// State of an abort callback during one training call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CallbackState {
    pub start_time: Instant,
    pub deadline: Option<Instant>,
    pub time_per_unit: Option<Duration>,
}

impl CallbackState {
    pub fn new(start_time: Instant, deadline: Option<Instant>) -> Self {
        Self {
            start_time,
            deadline,
            time_per_unit: None,
        }
    }
}

/// Why training was asked to stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Next unit would finish after the deadline
    Deadline,

    /// Available memory fell below the free ratio
    LowMemory,

    /// The resource limiter tripped its abort token
    Aborted,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Deadline => f.write_str("deadline"),
            StopReason::LowMemory => f.write_str("low memory"),
            StopReason::Aborted => f.write_str("aborted"),
        }
    }
}

/// Decision returned after every completed unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitSignal {
    Continue,
    Stop(StopReason),
}

impl UnitSignal {
    pub fn is_stop(&self) -> bool {
        matches!(self, UnitSignal::Stop(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_rejects_invalid_seconds() {
        let now = Instant::now();
        assert!(TrainingBudget::new(now, Some(-1.0)).is_err());
        assert!(TrainingBudget::new(now, Some(f64::NAN)).is_err());
        assert!(TrainingBudget::new(now, Some(f64::INFINITY)).is_err());
        assert!(TrainingBudget::new(now, Some(0.0)).is_ok());
    }

    #[test]
    fn test_deadline_from_budget() {
        let now = Instant::now();
        let budget = TrainingBudget::new(now, Some(2.0)).unwrap();
        assert_eq!(budget.deadline(), Some(now + Duration::from_secs(2)));
        assert!(budget.is_bounded());

        let unbounded = TrainingBudget::new(now, None).unwrap();
        assert_eq!(unbounded.deadline(), None);
        assert_eq!(unbounded.remaining_secs(now), None);
    }

    #[test]
    fn test_huge_budget_saturates() {
        let now = Instant::now();
        let budget = TrainingBudget::new(now, Some(1e20)).unwrap();
        assert!(budget.is_bounded());
        assert_eq!(budget.duration(), Some(Duration::MAX));
        assert_eq!(budget.deadline(), None);
        assert!(budget.remaining_secs(now).unwrap() > 1e18);

        let past_instant = TrainingBudget::new(now, Some(1e19)).unwrap();
        assert_eq!(past_instant.deadline(), None);
    }

    #[test]
    fn test_remaining_secs_goes_negative() {
        let start = Instant::now();
        let budget = TrainingBudget::new(start, Some(1.0)).unwrap();
        let later = start + Duration::from_millis(1500);
        let remaining = budget.remaining_secs(later).unwrap();
        assert!((remaining + 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_default_config_constants() {
        let config = BudgetConfig::default();
        assert_eq!(config.free_mem_ratio, 0.2);
        assert_eq!(config.calibration_units, 4);
        assert_eq!(config.size_tolerance_rows, 4);
        assert_eq!(config.min_time_per_unit, 0.001);
    }

    #[test]
    fn test_plan_capped() {
        let mut plan = IterationPlan::new(100);
        plan.final_units = 31;
        assert!(plan.was_capped());
        plan.final_units = 100;
        assert!(!plan.was_capped());
    }

    #[test]
    fn test_signal_stop() {
        assert!(UnitSignal::Stop(StopReason::Deadline).is_stop());
        assert!(!UnitSignal::Continue.is_stop());
    }
}
