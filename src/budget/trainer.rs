//! Calibrated unit planning for backends without a per-unit hook
//!
//! The trainer measures what one unit and a few units cost, projects how
//! many units fit the remaining time and memory, and drives the supplied
//! training closure accordingly. Measured costs are cached across calls
//! while the training row count stays roughly the same.

use crate::budget::projection::{self, CapInputs};
use crate::budget::types::{BudgetConfig, IterationPlan, TrainingBudget};
use crate::errors::Result;
use crate::telemetry::{FitEvent, FitTelemetry, MemoryProbe};
use log::debug;
use std::time::{Duration, Instant};

/// Budget-aware driver for calibrated training
#[derive(Clone)]
pub struct BudgetedTrainer {
    config: BudgetConfig,

    /// Cached seconds per unit
    time_per_unit: Option<f64>,

    /// Cached bytes per unit; negative means the measurement was unusable
    mem_per_unit: Option<f64>,

    /// Row count the cached time cost was measured on
    train_size: usize,

    /// Duration of the last 1-unit calibration pass
    t1: f64,

    telemetry: FitTelemetry,
}

impl BudgetedTrainer {
    pub fn new() -> Self {
        Self::with_config(BudgetConfig::default())
    }

    pub fn with_config(config: BudgetConfig) -> Self {
        Self {
            config,
            time_per_unit: None,
            mem_per_unit: None,
            train_size: 0,
            t1: 0.0,
            telemetry: FitTelemetry::new(),
        }
    }

    /// Share a telemetry collector
    pub fn with_telemetry(mut self, telemetry: FitTelemetry) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn config(&self) -> &BudgetConfig {
        &self.config
    }

    pub fn time_per_unit(&self) -> Option<f64> {
        self.time_per_unit
    }

    pub fn mem_per_unit(&self) -> Option<f64> {
        self.mem_per_unit
    }

    /// Whether the cached costs are stale for a fit on `rows` rows
    pub fn needs_calibration(&self, rows: usize, bounded: bool, has_probe: bool) -> bool {
        let time_stale = self.time_per_unit.is_none()
            || rows.abs_diff(self.train_size) > self.config.size_tolerance_rows;
        let mem_stale = self.mem_per_unit.map_or(true, |m| m < 0.0);
        (time_stale && bounded) || (has_probe && mem_stale)
    }

    /// Forget every cached measurement
    pub fn reset(&mut self) {
        self.time_per_unit = None;
        self.mem_per_unit = None;
        self.train_size = 0;
        self.t1 = 0.0;
    }

    /// Plan and run training of up to `requested` units.
    ///
    /// `train(n)` must (re)train a model of exactly `n` units from scratch,
    /// replace the caller's current model, and return how long it took. The
    /// model left behind by the last call is the one the plan describes.
    pub fn plan_and_train<F>(
        &mut self,
        budget: &TrainingBudget,
        requested: usize,
        rows: usize,
        probe: Option<&dyn MemoryProbe>,
        mut train: F,
    ) -> Result<IterationPlan>
    where
        F: FnMut(usize) -> Result<Duration>,
    {
        let requested = requested.max(1);
        let mut plan = IterationPlan::new(requested);

        if requested == 1 {
            train(1)?;
            plan.final_units = 1;
            return Ok(self.finish(plan));
        }

        let budget_secs = budget.seconds();
        let mem0 = probe.map(|p| p.snapshot().available);
        let mut calibrated = false;

        if self.needs_calibration(rows, budget.is_bounded(), probe.is_some()) {
            let t1 = train(1)?.as_secs_f64();
            self.t1 = t1;
            plan.calibrated_units = 1;
            plan.final_units = 1;
            self.record_pass(1, t1);

            if budget_secs.map_or(false, |b| t1 >= b) {
                debug!("1-unit calibration used the whole budget ({:.3}s)", t1);
                return Ok(self.finish(plan));
            }

            let mem1 = used_since(mem0, probe);

            let units = requested.min(self.config.calibration_units.max(2));
            let t2 = train(units)?.as_secs_f64();
            plan.calibrated_units = units;
            plan.final_units = units;
            self.record_pass(units, t2);

            let mem2 = used_since(mem0, probe);
            self.mem_per_unit = match (mem1, mem2) {
                (Some(m1), Some(m2)) => Some(projection::mem_per_unit(m1, m2.max(m1), units)),
                _ => None,
            };
            self.time_per_unit = Some(projection::time_per_unit(
                t1,
                t2,
                units,
                self.config.min_time_per_unit,
            ));
            self.train_size = rows;

            debug!(
                "calibrated on {} rows: {:.4}s/unit, {:?} bytes/unit",
                rows, self.time_per_unit.unwrap_or_default(), self.mem_per_unit
            );

            if budget_secs.map_or(false, |b| t1 + t2 >= b) || units == requested {
                return Ok(self.finish(plan));
            }
            calibrated = true;
        } else if self.time_per_unit.is_some() || self.mem_per_unit.is_some() {
            self.telemetry.record(FitEvent::CalibrationReused {
                rows,
                timestamp: Instant::now(),
            });
        }

        let cap = projection::project_unit_cap(&CapInputs {
            requested,
            remaining_secs: budget.remaining_secs(Instant::now()),
            t1: self.t1,
            time_per_unit: self.time_per_unit,
            available_mem: mem0,
            mem_per_unit: self.mem_per_unit,
            free_mem_ratio: self.config.free_mem_ratio,
        });
        plan.unit_cap = Some(cap);
        self.telemetry.record(FitEvent::CapProjected {
            requested,
            cap,
            timestamp: Instant::now(),
        });

        if calibrated && cap <= plan.calibrated_units {
            debug!(
                "projected cap {} does not beat the {}-unit calibration model",
                cap, plan.calibrated_units
            );
            return Ok(self.finish(plan));
        }

        if cap < requested {
            debug!("capping training at {} of {} units", cap, requested);
        }
        train(cap)?;
        plan.final_units = cap;

        Ok(self.finish(plan))
    }

    fn record_pass(&self, units: usize, secs: f64) {
        self.telemetry.record(FitEvent::CalibrationPass {
            units,
            elapsed: Duration::from_secs_f64(secs.max(0.0)),
            timestamp: Instant::now(),
        });
    }

    fn finish(&self, mut plan: IterationPlan) -> IterationPlan {
        plan.measured_time_per_unit = self.time_per_unit;
        plan.measured_mem_per_unit = self.mem_per_unit.filter(|&m| m > 0.0);
        plan
    }
}

impl Default for BudgetedTrainer {
    fn default() -> Self {
        Self::new()
    }
}

/// Bytes of available memory consumed since `before`
fn used_since(before: Option<u64>, probe: Option<&dyn MemoryProbe>) -> Option<f64> {
    match (before, probe) {
        (Some(before), Some(probe)) => Some(before as f64 - probe.snapshot().available as f64),
        _ => None,
    }
}
