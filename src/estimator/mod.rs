//! Budget-aware estimator facade
//!
//! Wraps one backend and applies the budget policy around every fit: the
//! resource limiter, calibrated unit planning or the per-unit callback, best
//! iteration pruning, and the constant-model fallback under resource
//! pressure.

use crate::backend::{
    param_usize, BackendKind, ConstantModel, FitContext, ModelBackend, Params, TrainedModel,
};
use crate::budget::{
    BudgetConfig, BudgetedTrainer, IterationPlan, ResourceLimitCallback, TrainingBudget,
};
use crate::config::Config;
use crate::data::{Dataset, Matrix, Task};
use crate::errors::{FitError, Result};
use crate::limiter::{AbortToken, LimiterConfig, ResourceLimiter};
use crate::telemetry::{FitEvent, FitTelemetry, SharedProbe, SysinfoProbe};
use log::{debug, info, warn};
use serde_json::json;
use std::time::{Duration, Instant};

/// Estimator with time and memory budgeting around its backend
pub struct Estimator {
    kind: BackendKind,
    task: Task,
    params: Params,
    backend: Box<dyn ModelBackend>,
    model: Option<Box<dyn TrainedModel>>,
    trainer: BudgetedTrainer,
    budget_config: BudgetConfig,
    limiter_config: LimiterConfig,
    probe: Option<SharedProbe>,
    telemetry: FitTelemetry,
    last_plan: Option<IterationPlan>,
}

impl Estimator {
    /// Estimator of `kind` for `task`, with `config` translated into backend
    /// parameters. System memory telemetry is on by default.
    pub fn new(
        kind: BackendKind,
        task: Task,
        config: Params,
        backend: Box<dyn ModelBackend>,
    ) -> Result<Self> {
        kind.check_task(task)?;
        let params = kind.config_to_params(&config, task);
        let telemetry = FitTelemetry::new();

        Ok(Self {
            kind,
            task,
            params,
            backend,
            model: None,
            trainer: BudgetedTrainer::new().with_telemetry(telemetry.clone()),
            budget_config: BudgetConfig::default(),
            limiter_config: LimiterConfig::default(),
            probe: Some(SysinfoProbe::shared()),
            telemetry,
            last_plan: None,
        })
    }

    /// Replace the memory probe; `None` disables memory budgeting
    pub fn with_probe(mut self, probe: Option<SharedProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// Apply budget and limiter settings. Drops cached unit costs.
    pub fn with_config(mut self, config: &Config) -> Self {
        self.budget_config = config.budget.clone();
        self.limiter_config = config.limiter.clone();
        self.trainer =
            BudgetedTrainer::with_config(config.budget.clone()).with_telemetry(self.telemetry.clone());
        self
    }

    /// Share a telemetry collector
    pub fn with_telemetry(mut self, telemetry: FitTelemetry) -> Self {
        self.trainer = self.trainer.with_telemetry(telemetry.clone());
        self.telemetry = telemetry;
        self
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    pub fn task(&self) -> Task {
        self.task
    }

    /// Whether fits go through the per-unit callback instead of calibration
    pub fn uses_native_callback(&self) -> bool {
        self.kind.capabilities().native_abort_callback && self.backend.supports_abort_callback()
    }

    /// Train on `data` within `budget` seconds and return the elapsed time.
    ///
    /// Running out of time or memory is not an error: the model is replaced
    /// by a constant one and a warning is logged. Any other failure is
    /// returned and leaves the estimator unfitted.
    pub fn fit(&mut self, data: &Dataset, budget: Option<f64>) -> Result<Duration> {
        let start = Instant::now();
        let training_budget = TrainingBudget::new(start, budget)?;
        if data.rows() == 0 {
            return Err(FitError::EmptyDataset);
        }

        self.model = None;
        self.last_plan = None;

        let outcome = if training_budget.is_bounded() || self.probe.is_some() {
            let memory_limit = self.probe.as_ref().map(|probe| {
                let snapshot = probe.snapshot();
                (snapshot.available as f64 * (1.0 - self.budget_config.free_mem_ratio)) as u64
                    + snapshot.process_rss
            });
            let training_budget = training_budget.with_memory_ceiling(memory_limit);
            let limiter = ResourceLimiter::new(memory_limit, training_budget.duration())
                .with_config(self.limiter_config.clone())
                .with_probe(self.probe.clone());

            limiter.run(|token| self.fit_within(data, &training_budget, token))
        } else {
            self.fit_within(data, &training_budget, &AbortToken::new())
        };

        match outcome {
            Ok(()) => {}
            Err(e) if e.is_resource_pressure() => {
                warn!(
                    "{} ran out of resources ({}); using a constant model instead",
                    self.kind, e
                );
                self.telemetry.record(FitEvent::Fallback {
                    reason: e.to_string(),
                    timestamp: Instant::now(),
                });
                self.model = Some(Box::new(ConstantModel::fit(self.task, data)?));
                self.last_plan = None;
            }
            Err(e) => {
                self.model = None;
                self.last_plan = None;
                return Err(e);
            }
        }

        let elapsed = start.elapsed();
        let units = self.trained_units().unwrap_or(0);
        self.telemetry.record(FitEvent::FitCompleted {
            units,
            elapsed,
            timestamp: Instant::now(),
        });
        info!(
            "{} fit {} rows with {} units in {:.3}s",
            self.kind,
            data.rows(),
            units,
            elapsed.as_secs_f64()
        );

        Ok(elapsed)
    }

    fn fit_within(
        &mut self,
        data: &Dataset,
        budget: &TrainingBudget,
        token: &AbortToken,
    ) -> Result<()> {
        let Some(iteration_param) = self.kind.capabilities().iteration_param else {
            let model = self
                .backend
                .fit(&self.params, self.task, data, FitContext::new(token))?;
            self.model = Some(model);
            return Ok(());
        };

        let requested = param_usize(&self.params, iteration_param)?.ok_or_else(|| {
            FitError::InvalidParameter {
                name: iteration_param.to_string(),
                reason: "missing unit count".to_string(),
            }
        })?;

        if self.uses_native_callback() {
            self.fit_with_callback(data, budget, token, requested)?;
        } else {
            self.fit_calibrated(data, budget, token, iteration_param, requested)?;
        }

        if let Some(model) = self.model.as_mut() {
            if let Some(best) = model.best_iteration() {
                if best + 1 < model.units() {
                    debug!("pruning to best iteration {}", best);
                    model.truncate(best + 1);
                }
            }
        }
        Ok(())
    }

    fn fit_with_callback(
        &mut self,
        data: &Dataset,
        budget: &TrainingBudget,
        token: &AbortToken,
        requested: usize,
    ) -> Result<()> {
        let mut callback = ResourceLimitCallback::new(
            budget.start(),
            budget.deadline(),
            self.budget_config.free_mem_ratio,
        )
        .with_probe(self.probe.clone())
        .with_abort_token(token.clone());

        let model = self.backend.fit(
            &self.params,
            self.task,
            data,
            FitContext::new(token).with_callback(&mut callback),
        )?;

        if let Some((unit, reason)) = callback.stopped() {
            self.telemetry.record(FitEvent::EarlyStop {
                unit,
                reason,
                timestamp: Instant::now(),
            });
        }

        let mut plan = IterationPlan::new(requested);
        plan.final_units = model.units();
        plan.measured_time_per_unit = callback
            .state()
            .time_per_unit
            .map(|d| d.as_secs_f64().max(self.budget_config.min_time_per_unit));
        self.last_plan = Some(plan);
        self.model = Some(model);
        Ok(())
    }

    fn fit_calibrated(
        &mut self,
        data: &Dataset,
        budget: &TrainingBudget,
        token: &AbortToken,
        iteration_param: &str,
        requested: usize,
    ) -> Result<()> {
        let backend = self.backend.as_ref();
        let base = &self.params;
        let task = self.task;
        let probe = self.probe.clone();
        let mut latest: Option<Box<dyn TrainedModel>> = None;

        let plan = self.trainer.plan_and_train(
            budget,
            requested,
            data.rows(),
            probe.as_deref(),
            |units| {
                let mut params = base.clone();
                params.insert(iteration_param.to_string(), json!(units));
                let started = Instant::now();
                let model = backend.fit(&params, task, data, FitContext::new(token))?;
                latest = Some(model);
                Ok(started.elapsed())
            },
        )?;

        self.model = latest;
        self.last_plan = Some(plan);
        Ok(())
    }

    /// Predictions for `features`.
    ///
    /// Before the first fit this logs a warning and returns ones.
    pub fn predict(&self, features: &Matrix) -> Result<Vec<f64>> {
        match &self.model {
            Some(model) => model.predict(features),
            None => {
                warn!("estimator is not fit yet; call fit() before predict()");
                Ok(vec![1.0; features.rows()])
            }
        }
    }

    /// Class probabilities for classification tasks
    pub fn predict_proba(&self, features: &Matrix) -> Result<Matrix> {
        if !self.task.is_classification() {
            return Err(FitError::UnsupportedTask {
                kind: self.kind.to_string(),
                task: self.task.to_string(),
            });
        }
        self.model
            .as_ref()
            .ok_or(FitError::NotFitted)?
            .predict_proba(features)
    }

    /// Backend parameters as passed to the backend
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Backend parameters plus the task
    pub fn get_params(&self) -> Params {
        let mut params = self.params.clone();
        params.insert("task".to_string(), json!(self.task.as_str()));
        params
    }

    pub fn model(&self) -> Option<&dyn TrainedModel> {
        self.model.as_deref()
    }

    pub fn n_features(&self) -> Option<usize> {
        self.model.as_ref().map(|m| m.n_features())
    }

    pub fn classes(&self) -> Option<&[f64]> {
        self.model.as_ref().and_then(|m| m.classes())
    }

    /// Units held by the current model; the requested count in
    /// [`Estimator::params`] is left untouched
    pub fn trained_units(&self) -> Option<usize> {
        self.model.as_ref().map(|m| m.units())
    }

    /// Plan of the last fit that went through unit planning
    pub fn last_plan(&self) -> Option<&IterationPlan> {
        self.last_plan.as_ref()
    }

    pub fn telemetry(&self) -> &FitTelemetry {
        &self.telemetry
    }

    /// Estimated model size in bytes for the current parameters
    pub fn size(&self) -> f64 {
        self.kind.size(&self.params)
    }

    pub fn cost_relative_to_lgbm(&self) -> f64 {
        self.kind.cost_relative_to_lgbm()
    }

    /// Drop the fitted model
    pub fn cleanup(&mut self) {
        self.model = None;
        self.last_plan = None;
    }
}
