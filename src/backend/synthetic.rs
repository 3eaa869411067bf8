//! Synthetic workload backend
//!
//! Burns a configurable amount of time and memory per unit while fitting a
//! model that shrinks its prediction towards the target mean. Used to drive
//! the budget controller from the CLI and in tests without a real learner.

use crate::backend::{
    param_f64, param_usize, BackendKind, ConstantModel, FitContext, ModelBackend, Params,
    TrainedModel,
};
use crate::data::{Dataset, Matrix, Task};
use crate::errors::{FitError, Result};
use log::trace;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

const DEFAULT_LEARNING_RATE: f64 = 0.1;

/// Unit counts of every fit call made on a backend, in order
pub type CallLog = Arc<Mutex<Vec<usize>>>;

/// Workload shape of a [`SyntheticBackend`]
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    /// Fixed cost of every fit call
    pub setup_cost: Duration,

    /// Wall-clock cost of one unit
    pub unit_cost: Duration,

    /// Bytes retained by the model per unit
    pub unit_bytes: usize,

    /// Consult the unit callback between units
    pub native_callback: bool,

    /// Parameter holding the unit count; `None` trains a single unit
    pub iteration_param: Option<&'static str>,

    /// Best unit the model reports, capped to the units trained
    pub best_iteration: Option<usize>,

    /// Fail every fit with this backend error
    pub fail_with: Option<String>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            setup_cost: Duration::ZERO,
            unit_cost: Duration::from_millis(1),
            unit_bytes: 0,
            native_callback: true,
            iteration_param: Some("n_estimators"),
            best_iteration: None,
            fail_with: None,
        }
    }
}

/// Stand-in backend with a predictable per-unit cost
pub struct SyntheticBackend {
    config: SyntheticConfig,
    calls: CallLog,

    /// Library whose hook convention and unit numbering the loop mimics
    library: Option<BackendKind>,
}

impl SyntheticBackend {
    pub fn new(config: SyntheticConfig) -> Self {
        Self {
            config,
            calls: Arc::new(Mutex::new(Vec::new())),
            library: None,
        }
    }

    /// Backend shaped like `kind`: same iteration parameter, a callback only
    /// when both `kind` and `config` allow one, and the library's hook
    /// convention and unit numbering
    pub fn for_kind(kind: BackendKind, config: SyntheticConfig) -> Self {
        let capabilities = kind.capabilities();
        let mut backend = Self::new(SyntheticConfig {
            native_callback: config.native_callback && capabilities.native_abort_callback,
            iteration_param: capabilities.iteration_param,
            ..config
        });
        backend.library = kind.callback_convention().map(|_| kind);
        backend
    }

    pub fn config(&self) -> &SyntheticConfig {
        &self.config
    }

    /// Handle on the call log, usable after the backend is moved
    pub fn call_log(&self) -> CallLog {
        Arc::clone(&self.calls)
    }
}

impl ModelBackend for SyntheticBackend {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn supports_abort_callback(&self) -> bool {
        self.config.native_callback
    }

    fn fit(
        &self,
        params: &Params,
        task: Task,
        data: &Dataset,
        ctx: FitContext<'_>,
    ) -> Result<Box<dyn TrainedModel>> {
        let units = match self.config.iteration_param {
            Some(name) => param_usize(params, name)?.unwrap_or(1),
            None => 1,
        }
        .max(1);

        let learning_rate = param_f64(params, "learning_rate")?.unwrap_or(DEFAULT_LEARNING_RATE);
        if !(learning_rate > 0.0 && learning_rate <= 1.0) {
            return Err(FitError::InvalidParameter {
                name: "learning_rate".to_string(),
                reason: format!("must be in (0, 1], got {}", learning_rate),
            });
        }

        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(units);

        if let Some(message) = &self.config.fail_with {
            return Err(FitError::Backend(message.clone()));
        }

        let target = ConstantModel::fit(task, data)?;
        if !self.config.setup_cost.is_zero() {
            thread::sleep(self.config.setup_cost);
        }

        let FitContext { abort, mut callback } = ctx;
        let mut ballast = Vec::new();
        let mut trained = 0;

        for unit in 0..units {
            if abort.is_tripped() {
                return Err(FitError::Aborted);
            }
            if !self.config.unit_cost.is_zero() {
                thread::sleep(self.config.unit_cost);
            }
            if self.config.unit_bytes > 0 {
                ballast.push(vec![1u8; self.config.unit_bytes].into_boxed_slice());
            }
            trained = unit + 1;

            if self.config.native_callback {
                if let Some(callback) = callback.as_deref_mut() {
                    let stop = match self.library {
                        Some(kind) => kind.run_hook(callback, kind.first_unit_index() + unit),
                        None => callback.after_unit(unit).is_stop(),
                    };
                    if stop {
                        break;
                    }
                }
            }
        }
        trace!("synthetic fit trained {} of {} units", trained, units);

        Ok(Box::new(SyntheticModel {
            task,
            target,
            learning_rate,
            units: trained,
            best_iteration: self.config.best_iteration,
            ballast,
        }))
    }
}

/// Model whose prediction approaches the target mean as units are added
pub struct SyntheticModel {
    task: Task,
    target: ConstantModel,
    learning_rate: f64,
    units: usize,
    best_iteration: Option<usize>,
    ballast: Vec<Box<[u8]>>,
}

impl SyntheticModel {
    /// Share of the gap to the target closed by the trained units
    fn progress(&self) -> f64 {
        let units = i32::try_from(self.units).unwrap_or(i32::MAX);
        1.0 - (1.0 - self.learning_rate).powi(units)
    }

    fn proba_row(&self) -> Vec<f64> {
        let priors = self.target.priors();
        let uniform = 1.0 / priors.len().max(1) as f64;
        let progress = self.progress();
        priors
            .iter()
            .map(|p| (1.0 - progress) * uniform + progress * p)
            .collect()
    }

    fn check_shape(&self, features: &Matrix) -> Result<()> {
        if features.cols() != self.target.n_features() {
            return Err(FitError::ShapeMismatch {
                expected: self.target.n_features(),
                actual: features.cols(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for SyntheticModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyntheticModel")
            .field("task", &self.task)
            .field("units", &self.units)
            .field("learning_rate", &self.learning_rate)
            .field("best_iteration", &self.best_iteration)
            .field("ballast_bytes", &self.ballast.iter().map(|b| b.len()).sum::<usize>())
            .finish()
    }
}

impl TrainedModel for SyntheticModel {
    fn predict(&self, features: &Matrix) -> Result<Vec<f64>> {
        self.check_shape(features)?;

        let value = if self.task.is_classification() {
            let classes = self.target.classes().unwrap_or(&[]);
            let proba = self.proba_row();
            let mut best = 0;
            for (slot, p) in proba.iter().enumerate() {
                if *p > proba[best] {
                    best = slot;
                }
            }
            classes.get(best).copied().unwrap_or(0.0)
        } else {
            self.target.value() * self.progress()
        };

        Ok(vec![value; features.rows()])
    }

    fn predict_proba(&self, features: &Matrix) -> Result<Matrix> {
        if !self.task.is_classification() {
            return Err(FitError::Unsupported(format!(
                "predict_proba for {} task",
                self.task
            )));
        }
        self.check_shape(features)?;

        let row = self.proba_row();
        let mut values = Vec::with_capacity(features.rows() * row.len());
        for _ in 0..features.rows() {
            values.extend_from_slice(&row);
        }
        Matrix::new(features.rows(), row.len(), values)
    }

    fn n_features(&self) -> usize {
        self.target.n_features()
    }

    fn classes(&self) -> Option<&[f64]> {
        self.target.classes()
    }

    fn units(&self) -> usize {
        self.units
    }

    fn best_iteration(&self) -> Option<usize> {
        let last = self.units.checked_sub(1)?;
        Some(self.best_iteration.map_or(last, |best| best.min(last)))
    }

    fn truncate(&mut self, units: usize) {
        self.units = self.units.min(units);
        self.ballast.truncate(self.units);
    }
}
