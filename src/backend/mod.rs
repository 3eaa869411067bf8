//! Model backend contracts
//!
//! A backend turns a parameter map and a dataset into a trained model. The
//! budget controller only needs to know how many units a model holds, how to
//! ask the backend for a given count, and whether the backend will consult a
//! [`UnitCallback`] between units.

pub mod constant;
pub mod kind;
pub mod synthetic;

pub use constant::ConstantModel;
pub use kind::{BackendKind, CallbackConvention, Capabilities};
pub use synthetic::{CallLog, SyntheticBackend, SyntheticConfig};

use crate::budget::types::UnitSignal;
use crate::data::{Dataset, Matrix, Task};
use crate::errors::{FitError, Result};
use crate::limiter::AbortToken;
use serde_json::Value;
use std::fmt;

/// Backend hyperparameters
pub type Params = serde_json::Map<String, Value>;

/// Hook consulted after every completed unit
pub trait UnitCallback {
    fn after_unit(&mut self, unit: usize) -> UnitSignal;
}

/// Per-call training context handed to a backend
pub struct FitContext<'a> {
    /// Tripped when the enclosing limiter gives up
    pub abort: &'a AbortToken,

    /// Per-unit hook, only passed to backends that support one
    pub callback: Option<&'a mut dyn UnitCallback>,
}

impl<'a> FitContext<'a> {
    pub fn new(abort: &'a AbortToken) -> Self {
        Self {
            abort,
            callback: None,
        }
    }

    pub fn with_callback(mut self, callback: &'a mut dyn UnitCallback) -> Self {
        self.callback = Some(callback);
        self
    }
}

/// Something that can train models
pub trait ModelBackend: Send {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Whether `fit` honours [`FitContext::callback`]
    fn supports_abort_callback(&self) -> bool {
        true
    }

    /// Train a fresh model from `params`
    fn fit(
        &self,
        params: &Params,
        task: Task,
        data: &Dataset,
        ctx: FitContext<'_>,
    ) -> Result<Box<dyn TrainedModel>>;
}

/// A fitted model
pub trait TrainedModel: Send + fmt::Debug {
    fn predict(&self, features: &Matrix) -> Result<Vec<f64>>;

    /// Class probabilities, one column per entry of [`TrainedModel::classes`]
    fn predict_proba(&self, _features: &Matrix) -> Result<Matrix> {
        Err(FitError::Unsupported("predict_proba".to_string()))
    }

    /// Feature count seen during training
    fn n_features(&self) -> usize;

    /// Sorted class labels for classifiers
    fn classes(&self) -> Option<&[f64]> {
        None
    }

    /// Units (trees, boosting rounds) the model holds
    fn units(&self) -> usize {
        1
    }

    /// Index of the best unit, when the backend tracks one
    fn best_iteration(&self) -> Option<usize> {
        None
    }

    /// Keep only the first `units` units
    fn truncate(&mut self, _units: usize) {}
}

/// Read a non-negative integer parameter
pub fn param_usize(params: &Params, name: &str) -> Result<Option<usize>> {
    match params.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .or_else(|| {
                value
                    .as_f64()
                    .filter(|v| v.fract() == 0.0 && *v >= 0.0)
                    .map(|v| v as u64)
            })
            .map(|v| Some(v as usize))
            .ok_or_else(|| FitError::InvalidParameter {
                name: name.to_string(),
                reason: format!("expected a non-negative integer, got {}", value),
            }),
    }
}

/// Read a numeric parameter
pub fn param_f64(params: &Params, name: &str) -> Result<Option<f64>> {
    match params.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_f64()
            .map(Some)
            .ok_or_else(|| FitError::InvalidParameter {
                name: name.to_string(),
                reason: format!("expected a number, got {}", value),
            }),
    }
}
