//! Supported estimator kinds and their parameter conventions

use crate::backend::{Params, UnitCallback};
use crate::budget::types::UnitSignal;
use crate::data::Task;
use crate::errors::{FitError, Result};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

/// Estimator families the controller knows how to budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    LightGbm,
    /// XGBoost through its native training API
    XGBoost,
    /// XGBoost through its scikit-learn style wrapper
    XGBoostSklearn,
    /// XGBoost wrapper searched with depth-wise growth
    XGBoostLimitDepth,
    RandomForest,
    ExtraTrees,
    LogisticRegressionL1,
    LogisticRegressionL2,
    CatBoost,
    KNeighbors,
    Prophet,
    Arima,
    Sarimax,
}

/// What the controller can rely on for a kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// The library can call back after every unit and be told to stop
    pub native_abort_callback: bool,

    /// Parameter holding the unit count, for iterative learners
    pub iteration_param: Option<&'static str>,
}

/// How a library's per-unit hook expresses "stop"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackConvention {
    /// The hook returns nothing and raises to stop
    RaiseToStop,

    /// The hook returns true to stop
    StopIsTrue,

    /// The hook returns true to keep going
    ContinueIsTrue,
}

impl CallbackConvention {
    /// Value the library hook must return for `signal`; `None` means return
    /// nothing and, for a stop, raise instead
    pub fn encode(&self, signal: UnitSignal) -> Option<bool> {
        match self {
            CallbackConvention::RaiseToStop => None,
            CallbackConvention::StopIsTrue => Some(signal.is_stop()),
            CallbackConvention::ContinueIsTrue => Some(!signal.is_stop()),
        }
    }

    /// Whether a raw hook return value asks the library to stop
    pub fn is_stop(&self, raw: bool) -> bool {
        match self {
            CallbackConvention::RaiseToStop => false,
            CallbackConvention::StopIsTrue => raw,
            CallbackConvention::ContinueIsTrue => !raw,
        }
    }
}

const ALL: [BackendKind; 13] = [
    BackendKind::LightGbm,
    BackendKind::XGBoost,
    BackendKind::XGBoostSklearn,
    BackendKind::XGBoostLimitDepth,
    BackendKind::RandomForest,
    BackendKind::ExtraTrees,
    BackendKind::LogisticRegressionL1,
    BackendKind::LogisticRegressionL2,
    BackendKind::CatBoost,
    BackendKind::KNeighbors,
    BackendKind::Prophet,
    BackendKind::Arima,
    BackendKind::Sarimax,
];

const CATBOOST_DEFAULT_ESTIMATORS: u64 = 8192;
const CATBOOST_SEED: u64 = 10242048;
const DEFAULT_MAX_DEPTH: u32 = 16;

impl BackendKind {
    pub fn all() -> &'static [BackendKind] {
        &ALL
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::LightGbm => "lgbm",
            BackendKind::XGBoost => "xgboost",
            BackendKind::XGBoostSklearn => "xgboost_sklearn",
            BackendKind::XGBoostLimitDepth => "xgb_limitdepth",
            BackendKind::RandomForest => "rf",
            BackendKind::ExtraTrees => "extra_tree",
            BackendKind::LogisticRegressionL1 => "lrl1",
            BackendKind::LogisticRegressionL2 => "lrl2",
            BackendKind::CatBoost => "catboost",
            BackendKind::KNeighbors => "kneighbor",
            BackendKind::Prophet => "prophet",
            BackendKind::Arima => "arima",
            BackendKind::Sarimax => "sarimax",
        }
    }

    fn is_xgboost(&self) -> bool {
        matches!(
            self,
            BackendKind::XGBoost | BackendKind::XGBoostSklearn | BackendKind::XGBoostLimitDepth
        )
    }

    fn is_forest(&self) -> bool {
        matches!(self, BackendKind::RandomForest | BackendKind::ExtraTrees)
    }

    fn is_forecaster(&self) -> bool {
        matches!(
            self,
            BackendKind::Prophet | BackendKind::Arima | BackendKind::Sarimax
        )
    }

    pub fn capabilities(&self) -> Capabilities {
        let boosted = *self == BackendKind::LightGbm
            || *self == BackendKind::CatBoost
            || self.is_xgboost();
        Capabilities {
            native_abort_callback: boosted,
            iteration_param: (boosted || self.is_forest()).then_some("n_estimators"),
        }
    }

    /// Hook convention of the underlying library, for kinds with a hook
    pub fn callback_convention(&self) -> Option<CallbackConvention> {
        match self {
            BackendKind::LightGbm => Some(CallbackConvention::RaiseToStop),
            BackendKind::CatBoost => Some(CallbackConvention::ContinueIsTrue),
            k if k.is_xgboost() => Some(CallbackConvention::StopIsTrue),
            _ => None,
        }
    }

    /// Index the library reports for the first unit
    pub fn first_unit_index(&self) -> usize {
        match self {
            BackendKind::CatBoost => 1,
            _ => 0,
        }
    }

    /// Convert a library-reported unit index to a 0-based one
    pub fn unit_from_library(&self, reported: usize) -> usize {
        reported.saturating_sub(self.first_unit_index())
    }

    /// Consult `callback` from inside this library's per-unit hook.
    ///
    /// `reported` is the unit index as the library counts it. Returns whether
    /// the library stops training, after the signal has gone through the
    /// library's return convention.
    pub fn run_hook(&self, callback: &mut dyn UnitCallback, reported: usize) -> bool {
        let signal = callback.after_unit(self.unit_from_library(reported));
        match self.callback_convention() {
            Some(convention) => match convention.encode(signal) {
                Some(raw) => convention.is_stop(raw),
                // raised
                None => signal.is_stop(),
            },
            None => signal.is_stop(),
        }
    }

    /// Check the kind can serve `task`
    pub fn check_task(&self, task: Task) -> Result<()> {
        let supported = match self {
            BackendKind::LogisticRegressionL1 | BackendKind::LogisticRegressionL2 => {
                task.is_classification()
            }
            k if k.is_forecaster() => task == Task::Forecast,
            _ => true,
        };
        if supported {
            Ok(())
        } else {
            Err(FitError::UnsupportedTask {
                kind: self.to_string(),
                task: task.to_string(),
            })
        }
    }

    /// Translate a search configuration into backend parameters
    pub fn config_to_params(&self, config: &Params, task: Task) -> Params {
        let mut params = config.clone();

        match self {
            BackendKind::LightGbm => {
                if let Some(log_max_bin) = params.remove("log_max_bin").and_then(|v| v.as_u64()) {
                    params.insert("max_bin".into(), json!((1u64 << log_max_bin.min(62)) - 1));
                }
                params.entry("verbose").or_insert(json!(-1));
            }
            k if k.is_xgboost() => {
                let max_depth = params
                    .entry("max_depth")
                    .or_insert(json!(0))
                    .as_u64()
                    .unwrap_or(0);
                if max_depth == 0 {
                    params.entry("grow_policy").or_insert(json!("lossguide"));
                    params.entry("tree_method").or_insert(json!("hist"));
                }
                params.entry("use_label_encoder").or_insert(json!(false));
                params.insert("verbosity".into(), json!(0));
                params.remove("verbose");
                if *k == BackendKind::XGBoost {
                    if let Some(n_jobs) = params.remove("n_jobs") {
                        params.insert("nthread".into(), n_jobs);
                    }
                }
            }
            k if k.is_forest() => {
                if let Some(max_leaves) = params.remove("max_leaves") {
                    params.entry("max_leaf_nodes").or_insert(max_leaves);
                }
                if !task.is_classification() {
                    params.remove("criterion");
                }
                params.insert("verbose".into(), json!(0));
            }
            BackendKind::LogisticRegressionL1 | BackendKind::LogisticRegressionL2 => {
                let l1 = *self == BackendKind::LogisticRegressionL1;
                params.entry("tol").or_insert(json!(1e-4));
                params
                    .entry("solver")
                    .or_insert(json!(if l1 { "saga" } else { "lbfgs" }));
                params
                    .entry("penalty")
                    .or_insert(json!(if l1 { "l1" } else { "l2" }));
            }
            BackendKind::CatBoost => {
                params
                    .entry("n_estimators")
                    .or_insert(json!(CATBOOST_DEFAULT_ESTIMATORS));
                if let Some(n_jobs) = params.remove("n_jobs") {
                    params.insert("thread_count".into(), n_jobs);
                }
                params.entry("verbose").or_insert(json!(false));
                params.entry("random_seed").or_insert(json!(CATBOOST_SEED));
            }
            BackendKind::KNeighbors => {
                params.entry("weights").or_insert(json!("distance"));
            }
            _ => {}
        }

        params
    }

    /// Estimated model size in bytes for `config`
    pub fn size(&self, config: &Params) -> f64 {
        let tree_bytes = |leaves: f64, estimators: f64| {
            (leaves * 3.0 + (leaves - 1.0) * 4.0 + 1.0) * estimators * 8.0
        };
        let number = |name: &str| config.get(name).and_then(Value::as_f64);

        match self {
            BackendKind::CatBoost => {
                let estimators = number("n_estimators").unwrap_or(CATBOOST_DEFAULT_ESTIMATORS as f64);
                tree_bytes(64.0, estimators)
            }
            k if k.capabilities().iteration_param.is_some() => {
                let leaves = number("num_leaves")
                    .or_else(|| number("max_leaves"))
                    .unwrap_or_else(|| {
                        let depth = number("max_depth")
                            .filter(|d| *d > 0.0)
                            .unwrap_or(DEFAULT_MAX_DEPTH as f64)
                            .min(62.0);
                        (1u64 << depth as u32) as f64
                    });
                let estimators = number("n_estimators").unwrap_or(100.0);
                tree_bytes(leaves, estimators)
            }
            _ => 1.0,
        }
    }

    /// Training cost relative to LightGBM on the same data
    pub fn cost_relative_to_lgbm(&self) -> f64 {
        match self {
            BackendKind::LightGbm => 1.0,
            BackendKind::XGBoost | BackendKind::XGBoostSklearn => 1.6,
            BackendKind::XGBoostLimitDepth => 64.0,
            BackendKind::RandomForest => 2.0,
            BackendKind::ExtraTrees => 1.9,
            BackendKind::LogisticRegressionL1 => 160.0,
            BackendKind::LogisticRegressionL2 => 25.0,
            BackendKind::CatBoost => 15.0,
            BackendKind::KNeighbors => 30.0,
            BackendKind::Prophet | BackendKind::Arima | BackendKind::Sarimax => 1.0,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let lowered = s.to_lowercase();
        match lowered.as_str() {
            "lightgbm" => return Ok(BackendKind::LightGbm),
            "xgb" => return Ok(BackendKind::XGBoost),
            "extra_trees" => return Ok(BackendKind::ExtraTrees),
            "kneighbors" | "knn" => return Ok(BackendKind::KNeighbors),
            _ => {}
        }
        ALL.iter()
            .copied()
            .find(|kind| kind.as_str() == lowered)
            .ok_or_else(|| format!("unknown estimator kind '{}'", s))
    }
}
