//! Integration tests for budgeted fits
//!
//! Drive the estimator facade end to end with the synthetic backend.
//! Timing assertions leave generous slack for loaded machines.

use budgetfit::{
    backend::{BackendKind, CallLog, Params, SyntheticBackend, SyntheticConfig},
    budget::StopReason,
    config::Config,
    data::{Dataset, Matrix, Task},
    errors::FitError,
    estimator::Estimator,
    limiter::DeadlineMode,
    telemetry::{FitEvent, MemoryProbe, MemorySnapshot, SharedProbe, StaticProbe},
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn params(units: usize) -> Params {
    let mut params = Params::new();
    params.insert("n_estimators".into(), json!(units));
    params
}

fn synthetic(unit_cost_ms: u64) -> SyntheticConfig {
    SyntheticConfig {
        unit_cost: Duration::from_millis(unit_cost_ms),
        ..SyntheticConfig::default()
    }
}

fn estimator(kind: BackendKind, task: Task, units: usize, workload: SyntheticConfig) -> (Estimator, CallLog) {
    let backend = SyntheticBackend::for_kind(kind, workload);
    let calls = backend.call_log();
    let estimator = Estimator::new(kind, task, params(units), Box::new(backend))
        .unwrap()
        .with_probe(None);
    (estimator, calls)
}

fn enforced_config() -> Config {
    let mut config = Config::default();
    config.limiter.deadline_mode = DeadlineMode::Enforced;
    config.limiter.min_time_limit_secs = 0.0;
    config.limiter.poll_interval_ms = 5;
    config
}

#[test]
fn test_calibrated_fit_respects_budget() {
    let (mut estimator, calls) = estimator(BackendKind::RandomForest, Task::Regression, 1000, synthetic(5));
    let data = Dataset::synthetic(200, 4, None);

    let elapsed = estimator.fit(&data, Some(0.5)).unwrap();

    let units = estimator.trained_units().unwrap();
    assert!(units > 4 && units < 1000, "trained {} units", units);
    assert!(elapsed < Duration::from_secs_f64(1.0), "took {:?}", elapsed);

    let calls = calls.lock().unwrap().clone();
    assert_eq!(&calls[..2], &[1, 4]);
    assert_eq!(*calls.last().unwrap(), units);

    let plan = estimator.last_plan().unwrap();
    assert!(plan.was_capped());
    assert!(plan.measured_time_per_unit.unwrap() > 0.0);
}

#[test]
fn test_requested_units_not_overwritten_by_cap() {
    let (mut estimator, _) = estimator(BackendKind::ExtraTrees, Task::Regression, 1000, synthetic(5));
    let data = Dataset::synthetic(50, 3, None);

    estimator.fit(&data, Some(0.3)).unwrap();

    assert!(estimator.trained_units().unwrap() < 1000);
    assert_eq!(estimator.params()["n_estimators"], json!(1000));
}

#[test]
fn test_callback_fit_stops_near_deadline() {
    let (mut estimator, calls) = estimator(BackendKind::LightGbm, Task::Regression, 1000, synthetic(5));
    assert!(estimator.uses_native_callback());
    let data = Dataset::synthetic(100, 3, None);

    let elapsed = estimator.fit(&data, Some(0.3)).unwrap();

    let units = estimator.trained_units().unwrap();
    assert!(units >= 1 && units < 1000, "trained {} units", units);
    assert!(elapsed < Duration::from_secs_f64(0.8), "took {:?}", elapsed);
    // One backend call: no calibration on the callback path
    assert_eq!(calls.lock().unwrap().len(), 1);

    let stats = estimator.telemetry().get_stats();
    assert_eq!(stats.early_stops, 1);
    assert_eq!(stats.calibration_passes, 0);
}

#[test]
fn test_zero_budget_trains_single_unit() {
    let (mut calibrated, _) = estimator(BackendKind::RandomForest, Task::Regression, 100, synthetic(1));
    let (mut callback, _) = estimator(BackendKind::XGBoost, Task::Regression, 100, synthetic(1));
    let data = Dataset::synthetic(20, 2, None);

    calibrated.fit(&data, Some(0.0)).unwrap();
    callback.fit(&data, Some(0.0)).unwrap();

    assert_eq!(calibrated.trained_units(), Some(1));
    assert_eq!(callback.trained_units(), Some(1));
}

#[test]
fn test_unbounded_fit_trains_all_units() {
    let (mut estimator, calls) = estimator(BackendKind::RandomForest, Task::Regression, 40, synthetic(0));
    let data = Dataset::synthetic(20, 2, None);

    estimator.fit(&data, None).unwrap();

    assert_eq!(estimator.trained_units(), Some(40));
    assert_eq!(*calls.lock().unwrap(), vec![40]);
}

#[test]
fn test_cached_costs_skip_calibration() {
    let (mut estimator, calls) = estimator(BackendKind::RandomForest, Task::Regression, 20, synthetic(1));
    let data = Dataset::synthetic(100, 3, None);

    estimator.fit(&data, Some(10.0)).unwrap();
    estimator.fit(&data, Some(10.0)).unwrap();
    assert_eq!(*calls.lock().unwrap(), vec![1, 4, 20, 20]);

    let grown = Dataset::synthetic(110, 3, None);
    estimator.fit(&grown, Some(10.0)).unwrap();
    assert_eq!(*calls.lock().unwrap(), vec![1, 4, 20, 20, 1, 4, 20]);

    let stats = estimator.telemetry().get_stats();
    assert_eq!(stats.calibration_passes, 4);
    assert_eq!(stats.calibrations_reused, 1);
}

#[test]
fn test_deadline_falls_back_to_constant_model() {
    let (estimator, _) = estimator(BackendKind::RandomForest, Task::Regression, 100, synthetic(20));
    let mut estimator = estimator.with_config(&enforced_config());

    let features = Matrix::zeros(4, 2);
    let data = Dataset::new(features.clone(), vec![1.0, 2.0, 3.0, 6.0]).unwrap();

    let result = estimator.fit(&data, Some(0.05));

    assert!(result.is_ok());
    assert_eq!(estimator.trained_units(), Some(0));
    assert_eq!(estimator.predict(&features).unwrap(), vec![3.0; 4]);
    assert!(estimator.last_plan().is_none());

    let stats = estimator.telemetry().get_stats();
    assert_eq!(stats.fallbacks, 1);
    assert!(estimator
        .telemetry()
        .recent_events(10)
        .iter()
        .any(|e| matches!(e, FitEvent::Fallback { .. })));
}

#[test]
fn test_fallback_classifier_reports_priors() {
    let workload = SyntheticConfig {
        setup_cost: Duration::from_millis(200),
        ..synthetic(0)
    };
    let (estimator, _) = estimator(BackendKind::KNeighbors, Task::Binary, 1, workload);
    let mut estimator = estimator.with_config(&enforced_config());

    let features = Matrix::zeros(4, 1);
    let data = Dataset::new(features.clone(), vec![0.0, 1.0, 1.0, 1.0]).unwrap();

    estimator.fit(&data, Some(0.02)).unwrap();

    assert_eq!(estimator.trained_units(), Some(0));
    assert_eq!(estimator.predict(&features).unwrap(), vec![1.0; 4]);
    assert_eq!(estimator.classes(), Some(&[0.0, 1.0][..]));
    let proba = estimator.predict_proba(&features).unwrap();
    assert_eq!(proba.row(0), &[0.25, 0.75]);
}

#[test]
fn test_backend_errors_propagate() {
    let workload = SyntheticConfig {
        fail_with: Some("max_depth must be positive".to_string()),
        ..synthetic(0)
    };
    let (mut estimator, _) = estimator(BackendKind::RandomForest, Task::Regression, 10, workload);
    let data = Dataset::synthetic(20, 2, None);

    let result = estimator.fit(&data, Some(5.0));

    assert!(matches!(result, Err(FitError::Backend(_))));
    assert!(estimator.model().is_none());
    assert_eq!(estimator.telemetry().get_stats().fallbacks, 0);
}

#[test]
fn test_invalid_budget_rejected() {
    let (mut estimator, calls) = estimator(BackendKind::LightGbm, Task::Regression, 10, synthetic(0));
    let data = Dataset::synthetic(20, 2, None);

    assert!(matches!(estimator.fit(&data, Some(-1.0)), Err(FitError::InvalidBudget(_))));
    assert!(calls.lock().unwrap().is_empty());
}

#[test]
fn test_missing_unit_count_is_invalid() {
    let backend = SyntheticBackend::for_kind(BackendKind::RandomForest, synthetic(0));
    let mut estimator = Estimator::new(BackendKind::RandomForest, Task::Regression, Params::new(), Box::new(backend))
        .unwrap()
        .with_probe(None);

    let result = estimator.fit(&Dataset::synthetic(10, 2, None), None);
    assert!(matches!(result, Err(FitError::InvalidParameter { .. })));
}

#[test]
fn test_best_iteration_prunes_model() {
    let workload = SyntheticConfig {
        best_iteration: Some(6),
        ..synthetic(0)
    };
    let (mut estimator, _) = estimator(BackendKind::LightGbm, Task::Regression, 20, workload);

    estimator.fit(&Dataset::synthetic(20, 2, None), None).unwrap();

    assert_eq!(estimator.trained_units(), Some(7));
    assert_eq!(estimator.params()["n_estimators"], json!(20));
}

#[test]
fn test_low_memory_stops_callback_training() {
    let probe: SharedProbe = Arc::new(StaticProbe::new(10 << 20, 1 << 30, 0));
    let (estimator, _) = estimator(BackendKind::CatBoost, Task::Regression, 50, synthetic(0));
    let mut estimator = estimator.with_probe(Some(probe));

    estimator.fit(&Dataset::synthetic(20, 2, None), None).unwrap();

    assert_eq!(estimator.trained_units(), Some(1));
    let stopped = estimator
        .telemetry()
        .recent_events(10)
        .into_iter()
        .find_map(|e| match e {
            FitEvent::EarlyStop { reason, .. } => Some(reason),
            _ => None,
        });
    assert_eq!(stopped, Some(StopReason::LowMemory));
}

#[test]
fn test_ample_memory_leaves_calibrated_fit_uncapped() {
    // Plenty of memory: the memory term must not bind.
    let probe: SharedProbe = Arc::new(StaticProbe::new(8 << 30, 16 << 30, 0));
    let (estimator, calls) = estimator(BackendKind::RandomForest, Task::Regression, 30, synthetic(0));
    let mut estimator = estimator.with_probe(Some(probe));

    estimator.fit(&Dataset::synthetic(20, 2, None), None).unwrap();

    assert_eq!(estimator.trained_units(), Some(30));
    assert_eq!(*calls.lock().unwrap(), vec![1, 4, 30]);
    // Static readings measure no memory use, so no per-unit cost is reported.
    assert_eq!(estimator.last_plan().unwrap().measured_mem_per_unit, None);
}

/// Available memory shrinks by `unit_bytes` for every unit the backend
/// has been asked to train so far
struct DrainingProbe {
    calls: CallLog,
    start: u64,
    unit_bytes: u64,
}

impl MemoryProbe for DrainingProbe {
    fn snapshot(&self) -> MemorySnapshot {
        let trained: u64 = self.calls.lock().unwrap().iter().map(|&u| u as u64).sum();
        MemorySnapshot {
            available: self.start.saturating_sub(trained * self.unit_bytes),
            total: self.start * 2,
            process_rss: 0,
        }
    }
}

#[test]
fn test_memory_cost_caps_calibrated_training() {
    let start: u64 = 100 << 20;
    let unit_bytes: u64 = 1 << 20;
    let (estimator, calls) = estimator(BackendKind::RandomForest, Task::Regression, 1000, synthetic(0));
    let probe: SharedProbe = Arc::new(DrainingProbe {
        calls: calls.clone(),
        start,
        unit_bytes,
    });
    let mut estimator = estimator.with_probe(Some(probe));

    estimator.fit(&Dataset::synthetic(20, 2, None), None).unwrap();

    let plan = estimator.last_plan().unwrap();
    assert_eq!(plan.measured_mem_per_unit, Some(unit_bytes as f64));
    let expected = ((1.0 - 0.2) * start as f64 / unit_bytes as f64).floor() as usize;
    assert_eq!(plan.unit_cap, Some(expected));
    assert!(expected < 1000);
    assert_eq!(estimator.trained_units(), Some(expected));
    assert_eq!(*calls.lock().unwrap(), vec![1, 4, expected]);
}

#[test]
fn test_library_hooks_stop_at_same_unit() {
    // Low memory stops at the first unit; CatBoost counts it as 1, XGBoost as 0.
    for kind in [BackendKind::CatBoost, BackendKind::XGBoost] {
        let probe: SharedProbe = Arc::new(StaticProbe::new(10 << 20, 1 << 30, 0));
        let (estimator, _) = estimator(kind, Task::Regression, 50, synthetic(0));
        let mut estimator = estimator.with_probe(Some(probe));

        estimator.fit(&Dataset::synthetic(20, 2, None), None).unwrap();

        assert_eq!(estimator.trained_units(), Some(1), "{}", kind);
        let stopped_at = estimator
            .telemetry()
            .recent_events(10)
            .into_iter()
            .find_map(|e| match e {
                FitEvent::EarlyStop { unit, .. } => Some(unit),
                _ => None,
            });
        assert_eq!(stopped_at, Some(0), "{}", kind);
    }
}

#[test]
fn test_huge_budget_behaves_as_unbounded() {
    let (mut forest, _) = estimator(BackendKind::RandomForest, Task::Regression, 5, synthetic(0));
    let (mut boosted, _) = estimator(BackendKind::LightGbm, Task::Regression, 5, synthetic(0));
    let data = Dataset::synthetic(10, 2, None);

    forest.fit(&data, Some(1e20)).unwrap();
    boosted.fit(&data, Some(1e19)).unwrap();

    assert_eq!(forest.trained_units(), Some(5));
    assert_eq!(boosted.trained_units(), Some(5));
}

#[test]
fn test_refit_replaces_model() {
    let (mut estimator, _) = estimator(BackendKind::LightGbm, Task::Regression, 5, synthetic(0));

    estimator.fit(&Dataset::synthetic(20, 2, None), None).unwrap();
    assert_eq!(estimator.n_features(), Some(2));

    estimator.fit(&Dataset::synthetic(20, 5, None), None).unwrap();
    assert_eq!(estimator.n_features(), Some(5));
    assert_eq!(estimator.telemetry().get_stats().fits_completed, 2);
}
