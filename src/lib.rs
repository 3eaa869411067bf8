//! budgetfit - Budget-aware estimator training
//!
//! Trains iterative estimators within a wall-clock budget and a memory
//! ceiling. Unit counts are either planned up front from short calibration
//! runs, or enforced between units through a backend callback, and a
//! resource failure degrades to a constant model instead of an error.

pub mod backend;
pub mod budget;
pub mod cli;
pub mod config;
pub mod data;
pub mod errors;
pub mod estimator;
pub mod limiter;
pub mod telemetry;

// Re-export commonly used types
pub use backend::{BackendKind, ModelBackend, Params, TrainedModel, UnitCallback};
pub use budget::{BudgetedTrainer, IterationPlan, TrainingBudget, UnitSignal};
pub use config::Config;
pub use data::{Dataset, Matrix, Task};
pub use errors::{FitError, Result};
pub use estimator::Estimator;
pub use limiter::ResourceLimiter;
