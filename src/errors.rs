//! Error types for budgetfit
//!
//! Separates resource-pressure failures (recovered by the estimator with a
//! fallback model) from correctness failures (propagated to the caller).

use thiserror::Error;

/// Main error type for budgeted training
#[derive(Error, Debug)]
pub enum FitError {
    /// Memory ceiling breached inside a limited scope
    #[error("Memory ceiling exceeded: {used} bytes > {ceiling} bytes")]
    ResourceExceeded { used: u64, ceiling: u64 },

    /// Wall-clock limit fired inside a limited scope
    #[error("Deadline exceeded after {budget_ms}ms")]
    DeadlineExceeded { budget_ms: u64 },

    /// Backend observed a tripped abort token and gave up mid-training
    #[error("Training aborted at a unit boundary")]
    Aborted,

    /// Hyperparameter missing or malformed
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    /// Budget must be a finite, non-negative number of seconds
    #[error("Invalid budget: {0} seconds")]
    InvalidBudget(f64),

    /// Backend kind cannot serve the requested task
    #[error("{kind} does not support task '{task}'")]
    UnsupportedTask { kind: String, task: String },

    /// Operation not offered by a backend or model
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Feature/target dimensions disagree
    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// Nothing to train on
    #[error("Cannot fit on an empty dataset")]
    EmptyDataset,

    /// Model access before fit
    #[error("Estimator is not fit yet")]
    NotFitted,

    /// Opaque failure reported by a model backend
    #[error("Backend error: {0}")]
    Backend(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl FitError {
    /// Whether this failure came from budget or memory pressure.
    ///
    /// Such failures degrade the model instead of failing the fit; everything
    /// else is a correctness error and must reach the caller.
    pub fn is_resource_pressure(&self) -> bool {
        match self {
            FitError::ResourceExceeded { .. } => true,
            FitError::DeadlineExceeded { .. } => true,
            FitError::Aborted => true,

            FitError::InvalidParameter { .. } => false,
            FitError::InvalidBudget(_) => false,
            FitError::UnsupportedTask { .. } => false,
            FitError::ShapeMismatch { .. } => false,
            FitError::EmptyDataset => false,
            FitError::ConfigError(_) => false,

            _ => false,
        }
    }
}

/// Result type alias for budgeted training operations
pub type Result<T> = std::result::Result<T, FitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FitError::ResourceExceeded {
            used: 9000,
            ceiling: 8000,
        };
        assert!(err.to_string().contains("9000"));
        assert!(err.to_string().contains("8000"));
    }

    #[test]
    fn test_unsupported_task_display() {
        let err = FitError::UnsupportedTask {
            kind: "lrl1".to_string(),
            task: "regression".to_string(),
        };
        assert!(err.to_string().contains("lrl1"));
        assert!(err.to_string().contains("regression"));
    }

    #[test]
    fn test_resource_pressure_classification() {
        assert!(FitError::DeadlineExceeded { budget_ms: 10 }.is_resource_pressure());
        assert!(FitError::ResourceExceeded { used: 2, ceiling: 1 }.is_resource_pressure());
        assert!(FitError::Aborted.is_resource_pressure());
        assert!(!FitError::Backend("bad combination".to_string()).is_resource_pressure());
        assert!(!FitError::InvalidBudget(-1.0).is_resource_pressure());
        assert!(!FitError::NotFitted.is_resource_pressure());
    }
}
