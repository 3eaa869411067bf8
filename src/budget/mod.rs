//! Budget-aware training control
//!
//! Two strategies share one budget: calibrated unit planning for backends
//! that can only be told a unit count up front, and a per-unit callback for
//! backends that can be stopped between units.

pub mod callback;
pub mod projection;
pub mod trainer;
pub mod types;

pub use callback::ResourceLimitCallback;
pub use projection::{project_unit_cap, CapInputs};
pub use trainer::BudgetedTrainer;
pub use types::{
    BudgetConfig, CallbackState, IterationPlan, StopReason, TrainingBudget, UnitSignal,
};
