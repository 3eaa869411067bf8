//! Training data containers
//! Dense feature matrices, labelled datasets and task kinds

pub mod dataset;
pub mod task;

pub use dataset::{Dataset, Matrix};
pub use task::Task;
