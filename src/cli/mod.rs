//! CLI module for budgetfit
//!
//! Handles command-line argument parsing.

pub mod args;

pub use args::{Args, Commands, FitArgs, Verbosity};
