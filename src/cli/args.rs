//! Command-line argument parsing for budgetfit
//!
//! Provides clap-based CLI with subcommands and verbosity control.

use crate::backend::BackendKind;
use crate::data::Task;
use clap::{Parser, Subcommand};
use log::LevelFilter;
use std::path::PathBuf;

/// budgetfit - Train estimators within a time and memory budget
#[derive(Parser, Debug)]
#[command(name = "budgetfit")]
#[command(version)]
#[command(about = "Budget-aware estimator training controller", long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level: -q (quiet), default (normal), -v (verbose), -vv (very verbose)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a synthetic workload under a budget
    Fit(FitArgs),

    /// Show current memory telemetry
    Probe,

    /// List estimator kinds and their capabilities
    Kinds,

    /// Display current configuration
    Config,
}

/// Options for the `fit` subcommand
#[derive(clap::Args, Debug, Clone)]
pub struct FitArgs {
    /// Estimator kind to emulate
    #[arg(long, default_value = "lgbm")]
    pub kind: BackendKind,

    /// Learning task
    #[arg(long, default_value = "regression")]
    pub task: Task,

    /// Training rows
    #[arg(long, default_value_t = 1000)]
    pub rows: usize,

    /// Feature columns
    #[arg(long, default_value_t = 8)]
    pub cols: usize,

    /// Requested units (n_estimators)
    #[arg(short = 'n', long, default_value_t = 100)]
    pub units: usize,

    /// Time budget in seconds (unbounded if omitted)
    #[arg(short, long)]
    pub budget: Option<f64>,

    /// Wall-clock cost of one unit in milliseconds
    #[arg(long, default_value_t = 10)]
    pub unit_cost_ms: u64,

    /// Bytes retained per unit
    #[arg(long, default_value_t = 0)]
    pub unit_bytes: usize,

    /// Force calibrated planning even for kinds with a callback
    #[arg(long)]
    pub no_callback: bool,

    /// Disable memory telemetry
    #[arg(long)]
    pub no_memory: bool,

    /// Number of consecutive fits on the same data
    #[arg(long, default_value_t = 1)]
    pub repeat: usize,
}

/// Verbosity level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    VeryVerbose,
}

impl Args {
    /// Get verbosity level based on flags
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::VeryVerbose,
            }
        }
    }
}

impl Verbosity {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "quiet",
            Verbosity::Normal => "normal",
            Verbosity::Verbose => "verbose",
            Verbosity::VeryVerbose => "very_verbose",
        }
    }

    /// Log level for this verbosity; `None` defers to the config file
    pub fn level_filter(&self) -> Option<LevelFilter> {
        match self {
            Verbosity::Quiet => Some(LevelFilter::Error),
            Verbosity::Normal => None,
            Verbosity::Verbose => Some(LevelFilter::Info),
            Verbosity::VeryVerbose => Some(LevelFilter::Debug),
        }
    }
}
