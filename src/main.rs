//! budgetfit - Main CLI Entry Point

use anyhow::{Context, Result};
use budgetfit::{
    backend::{BackendKind, SyntheticBackend, SyntheticConfig},
    cli::{Args, Commands, FitArgs},
    config::Config,
    data::{Dataset, Task},
    estimator::Estimator,
    telemetry::{MemoryProbe, SysinfoProbe},
};
use clap::Parser;
use colored::Colorize;
use serde_json::json;
use std::time::Duration;

fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(args.config.clone()).context("Failed to load configuration")?;
    init_logging(&args, &config);

    match &args.command {
        Commands::Fit(fit) => run_fit(fit, &config)?,
        Commands::Probe => show_probe(),
        Commands::Kinds => show_kinds(),
        Commands::Config => show_config(&args, &config)?,
    }

    Ok(())
}

fn init_logging(args: &Args, config: &Config) {
    let level = args
        .verbosity()
        .level_filter()
        .unwrap_or_else(|| config.logging.level_filter());

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn run_fit(fit: &FitArgs, config: &Config) -> Result<()> {
    let backend = SyntheticBackend::for_kind(
        fit.kind,
        SyntheticConfig {
            unit_cost: Duration::from_millis(fit.unit_cost_ms),
            unit_bytes: fit.unit_bytes,
            native_callback: !fit.no_callback,
            ..SyntheticConfig::default()
        },
    );
    let calls = backend.call_log();

    let mut params = budgetfit::backend::Params::new();
    params.insert("n_estimators".into(), json!(fit.units));
    params.insert("n_jobs".into(), json!(num_cpus::get()));

    let probe = if fit.no_memory {
        None
    } else {
        Some(SysinfoProbe::shared())
    };

    let mut estimator = Estimator::new(fit.kind, fit.task, params, Box::new(backend))
        .with_context(|| format!("Cannot build a {} estimator", fit.kind))?
        .with_config(config)
        .with_probe(probe);

    let classes = match fit.task {
        Task::Binary => Some(2),
        Task::Multiclass => Some(3),
        _ => None,
    };
    let data = Dataset::synthetic(fit.rows, fit.cols, classes);

    println!(
        "{} {} on {} rows x {} cols, {} units requested, budget {}",
        "Fitting".bold().cyan(),
        fit.kind.to_string().green(),
        fit.rows,
        fit.cols,
        fit.units,
        fit.budget
            .map(|b| format!("{:.2}s", b))
            .unwrap_or_else(|| "unbounded".to_string())
    );
    println!(
        "  Strategy: {}",
        if estimator.uses_native_callback() {
            "per-unit callback"
        } else {
            "calibrated planning"
        }
    );

    for round in 1..=fit.repeat.max(1) {
        let elapsed = estimator.fit(&data, fit.budget).context("Fit failed")?;
        let units = estimator.trained_units().unwrap_or(0);

        let outcome = if units == 0 {
            "fallback (constant model)".yellow()
        } else if units < fit.units {
            format!("{} of {} units", units, fit.units).yellow()
        } else {
            format!("{} units", units).green()
        };
        println!(
            "  [{}] {:.3}s  {}",
            round,
            elapsed.as_secs_f64(),
            outcome
        );

        if let Some(plan) = estimator.last_plan() {
            if let Some(tpu) = plan.measured_time_per_unit {
                println!("      time/unit: {:.4}s", tpu);
            }
            if let Some(mpu) = plan.measured_mem_per_unit {
                println!("      mem/unit:  {:.0} bytes", mpu);
            }
            if let Some(cap) = plan.unit_cap {
                println!("      cap:       {}", cap);
            }
        }
    }

    let stats = estimator.telemetry().get_stats();
    println!();
    println!("{}", "Summary:".bold());
    println!("  Backend calls:      {:?}", calls.lock().map(|c| c.clone()).unwrap_or_default());
    println!("  Calibration passes: {}", stats.calibration_passes);
    println!("  Cached reuses:      {}", stats.calibrations_reused);
    println!("  Early stops:        {}", stats.early_stops);
    println!("  Fallbacks:          {}", stats.fallbacks);

    Ok(())
}

fn show_probe() {
    let snapshot = SysinfoProbe::new().snapshot();
    let gib = |bytes: u64| bytes as f64 / (1u64 << 30) as f64;

    println!("{}", "Memory:".bold().cyan());
    println!("  Total:       {:.2} GiB", gib(snapshot.total));
    println!(
        "  Available:   {:.2} GiB ({:.0}%)",
        gib(snapshot.available),
        snapshot.available_fraction() * 100.0
    );
    println!("  Process RSS: {:.1} MiB", snapshot.process_rss as f64 / (1u64 << 20) as f64);
    println!("  CPUs:        {}", num_cpus::get());
}

fn show_kinds() {
    println!(
        "{}",
        format!(
            "{:<18} {:<10} {:<14} {:<16} {:>8}",
            "KIND", "CALLBACK", "UNITS", "CONVENTION", "COST"
        )
        .bold()
    );
    for kind in BackendKind::all() {
        let caps = kind.capabilities();
        println!(
            "{:<18} {:<10} {:<14} {:<16} {:>8.1}",
            kind.to_string(),
            if caps.native_abort_callback { "yes" } else { "no" },
            caps.iteration_param.unwrap_or("-"),
            kind.callback_convention()
                .map(|c| format!("{:?}", c))
                .unwrap_or_else(|| "-".to_string()),
            kind.cost_relative_to_lgbm()
        );
    }
}

fn show_config(args: &Args, config: &Config) -> Result<()> {
    println!("{}", "budgetfit Configuration".bold().cyan());
    match &args.config {
        Some(path) => println!("  Source: {}", path.display()),
        None => match Config::default_path() {
            Some(path) if path.exists() => println!("  Source: {}", path.display()),
            _ => println!("  Source: built-in defaults"),
        },
    }
    println!("  Verbosity: {}", args.verbosity().as_str());
    println!();
    print!("{}", config.to_toml().context("Failed to render configuration")?);

    Ok(())
}
