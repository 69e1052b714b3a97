mod cli;
mod config;
mod table;

use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;
use tracing::info;

use outlier_compute::pipeline::prepare;
use outlier_compute::{Algorithm, AnomalyEngine};
use outlier_core::{EngineConfig, Table};

use crate::cli::CliArgs;

fn main() -> Result<()> {
    // Logs on stderr; stdout carries only the JSON result.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = CliArgs::parse();

    let config = config::load(args.config.as_deref(), args.seed)
        .context("failed to load configuration")?;
    config.log_summary();

    let table = table::load_csv(&args.input, !args.no_index)
        .with_context(|| format!("failed to load dataset: {}", args.input.display()))?;
    info!(
        rows = table.n_rows(),
        columns = table.n_columns(),
        "Loaded {}",
        args.input.display()
    );

    let output = if args.check {
        check(&table, &config)?
    } else {
        let algorithm: Algorithm = args.algorithm.parse()?;
        let report = AnomalyEngine::new(config)
            .detect(&table, algorithm)
            .with_context(|| format!("{} detection failed", algorithm))?;
        serde_json::to_value(&report).context("failed to serialize report")?
    };

    let rendered = if args.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{}", rendered);

    Ok(())
}

/// Validate the dataset the way a detection run would, without fitting.
fn check(table: &Table, config: &EngineConfig) -> Result<serde_json::Value> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let partition = prepare(table, &config.split, &mut rng).context("dataset is not usable")?;
    Ok(json!({
        "message": "Dataset is valid",
        "rows": table.n_rows(),
        "numeric_columns": partition.eval.columns,
        "fit_rows": partition.fit.n_rows(),
        "eval_rows": partition.eval.n_rows(),
    }))
}
