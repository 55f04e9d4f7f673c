//! Main entry point for the curriculum advisor CLI.

use anyhow::{Context, Result};
use clap::Parser;
use curriculum_advisor::{cli, scenario, settings::Settings, telemetry};
use serde::Serialize;
use std::path::Path;

fn main() -> Result<()> {
    // Parse command line arguments
    let args = cli::Cli::parse();

    // Load settings
    let settings = Settings::load_with(args.config.as_deref())?;

    // Initialize telemetry
    telemetry::init(&settings.logging)?;

    // Execute the requested command
    match args.command {
        cli::Commands::Train {
            catalog,
            student,
            episodes,
            output,
        } => {
            let outcome = scenario::run_training(&catalog, &student, &settings, episodes, output.as_deref())?;
            emit(&outcome, None)
        }
        cli::Commands::Recommend {
            catalog,
            student,
            q_table,
            output,
        } => {
            let recommendation = scenario::run_recommendation(&catalog, &student, q_table.as_deref(), &settings)?;
            emit(&recommendation, output.as_deref())
        }
        cli::Commands::Inspect { catalog, q_table } => {
            let report = scenario::inspect(&catalog, q_table.as_deref())?;
            emit(&report, None)
        }
    }
}

fn emit<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("Failed to write output: {:?}", path))?;
            tracing::info!(path = ?path, "Output written");
        }
        None => println!("{}", json),
    }
    Ok(())
}
