//! Command-line interface definitions using clap derive API.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Curriculum advisor CLI
#[derive(Parser)]
#[command(name = "advisor-cli")]
#[command(about = "Learn and recommend multi-semester course plans")]
#[command(version)]
pub struct Cli {
    /// Extra settings file layered over the defaults
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train a Q-table for a student and save it
    Train {
        /// Course catalog (JSON or TOML)
        #[arg(long)]
        catalog: PathBuf,
        /// Student scenario (profile and priorities, JSON or TOML)
        #[arg(long)]
        student: PathBuf,
        /// Override the number of training episodes
        #[arg(long)]
        episodes: Option<usize>,
        /// Where to write the Q-table; defaults to persistence.q_table_path
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Replay a saved Q-table into a semester plan
    Recommend {
        #[arg(long)]
        catalog: PathBuf,
        #[arg(long)]
        student: PathBuf,
        /// Q-table to replay; defaults to persistence.q_table_path
        #[arg(long)]
        q_table: Option<PathBuf>,
        /// Write the recommendation JSON here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Summarize a catalog and, optionally, a saved Q-table
    Inspect {
        #[arg(long)]
        catalog: PathBuf,
        #[arg(long)]
        q_table: Option<PathBuf>,
    },
}
