//! Command-line interface
//!
//! `analyze` runs the pipeline over a local file and caches the report;
//! the other commands work on the cache.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Multi-stage investment analysis over videos, audio and images
#[derive(Parser, Debug, Clone)]
#[command(name = "deal-analyzer")]
#[command(about = "Multi-stage investment analysis over videos, audio and images")]
#[command(version)]
pub struct Cli {
    /// Report cache location (overrides DEAL_ANALYZER_DB)
    #[arg(long, global = true, value_name = "PATH")]
    pub database: Option<PathBuf>,

    /// Emit machine-readable stage events on stderr
    #[arg(long, global = true)]
    pub events: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Analyse a video, audio or image file
    Analyze {
        /// Path to the file
        file: PathBuf,

        /// What you want to know about the deal
        #[arg(long, short, default_value = "Should I invest in this opportunity?")]
        query: String,

        /// Progress channel capacity
        #[arg(long, value_name = "N", default_value_t = 16)]
        capacity: usize,
    },

    /// Ask a follow-up question about a cached report
    ///
    /// Without a question, reads questions from stdin until EOF.
    Chat {
        file_id: String,
        question: Option<String>,
    },

    /// List cached reports, newest first
    Reports {
        #[arg(long, default_value_t = 20)]
        limit: usize,

        #[arg(long, default_value_t = 0)]
        offset: usize,
    },

    /// Print a cached report
    Show {
        file_id: String,

        /// Print the stage log instead of the report
        #[arg(long)]
        stages: bool,
    },

    /// Delete a cached report
    Delete { file_id: String },

    /// Delete reports older than the given number of days
    Prune {
        #[arg(long, default_value_t = 30)]
        days: i64,
    },
}

impl Cli {
    pub fn validate(&self) -> Result<()> {
        match &self.command {
            Command::Analyze {
                query, capacity, ..
            } => {
                if query.trim().is_empty() {
                    anyhow::bail!("--query must not be empty");
                }
                if *capacity == 0 {
                    anyhow::bail!("--capacity must be at least 1");
                }
            }
            Command::Prune { days } if *days < 0 => {
                anyhow::bail!("--days must not be negative, got {}", days);
            }
            _ => {}
        }
        Ok(())
    }
}
