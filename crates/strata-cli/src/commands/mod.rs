//! CLI command definitions and handlers.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use strata_core::Config;

pub mod query;
pub mod status;
pub mod sync;

/// Strata - cloud inventory graph synchronization
#[derive(Parser)]
#[command(name = "strata")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true, env = "STRATA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a sync against the inventory graph
    Sync(sync::SyncArgs),

    /// Show graph counts and per-module sync recency
    Status,

    /// Execute a raw Cypher query
    Query {
        /// Cypher query string
        query: String,
    },
}

impl Cli {
    fn load_config(&self) -> Result<Config> {
        match &self.config {
            Some(path) => Ok(Config::from_file(path)?),
            None => Ok(Config::default()),
        }
    }

    pub async fn execute(self) -> Result<()> {
        let config = self.load_config()?;

        match self.command {
            Commands::Sync(args) => sync::execute(args, config).await,
            Commands::Status => status::execute(&config).await,
            Commands::Query { query } => query::execute(&config, &query).await,
        }
    }
}
