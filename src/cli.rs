use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::DEFAULT_CONFIG_PATH;
use crate::templates::DEFAULT_CHUNK_SIZE;

/// partsql - Run SQL concurrently on partition databases
#[derive(Parser)]
#[command(name = "partsql")]
#[command(about = "Run maintenance SQL concurrently on partition databases")]
#[command(version)]
pub struct Cli {
    /// Path to the JSON configuration file (databases, partitions, templates)
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Dry-run mode: print the rendered statement and target databases
    /// without prompting or connecting.
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a named SQL template on one or all partition databases
    Run {
        /// SQL template name
        name: String,

        /// Database alias to run on (skips fan-out and confirmation)
        #[arg(short, long)]
        dbname: Option<String>,

        /// Maximum number of records to process per batch
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE, allow_negative_numbers = true)]
        chunk_size: i64,
    },
    /// List registered SQL templates and their run modes
    List,
}

impl Cli {
    pub fn parse_args() -> Self {
        <Self as clap::Parser>::parse()
    }
}
