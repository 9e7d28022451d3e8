//! CLI parse: clap types for numctx. No behavior; definitions only.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// numctx - run blocks against numeric contexts and inspect snapshots
#[derive(Parser)]
#[command(name = "numctx")]
#[command(about = "Reactive numeric contexts, filtered views and block execution")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory (where numctx.toml is looked up)
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Execute a block file and print the resulting context
    Run {
        /// Block source file
        block: PathBuf,
        /// Start from the contents of this snapshot
        #[arg(long)]
        snapshot: Option<PathBuf>,
        /// Write the resulting context to this snapshot file
        #[arg(long)]
        save: Option<PathBuf>,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Show the inputs and outputs of a block, or a restricted sub-block
    Inspect {
        /// Block source file
        block: PathBuf,
        /// Keep statements affected by these names
        #[arg(long, value_delimiter = ',')]
        inputs: Vec<String>,
        /// Keep statements needed to produce these names
        #[arg(long, value_delimiter = ',')]
        outputs: Vec<String>,
    },
    /// Print the contents of a snapshot file
    Show {
        /// Snapshot file
        snapshot: PathBuf,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}
