//! CLI parse: clap types for mirror. No behavior; definitions only.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Mirror CLI - record a directory tree and verify it later
#[derive(Parser, Debug)]
#[command(name = "mirror")]
#[command(about = "Record file metadata of a directory tree and verify the tree against it")]
#[command(disable_version_flag = true)]
#[command(
    after_help = "Content digests are BLAKE3 truncated to 128 bits (blake3-128). They cannot be compared with md5sum output."
)]
pub struct Cli {
    /// Tool to run
    #[arg(long, value_enum)]
    pub tool: Option<Tool>,

    /// Metadata store location
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// SOURCE [DEST]
    #[arg(value_name = "PATH")]
    pub paths: Vec<PathBuf>,

    /// Print version information and exit
    #[arg(short = 'v', long = "version")]
    pub version: bool,

    /// Configuration file path (layered over the global config file)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (debug level)
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stderr, stdout, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Verification report format
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub report_format: ReportFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Tool {
    /// Record a snapshot of SOURCE into the store
    CreateDb,
    /// Compare SOURCE against the recorded snapshot
    VerifyDir,
    /// Reconcile SOURCE into DEST (not supported)
    MergeDir,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Text,
    Json,
}
