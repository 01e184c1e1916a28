//! CLI module for Lookout
//!
//! Command-line interface definitions and handlers for the Lookout job
//! telemetry client.
//!
//! # Commands
//!
//! - `jobs` - List the tracked user's jobs
//! - `watch` - Follow roster changes as they happen
//! - `logs` - Stream a job's log lines
//! - `metrics` - Stream a job's resource metrics
//! - `cancel` - Request cancellation of a job
//! - `config` - Configuration utilities (init)
//! - `completions` - Generate shell completions
//!
//! # Example
//!
//! ```bash
//! # List running jobs as a table
//! lookout jobs --stage running
//!
//! # Follow a job's logs without timestamps
//! lookout logs job-42 --no-timestamps
//!
//! # Generate shell completions
//! lookout completions bash > ~/.bash_completion.d/lookout
//! ```

pub mod cancel;
pub mod completions;
pub mod config;
pub mod jobs;
pub mod logs;
pub mod metrics;
pub mod output;
pub mod watch;

pub use completions::handle_completions;
pub use config::handle_config_init;

use crate::config::LookoutConfig;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

/// Lookout - Job telemetry client
#[derive(Parser, Debug)]
#[command(
    name = "lookout",
    version,
    about = "Live logs, metrics, and roster tracking for remote jobs"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the tracked user's jobs
    Jobs(JobsArgs),
    /// Follow roster changes as they happen
    Watch(WatchArgs),
    /// Stream a job's log lines
    Logs(LogsArgs),
    /// Stream a job's resource metrics
    Metrics(MetricsArgs),
    /// Request cancellation of a job
    Cancel(CancelArgs),
    /// Configuration utilities
    #[command(subcommand)]
    Config(ConfigCommands),
    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args, Debug)]
pub struct JobsArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Filter by stage (pending, queued, running, updating, completed, error)
    #[arg(short, long)]
    pub stage: Option<String>,

    /// Path to configuration file
    #[arg(short, long, default_value = "lookout.toml")]
    pub config: PathBuf,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Override the poll interval in seconds
    #[arg(short, long)]
    pub interval: Option<u64>,

    /// Reprint the full roster table after every change
    #[arg(long)]
    pub table: bool,

    /// Path to configuration file
    #[arg(short, long, default_value = "lookout.toml")]
    pub config: PathBuf,
}

#[derive(Args, Debug)]
pub struct LogsArgs {
    /// Job to stream logs from
    pub job: String,

    /// Print the stored log snapshot instead of following the stream
    #[arg(long)]
    pub snapshot: bool,

    /// Hide server timestamps
    #[arg(long)]
    pub no_timestamps: bool,

    /// Path to configuration file
    #[arg(short, long, default_value = "lookout.toml")]
    pub config: PathBuf,
}

#[derive(Args, Debug)]
pub struct MetricsArgs {
    /// Job to stream metrics from
    pub job: String,

    /// Fetch a single sample instead of following the stream
    #[arg(long)]
    pub snapshot: bool,

    /// Output samples as JSON lines
    #[arg(long)]
    pub json: bool,

    /// Path to configuration file
    #[arg(short, long, default_value = "lookout.toml")]
    pub config: PathBuf,
}

#[derive(Args, Debug)]
pub struct CancelArgs {
    /// Job to cancel
    pub job: String,

    /// Path to configuration file
    #[arg(short, long, default_value = "lookout.toml")]
    pub config: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Initialize a new configuration file
    Init(ConfigInitArgs),
}

#[derive(Args, Debug)]
pub struct ConfigInitArgs {
    /// Output file path
    #[arg(short, long, default_value = "lookout.toml")]
    pub output: PathBuf,

    /// Overwrite existing file
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}

/// Load configuration for a command.
///
/// Reads the file when it exists (defaults otherwise), applies `LOOKOUT_*`
/// environment overrides, and validates the result.
pub fn load_config(path: &Path) -> Result<LookoutConfig, Box<dyn std::error::Error>> {
    let config = if path.exists() {
        LookoutConfig::load(Some(path))?
    } else {
        tracing::debug!("Config file not found, using defaults");
        LookoutConfig::default()
    };

    let config = config.with_env_overrides();
    config.validate()?;
    Ok(config)
}
