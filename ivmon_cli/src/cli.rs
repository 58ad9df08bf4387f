//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

/// Keeps the non-blocking file appender alive for the process lifetime.
pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "ivmon", version, about = "IV infusion monitor CLI")]
pub struct Cli {
    /// Path to config TOML
    #[arg(long, value_name = "FILE", default_value = "etc/ivmon.toml")]
    pub config: PathBuf,

    /// Path to secrets JSON (WiFi + SMS credentials)
    #[arg(long, value_name = "FILE")]
    pub secrets: Option<PathBuf>,

    /// Log as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); falls back to
    /// the config's logging.level, then "info"
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a deterministic infusion session on simulated time
    Simulate {
        /// Target volume in mL
        #[arg(long, default_value_t = 120)]
        volume_ml: u32,
        /// Prescribed duration in minutes
        #[arg(long, default_value_t = 60)]
        duration_min: u32,
        /// Drip factor in gtt/mL (omit to use the configured default)
        #[arg(long)]
        drip_factor: Option<u32>,
        /// Milliseconds between simulated drops (omit to follow the
        /// prescribed rate exactly)
        #[arg(long, value_name = "MS")]
        drop_interval_ms: Option<u64>,
        /// Simulate without connectivity (local-only mode)
        #[arg(long, action = ArgAction::SetTrue)]
        offline: bool,
        /// Inject a confirmed bubble at this session time
        #[arg(long, value_name = "MS")]
        bubble_at_ms: Option<u64>,
        /// Stop producing drops after this session time (no-flow scenario)
        #[arg(long, value_name = "MS")]
        stall_after_ms: Option<u64>,
        /// Give up after this much simulated time
        #[arg(long, value_name = "S", default_value_t = 7_200)]
        max_sim_s: u64,
    },
    /// Validate the config file and print the effective values
    CheckConfig,
}
