pub mod capture;
pub mod config;
pub mod patterns;
pub mod process;
pub mod queue;
pub mod status;
pub mod submit;
pub mod worker;

use crate::ux_error;
use clap::{Parser, Subcommand};
use stash_core::types::{CaptureId, OwnerId};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "stash",
    author,
    version,
    about = "Stash - autonomous capture processing",
    long_about = "Every saved capture is analyzed, planned, acted on and learned from without \
                  asking the user.\n\nConfiguration comes from defaults, an optional file, \
                  STASH_* environment variables and the flags below, in that order."
)]
pub struct Cli {
    #[arg(long, short, global = true, env = "STASH_CONFIG", help = "Configuration file (TOML or YAML)")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Log level (trace, debug, info, warn, error)")]
    pub log_level: Option<String>,

    #[arg(long, global = true, help = "Emit JSON log lines")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the worker pool and reminder sweeper until interrupted")]
    Worker(worker::WorkerArgs),

    #[command(about = "Dispatch a stored capture for processing")]
    Submit(submit::SubmitArgs),

    #[command(about = "Process a stored capture in the foreground")]
    Process(process::ProcessArgs),

    #[command(subcommand, about = "Create captures")]
    Capture(capture::CaptureCommand),

    #[command(about = "Show a capture's processing status and results")]
    Status(status::StatusArgs),

    #[command(about = "Show or mine learned behavior patterns")]
    Patterns(patterns::PatternsArgs),

    #[command(subcommand, about = "Inspect the job queue")]
    Queue(queue::QueueCommand),

    #[command(subcommand, about = "Inspect the effective configuration")]
    Config(self::config::ConfigCommand),
}

impl Cli {
    /// Flag values layered over environment and file configuration.
    pub fn overrides(&self) -> ::config::Config {
        let mut overrides = ::config::Config::default();
        if let Some(level) = &self.log_level {
            overrides.observability.log_level = level.clone();
        }
        if self.json_logs {
            overrides.observability.json_logs = true;
        }
        overrides
    }
}

pub fn parse_capture_id(raw: &str) -> Result<CaptureId, ux_error::UxError> {
    CaptureId::new(raw.to_string()).ok_or_else(|| ux_error::invalid_id("capture ID", raw))
}

pub fn parse_owner_id(raw: &str) -> Result<OwnerId, ux_error::UxError> {
    OwnerId::new(raw.to_string()).ok_or_else(|| ux_error::invalid_id("owner ID", raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_become_overrides() {
        let cli = Cli::parse_from(["stash", "--log-level", "debug", "--json-logs", "config", "show"]);
        let overrides = cli.overrides();
        assert_eq!(overrides.observability.log_level, "debug");
        assert!(overrides.observability.json_logs);
    }

    #[test]
    fn test_absent_flags_leave_defaults() {
        let cli = Cli::parse_from(["stash", "config", "show"]);
        assert_eq!(cli.overrides(), ::config::Config::default());
    }

    #[test]
    fn test_id_parsing() {
        assert!(parse_capture_id("cap-1").is_ok());
        assert!(parse_capture_id("").is_err());
        assert!(parse_owner_id(&"x".repeat(101)).is_err());
    }
}
