use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;

mod commands;
mod output;
mod runtime;
pub mod ux_error;

use commands::{Cli, Commands};
use runtime::Runtime;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<ux_error::UxError>() {
                Some(ux) => ux.display(),
                None => output::error(&format!("{err:#}")),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = config::load_config(cli.config.as_deref(), Some(cli.overrides()))
        .map_err(|e| ux_error::config_error(&e.to_string()))?;
    runtime::init_tracing(&config.observability);

    let command = match cli.command {
        Commands::Config(cmd) => return commands::config::run(cmd, config),
        command => command,
    };
    runtime::init_metrics(&config.observability)?;
    let runtime = Runtime::build(config).await?;

    match command {
        Commands::Worker(args) => commands::worker::run(args, runtime).await,
        Commands::Submit(args) => commands::submit::run(args, runtime).await,
        Commands::Process(args) => commands::process::run(args, runtime).await,
        Commands::Capture(cmd) => commands::capture::run(cmd, runtime).await,
        Commands::Status(args) => commands::status::run(args, runtime).await,
        Commands::Patterns(args) => commands::patterns::run(args, runtime).await,
        Commands::Queue(cmd) => commands::queue::run(cmd, runtime).await,
        Commands::Config(cmd) => commands::config::run(cmd, runtime.config),
    }
}
