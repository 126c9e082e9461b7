use crate::output;
use crate::runtime::Runtime;
use crate::ux_error;
use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;
use serde_json::json;
use stash_core::traits::JobQueue;

#[derive(Subcommand)]
pub enum QueueCommand {
    #[command(about = "Count ready and delayed jobs")]
    Depth(QueueArgs),

    #[command(about = "List dead-lettered jobs")]
    DeadLetters(DeadLetterArgs),
}

#[derive(Args)]
pub struct QueueArgs {
    #[arg(long, help = "Output as JSON")]
    pub json: bool,
}

#[derive(Args)]
pub struct DeadLetterArgs {
    #[arg(long, default_value_t = 20, help = "Maximum entries to show")]
    pub limit: usize,

    #[arg(long, help = "Output as JSON")]
    pub json: bool,
}

pub async fn run(cmd: QueueCommand, runtime: Runtime) -> Result<()> {
    let Some(queue) = &runtime.queue else {
        return Err(ux_error::queue_required("queue").into());
    };
    match cmd {
        QueueCommand::Depth(args) => {
            let depth = queue.depth().await?;
            if args.json {
                output::json(&json!({ "queue": runtime.config.queue.queue_name, "depth": depth }))?;
            } else {
                output::field(&runtime.config.queue.queue_name, &depth.to_string());
            }
        }
        QueueCommand::DeadLetters(args) => {
            let letters = queue.dead_letters(args.limit).await?;
            if args.json {
                output::json(&serde_json::to_value(&letters)?)?;
                return Ok(());
            }
            output::header("Dead letters");
            if letters.is_empty() {
                println!("  {}", "(none)".dimmed());
            }
            for letter in &letters {
                println!(
                    "  {} {} attempt {} {}",
                    letter.failed_at.to_rfc3339().dimmed(),
                    letter.job.capture_id,
                    letter.job.attempt,
                    letter.reason.red()
                );
            }
        }
    }
    Ok(())
}
