use super::parse_capture_id;
use crate::output;
use crate::runtime::Runtime;
use crate::ux_error;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use errors::PipelineError;
use pipeline::RunOutcome;
use serde_json::{Value, json};

#[derive(Args)]
pub struct ProcessArgs {
    #[arg(help = "Capture ID")]
    pub capture_id: String,

    #[arg(long, help = "Output as JSON")]
    pub json: bool,
}

pub async fn run(args: ProcessArgs, runtime: Runtime) -> Result<()> {
    let capture_id = parse_capture_id(&args.capture_id)?;
    let outcome = match runtime.coordinator.process(&capture_id).await {
        Ok(outcome) => outcome,
        Err(PipelineError::CaptureNotFound { .. }) => {
            return Err(ux_error::capture_not_found(capture_id.as_str()).into());
        }
        Err(e) => return Err(e.into()),
    };
    // Pattern mining runs detached after the learn stage.
    runtime.shutdown().await;
    print_outcome(&outcome, args.json)
}

pub fn outcome_json(outcome: &RunOutcome) -> Value {
    match outcome {
        RunOutcome::Completed {
            actions,
            succeeded,
            confidence,
            low_confidence,
            summary,
        } => json!({
            "status": "completed",
            "actions": actions,
            "succeeded": succeeded,
            "confidence": confidence,
            "lowConfidence": low_confidence,
            "summary": summary,
        }),
        RunOutcome::AlreadyCompleted => json!({ "status": "already_completed" }),
    }
}

pub fn print_outcome(outcome: &RunOutcome, as_json: bool) -> Result<()> {
    if as_json {
        return output::json(&outcome_json(outcome));
    }
    match outcome {
        RunOutcome::Completed {
            actions,
            succeeded,
            confidence,
            low_confidence,
            summary,
        } => {
            output::success(summary);
            output::field("actions", &format!("{succeeded}/{actions} succeeded"));
            let confidence = format!("{confidence:.2}");
            if *low_confidence {
                println!("  {:<14} {} {}", "confidence:", confidence.yellow(), "(low)".dimmed());
            } else {
                output::field("confidence", &confidence);
            }
        }
        RunOutcome::AlreadyCompleted => {
            output::info("Capture was already processed");
            output::hint("Run `stash status <id>` to see its results");
        }
    }
    Ok(())
}
