use super::parse_owner_id;
use crate::output;
use crate::runtime::Runtime;
use anyhow::Result;
use clap::{Args, Subcommand};
use serde_json::json;
use stash_core::traits::CaptureStore;
use stash_core::types::{Capture, CaptureType};

#[derive(Subcommand)]
pub enum CaptureCommand {
    #[command(about = "Store a new capture")]
    Create(CreateArgs),
}

#[derive(Args)]
pub struct CreateArgs {
    #[arg(help = "URL, text body or media reference")]
    pub content: String,

    #[arg(long, env = "STASH_OWNER", help = "Owner of the capture")]
    pub owner: String,

    #[arg(
        long = "type",
        default_value = "text",
        value_parser = parse_capture_type,
        help = "link, text, image, video, audio, document or other"
    )]
    pub capture_type: CaptureType,

    #[arg(long, help = "Note the user attached to the capture")]
    pub note: Option<String>,

    #[arg(long, help = "Dispatch the capture right away")]
    pub process: bool,

    #[arg(long, help = "Output as JSON")]
    pub json: bool,
}

fn parse_capture_type(raw: &str) -> Result<CaptureType, String> {
    raw.trim()
        .to_lowercase()
        .parse()
        .map_err(|_| format!("unknown capture type '{raw}'"))
}

pub async fn run(cmd: CaptureCommand, runtime: Runtime) -> Result<()> {
    match cmd {
        CaptureCommand::Create(args) => create(args, runtime).await,
    }
}

async fn create(args: CreateArgs, runtime: Runtime) -> Result<()> {
    let owner_id = parse_owner_id(&args.owner)?;
    let mut capture = Capture::new(owner_id.clone(), args.capture_type, args.content);
    if let Some(note) = args.note {
        capture = capture.with_annotation(note);
    }
    runtime.store.insert_capture(&capture).await?;

    let accepted = if args.process {
        Some(runtime.dispatcher().submit(capture.id.clone(), owner_id).await?)
    } else {
        None
    };

    if args.json {
        output::json(&json!({
            "captureId": capture.id,
            "type": capture.capture_type,
            "dispatched": accepted.as_ref().map(|a| a.mode),
        }))?;
    } else {
        output::success(&format!("Capture {} stored", capture.id));
        output::field("type", &capture.capture_type.to_string());
        match &accepted {
            Some(accepted) => output::field("dispatched", accepted.mode),
            None => output::hint(&format!("Run `stash submit {} --owner {}`", capture.id, capture.owner_id.as_str())),
        }
    }

    // In-process runs finish before exit.
    if accepted.as_ref().is_some_and(|a| a.job_id.is_none()) {
        runtime.shutdown().await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_capture_type() {
        assert_eq!(parse_capture_type("Link").unwrap(), CaptureType::Link);
        assert_eq!(parse_capture_type(" video ").unwrap(), CaptureType::Video);
        assert!(parse_capture_type("podcast").is_err());
    }
}
