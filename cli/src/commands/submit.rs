use super::{parse_capture_id, parse_owner_id};
use crate::output;
use crate::runtime::Runtime;
use anyhow::Result;
use clap::Args;
use serde_json::json;

#[derive(Args)]
pub struct SubmitArgs {
    #[arg(help = "Capture ID")]
    pub capture_id: String,

    #[arg(long, env = "STASH_OWNER", help = "Owner of the capture")]
    pub owner: String,

    #[arg(long, help = "Output as JSON")]
    pub json: bool,
}

/// In queue mode this returns once the job is enqueued. In-process runs are
/// drained before the process exits.
pub async fn run(args: SubmitArgs, runtime: Runtime) -> Result<()> {
    let capture_id = parse_capture_id(&args.capture_id)?;
    let owner_id = parse_owner_id(&args.owner)?;

    let accepted = runtime.dispatcher().submit(capture_id, owner_id).await?;
    if args.json {
        output::json(&json!({
            "captureId": accepted.capture_id,
            "mode": accepted.mode,
            "jobId": accepted.job_id,
        }))?;
    } else {
        output::success(&format!("Capture {} accepted", accepted.capture_id));
        output::field("mode", accepted.mode);
        if let Some(job_id) = &accepted.job_id {
            output::field("job", job_id);
        }
    }

    if accepted.job_id.is_none() {
        let report = runtime.shutdown().await;
        if !report.drained {
            output::warn("Processing did not finish within the grace period");
        }
    }
    Ok(())
}
