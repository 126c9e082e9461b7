use super::parse_owner_id;
use crate::output;
use crate::runtime::Runtime;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde_json::json;
use stash_core::traits::PatternStore;

#[derive(Args)]
pub struct PatternsArgs {
    #[arg(long, env = "STASH_OWNER", help = "Owner whose patterns to show")]
    pub owner: String,

    #[arg(long, help = "Run a mining pass before showing patterns")]
    pub mine: bool,

    #[arg(long, help = "Output as JSON")]
    pub json: bool,
}

pub async fn run(args: PatternsArgs, runtime: Runtime) -> Result<()> {
    let owner_id = parse_owner_id(&args.owner)?;

    let report = if args.mine {
        Some(runtime.coordinator.learner().mine_patterns(&owner_id).await)
    } else {
        None
    };
    let patterns = runtime.store.list_patterns(&owner_id).await?;

    if args.json {
        return output::json(&json!({
            "ownerId": owner_id,
            "mining": report.as_ref().map(|r| json!({
                "outcomes": r.outcomes,
                "skipped": r.skipped,
                "updated": r.updated,
                "failed": r.failed,
            })),
            "patterns": patterns,
        }));
    }

    if let Some(report) = &report {
        if report.skipped {
            output::info(&format!(
                "Mining skipped: only {} outcome(s) recorded",
                report.outcomes
            ));
        } else {
            output::info(&format!(
                "Mined {} outcome(s): {} updated, {} failed",
                report.outcomes,
                report.updated.len(),
                report.failed.len()
            ));
        }
    }

    output::header(&format!("Patterns for {}", owner_id.as_str()));
    if patterns.is_empty() {
        println!();
        println!("  {}", "(none yet)".dimmed());
        output::hint("Patterns appear once enough captures have been processed");
        return Ok(());
    }
    for pattern in &patterns {
        println!();
        output::subheader(&pattern.pattern_type.to_string());
        output::field("confidence", &format!("{:.2}", pattern.confidence));
        output::field("updated", &pattern.updated_at.to_rfc3339());
        println!("  {}", pattern.data.to_string().dimmed());
    }
    Ok(())
}
