use super::parse_capture_id;
use crate::output;
use crate::runtime::Runtime;
use crate::ux_error;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use stash_core::traits::{CaptureStore, ReminderStore, TagStore};
use stash_core::types::{Capture, ProcessingStatus};

#[derive(Args)]
pub struct StatusArgs {
    #[arg(help = "Capture ID")]
    pub capture_id: String,

    #[arg(long, help = "Output as JSON")]
    pub json: bool,

    #[arg(long, help = "Show the reasoning trace and action payloads")]
    pub verbose: bool,
}

pub async fn run(args: StatusArgs, runtime: Runtime) -> Result<()> {
    let capture_id = parse_capture_id(&args.capture_id)?;
    let Some(capture) = runtime.store.get_capture(&capture_id).await? else {
        return Err(ux_error::capture_not_found(capture_id.as_str()).into());
    };
    let tags = runtime.store.capture_tags(&capture_id).await?;
    let reminders = runtime.store.reminders_for_capture(&capture_id).await?;

    if args.json {
        let mut value = serde_json::to_value(&capture)?;
        value["tags"] = serde_json::to_value(tags.iter().map(|t| &t.name).collect::<Vec<_>>())?;
        value["reminders"] = serde_json::to_value(&reminders)?;
        return output::json(&value);
    }

    output::header(&format!("Capture {}", capture.id));
    println!();
    output::field("type", &capture.capture_type.to_string());
    println!("  {:<14} {}", "status:", status_str(capture.processing_status));
    if let Some(error) = capture.metadata.get("last_error").and_then(|e| e.as_str()) {
        println!("  {:<14} {}", "last error:", error.red());
    }
    if let Some(processed_at) = capture.processed_at {
        output::field("processed", &processed_at.to_rfc3339());
    }

    print_analysis(&capture);
    print_results(&capture, args.verbose);

    if !tags.is_empty() {
        println!();
        output::subheader("Tags:");
        let names: Vec<&str> = tags.iter().map(|t| t.name.as_str()).collect();
        println!("  {}", names.join(", ").cyan());
    }
    if !reminders.is_empty() {
        println!();
        output::subheader("Reminders:");
        for reminder in &reminders {
            let state = if reminder.delivered_at.is_some() { "delivered".green() } else { "pending".yellow() };
            println!("  {} {} ({})", reminder.remind_at.to_rfc3339(), reminder.message, state);
        }
    }

    if args.verbose
        && let Some(reasoning) = capture.metadata.get("reasoning").and_then(|r| r.as_array())
    {
        println!();
        output::subheader("Reasoning:");
        for step in reasoning {
            println!(
                "  {:<16} {}",
                step["step"].as_str().unwrap_or_default(),
                step["observation"].as_str().unwrap_or_default().dimmed()
            );
        }
    }
    Ok(())
}

fn print_analysis(capture: &Capture) {
    let Some(analysis) = &capture.analysis else {
        return;
    };
    println!();
    output::subheader("Analysis:");
    output::field("title", &analysis.title);
    if !analysis.topics.is_empty() {
        output::field("topics", &analysis.topics.join(", "));
    }
    output::field("content", &analysis.content_type);
    if analysis.estimated_minutes > 0 {
        output::field("reading time", &format!("{} min", analysis.estimated_minutes));
    }
}

fn print_results(capture: &Capture, verbose: bool) {
    let Some(results) = &capture.action_results else {
        return;
    };
    println!();
    match &capture.action_plan {
        Some(plan) => output::subheader(&format!("Actions (confidence {:.2}):", plan.confidence)),
        None => output::subheader("Actions:"),
    }
    for result in results {
        let mark = if result.success { "✓".green() } else { "✗".red() };
        match (&result.error, verbose, &result.data) {
            (Some(error), _, _) => println!("  {} {} {}", mark, result.action_type, error.dimmed()),
            (None, true, Some(data)) => println!("  {} {} {}", mark, result.action_type, data.to_string().dimmed()),
            _ => println!("  {} {}", mark, result.action_type),
        }
    }
}

fn status_str(status: ProcessingStatus) -> colored::ColoredString {
    match status {
        ProcessingStatus::Completed => "completed".green(),
        ProcessingStatus::Failed => "failed".red(),
        ProcessingStatus::Processing => "processing".yellow(),
        ProcessingStatus::Pending => "pending".normal(),
    }
}
