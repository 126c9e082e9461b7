//! # Configuration Precedence
//!
//! Merges configuration from multiple sources with precedence rules.
//!
//! # Precedence Order
//! 1. CLI arguments (highest priority)
//! 2. Environment variables
//! 3. Configuration file
//! 4. Default values (lowest priority)
//!
//! A field from a higher-priority source wins only when it differs from the
//! default, so a source that leaves a field unset never clobbers a lower
//! source that set it.

use crate::config::Config;

macro_rules! merge_field {
    ($changes:ident, $base:expr, $over:expr, $defaults:expr, $section:literal, $field:ident) => {
        if $over.$field != $defaults.$field && $over.$field != $base.$field {
            $changes.push(format!(
                "{}.{} = {:?}",
                $section,
                stringify!($field),
                $over.$field
            ));
            $base.$field.clone_from(&$over.$field);
        }
    };
}

macro_rules! merge_secret {
    ($changes:ident, $base:expr, $over:expr, $section:literal, $field:ident) => {
        if $over.$field.is_some() && $over.$field != $base.$field {
            $changes.push(format!("{}.{} = ***", $section, stringify!($field)));
            $base.$field.clone_from(&$over.$field);
        }
    };
}

/// Merge multiple configuration sources with precedence.
///
/// # M-CANONICAL-DOCS
///
/// ## Usage
/// ```rust,no_run
/// use config::{Config, merge_configs, load_from_file, load_from_env};
/// use std::path::Path;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let from_file = load_from_file(Path::new("stash.toml"))?;
///     let from_env = load_from_env();
///
///     let _config = merge_configs(Config::default(), from_file, "file", from_env, "env", None, "cli");
///     Ok(())
/// }
/// ```
pub fn merge_configs(
    defaults: Config,
    file_config: Config,
    file_source_name: &str,
    env_config: Config,
    env_source_name: &str,
    cli_config: Option<Config>,
    cli_source_name: &str,
) -> Config {
    let mut config = defaults;

    config = merge_with_logging(config, &file_config, file_source_name);
    config = merge_with_logging(config, &env_config, env_source_name);

    if let Some(cli) = cli_config {
        config = merge_with_logging(config, &cli, cli_source_name);
    }

    config
}

fn merge_with_logging(mut base: Config, over: &Config, source_name: &str) -> Config {
    let d = Config::default();
    let mut changes: Vec<String> = Vec::new();

    merge_field!(changes, base.queue, over.queue, d.queue, "queue", mode);
    merge_secret!(changes, base.queue, over.queue, "queue", redis_url);
    merge_field!(changes, base.queue, over.queue, d.queue, "queue", fallback_to_in_process);
    merge_field!(changes, base.queue, over.queue, d.queue, "queue", queue_name);
    merge_field!(changes, base.queue, over.queue, d.queue, "queue", workers);
    merge_field!(changes, base.queue, over.queue, d.queue, "queue", max_attempts);
    merge_field!(changes, base.queue, over.queue, d.queue, "queue", initial_backoff_ms);
    merge_field!(changes, base.queue, over.queue, d.queue, "queue", max_backoff_ms);
    merge_field!(changes, base.queue, over.queue, d.queue, "queue", lock_ttl_seconds);
    merge_field!(changes, base.queue, over.queue, d.queue, "queue", poll_timeout_ms);

    merge_field!(changes, base.llm, over.llm, d.llm, "llm", base_url);
    merge_secret!(changes, base.llm, over.llm, "llm", api_key);
    merge_field!(changes, base.llm, over.llm, d.llm, "llm", model);
    merge_field!(changes, base.llm, over.llm, d.llm, "llm", vision_model);
    merge_field!(changes, base.llm, over.llm, d.llm, "llm", temperature);
    merge_field!(changes, base.llm, over.llm, d.llm, "llm", max_tokens);

    let (b, o, dd) = (&mut base.collaborators, &over.collaborators, &d.collaborators);
    merge_field!(changes, b, o, dd, "collaborators", timeout_ms);
    merge_field!(changes, b, o, dd, "collaborators", reader_endpoint);
    merge_field!(changes, b, o, dd, "collaborators", transcript_endpoint);
    merge_field!(changes, b, o, dd, "collaborators", min_content_length);
    merge_field!(changes, b, o, dd, "collaborators", frame_endpoint);
    merge_field!(changes, b, o, dd, "collaborators", calendar_endpoint);
    merge_secret!(changes, b, o, "collaborators", calendar_token);
    merge_field!(changes, b, o, dd, "collaborators", notifier_webhook);

    let (b, o, dd) = (&mut base.analyzer, &over.analyzer, &d.analyzer);
    merge_field!(changes, b, o, dd, "analyzer", text_prefix_chars);
    merge_field!(changes, b, o, dd, "analyzer", fallback_title_chars);
    merge_field!(changes, b, o, dd, "analyzer", fallback_description_chars);
    merge_field!(changes, b, o, dd, "analyzer", degraded_description_chars);
    merge_field!(changes, b, o, dd, "analyzer", context_snippets);
    merge_field!(changes, b, o, dd, "analyzer", related_limit);
    merge_field!(changes, b, o, dd, "analyzer", video_frames);
    merge_field!(changes, b, o, dd, "analyzer", words_per_minute);

    let (b, o, dd) = (&mut base.planner, &over.planner, &d.planner);
    merge_field!(changes, b, o, dd, "planner", confidence_threshold);
    merge_field!(changes, b, o, dd, "planner", fallback_confidence);
    merge_field!(changes, b, o, dd, "planner", fallback_priority);
    merge_field!(changes, b, o, dd, "planner", max_actions);

    let (b, o, dd) = (&mut base.executor, &over.executor, &d.executor);
    merge_field!(changes, b, o, dd, "executor", summary_max_length);
    merge_field!(changes, b, o, dd, "executor", default_reminder_delay_hours);
    merge_field!(changes, b, o, dd, "executor", action_timeout_ms);
    merge_field!(changes, b, o, dd, "executor", calendar_event_minutes);
    merge_field!(changes, b, o, dd, "executor", collection_match_threshold);

    let (b, o, dd) = (&mut base.learner, &over.learner, &d.learner);
    merge_field!(changes, b, o, dd, "learner", min_samples);
    merge_field!(changes, b, o, dd, "learner", outcome_window);
    merge_field!(changes, b, o, dd, "learner", min_read_events);
    merge_field!(changes, b, o, dd, "learner", high_confidence_samples);

    let (b, o, dd) = (&mut base.reminders, &over.reminders, &d.reminders);
    merge_field!(changes, b, o, dd, "reminders", enabled);
    merge_field!(changes, b, o, dd, "reminders", sweep_interval_seconds);
    merge_field!(changes, b, o, dd, "reminders", batch_size);
    merge_field!(changes, b, o, dd, "reminders", marker_ttl_hours);

    let (b, o, dd) = (&mut base.storage, &over.storage, &d.storage);
    merge_field!(changes, b, o, dd, "storage", backend);
    merge_secret!(changes, b, o, "storage", postgres_url);
    merge_field!(changes, b, o, dd, "storage", pool_size);

    let (b, o, dd) = (&mut base.observability, &over.observability, &d.observability);
    merge_field!(changes, b, o, dd, "observability", log_level);
    merge_field!(changes, b, o, dd, "observability", json_logs);
    merge_field!(changes, b, o, dd, "observability", metrics_enabled);
    merge_field!(changes, b, o, dd, "observability", metrics_port);

    let (b, o, dd) = (&mut base.shutdown, &over.shutdown, &d.shutdown);
    merge_field!(changes, b, o, dd, "shutdown", grace_period_seconds);

    if !changes.is_empty() {
        tracing::info!("Configuration from {}: {:?}", source_name, changes);
    }

    base
}
