//! # Environment Variable Loader
//!
//! Loads configuration from `STASH_*` environment variables following
//! 12-factor app principles. Unset or unparsable variables fall back to the
//! field default, so the result can be merged over a file configuration by
//! [`crate::merge_configs`].

use crate::config::{
    AnalyzerConfig, CollaboratorConfig, Config, ExecutorConfig, LearnerConfig, LlmConfig,
    ObservabilityConfig, PlannerConfig, QueueConfig, ReminderConfig, ShutdownConfig,
    StorageConfig,
};
use std::env;

/// Load configuration from environment variables.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Reads every section from `STASH_<SECTION>_<FIELD>` variables.
///
/// ## Usage
/// ```rust,no_run
/// use config::load_from_env;
///
/// let config = load_from_env();
/// println!("Workers: {}", config.queue.workers);
/// ```
///
/// ## Environment Variables
/// ### Queue (`STASH_QUEUE_*`)
/// - `STASH_QUEUE_MODE`: `queue` or `in_process`
/// - `STASH_QUEUE_REDIS_URL`, `STASH_REDIS_URL`: Redis URL
/// - `STASH_QUEUE_FALLBACK_TO_IN_PROCESS`: true/false
/// - `STASH_QUEUE_NAME`, `STASH_QUEUE_WORKERS`, `STASH_QUEUE_MAX_ATTEMPTS`
/// - `STASH_QUEUE_INITIAL_BACKOFF_MS`, `STASH_QUEUE_MAX_BACKOFF_MS`
/// - `STASH_QUEUE_LOCK_TTL_SECONDS`, `STASH_QUEUE_POLL_TIMEOUT_MS`
///
/// ### LLM (`STASH_LLM_*`)
/// - `STASH_LLM_BASE_URL`, `STASH_LLM_API_KEY` (or `OPENAI_API_KEY`)
/// - `STASH_LLM_MODEL`, `STASH_LLM_VISION_MODEL`
/// - `STASH_LLM_TEMPERATURE`, `STASH_LLM_MAX_TOKENS`
///
/// ### Collaborators (`STASH_COLLABORATOR_*`)
/// - `STASH_COLLABORATOR_TIMEOUT_MS`, `STASH_COLLABORATOR_READER_ENDPOINT`
/// - `STASH_COLLABORATOR_TRANSCRIPT_ENDPOINT`,
///   `STASH_COLLABORATOR_MIN_CONTENT_LENGTH`
/// - `STASH_COLLABORATOR_FRAME_ENDPOINT`, `STASH_COLLABORATOR_CALENDAR_ENDPOINT`
/// - `STASH_COLLABORATOR_CALENDAR_TOKEN`, `STASH_COLLABORATOR_NOTIFIER_WEBHOOK`
///
/// ### Stages
/// - `STASH_ANALYZER_*`, `STASH_PLANNER_*`, `STASH_EXECUTOR_*`,
///   `STASH_LEARNER_*`, `STASH_REMINDERS_*`
///
/// ### Storage / Observability / Shutdown
/// - `STASH_STORAGE_BACKEND`, `STASH_DATABASE_URL`, `STASH_STORAGE_POOL_SIZE`
/// - `STASH_LOG_LEVEL`, `STASH_JSON_LOGS`, `STASH_METRICS_ENABLED`,
///   `STASH_METRICS_PORT`
/// - `STASH_SHUTDOWN_GRACE_PERIOD_SECONDS`
pub fn load_from_env() -> Config {
    Config {
        queue: load_queue_from_env(),
        llm: load_llm_from_env(),
        collaborators: load_collaborators_from_env(),
        analyzer: load_analyzer_from_env(),
        planner: load_planner_from_env(),
        executor: load_executor_from_env(),
        learner: load_learner_from_env(),
        reminders: load_reminders_from_env(),
        storage: load_storage_from_env(),
        observability: load_observability_from_env(),
        shutdown: load_shutdown_from_env(),
    }
}

fn load_queue_from_env() -> QueueConfig {
    let defaults = QueueConfig::default();
    QueueConfig {
        mode: parse_env("STASH_QUEUE_MODE").unwrap_or(defaults.mode),
        redis_url: env::var("STASH_QUEUE_REDIS_URL")
            .or_else(|_| env::var("STASH_REDIS_URL"))
            .ok(),
        fallback_to_in_process: parse_env("STASH_QUEUE_FALLBACK_TO_IN_PROCESS")
            .unwrap_or(defaults.fallback_to_in_process),
        queue_name: env::var("STASH_QUEUE_NAME").unwrap_or(defaults.queue_name),
        workers: parse_env("STASH_QUEUE_WORKERS").unwrap_or(defaults.workers),
        max_attempts: parse_env("STASH_QUEUE_MAX_ATTEMPTS").unwrap_or(defaults.max_attempts),
        initial_backoff_ms: parse_env("STASH_QUEUE_INITIAL_BACKOFF_MS")
            .unwrap_or(defaults.initial_backoff_ms),
        max_backoff_ms: parse_env("STASH_QUEUE_MAX_BACKOFF_MS").unwrap_or(defaults.max_backoff_ms),
        lock_ttl_seconds: parse_env("STASH_QUEUE_LOCK_TTL_SECONDS")
            .unwrap_or(defaults.lock_ttl_seconds),
        poll_timeout_ms: parse_env("STASH_QUEUE_POLL_TIMEOUT_MS")
            .unwrap_or(defaults.poll_timeout_ms),
    }
}

fn load_llm_from_env() -> LlmConfig {
    let defaults = LlmConfig::default();
    LlmConfig {
        base_url: env::var("STASH_LLM_BASE_URL").ok(),
        api_key: env::var("STASH_LLM_API_KEY")
            .or_else(|_| env::var("OPENAI_API_KEY"))
            .ok(),
        model: env::var("STASH_LLM_MODEL").unwrap_or(defaults.model),
        vision_model: env::var("STASH_LLM_VISION_MODEL").unwrap_or(defaults.vision_model),
        temperature: parse_env("STASH_LLM_TEMPERATURE").unwrap_or(defaults.temperature),
        max_tokens: parse_env("STASH_LLM_MAX_TOKENS").unwrap_or(defaults.max_tokens),
    }
}

fn load_collaborators_from_env() -> CollaboratorConfig {
    let defaults = CollaboratorConfig::default();
    CollaboratorConfig {
        timeout_ms: parse_env("STASH_COLLABORATOR_TIMEOUT_MS").unwrap_or(defaults.timeout_ms),
        reader_endpoint: env::var("STASH_COLLABORATOR_READER_ENDPOINT")
            .unwrap_or(defaults.reader_endpoint),
        transcript_endpoint: env::var("STASH_COLLABORATOR_TRANSCRIPT_ENDPOINT")
            .unwrap_or(defaults.transcript_endpoint),
        min_content_length: parse_env("STASH_COLLABORATOR_MIN_CONTENT_LENGTH")
            .unwrap_or(defaults.min_content_length),
        frame_endpoint: env::var("STASH_COLLABORATOR_FRAME_ENDPOINT").ok(),
        calendar_endpoint: env::var("STASH_COLLABORATOR_CALENDAR_ENDPOINT").ok(),
        calendar_token: env::var("STASH_COLLABORATOR_CALENDAR_TOKEN").ok(),
        notifier_webhook: env::var("STASH_COLLABORATOR_NOTIFIER_WEBHOOK").ok(),
    }
}

fn load_analyzer_from_env() -> AnalyzerConfig {
    let defaults = AnalyzerConfig::default();
    AnalyzerConfig {
        text_prefix_chars: parse_env("STASH_ANALYZER_TEXT_PREFIX_CHARS")
            .unwrap_or(defaults.text_prefix_chars),
        fallback_title_chars: parse_env("STASH_ANALYZER_FALLBACK_TITLE_CHARS")
            .unwrap_or(defaults.fallback_title_chars),
        fallback_description_chars: parse_env("STASH_ANALYZER_FALLBACK_DESCRIPTION_CHARS")
            .unwrap_or(defaults.fallback_description_chars),
        degraded_description_chars: parse_env("STASH_ANALYZER_DEGRADED_DESCRIPTION_CHARS")
            .unwrap_or(defaults.degraded_description_chars),
        context_snippets: parse_env("STASH_ANALYZER_CONTEXT_SNIPPETS")
            .unwrap_or(defaults.context_snippets),
        related_limit: parse_env("STASH_ANALYZER_RELATED_LIMIT").unwrap_or(defaults.related_limit),
        video_frames: parse_env("STASH_ANALYZER_VIDEO_FRAMES").unwrap_or(defaults.video_frames),
        words_per_minute: parse_env("STASH_ANALYZER_WORDS_PER_MINUTE")
            .unwrap_or(defaults.words_per_minute),
    }
}

fn load_planner_from_env() -> PlannerConfig {
    let defaults = PlannerConfig::default();
    PlannerConfig {
        confidence_threshold: parse_env("STASH_PLANNER_CONFIDENCE_THRESHOLD")
            .unwrap_or(defaults.confidence_threshold),
        fallback_confidence: parse_env("STASH_PLANNER_FALLBACK_CONFIDENCE")
            .unwrap_or(defaults.fallback_confidence),
        fallback_priority: parse_env("STASH_PLANNER_FALLBACK_PRIORITY")
            .unwrap_or(defaults.fallback_priority),
        max_actions: parse_env("STASH_PLANNER_MAX_ACTIONS").unwrap_or(defaults.max_actions),
    }
}

fn load_executor_from_env() -> ExecutorConfig {
    let defaults = ExecutorConfig::default();
    ExecutorConfig {
        summary_max_length: parse_env("STASH_EXECUTOR_SUMMARY_MAX_LENGTH")
            .unwrap_or(defaults.summary_max_length),
        default_reminder_delay_hours: parse_env("STASH_EXECUTOR_DEFAULT_REMINDER_DELAY_HOURS")
            .unwrap_or(defaults.default_reminder_delay_hours),
        action_timeout_ms: parse_env("STASH_EXECUTOR_ACTION_TIMEOUT_MS")
            .unwrap_or(defaults.action_timeout_ms),
        calendar_event_minutes: parse_env("STASH_EXECUTOR_CALENDAR_EVENT_MINUTES")
            .unwrap_or(defaults.calendar_event_minutes),
        collection_match_threshold: parse_env("STASH_EXECUTOR_COLLECTION_MATCH_THRESHOLD")
            .unwrap_or(defaults.collection_match_threshold),
    }
}

fn load_learner_from_env() -> LearnerConfig {
    let defaults = LearnerConfig::default();
    LearnerConfig {
        min_samples: parse_env("STASH_LEARNER_MIN_SAMPLES").unwrap_or(defaults.min_samples),
        outcome_window: parse_env("STASH_LEARNER_OUTCOME_WINDOW")
            .unwrap_or(defaults.outcome_window),
        min_read_events: parse_env("STASH_LEARNER_MIN_READ_EVENTS")
            .unwrap_or(defaults.min_read_events),
        high_confidence_samples: parse_env("STASH_LEARNER_HIGH_CONFIDENCE_SAMPLES")
            .unwrap_or(defaults.high_confidence_samples),
    }
}

fn load_reminders_from_env() -> ReminderConfig {
    let defaults = ReminderConfig::default();
    ReminderConfig {
        enabled: parse_env("STASH_REMINDERS_ENABLED").unwrap_or(defaults.enabled),
        sweep_interval_seconds: parse_env("STASH_REMINDERS_SWEEP_INTERVAL_SECONDS")
            .unwrap_or(defaults.sweep_interval_seconds),
        batch_size: parse_env("STASH_REMINDERS_BATCH_SIZE").unwrap_or(defaults.batch_size),
        marker_ttl_hours: parse_env("STASH_REMINDERS_MARKER_TTL_HOURS")
            .unwrap_or(defaults.marker_ttl_hours),
    }
}

fn load_storage_from_env() -> StorageConfig {
    let defaults = StorageConfig::default();
    StorageConfig {
        backend: parse_env("STASH_STORAGE_BACKEND").unwrap_or(defaults.backend),
        postgres_url: env::var("STASH_DATABASE_URL")
            .or_else(|_| env::var("DATABASE_URL"))
            .ok(),
        pool_size: parse_env("STASH_STORAGE_POOL_SIZE").unwrap_or(defaults.pool_size),
    }
}

fn load_observability_from_env() -> ObservabilityConfig {
    let defaults = ObservabilityConfig::default();
    ObservabilityConfig {
        log_level: env::var("STASH_LOG_LEVEL").unwrap_or(defaults.log_level),
        json_logs: parse_env("STASH_JSON_LOGS").unwrap_or(defaults.json_logs),
        metrics_enabled: parse_env("STASH_METRICS_ENABLED").unwrap_or(defaults.metrics_enabled),
        metrics_port: parse_env("STASH_METRICS_PORT").unwrap_or(defaults.metrics_port),
    }
}

fn load_shutdown_from_env() -> ShutdownConfig {
    let defaults = ShutdownConfig::default();
    ShutdownConfig {
        grace_period_seconds: parse_env("STASH_SHUTDOWN_GRACE_PERIOD_SECONDS")
            .unwrap_or(defaults.grace_period_seconds),
    }
}

fn parse_env<T>(key: &str) -> Result<T, Box<dyn std::error::Error>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(s) => s.trim().parse::<T>().map_err(|e| {
            tracing::warn!(key, value = %s, "Ignoring unparsable environment variable");
            Box::new(e) as Box<dyn std::error::Error>
        }),
        Err(e) => Err(Box::new(e) as Box<dyn std::error::Error>),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{QueueMode, StorageBackendKind};
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_load_queue_from_env() {
        unsafe {
            env::set_var("STASH_QUEUE_MODE", "queue");
            env::set_var("STASH_QUEUE_REDIS_URL", "redis://redis:6379");
            env::set_var("STASH_QUEUE_WORKERS", "12");
            env::set_var("STASH_QUEUE_MAX_ATTEMPTS", "5");
        }

        let queue = load_queue_from_env();

        unsafe {
            env::remove_var("STASH_QUEUE_MODE");
            env::remove_var("STASH_QUEUE_REDIS_URL");
            env::remove_var("STASH_QUEUE_WORKERS");
            env::remove_var("STASH_QUEUE_MAX_ATTEMPTS");
        }

        assert_eq!(queue.mode, QueueMode::Queue);
        assert_eq!(queue.redis_url.as_deref(), Some("redis://redis:6379"));
        assert_eq!(queue.workers, 12);
        assert_eq!(queue.max_attempts, 5);
        assert_eq!(queue.queue_name, "stash:captures");
    }

    #[test]
    #[serial]
    fn test_unparsable_values_fall_back_to_defaults() {
        unsafe {
            env::set_var("STASH_QUEUE_WORKERS", "many");
            env::set_var("STASH_PLANNER_CONFIDENCE_THRESHOLD", "high");
        }

        let config = load_from_env();

        unsafe {
            env::remove_var("STASH_QUEUE_WORKERS");
            env::remove_var("STASH_PLANNER_CONFIDENCE_THRESHOLD");
        }

        assert_eq!(config.queue.workers, 4);
        assert_eq!(config.planner.confidence_threshold, 0.7);
    }

    #[test]
    #[serial]
    fn test_load_storage_and_observability_from_env() {
        unsafe {
            env::set_var("STASH_STORAGE_BACKEND", "postgres");
            env::set_var("STASH_DATABASE_URL", "postgres://stash@db/stash");
            env::set_var("STASH_LOG_LEVEL", "debug");
            env::set_var("STASH_METRICS_ENABLED", "true");
        }

        let storage = load_storage_from_env();
        let observability = load_observability_from_env();

        unsafe {
            env::remove_var("STASH_STORAGE_BACKEND");
            env::remove_var("STASH_DATABASE_URL");
            env::remove_var("STASH_LOG_LEVEL");
            env::remove_var("STASH_METRICS_ENABLED");
        }

        assert_eq!(storage.backend, StorageBackendKind::Postgres);
        assert_eq!(storage.postgres_url.as_deref(), Some("postgres://stash@db/stash"));
        assert_eq!(observability.log_level, "debug");
        assert!(observability.metrics_enabled);
    }
}
