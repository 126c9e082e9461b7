//! # Configuration Structures
//!
//! This module defines all configuration structures for the Stash capture
//! pipeline.
//!
//! All configuration structures:
//! - Use `serde` for serialization/deserialization
//! - Use `validator` for input validation
//! - Fill every missing field from a `default_*` function

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use validator::{Validate, ValidationError};

/// Planner acceptance threshold. Plans scoring below it are flagged as low
/// confidence; the deterministic fallback plan always scores below it.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.7;

/// Confidence assigned to the deterministic fallback plan.
pub const DEFAULT_FALLBACK_CONFIDENCE: f32 = 0.5;

/// Main configuration structure for the capture pipeline.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Aggregates the configuration of every pipeline component: dispatch and
/// queueing, the LLM and other collaborators, the four pipeline stages,
/// storage, observability and shutdown.
///
/// ## Usage
/// ```rust,no_run
/// use config::Config;
///
/// let config = Config::default();
/// println!("Workers: {}", config.queue.workers);
/// ```
///
/// ## Validation
/// Every nested section validates itself. Cross-section rules (queue mode
/// needs a Redis URL, postgres backend needs a database URL, the fallback
/// confidence must stay below the threshold) run at this level.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default, PartialEq)]
#[validate(schema(function = "validate_cross_section"))]
pub struct Config {
    #[serde(default)]
    #[validate(nested)]
    pub queue: QueueConfig,

    #[serde(default)]
    #[validate(nested)]
    pub llm: LlmConfig,

    #[serde(default)]
    #[validate(nested)]
    pub collaborators: CollaboratorConfig,

    #[serde(default)]
    #[validate(nested)]
    pub analyzer: AnalyzerConfig,

    #[serde(default)]
    #[validate(nested)]
    pub planner: PlannerConfig,

    #[serde(default)]
    #[validate(nested)]
    pub executor: ExecutorConfig,

    #[serde(default)]
    #[validate(nested)]
    pub learner: LearnerConfig,

    #[serde(default)]
    #[validate(nested)]
    pub reminders: ReminderConfig,

    #[serde(default)]
    #[validate(nested)]
    pub storage: StorageConfig,

    #[serde(default)]
    #[validate(nested)]
    pub observability: ObservabilityConfig,

    #[serde(default)]
    #[validate(nested)]
    pub shutdown: ShutdownConfig,
}

fn validate_cross_section(config: &Config) -> Result<(), ValidationError> {
    if config.queue.mode == QueueMode::Queue && config.queue.redis_url.is_none() {
        return Err(ValidationError::new("queue_mode_requires_redis_url"));
    }
    if config.storage.backend == StorageBackendKind::Postgres
        && config.storage.postgres_url.is_none()
    {
        return Err(ValidationError::new("postgres_backend_requires_url"));
    }
    if config.planner.fallback_confidence >= config.planner.confidence_threshold {
        return Err(ValidationError::new(
            "fallback_confidence_must_be_below_threshold",
        ));
    }
    Ok(())
}

/// How the dispatcher hands captures to the coordinator.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum QueueMode {
    /// Durable Redis queue drained by the worker pool.
    Queue,
    /// Supervised in-process task per capture.
    #[default]
    InProcess,
}

/// Queue and worker pool configuration.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Selects the dispatch mode and tunes the Redis-backed job queue.
///
/// ## Fields
/// - `mode`: `queue` or `in_process` (default: `in_process`)
/// - `redis_url`: Redis connection URL, required in queue mode
/// - `fallback_to_in_process`: use in-process dispatch when Redis is
///   unreachable at startup (default: true)
/// - `queue_name`: key prefix for the ready, processing, delayed and dead
///   letter keys (default: "stash:captures")
/// - `workers`: worker pool size (default: 4, range 1-64)
/// - `max_attempts`: attempts per job before dead-lettering (default: 3)
/// - `initial_backoff_ms` / `max_backoff_ms`: exponential retry backoff
/// - `lock_ttl_seconds`: per-capture execution lock TTL (default: 900)
/// - `poll_timeout_ms`: how long an idle worker waits per poll (default: 1000)
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct QueueConfig {
    #[serde(default)]
    pub mode: QueueMode,

    #[serde(default)]
    #[validate(length(min = 1, max = 2048))]
    pub redis_url: Option<String>,

    #[serde(default = "default_true")]
    pub fallback_to_in_process: bool,

    #[serde(default = "default_queue_name")]
    #[validate(length(min = 1, max = 200))]
    pub queue_name: String,

    #[serde(default = "default_workers")]
    #[validate(range(min = 1, max = 64))]
    pub workers: usize,

    #[serde(default = "default_max_attempts")]
    #[validate(range(min = 1, max = 20))]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff_ms")]
    #[validate(range(min = 10, max = 600_000))]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    #[validate(range(min = 10, max = 3_600_000))]
    pub max_backoff_ms: u64,

    #[serde(default = "default_lock_ttl_seconds")]
    #[validate(range(min = 10, max = 86_400))]
    pub lock_ttl_seconds: u64,

    #[serde(default = "default_poll_timeout_ms")]
    #[validate(range(min = 10, max = 60_000))]
    pub poll_timeout_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_queue_name() -> String {
    "stash:captures".to_string()
}

fn default_workers() -> usize {
    4
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    1_000
}

fn default_max_backoff_ms() -> u64 {
    60_000
}

fn default_lock_ttl_seconds() -> u64 {
    900
}

fn default_poll_timeout_ms() -> u64 {
    1_000
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            mode: QueueMode::default(),
            redis_url: None,
            fallback_to_in_process: default_true(),
            queue_name: default_queue_name(),
            workers: default_workers(),
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            lock_ttl_seconds: default_lock_ttl_seconds(),
            poll_timeout_ms: default_poll_timeout_ms(),
        }
    }
}

/// LLM provider configuration.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Configures the OpenAI-compatible chat completion endpoint used for text
/// extraction, intent classification, planning and summarization, plus the
/// vision model used for images and video frames.
///
/// ## Fields
/// - `base_url`: API base URL (default: provider default)
/// - `api_key`: API key; without it the LLM is treated as unavailable
/// - `model`: chat model (default: "gpt-4o-mini")
/// - `vision_model`: vision model (default: "gpt-4o-mini")
/// - `temperature`: sampling temperature (default: 0.3, range 0.0-2.0)
/// - `max_tokens`: completion cap (default: 1024)
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct LlmConfig {
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_llm_model")]
    #[validate(length(min = 1, max = 200))]
    pub model: String,

    #[serde(default = "default_llm_model")]
    #[validate(length(min = 1, max = 200))]
    pub vision_model: String,

    #[serde(default = "default_temperature")]
    #[validate(range(min = 0.0, max = 2.0))]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    #[validate(range(min = 16, max = 32_768))]
    pub max_tokens: u32,
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_tokens() -> u32 {
    1024
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            model: default_llm_model(),
            vision_model: default_llm_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// External collaborator endpoints.
///
/// # M-CANONICAL-DOCS
///
/// ## Fields
/// - `timeout_ms`: per-call timeout applied to every collaborator call
///   (default: 30000)
/// - `reader_endpoint`: reader service prefixed to article URLs
/// - `transcript_endpoint`: timed-text endpoint for video transcripts
/// - `min_content_length`: extracted text shorter than this is a failure
///   (default: 100)
/// - `frame_endpoint`: frame sampling service for stored videos
/// - `calendar_endpoint` / `calendar_token`: calendar API
/// - `notifier_webhook`: notification delivery webhook
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct CollaboratorConfig {
    #[serde(default = "default_collaborator_timeout_ms")]
    #[validate(range(min = 100, max = 600_000))]
    pub timeout_ms: u64,

    #[serde(default = "default_reader_endpoint")]
    #[validate(length(min = 1))]
    pub reader_endpoint: String,

    #[serde(default = "default_transcript_endpoint")]
    #[validate(length(min = 1))]
    pub transcript_endpoint: String,

    #[serde(default = "default_min_content_length")]
    #[validate(range(min = 1, max = 100_000))]
    pub min_content_length: usize,

    #[serde(default)]
    pub frame_endpoint: Option<String>,

    #[serde(default)]
    pub calendar_endpoint: Option<String>,

    #[serde(default)]
    pub calendar_token: Option<String>,

    #[serde(default)]
    pub notifier_webhook: Option<String>,
}

fn default_collaborator_timeout_ms() -> u64 {
    30_000
}

fn default_reader_endpoint() -> String {
    "https://r.jina.ai/".to_string()
}

fn default_transcript_endpoint() -> String {
    "https://www.youtube.com/api/timedtext".to_string()
}

fn default_min_content_length() -> usize {
    100
}

impl Default for CollaboratorConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_collaborator_timeout_ms(),
            reader_endpoint: default_reader_endpoint(),
            transcript_endpoint: default_transcript_endpoint(),
            min_content_length: default_min_content_length(),
            frame_endpoint: None,
            calendar_endpoint: None,
            calendar_token: None,
            notifier_webhook: None,
        }
    }
}

/// Analyzer limits.
///
/// ## Fields
/// - `text_prefix_chars`: prefix of text captures sent to the LLM
/// - `fallback_title_chars` / `fallback_description_chars`: raw content
///   slices used by the minimal fallback analysis
/// - `degraded_description_chars`: description length of degraded media
///   analyses
/// - `context_snippets`: semantic memory hits summarized into context
/// - `related_limit`: related captures returned (default: 5)
/// - `video_frames`: frames sampled per video (default: 4)
/// - `words_per_minute`: reading speed for the consumption estimate
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct AnalyzerConfig {
    #[serde(default = "default_text_prefix_chars")]
    #[validate(range(min = 100, max = 200_000))]
    pub text_prefix_chars: usize,

    #[serde(default = "default_fallback_title_chars")]
    #[validate(range(min = 10, max = 1_000))]
    pub fallback_title_chars: usize,

    #[serde(default = "default_fallback_description_chars")]
    #[validate(range(min = 10, max = 10_000))]
    pub fallback_description_chars: usize,

    #[serde(default = "default_degraded_description_chars")]
    #[validate(range(min = 10, max = 10_000))]
    pub degraded_description_chars: usize,

    #[serde(default = "default_context_snippets")]
    #[validate(range(min = 0, max = 20))]
    pub context_snippets: usize,

    #[serde(default = "default_related_limit")]
    #[validate(range(min = 0, max = 50))]
    pub related_limit: usize,

    #[serde(default = "default_video_frames")]
    #[validate(range(min = 1, max = 16))]
    pub video_frames: usize,

    #[serde(default = "default_words_per_minute")]
    #[validate(range(min = 50, max = 1_000))]
    pub words_per_minute: u32,
}

fn default_text_prefix_chars() -> usize {
    4_000
}

fn default_fallback_title_chars() -> usize {
    100
}

fn default_fallback_description_chars() -> usize {
    500
}

fn default_degraded_description_chars() -> usize {
    200
}

fn default_context_snippets() -> usize {
    3
}

fn default_related_limit() -> usize {
    5
}

fn default_video_frames() -> usize {
    4
}

fn default_words_per_minute() -> u32 {
    200
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            text_prefix_chars: default_text_prefix_chars(),
            fallback_title_chars: default_fallback_title_chars(),
            fallback_description_chars: default_fallback_description_chars(),
            degraded_description_chars: default_degraded_description_chars(),
            context_snippets: default_context_snippets(),
            related_limit: default_related_limit(),
            video_frames: default_video_frames(),
            words_per_minute: default_words_per_minute(),
        }
    }
}

/// Planner configuration.
///
/// ## Fields
/// - `confidence_threshold`: acceptance threshold (default:
///   [`DEFAULT_CONFIDENCE_THRESHOLD`])
/// - `fallback_confidence`: confidence of the fallback plan, must stay
///   below the threshold (default: [`DEFAULT_FALLBACK_CONFIDENCE`])
/// - `fallback_priority`: priority of the fallback `add_tag` action
/// - `max_actions`: plans longer than this are truncated
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct PlannerConfig {
    #[serde(default = "default_confidence_threshold")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub confidence_threshold: f32,

    #[serde(default = "default_fallback_confidence")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub fallback_confidence: f32,

    #[serde(default = "default_fallback_priority")]
    pub fallback_priority: i32,

    #[serde(default = "default_max_actions")]
    #[validate(range(min = 1, max = 32))]
    pub max_actions: usize,
}

fn default_confidence_threshold() -> f32 {
    DEFAULT_CONFIDENCE_THRESHOLD
}

fn default_fallback_confidence() -> f32 {
    DEFAULT_FALLBACK_CONFIDENCE
}

fn default_fallback_priority() -> i32 {
    1
}

fn default_max_actions() -> usize {
    8
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            fallback_confidence: default_fallback_confidence(),
            fallback_priority: default_fallback_priority(),
            max_actions: default_max_actions(),
        }
    }
}

/// Executor configuration.
///
/// ## Fields
/// - `summary_max_length`: cap on generated summaries (default: 500)
/// - `default_reminder_delay_hours`: used when a reminder action carries no
///   timestamp (default: 24)
/// - `action_timeout_ms`: per-action deadline (default: 30000)
/// - `calendar_event_minutes`: default event length (default: 60)
/// - `collection_match_threshold`: keyword overlap at which a requested
///   collection name reuses an existing collection (default: 0.5)
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct ExecutorConfig {
    #[serde(default = "default_summary_max_length")]
    #[validate(range(min = 50, max = 10_000))]
    pub summary_max_length: usize,

    #[serde(default = "default_reminder_delay_hours")]
    #[validate(range(min = 1, max = 8_760))]
    pub default_reminder_delay_hours: i64,

    #[serde(default = "default_action_timeout_ms")]
    #[validate(range(min = 100, max = 600_000))]
    pub action_timeout_ms: u64,

    #[serde(default = "default_calendar_event_minutes")]
    #[validate(range(min = 5, max = 1_440))]
    pub calendar_event_minutes: i64,

    #[serde(default = "default_collection_match_threshold")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub collection_match_threshold: f32,
}

fn default_summary_max_length() -> usize {
    500
}

fn default_reminder_delay_hours() -> i64 {
    24
}

fn default_action_timeout_ms() -> u64 {
    30_000
}

fn default_calendar_event_minutes() -> i64 {
    60
}

fn default_collection_match_threshold() -> f32 {
    0.5
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            summary_max_length: default_summary_max_length(),
            default_reminder_delay_hours: default_reminder_delay_hours(),
            action_timeout_ms: default_action_timeout_ms(),
            calendar_event_minutes: default_calendar_event_minutes(),
            collection_match_threshold: default_collection_match_threshold(),
        }
    }
}

/// Learner configuration.
///
/// ## Fields
/// - `min_samples`: outcomes needed before mining runs (default: 5)
/// - `outcome_window`: recent outcomes and captures inspected (default: 100)
/// - `min_read_events`: read notifications needed for the timing pattern
///   (default: 5)
/// - `high_confidence_samples`: sample count that earns high confidence
///   (default: 20)
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct LearnerConfig {
    #[serde(default = "default_min_samples")]
    #[validate(range(min = 1, max = 1_000))]
    pub min_samples: usize,

    #[serde(default = "default_outcome_window")]
    #[validate(range(min = 1, max = 10_000))]
    pub outcome_window: usize,

    #[serde(default = "default_min_samples")]
    #[validate(range(min = 1, max = 1_000))]
    pub min_read_events: usize,

    #[serde(default = "default_high_confidence_samples")]
    #[validate(range(min = 1, max = 10_000))]
    pub high_confidence_samples: usize,
}

fn default_min_samples() -> usize {
    5
}

fn default_outcome_window() -> usize {
    100
}

fn default_high_confidence_samples() -> usize {
    20
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            min_samples: default_min_samples(),
            outcome_window: default_outcome_window(),
            min_read_events: default_min_samples(),
            high_confidence_samples: default_high_confidence_samples(),
        }
    }
}

/// Reminder sweeper configuration.
///
/// ## Fields
/// - `enabled`: run the sweeper in the worker process (default: true)
/// - `sweep_interval_seconds`: period between sweeps (default: 60)
/// - `batch_size`: due reminders handled per sweep (default: 50)
/// - `marker_ttl_hours`: lifetime of delivery markers (default: 720)
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct ReminderConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_sweep_interval_seconds")]
    #[validate(range(min = 1, max = 86_400))]
    pub sweep_interval_seconds: u64,

    #[serde(default = "default_sweep_batch_size")]
    #[validate(range(min = 1, max = 10_000))]
    pub batch_size: usize,

    #[serde(default = "default_marker_ttl_hours")]
    #[validate(range(min = 1, max = 87_600))]
    pub marker_ttl_hours: u64,
}

fn default_sweep_interval_seconds() -> u64 {
    60
}

fn default_sweep_batch_size() -> usize {
    50
}

fn default_marker_ttl_hours() -> u64 {
    720
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            sweep_interval_seconds: default_sweep_interval_seconds(),
            batch_size: default_sweep_batch_size(),
            marker_ttl_hours: default_marker_ttl_hours(),
        }
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StorageBackendKind {
    #[default]
    Memory,
    Postgres,
}

/// Storage configuration.
///
/// ## Fields
/// - `backend`: `memory` or `postgres` (default: `memory`)
/// - `postgres_url`: connection URL, required for `postgres`
/// - `pool_size`: connection pool size (default: 10, range 1-100)
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackendKind,

    #[serde(default)]
    #[validate(length(min = 1, max = 2048))]
    pub postgres_url: Option<String>,

    #[serde(default = "default_pool_size")]
    #[validate(range(min = 1, max = 100))]
    pub pool_size: u32,
}

fn default_pool_size() -> u32 {
    10
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackendKind::default(),
            postgres_url: None,
            pool_size: default_pool_size(),
        }
    }
}

/// Observability configuration.
///
/// ## Fields
/// - `log_level`: default `EnvFilter` directive when `RUST_LOG` is unset
///   (default: "info")
/// - `json_logs`: emit JSON log lines (default: false)
/// - `metrics_enabled`: install the Prometheus exporter (default: false)
/// - `metrics_port`: exporter port (default: 9090)
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    #[validate(custom(function = "validate_log_level"))]
    pub log_level: String,

    #[serde(default)]
    pub json_logs: bool,

    #[serde(default)]
    pub metrics_enabled: bool,

    #[serde(default = "default_metrics_port")]
    #[validate(range(min = 1, max = 65535))]
    pub metrics_port: u16,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    match level {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ValidationError::new("invalid_log_level")),
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            metrics_enabled: false,
            metrics_port: default_metrics_port(),
        }
    }
}

/// Shutdown configuration.
///
/// ## Fields
/// - `grace_period_seconds`: deadline for draining supervised tasks and
///   in-flight jobs (default: 30)
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct ShutdownConfig {
    #[serde(default = "default_grace_period_seconds")]
    #[validate(range(min = 1, max = 3_600))]
    pub grace_period_seconds: u64,
}

fn default_grace_period_seconds() -> u64 {
    30
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            grace_period_seconds: default_grace_period_seconds(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.queue.mode, QueueMode::InProcess);
        assert_eq!(config.planner.confidence_threshold, 0.7);
        assert_eq!(config.learner.min_samples, 5);
        assert_eq!(config.analyzer.related_limit, 5);
    }

    #[test]
    fn test_queue_mode_requires_redis_url() {
        let mut config = Config::default();
        config.queue.mode = QueueMode::Queue;
        assert!(config.validate().is_err());

        config.queue.redis_url = Some("redis://localhost:6379".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_postgres_backend_requires_url() {
        let mut config = Config::default();
        config.storage.backend = StorageBackendKind::Postgres;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_fallback_confidence_must_stay_below_threshold() {
        let mut config = Config::default();
        config.planner.fallback_confidence = 0.9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_ranges_rejected() {
        let mut config = Config::default();
        config.queue.workers = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.observability.log_level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [queue]
            workers = 8

            [planner]
            confidence_threshold = 0.8
            "#,
        )
        .unwrap();
        assert_eq!(config.queue.workers, 8);
        assert_eq!(config.queue.max_attempts, 3);
        assert_eq!(config.planner.confidence_threshold, 0.8);
        assert_eq!(config.planner.fallback_confidence, DEFAULT_FALLBACK_CONFIDENCE);
    }
}
