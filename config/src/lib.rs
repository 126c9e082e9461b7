//! # Stash configuration
//!
//! One `Config` with a section per pipeline component. `load_config`
//! resolves it from defaults, an optional TOML/YAML file, `STASH_*`
//! environment variables and CLI overrides, in that order, and validates
//! the result.

pub mod config;
pub mod file_loader;
pub mod loader;
pub mod precedence;
pub mod resolve;

pub use config::{
    AnalyzerConfig, CollaboratorConfig, Config, DEFAULT_CONFIDENCE_THRESHOLD,
    DEFAULT_FALLBACK_CONFIDENCE, ExecutorConfig, LearnerConfig, LlmConfig, ObservabilityConfig,
    PlannerConfig, QueueConfig, QueueMode, ReminderConfig, ShutdownConfig, StorageBackendKind,
    StorageConfig,
};
pub use file_loader::{ConfigFileError, ConfigFormat, load_from_file, load_from_toml, load_from_yaml};
pub use loader::load_from_env;
pub use precedence::merge_configs;
pub use resolve::{ConfigError, load_config};
pub use validator::Validate;
