//! # Configuration Resolution
//!
//! Builds the effective configuration: defaults, then an optional file,
//! then `STASH_*` environment, then CLI overrides, then validation.

use crate::config::Config;
use crate::file_loader::{ConfigFileError, load_from_file};
use crate::loader::load_from_env;
use crate::precedence::merge_configs;
use std::path::Path;
use validator::Validate;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    File(#[from] ConfigFileError),

    #[error("Invalid configuration: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Resolve and validate the effective configuration.
///
/// # M-CANONICAL-DOCS
///
/// ## Usage
/// ```rust,no_run
/// use config::load_config;
/// use std::path::Path;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = load_config(Some(Path::new("stash.toml")), None)?;
///     println!("Mode: {}", config.queue.mode);
///     Ok(())
/// }
/// ```
pub fn load_config(path: Option<&Path>, cli: Option<Config>) -> Result<Config, ConfigError> {
    let file_config = match path {
        Some(path) => load_from_file(path)?,
        None => Config::default(),
    };

    let config = merge_configs(
        Config::default(),
        file_config,
        "file",
        load_from_env(),
        "env",
        cli,
        "cli",
    );

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use std::fs;

    #[test]
    #[serial]
    fn test_env_wins_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stash.toml");
        fs::write(&path, "[queue]\nworkers = 6\nmax_attempts = 4\n").unwrap();

        unsafe {
            env::set_var("STASH_QUEUE_WORKERS", "10");
        }
        let config = load_config(Some(&path), None);
        unsafe {
            env::remove_var("STASH_QUEUE_WORKERS");
        }

        let config = config.unwrap();
        assert_eq!(config.queue.workers, 10);
        assert_eq!(config.queue.max_attempts, 4);
    }

    #[test]
    #[serial]
    fn test_invalid_file_config_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stash.toml");
        fs::write(&path, "[queue]\nmode = \"queue\"\n").unwrap();

        unsafe {
            env::remove_var("STASH_QUEUE_REDIS_URL");
            env::remove_var("STASH_REDIS_URL");
        }

        let result = load_config(Some(&path), None);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    #[serial]
    fn test_missing_file_is_an_error() {
        let result = load_config(Some(Path::new("/nonexistent/stash.toml")), None);
        assert!(matches!(
            result,
            Err(ConfigError::File(ConfigFileError::FileNotFound(_)))
        ));
    }
}
