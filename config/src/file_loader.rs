//! # Configuration File Loading
//!
//! Reads a `Config` from a TOML or YAML file; the format follows the file
//! extension. Sections and fields the file leaves out keep their defaults.

use crate::config::Config;
use std::path::Path;

/// Why a configuration file could not be turned into a `Config`.
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse {format} in {path}: {reason}")]
    Parse {
        path: String,
        format: ConfigFormat,
        reason: String,
    },

    #[error("Config file has no extension")]
    NoExtension,

    #[error("Unsupported config file format: {0}")]
    UnsupportedFormat(String),
}

/// File formats accepted for configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ConfigFormat {
    #[strum(serialize = "TOML")]
    Toml,
    #[strum(serialize = "YAML")]
    Yaml,
}

impl ConfigFormat {
    /// Picks the format from a path's extension, case-insensitively.
    pub fn from_path(path: &Path) -> Result<Self, ConfigFileError> {
        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .ok_or(ConfigFileError::NoExtension)?;
        match extension.to_ascii_lowercase().as_str() {
            "toml" => Ok(Self::Toml),
            "yaml" | "yml" => Ok(Self::Yaml),
            other => Err(ConfigFileError::UnsupportedFormat(other.to_string())),
        }
    }

    fn parse(self, contents: &str) -> Result<Config, String> {
        match self {
            Self::Toml => toml::from_str(contents).map_err(|e| e.to_string()),
            Self::Yaml => serde_yaml::from_str(contents).map_err(|e| e.to_string()),
        }
    }
}

fn load_as(path: &Path, format: ConfigFormat) -> Result<Config, ConfigFileError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|_| ConfigFileError::FileNotFound(path.display().to_string()))?;
    format.parse(&contents).map_err(|reason| ConfigFileError::Parse {
        path: path.display().to_string(),
        format,
        reason,
    })
}

/// Loads a TOML configuration file regardless of its extension.
///
/// ```rust,no_run
/// use config::load_from_toml;
/// use std::path::Path;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = load_from_toml(Path::new("stash.toml"))?;
///     println!("Workers: {}", config.queue.workers);
///     Ok(())
/// }
/// ```
pub fn load_from_toml(path: &Path) -> Result<Config, ConfigFileError> {
    load_as(path, ConfigFormat::Toml)
}

/// Loads a YAML configuration file regardless of its extension.
pub fn load_from_yaml(path: &Path) -> Result<Config, ConfigFileError> {
    load_as(path, ConfigFormat::Yaml)
}

/// Loads `.toml`, `.yaml` or `.yml` files.
pub fn load_from_file(path: &Path) -> Result<Config, ConfigFileError> {
    load_as(path, ConfigFormat::from_path(path)?)
}
