//! Configuration module for rustible-ios
//!
//! Handles loading and merging configuration from multiple sources:
//! - Default values
//! - System configuration (/etc/rustible-ios/config.toml)
//! - User configuration (~/.rustible-ios.toml)
//! - Project configuration (./rustible-ios.toml)
//! - Environment variables
//! - Command-line arguments

use crate::modules::network::ResourceState;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default module settings
    pub defaults: Defaults,

    /// Logging settings
    pub logging: LoggingConfig,

    /// Output settings
    pub output: OutputConfig,
}

/// Default values for module runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    /// State used when a run names none
    pub state: String,

    /// Compute commands without sending them
    pub check_mode: bool,

    /// Report a diff of the facts
    pub diff_mode: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            state: ResourceState::Merged.as_str().to_string(),
            check_mode: false,
            diff_mode: false,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level when no `-v` flag is given
    pub level: String,

    /// `text` or `json`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: "text".to_string(),
        }
    }
}

/// Output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// `human`, `json` or `yaml`
    pub format: String,

    /// Enable colors
    pub colors: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: "human".to_string(),
            colors: true,
        }
    }
}

impl Config {
    /// Load configuration from all sources
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Config::default();

        for path in Self::get_config_paths(config_path) {
            if path.exists() {
                config = config.merge_from_file(&path)?;
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Get the list of configuration file paths to check
    fn get_config_paths(explicit_path: Option<&PathBuf>) -> Vec<PathBuf> {
        let mut paths = Vec::new();

        // Explicit path takes priority
        if let Some(path) = explicit_path {
            paths.push(path.clone());
            return paths;
        }

        paths.push(PathBuf::from("/etc/rustible-ios/config.toml"));

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".rustible-ios.toml"));
        }

        paths.push(PathBuf::from("rustible-ios.toml"));

        // Environment variable
        if let Ok(env_config) = std::env::var("RUSTIBLE_IOS_CONFIG") {
            paths.insert(0, PathBuf::from(env_config));
        }

        paths
    }

    /// Merge configuration from a file
    fn merge_from_file(&self, path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let file_config: Config = match extension {
            "yml" | "yaml" => serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
            "json" => serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
            _ => toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
        };

        Ok(self.merge(file_config))
    }

    /// Merge another config into this one; values of `other` that differ
    /// from the defaults win.
    fn merge(&self, other: Config) -> Config {
        fn pick<T: PartialEq>(base: T, other: T, default: T) -> T {
            if other != default {
                other
            } else {
                base
            }
        }

        let defaults = Defaults::default();
        let logging = LoggingConfig::default();
        let output = OutputConfig::default();

        Config {
            defaults: Defaults {
                state: pick(self.defaults.state.clone(), other.defaults.state, defaults.state),
                check_mode: pick(self.defaults.check_mode, other.defaults.check_mode, defaults.check_mode),
                diff_mode: pick(self.defaults.diff_mode, other.defaults.diff_mode, defaults.diff_mode),
            },
            logging: LoggingConfig {
                level: pick(self.logging.level.clone(), other.logging.level, logging.level),
                format: pick(self.logging.format.clone(), other.logging.format, logging.format),
            },
            output: OutputConfig {
                format: pick(self.output.format.clone(), other.output.format, output.format),
                colors: pick(self.output.colors, other.output.colors, output.colors),
            },
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(state) = std::env::var("RUSTIBLE_IOS_STATE") {
            self.defaults.state = state;
        }

        if let Ok(level) = std::env::var("RUSTIBLE_IOS_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Ok(format) = std::env::var("RUSTIBLE_IOS_LOG_FORMAT") {
            self.logging.format = format;
        }

        if std::env::var("NO_COLOR").is_ok() {
            self.output.colors = false;
        }
    }

    fn validate(&self) -> Result<()> {
        self.default_state()?;
        match self.logging.format.as_str() {
            "text" | "json" => Ok(()),
            other => anyhow::bail!(
                "Invalid log format '{}'. Valid options: text, json",
                other
            ),
        }
    }

    /// The configured default state
    pub fn default_state(&self) -> Result<ResourceState> {
        self.defaults
            .state
            .parse::<ResourceState>()
            .context("Invalid defaults.state")
    }

    /// Load from a specific file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Config::default().merge_from_file(path.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.defaults.state, "merged");
        assert!(!config.defaults.check_mode);
        assert_eq!(config.logging.format, "text");
        assert_eq!(config.output.format, "human");
    }

    #[test]
    fn test_config_merge() {
        let base = Config {
            output: OutputConfig {
                format: "json".to_string(),
                ..OutputConfig::default()
            },
            ..Config::default()
        };
        let other = Config {
            defaults: Defaults {
                state: "replaced".to_string(),
                ..Defaults::default()
            },
            ..Config::default()
        };

        let merged = base.merge(other);
        assert_eq!(merged.defaults.state, "replaced");
        assert_eq!(merged.output.format, "json");
    }

    #[test]
    fn test_from_file_by_extension() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "defaults:\n  state: overridden\n  check_mode: true").unwrap();
        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.default_state().unwrap(), ResourceState::Overridden);
        assert!(config.defaults.check_mode);

        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[logging]\nformat = \"json\"").unwrap();
        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    #[serial]
    fn test_env_override() {
        std::env::set_var("RUSTIBLE_IOS_STATE", "deleted");
        let mut config = Config::default();
        config.apply_env_overrides();
        assert_eq!(config.defaults.state, "deleted");
        std::env::remove_var("RUSTIBLE_IOS_STATE");
    }

    #[test]
    #[serial]
    fn test_invalid_state_rejected() {
        std::env::set_var("RUSTIBLE_IOS_STATE", "purged");
        let missing = PathBuf::from("/nonexistent/rustible-ios.toml");
        assert!(Config::load(Some(&missing)).is_err());
        std::env::remove_var("RUSTIBLE_IOS_STATE");
    }
}
