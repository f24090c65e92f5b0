//! Configuration module
//!
//! Handles application settings loaded from `config.toml`

mod settings;

pub use settings::{
    AppConfig, LineEnding, LoggingConfig, PreflightSettings, RetrySettings, SerialSettings,
    SlowCommand, TmuxSettings,
};

use directories::ProjectDirs;
use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File could not be read
    #[error("Cannot read {path}: {source}")]
    Read {
        /// File path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// File is not valid TOML for this schema
    #[error("Cannot parse {path}: {source}")]
    Parse {
        /// File path (empty when parsing a string)
        path: PathBuf,
        /// Underlying error
        source: toml::de::Error,
    },

    /// A value is out of range
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Get the application configuration directory
pub fn config_dir() -> Option<PathBuf> {
    ProjectDirs::from("org", "cliprobe", "cliprobe").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Default configuration file
pub fn config_file() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[tmux]\nbinary = \"/opt/tmux/bin/tmux\"").unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.tmux.binary, "/opt/tmux/bin/tmux");
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = AppConfig::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_parse_error_names_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[retry\nmax_parse_errors = 1").unwrap();

        let err = AppConfig::load(Some(file.path())).unwrap_err();
        assert!(err.to_string().contains(&file.path().display().to_string()));
    }
}
