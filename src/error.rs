//! Error types for rustible-ios.
//!
//! Library code reports [`ModuleError`] and [`ConnectionError`]; this module
//! adds the crate-level error that the CLI surfaces, with one exit code per
//! failure class.

use crate::connection::ConnectionError;
use crate::modules::ModuleError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for rustible-ios operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for rustible-ios.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Module Errors
    // ========================================================================
    /// Module not found.
    #[error("Module '{0}' not found")]
    ModuleNotFound(String),

    /// Module execution failed.
    #[error("Module '{module}' failed: {source}")]
    Module {
        /// Module name
        module: String,
        /// Underlying module error
        #[source]
        source: ModuleError,
    },

    // ========================================================================
    // Device Errors
    // ========================================================================
    /// Device transport failed outside of a module run.
    #[error("Device error: {0}")]
    Connection(#[from] ConnectionError),

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input file (desired state or device snapshot).
    #[error("Invalid input file '{path}': {message}")]
    InvalidInput {
        /// Path to the file
        path: PathBuf,
        /// Error message
        message: String,
    },

    // ========================================================================
    // IO Errors
    // ========================================================================
    /// File not found.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ========================================================================
    // Serialization Errors
    // ========================================================================
    /// YAML parsing error.
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl Error {
    /// Creates a module error tagged with the module name.
    pub fn module(module: impl Into<String>, source: ModuleError) -> Self {
        Self::Module {
            module: module.into(),
            source,
        }
    }

    /// Creates an invalid input error.
    pub fn invalid_input(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Returns the error code for CLI exit status.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Module { source, .. } => match source {
                ModuleError::InvalidParameter(_) | ModuleError::MissingParameter(_) => 4,
                ModuleError::PolicyViolation(_) => 5,
                ModuleError::GrammarGap(_) => 6,
                ModuleError::Transport(_) => 3,
                _ => 2,
            },
            Error::Connection(_) => 3,
            Error::ModuleNotFound(_) => 2,
            Error::Config(_) | Error::InvalidInput { .. } => 4,
            _ => 1,
        }
    }
}

impl From<ModuleError> for Error {
    fn from(error: ModuleError) -> Self {
        match error {
            ModuleError::NotFound(name) => Error::ModuleNotFound(name),
            other => Error::module("unknown", other),
        }
    }
}
