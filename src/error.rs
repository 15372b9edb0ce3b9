//! This module defines all error types used throughout the application.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    /// IO errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Delimited file reading errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON encoding/decoding errors
    #[error("JSON error: {0}")]
    Json(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file parsing errors
    #[error("Configuration parsing error in {file:?}: {message}")]
    ConfigParse { file: PathBuf, message: String },

    /// A raw record could not be coerced into an event record
    #[error("Record {row}: cannot normalize field `{field}`: {message}")]
    Normalize {
        row: usize,
        field: &'static str,
        message: String,
    },

    /// Threshold outside the accepted range
    #[error("Invalid threshold: {0}")]
    InvalidThreshold(f64),

    /// An edge references a node that is not part of the graph
    #[error("Inconsistent graph: {0}")]
    InconsistentGraph(String),

    /// A per-state counter was expected but never accumulated
    #[error("No tally recorded for state {0}")]
    MissingState(String),

    /// Generic error with custom message
    #[error("{0}")]
    Custom(String),

    /// Wrapped anyhow errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a custom error with a message
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }

    /// Create a normalization error for a given row and field
    pub fn normalize(row: usize, field: &'static str, msg: impl Into<String>) -> Self {
        Self::Normalize {
            row,
            field,
            message: msg.into(),
        }
    }

    /// Create an inconsistent graph error
    pub fn inconsistent(msg: impl Into<String>) -> Self {
        Self::InconsistentGraph(msg.into())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::ConfigParse {
            file: PathBuf::from("unknown"),
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err.to_string())
    }
}

// Helper macros for creating errors

/// Create a custom error with formatting
#[macro_export]
macro_rules! custom_error {
    ($($arg:tt)*) => {
        $crate::error::Error::Custom(format!($($arg)*))
    };
}

/// Bail with a custom error message
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::custom_error!($($arg)*))
    };
}

/// Ensure a condition is true or return error
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $($arg:tt)*) => {
        if !($cond) {
            $crate::bail!($($arg)*);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::custom("test error");
        assert_eq!(err.to_string(), "test error");

        let err = Error::normalize(3, "current_step", "invalid digit");
        assert_eq!(
            err.to_string(),
            "Record 3: cannot normalize field `current_step`: invalid digit"
        );
    }

    #[test]
    fn test_ensure_macro() {
        fn check(value: i32) -> Result<()> {
            crate::ensure!(value > 0, "value must be positive, got {}", value);
            Ok(())
        }

        assert!(check(1).is_ok());
        assert_eq!(
            check(-1).unwrap_err().to_string(),
            "value must be positive, got -1"
        );
    }
}
