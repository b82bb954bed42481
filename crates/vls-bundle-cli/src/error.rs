//! Error handling for the `vls-bundle` executable.
//!
//! Pipeline failures keep their `vls_bundle::Error` (and its diagnostic code
//! and help text); everything that goes wrong before the pipeline starts is a
//! [`CliError::Config`].

mod miette;

pub use self::miette::cli_error_to_miette;

use thiserror::Error;

/// Top-level CLI error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration could not be loaded or is inconsistent.
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        /// Suggestion shown below the error.
        hint: Option<String>,
    },

    /// The build pipeline failed.
    #[error(transparent)]
    Bundle(#[from] vls_bundle::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn config(message: impl Into<String>) -> Self {
        CliError::Config {
            message: message.into(),
            hint: None,
        }
    }

    pub fn config_with_hint(message: impl Into<String>, hint: impl Into<String>) -> Self {
        CliError::Config {
            message: message.into(),
            hint: Some(hint.into()),
        }
    }
}

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        CliError::config_with_hint(
            err.to_string(),
            "Check vls-bundle.json syntax and the VLS_* environment variables",
        )
    }
}

/// Result type alias for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;
