//! # vls-bundle
//!
//! Build orchestration for the VLS language server bundle.
//!
//! The pipeline is made of build-phase participants ([`BuildPlugin`]) that a
//! [`BuildHost`] drives through `build_start` / `build_end` and consults on
//! module resolution:
//!
//! - [`LinkVlsPlugin`] keeps `./services/vls` external so consumers load the
//!   prebuilt `vls.js` instead of bundling it again
//! - [`WatchSourcePlugin`] registers the server source tree with the host's watcher
//! - [`GenerateTypingsPlugin`] runs `tsc` in declaration-only mode and fails the
//!   phase when it exits non-zero
//! - [`BundleVlsPlugin`] builds (one-shot) or watches (persistent context) the
//!   server bundle through a [`BundlerEngine`]
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use vls_bundle::{BuildHost, BuildMode, RolldownEngine, ServerLayout};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let layout = ServerLayout::new("server");
//! let host = BuildHost::vls(&layout, BuildMode::OneShot, Arc::new(RolldownEngine::new()));
//!
//! host.start().await?;
//! host.end().await?;
//! # Ok(()) }
//! ```

pub mod config;
pub mod engine;
pub mod host;
pub mod plugins;
pub mod watcher;

pub use config::{BuildConfiguration, BuildMode, EXTERNAL_DEPENDENCIES, ServerLayout};
pub use engine::{BundlerEngine, RolldownEngine, RolldownWatchContext, WatchContext};
pub use host::{BuildHost, RegistryResolvePlugin, WatchRegistry};
pub use plugins::{
    BuildPlugin, BundleVlsPlugin, GenerateTypingsPlugin, LinkVlsPlugin, OutputSink, PluginContext,
    PluginPhase, PluginRegistry, ResolvedId, StdStream, StdioSink, SubprocessResult,
    TscInvocation, WatchSourcePlugin,
};
pub use watcher::{FileChange, FileWatcher, IgnoreRules};

/// Error types for vls-bundle operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The type checker exited with a non-zero status (or was killed).
    #[error("type-check error.")]
    TypeCheck {
        /// Exit code, `None` when the process was terminated by a signal.
        exit_code: Option<i32>,
    },

    /// Error from the bundler engine while building or watching.
    #[error("Rolldown bundler error: {0}")]
    Bundle(String),

    /// The type checker could not be started at all.
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A watch context was asked to watch after it was disposed.
    #[error("Watch context has already been disposed")]
    WatchContextDisposed,

    /// File watcher error.
    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid output path (e.g., directory traversal attempt).
    #[error("Invalid output path: {0}")]
    InvalidOutputPath(String),

    /// File write operation failed.
    #[error("Write failure: {0}")]
    WriteFailure(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for vls-bundle operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a bundle error from a Rolldown error batch.
    ///
    /// Rolldown's diagnostics are only exposed through `Debug`, so the batch is
    /// flattened into one message.
    pub fn from_rolldown_batch(error: &dyn std::fmt::Debug) -> Self {
        let rendered = format!("{:?}", error);
        if rendered.trim().is_empty() {
            Error::Bundle("Unknown bundler error".to_string())
        } else {
            Error::Bundle(rendered)
        }
    }

    /// Whether this is the fatal type-check failure.
    pub fn is_type_check(&self) -> bool {
        matches!(self, Error::TypeCheck { .. })
    }
}

impl miette::Diagnostic for Error {
    fn code(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        Some(Box::new(match self {
            Error::TypeCheck { .. } => "TYPE_CHECK_ERROR",
            Error::Bundle(_) => "BUNDLE_ERROR",
            Error::Spawn { .. } => "SPAWN_ERROR",
            Error::WatchContextDisposed => "WATCH_CONTEXT_DISPOSED",
            Error::Watch(_) => "WATCH_ERROR",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::InvalidOutputPath(_) => "INVALID_OUTPUT_PATH",
            Error::WriteFailure(_) => "WRITE_FAILURE",
            Error::Io(_) => "IO_ERROR",
        }))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(miette::Severity::Error)
    }

    fn help(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        match self {
            Error::TypeCheck { exit_code } => Some(Box::new(format!(
                "tsc reported errors (exit code {}). The diagnostics above show where.",
                exit_code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "none, terminated by signal".to_string())
            ))),
            Error::Spawn { program, .. } => Some(Box::new(format!(
                "Could not start '{}'. Run `yarn install` in the server directory so node_modules/.bin/tsc exists.",
                program
            ))),
            Error::WatchContextDisposed => Some(Box::new(
                "The bundle watch context is released in build_end and cannot be restarted.",
            )),
            Error::InvalidOutputPath(path) => Some(Box::new(format!(
                "The output path '{}' is invalid. Ensure it stays inside the output directory.",
                path
            ))),
            Error::WriteFailure(msg) => Some(Box::new(format!(
                "Failed to write file. Check disk space and permissions.\nError: {}",
                msg
            ))),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use miette::Diagnostic;

    #[test]
    fn test_type_check_message_is_fixed() {
        let err = Error::TypeCheck { exit_code: Some(2) };
        assert_eq!(err.to_string(), "type-check error.");
        assert!(err.is_type_check());
        assert_eq!(err.code().unwrap().to_string(), "TYPE_CHECK_ERROR");
    }

    #[test]
    fn test_from_rolldown_batch_keeps_message() {
        let err = Error::from_rolldown_batch(&"Could not resolve './missing'");
        assert!(matches!(err, Error::Bundle(ref msg) if msg.contains("./missing")));
        assert!(!err.is_type_check());
    }

    #[test]
    fn test_spawn_help_mentions_program() {
        let err = Error::Spawn {
            program: "node_modules/.bin/tsc".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        let help = err.help().unwrap().to_string();
        assert!(help.contains("node_modules/.bin/tsc"));
    }
}
