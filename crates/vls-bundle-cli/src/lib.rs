//! Front end for the VLS bundle pipeline.
//!
//! There is no argument parser: the process is configured from
//! `vls-bundle.json` and `VLS_*` environment variables (see [`config`]).
//!
//! - [`config`] - configuration loading and validation
//! - [`error`] - CLI errors and miette conversion
//! - [`logger`] - tracing subscriber setup
//! - [`run`] - one-shot build or watch loop
//! - [`ui`] - status lines on stderr

pub mod config;
pub mod error;
pub mod logger;
pub mod run;
pub mod ui;

pub use config::OrchestratorConfig;
pub use error::{CliError, Result};
