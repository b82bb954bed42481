//! Miette diagnostic conversion for CLI errors.

use crate::error::CliError;
use miette::Report;

/// Convert CliError to miette Report
pub fn cli_error_to_miette(err: CliError) -> Report {
    match err {
        CliError::Bundle(e) => Report::new(e),
        CliError::Config {
            message,
            hint: Some(hint),
        } => miette::miette!(
            code = "CONFIG_ERROR",
            help = hint,
            "Configuration error: {}",
            message
        ),
        CliError::Config {
            message,
            hint: None,
        } => miette::miette!(code = "CONFIG_ERROR", "Configuration error: {}", message),
        CliError::Io(e) => miette::miette!("I/O error: {}", e),
    }
}
