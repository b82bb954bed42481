//! `vls-bundle` - builds the VLS server bundle, once or in watch mode.

use miette::Result;
use vls_bundle_cli::{OrchestratorConfig, error, logger, run, ui};

#[tokio::main]
async fn main() -> Result<()> {
    let config = OrchestratorConfig::load().map_err(error::cli_error_to_miette)?;

    ui::init_colors(config.no_color);
    logger::init_logger(config.verbose, config.quiet, !ui::colors_enabled());

    run::run(config).await.map_err(error::cli_error_to_miette)
}
