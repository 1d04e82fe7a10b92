//! CLI entry point.

use anyhow::{Context, Result};
use clap::Parser;

use rebinder::initialization::init_logger_with;
use rebinder::{run, AppConfig, Options};

#[tokio::main]
async fn main() -> Result<()> {
    let options = Options::parse();

    init_logger_with(
        options.log_level.clone().into(),
        options.log_format.clone(),
    )
    .context("Failed to initialize logger")?;

    run(AppConfig::from(&options)).await
}
