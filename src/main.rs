use std::process::ExitCode;

use clap::Parser;
use icongen::config::{AppConfig, setup_logging};
use tracing::error;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = icongen::cli::CliOptions::parse();

    if setup_logging(cli.debug).is_err() {
        return ExitCode::FAILURE;
    }

    let config = match AppConfig::from_cli(cli) {
        Ok(config) => config,
        Err(err) => {
            error!("Configuration error: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let artifacts = icongen::storage::ArtifactStore::new(&config.storage);
    if let Err(err) = artifacts.ensure_directories().await {
        error!("Failed to create output directories: {}", err);
        return ExitCode::FAILURE;
    }

    if let Err(err) = icongen::web::setup_server(config).await {
        error!("Application error: {}", err);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
