//! Wetland benefit API server

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use wetland_cloud::HttpDemSource;
use wetland_server::{router, Cli, JobManager, MarkdownReport};

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);
    let config = cli.into_config();

    config
        .acquisition
        .validate()
        .context("invalid acquisition settings")?;
    std::fs::create_dir_all(&config.output_dir).with_context(|| {
        format!("Failed to create output directory {}", config.output_dir.display())
    })?;

    let source = HttpDemSource::new(config.acquisition.timeout)
        .context("Failed to build HTTP client")?;
    let manager = JobManager::new(&config, Arc::new(source), Arc::new(MarkdownReport));
    let app = router(manager);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    info!(
        addr = %config.bind,
        output_dir = %config.output_dir.display(),
        "Wetland benefit API listening"
    );

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
