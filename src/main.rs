use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use blog_ui::config;
use blog_ui::render::CommonMarkRenderer;
use blog_ui::web::{self, AppState};
use blog_ui::CatalogFacade;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;

    let facade = CatalogFacade::from_config(&cfg)?;
    info!(api = %cfg.api.url, timeout_ms = cfg.api.timeout_ms, "catalog client ready");

    let state = AppState {
        facade: Arc::new(facade),
        renderer: Arc::new(CommonMarkRenderer),
        default_page_size: cfg.app.default_page_size,
    };
    web::serve(&cfg, state).await?;

    info!("shut down");
    Ok(())
}
