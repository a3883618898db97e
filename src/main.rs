use anyhow::Context;
use clap::Parser;
use docsearch::{
    api,
    app::AppServices,
    config::{AppConfig, ConfigLoader},
    logging,
    registry::ProviderRegistry,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Document search and retrieval-augmented chat over a vector store.
#[derive(Debug, Parser)]
#[command(name = "docsearch", version, about)]
struct Cli {
    /// Configuration file (YAML or JSON). Defaults to `CONFIG_PATH` or `./config.*`.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Interface to bind, overriding `api.host`.
    #[arg(long)]
    host: Option<String>,
    /// Port to bind, overriding `api.port`.
    #[arg(long)]
    port: Option<u16>,
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<AppConfig> {
        let loader = match &self.config {
            Some(path) => ConfigLoader::new().with_path(path),
            None => ConfigLoader::new(),
        };
        let mut config = loader.load().context("Failed to load configuration")?;
        if let Some(host) = &self.host {
            config.api.host = host.clone();
        }
        if let Some(port) = self.port {
            config.api.port = port;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;
    logging::init_tracing(&config.api.log_level);
    tracing::info!(environment = %config.environment, "Starting Document Search API");
    if config.api.reload {
        tracing::warn!("api.reload is set but has no effect; restart the process to reload");
    }

    let services = ProviderRegistry::with_defaults()
        .build_services(&config)
        .context("Failed to construct providers")?;
    let app_services = Arc::new(AppServices::new(services));
    app_services.initialize().await;

    let router = api::create_router(
        app_services.clone(),
        config.environment.exposes_error_details(),
        &config.api.cors_origins,
    );

    let address = format!("{}:{}", config.api.host, config.api.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    tracing::info!("Listening on http://{address}");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    tracing::info!("Shutting down Document Search API");
    app_services.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %error, "Failed to listen for shutdown signal");
    }
}
