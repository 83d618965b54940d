use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use talkrelay::{api, config, llm, logging};
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(name = "talkrelay", version, about = "Messenger Bot R to OpenAI relay server")]
struct Cli {
    /// Interface to bind, overriding `HOST`.
    #[arg(long)]
    host: Option<String>,
    /// Port to bind, overriding `PORT`.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = config::init_config().context("failed to load configuration")?;
    if let Some(host) = cli.host {
        settings.host = host;
    }
    if let Some(port) = cli.port {
        settings.port = port;
    }
    logging::init_tracing(&settings);

    let client = llm::OpenAiClient::new(settings.openai_base_url.clone(), settings.openai_timeout)
        .context("failed to build OpenAI HTTP client")?;
    let llm: Arc<dyn llm::LlmClient> = Arc::new(client);
    llm.initialize(&settings.openai_api_key);

    let base_url = settings.public_base_url();
    let listener = TcpListener::bind((settings.host.as_str(), settings.port))
        .await
        .with_context(|| format!("failed to bind {base_url}"))?;
    let app = api::create_router(api::AppState::new(settings, llm));
    tracing::info!("Listening on {base_url}");
    tracing::info!("Webhook endpoint: {base_url}/webhook/message");
    tracing::info!("Health check: {base_url}/health");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server terminated unexpectedly")?;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
