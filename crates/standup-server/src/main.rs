// Standup summarizer server entry point.
//
// Startup sequence:
// 1. Initialize tracing (stdout)
// 2. Load config
// 3. Build the store (seeded or empty)
// 4. Assemble the processing pipeline for the configured provider
// 5. Bind and serve until Ctrl+C

use anyhow::Context;
use tracing::info;

use standup_core::config;
use standup_core::store::StandupStore;
use standup_llm::client::OllamaClient;
use standup_llm::pipeline::StandupPipeline;
use standup_server::routes::{build_app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing
    init_tracing()?;
    info!("Standup server starting up");

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: provider={}, ollama={} ({})",
        config.provider, config.ollama.base_url, config.ollama.model
    );

    // 3. Build the store
    let store = if config.store.seed_demo_data {
        StandupStore::seeded()
    } else {
        StandupStore::new()
    };
    info!(
        "Store ready with {} teams, {} standups",
        store.team_count(),
        store.standup_count()
    );

    // 4. Assemble the pipeline
    let pipeline =
        StandupPipeline::from_config(&config).context("failed to build standup pipeline")?;
    info!("Processing pipeline uses provider: {}", pipeline.provider());
    let ollama =
        OllamaClient::from_config(&config.ollama).context("failed to build Ollama client")?;

    // 5. Serve
    let state = AppState::new(store, pipeline, ollama);
    let app = build_app(state, config.server.max_upload_bytes);

    let host = config.server.host.as_str();
    let port = config.server.port;
    let listener = tokio::net::TcpListener::bind((host, port))
        .await
        .with_context(|| format!("failed to bind {host}:{port}"))?;
    info!("Server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Standup server shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
    info!("Received Ctrl+C, shutting down...");
}

fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(
                "standup_server=info,standup_llm=info,standup_core=info,tower_http=info,warn",
            )
        }))
        .with_target(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
