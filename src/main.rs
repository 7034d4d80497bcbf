//! pitwall server binary

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pitwall::api::{create_public_router, create_router, AppState, ROUTES};
use pitwall::config::{AppConfig, LogFormat};
use pitwall::store::{create_store, DataStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("failed to load configuration")?;

    init_tracing(&config)?;

    let store_config = config
        .store_runtime()
        .context("invalid store configuration")?;

    let store = create_store(store_config)
        .await
        .context("failed to initialise data store")?;
    let store: Arc<dyn DataStore> = Arc::from(store);
    tracing::info!(backend = store.backend(), "Data store ready");

    let state = AppState::new(store);
    let router = if config.server.cors {
        create_public_router(state)
    } else {
        create_router(state)
    };

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    tracing::info!(%addr, "Listening for HTTP traffic");

    print_examples(config.server.port);

    axum::serve(listener, router).await?;

    Ok(())
}

fn print_examples(port: u16) {
    println!("listening on port {}", port);
    for route in ROUTES {
        println!("http://localhost:{}{}", port, route.example);
    }
}

fn init_tracing(config: &AppConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.logging.level.clone()))
        .unwrap_or_else(|_| EnvFilter::new("pitwall=info,tower_http=info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.logging.format {
        LogFormat::Json => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        LogFormat::Text => {
            registry.with(tracing_subscriber::fmt::layer()).init();
        }
    }

    Ok(())
}
