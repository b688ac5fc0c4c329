//! Gas monitor alert hook service.
//!
//! Run with: `cargo run -p gasmon-service`

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::{Router, middleware};
use clap::Parser;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use gasmon_core::RtdbClient;
use gasmon_service::middleware::hook_secret_auth;
use gasmon_service::{
    AppState, Config, DisabledNotifier, Notifier, TelegramNotifier, Watcher, api,
};

/// Gas monitor alert hook: notifies a chat when a device enters ALERT.
#[derive(Parser, Debug)]
#[command(name = "gasmon-service")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address (overrides config).
    #[arg(short, long)]
    bind: Option<String>,

    /// Realtime database URL (overrides config).
    #[arg(long)]
    database_url: Option<String>,

    /// Watch the database for writes in addition to serving the hook.
    #[arg(short, long)]
    watch: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("gasmon_service=info".parse()?)
                .add_directive("gasmon_core=info".parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default().unwrap_or_default(),
    };
    config.apply_env();

    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(url) = args.database_url {
        config.database.url = Some(url);
    }
    if args.watch {
        config.watcher.enabled = true;
    }
    config.validate()?;

    let notifier: Arc<dyn Notifier> = match TelegramNotifier::from_config(&config.telegram) {
        Some(telegram) => Arc::new(telegram),
        None => {
            warn!("Telegram is not configured; alerts will be logged as failed sends");
            Arc::new(DisabledNotifier)
        }
    };

    let hook_config = Arc::new(config.hook.clone());
    let state = AppState::new(config.clone(), notifier);

    let watcher = if config.watcher.enabled {
        let url = config
            .database
            .url
            .as_deref()
            .context("database.url is required for the watcher")?;
        let client = RtdbClient::new(url, config.database.auth.clone())?;
        Some(Watcher::new(Arc::clone(&state), Arc::new(client)).start())
    } else {
        info!("Watcher disabled, serving the hook endpoint only");
        None
    };

    let app = Router::new()
        .merge(api::router())
        .layer(middleware::from_fn_with_state(hook_config, hook_secret_auth))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(Arc::clone(&state));

    let addr: SocketAddr = config.server.bind.parse()?;
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.watcher.signal_stop();
    if let Some(handle) = watcher {
        let _ = handle.await;
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
