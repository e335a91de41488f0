mod cleanup;
mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use paste_api::routes::{self, AppStateInner};
use paste_api::service::PasteService;
use paste_db::{Database, DbOptions};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "pastebin_lite=debug,paste_api=debug,paste_db=info,tower_http=debug".into()
            }),
        )
        .init();

    let config = Config::from_env()?;
    if config.test_mode {
        warn!("TEST_MODE=1: clients may pin the request clock. Never run like this in production.");
    }

    // Init DB
    let db = Arc::new(Database::open_with(
        &config.db_path,
        DbOptions {
            pool_size: config.db_pool_size,
            busy_timeout: config.db_busy_timeout,
        },
    )?);
    let pastes = PasteService::new(db.clone());

    // A real-time sweep would contradict pinned test clocks.
    let cleanup = if config.cleanup_interval_secs > 0 && !config.test_mode {
        Some(tokio::spawn(cleanup::run_cleanup_loop(
            pastes.clone(),
            config.cleanup_interval_secs,
        )))
    } else {
        info!("Cleanup loop disabled");
        None
    };

    let state = Arc::new(AppStateInner {
        pastes,
        public_url: config.public_url.clone(),
        test_mode: config.test_mode,
    });

    let app = routes::router(state)
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Pastebin-Lite listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = cleanup {
        handle.abort();
    }
    db.checkpoint()?;
    info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(sigterm) => sigterm,
                Err(e) => {
                    warn!("Failed to install SIGTERM handler: {}", e);
                    ctrl_c.await.ok();
                    info!("Received Ctrl+C, shutting down...");
                    return;
                }
            };
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
