//! Hue console server
//!
//! Serves the file browser under `/filebrowser` and the Oozie dashboard
//! under `/oozie`. Configuration comes from the TOML file named by
//! `HUE_CONFIG` (default /etc/hue/hue.toml).

use anyhow::{Context, Result};
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use hue_common::config::{load_config, ConsoleConfig};
use hue_common::logging::init_tracing;
use hue_filebrowser::fs::{FileSystem, LocalFs};
use hue_oozie::OozieClient;

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config()?;
    init_tracing(&config.logging.level);

    info!("Hue console v{} starting", env!("CARGO_PKG_VERSION"));

    let app = build_app(&config)?;

    let listener = tokio::net::TcpListener::bind(&config.server.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_address))?;
    info!("Listening on http://{}", config.server.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Hue console stopped");
    Ok(())
}

fn build_app(config: &ConsoleConfig) -> Result<Router> {
    let fb = &config.filebrowser;
    std::fs::create_dir_all(&fb.local_root)
        .with_context(|| format!("Failed to create filesystem root {}", fb.local_root))?;

    let fs = LocalFs::new(&fb.fs_name, &fb.local_root, &fb.superuser);
    if !fs.isdir(&fb.upload_tmp_dir) {
        fs.mkdir(&fb.upload_tmp_dir)
            .with_context(|| format!("Failed to create upload directory {}", fb.upload_tmp_dir))?;
    }
    info!(
        "Filesystem '{}' rooted at {} (superuser {})",
        fb.fs_name, fb.local_root, fb.superuser
    );

    let filebrowser = hue_filebrowser::AppState {
        fs: Arc::new(fs),
        settings: Arc::new(fb.clone()),
        auth: config.auth.clone(),
    };

    let oozie_client = OozieClient::new(&config.oozie);
    info!("Oozie server at {}", oozie_client.base_url());
    let dashboard = hue_oozie::DashboardState {
        client: Arc::new(oozie_client),
        settings: Arc::new(config.oozie.clone()),
        auth: config.auth.clone(),
    };

    Ok(Router::new()
        .nest("/filebrowser", hue_filebrowser::router(filebrowser))
        .nest("/oozie", hue_oozie::router(dashboard))
        .layer(TraceLayer::new_for_http()))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
