//! Core library for the WiFi manager.
//! This crate defines the platform traits (WiFi driver, firmware updater,
//! mDNS responder, UI assets), the `WifiManager` that orchestrates them,
//! and the HTTP configuration server. Platform implementations live in
//! `backends` and are selected by feature flags.

pub mod backends;
pub mod config;
pub mod frontends;
pub mod hooks;
pub mod identity;
pub mod manager;
pub mod ota;
pub mod traits;
pub mod web_server;

use std::sync::Arc;

use thiserror::Error;

use manager::{StartOutcome, WifiManager};
use traits::UiAssetProvider;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("Config parse error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid MAC address: {0:?}")]
    InvalidMac(String),

    #[error("Web server error: {0}")]
    WebServer(#[from] axum::BoxError),

    #[error("Firmware update error: {0}")]
    Update(String),

    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    #[error("UTF-8 conversion error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// A specialized `Result` type for this crate's operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Binds the HTTP server, runs the startup sequence and then serves
/// requests until the server fails.
pub async fn run_manager(
    manager: Arc<WifiManager>,
    frontend: Arc<dyn UiAssetProvider>,
) -> Result<()> {
    let bind_addr = manager.config().http.bind_addr;
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("🌐 Web server listening on {}", bind_addr);

    let server = tokio::spawn(web_server::serve(
        listener,
        web_server::router(manager.clone(), frontend),
    ));

    match manager.start().await? {
        StartOutcome::Connected { ssid, ip } => {
            tracing::info!(%ssid, %ip, "✅ Station connected");
        }
        StartOutcome::AccessPoint { ssid, ip } => {
            tracing::info!(%ssid, %ip, "📡 Configuration access point open");
        }
    }

    server
        .await
        .map_err(|e| Error::WebServer(e.into()))?
}
