mod backend;

use anyhow::{Context, Result};
use std::sync::Arc;
use wifi_manager_core::config::{load_config_from_toml_str, ManagerConfig};
use wifi_manager_core::frontends::EmbedFrontend;
use wifi_manager_core::manager::WifiManager;
use wifi_manager_core::run_manager;

const DEFAULT_CONFIG_TOML: &str = include_str!("../configs.toml");
const CONFIG_ENV: &str = "WIFI_MANAGER_CONFIG";

fn load_config() -> Result<ManagerConfig> {
    match std::env::var(CONFIG_ENV) {
        Ok(path) => {
            tracing::info!("Loading config from {}", path);
            let s = std::fs::read_to_string(&path)
                .with_context(|| format!("cannot read config file {}", path))?;
            Ok(load_config_from_toml_str(&s)?)
        }
        Err(_) => Ok(load_config_from_toml_str(DEFAULT_CONFIG_TOML)?),
    }
}

async fn run() -> Result<()> {
    let config = load_config()?;
    let (driver, updater, mdns) = backend::create(&config);

    let mut manager = WifiManager::new(driver, updater, mdns, config).await?;

    let hooks = manager.hooks_mut();
    hooks.set_on_connect(|| tracing::debug!("Connecting..."));
    hooks.set_on_after_connect(|ok| {
        if ok {
            tracing::info!("Connection attempt succeeded");
        } else {
            tracing::warn!("Connection attempt failed");
        }
    });
    hooks.set_on_after_scan(|| tracing::debug!("Scan finished"));
    hooks.set_on_ap_open(|ssid, ip| {
        tracing::info!("📡 Join \"{}\" and open http://{}/ to configure", ssid, ip);
    });

    run_manager(Arc::new(manager), Arc::new(EmbedFrontend::new())).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(e) = run().await {
        tracing::error!("❌ WiFi manager failed: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
