// 后端：通过 wpa_cli 控制 wpa_supplicant，AP 模式使用 mode=2 网络 + dnsmasq

mod avahi;

pub use avahi::AvahiResponder;

use crate::backends::utils::{
    netmask_prefix_len, parse_scan_results, parse_status, quoted_passphrase, WpaStatus,
};
use crate::config::PlatformConfig;
use crate::traits::{ApSettings, LinkStatus, ScanEntry, WifiDriver};
use crate::{Error, Result};
use async_trait::async_trait;
use std::net::Ipv4Addr;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

/// AP channel 6.
const AP_FREQUENCY_MHZ: u32 = 2437;

#[derive(Debug, Default)]
struct DriverState {
    /// Network added by the last `begin`; saved once it associates.
    pending_net_id: Option<u32>,
    dhcp_requested: bool,
    ap_net_id: Option<u32>,
    ap_cidr: Option<String>,
}

/// Linux WiFi driver on top of `wpa_cli`.
///
/// Single radio: while the soft AP network is selected the station link is
/// down, and joining a network drops the AP.
// TODO: run the AP on a virtual `__ap` interface so it survives a failed join.
#[derive(Debug)]
pub struct WpaCliDriver {
    config: PlatformConfig,
    dnsmasq: Mutex<Option<Child>>,
    state: Mutex<DriverState>,
}

impl WpaCliDriver {
    pub fn new(config: PlatformConfig) -> Self {
        Self {
            config,
            dnsmasq: Mutex::new(None),
            state: Mutex::new(DriverState::default()),
        }
    }

    /// Runs one `wpa_cli` command and returns its trimmed reply.
    async fn wpa_cli(&self, args: &[&str]) -> Result<String> {
        tracing::debug!("wpa_cli {}", args.join(" "));
        let output = Command::new("wpa_cli")
            .arg("-i")
            .arg(&self.config.interface_name)
            .args(args)
            .output()
            .await?;

        if !output.status.success() {
            let error_msg = String::from_utf8_lossy(&output.stderr);
            return Err(Error::CommandFailed(format!(
                "wpa_cli {} failed: {}",
                args.join(" "),
                error_msg
            )));
        }

        let reply = String::from_utf8(output.stdout)?.trim().to_string();
        if reply == "FAIL" || reply.starts_with("FAIL-") {
            return Err(Error::CommandFailed(format!(
                "wpa_cli {} replied {}",
                args.join(" "),
                reply
            )));
        }
        Ok(reply)
    }

    async fn add_network(&self) -> Result<u32> {
        let reply = self.wpa_cli(&["add_network"]).await?;
        reply.parse::<u32>().map_err(|_| {
            Error::CommandFailed(format!("Failed to parse network ID from wpa_cli: {}", reply))
        })
    }

    async fn set_network(&self, net_id: u32, key: &str, value: &str) -> Result<()> {
        self.wpa_cli(&["set_network", &net_id.to_string(), key, value])
            .await
            .map(drop)
    }

    async fn read_status(&self) -> Result<WpaStatus> {
        Ok(parse_status(&self.wpa_cli(&["status"]).await?))
    }

    async fn ip(&self, verb: &str, cidr: &str) -> Result<std::process::Output> {
        Ok(Command::new("ip")
            .arg("addr")
            .arg(verb)
            .arg(cidr)
            .arg("dev")
            .arg(&self.config.interface_name)
            .output()
            .await?)
    }

    /// 停止 AP（停止 dnsmasq，移除 AP 网络和 IP）
    async fn stop_ap(&self) -> Result<()> {
        if let Some(mut child) = self.dnsmasq.lock().await.take() {
            let _ = child.kill().await;
        }

        let (ap_net_id, ap_cidr) = {
            let mut state = self.state.lock().await;
            (state.ap_net_id.take(), state.ap_cidr.take())
        };
        if let Some(net_id) = ap_net_id {
            self.wpa_cli(&["remove_network", &net_id.to_string()]).await?;
            // 重新启用保存的 STA 网络
            self.wpa_cli(&["enable_network", "all"]).await?;
        }
        if let Some(cidr) = ap_cidr {
            let output = self.ip("del", &cidr).await?;
            if !output.status.success() {
                let error_msg = String::from_utf8_lossy(&output.stderr);
                if !error_msg.contains("Cannot assign requested address") {
                    return Err(Error::CommandFailed(format!(
                        "Failed to clean up IP address: {}",
                        error_msg
                    )));
                }
            }
            tracing::info!("AP stopped on {}", self.config.interface_name);
        }
        Ok(())
    }

    /// 使用 wpa_supplicant 控制接口创建并启用一个 AP 网络
    async fn add_ap_network(&self, settings: &ApSettings) -> Result<u32> {
        let psk = match &settings.password {
            None => None,
            Some(psk) => Some(quoted_passphrase(psk).ok_or_else(|| {
                Error::InvalidConfig(
                    "AP passphrase must be 8-63 printable ASCII characters without '\"'"
                        .to_string(),
                )
            })?),
        };

        let net_id = self.add_network().await?;
        tracing::debug!(net_id, "Configuring AP network id");

        self.set_network(net_id, "mode", "2").await?;
        // SSID 使用 hex 编码以支持任意字符
        self.set_network(net_id, "ssid", &hex::encode(&settings.ssid)).await?;

        match psk {
            None => self.set_network(net_id, "key_mgmt", "NONE").await?,
            Some(quoted) => {
                self.set_network(net_id, "proto", "RSN").await?;
                self.set_network(net_id, "key_mgmt", "WPA-PSK").await?;
                self.set_network(net_id, "pairwise", "CCMP").await?;
                self.set_network(net_id, "psk", &quoted).await?;
            }
        }

        // 某些驱动不支持在 AP 模式下设置频率，失败时交给驱动自动选择
        if let Err(e) = self
            .set_network(net_id, "frequency", &AP_FREQUENCY_MHZ.to_string())
            .await
        {
            tracing::warn!(
                freq = AP_FREQUENCY_MHZ,
                error = %e,
                "Failed to set AP frequency, driver will auto-select channel"
            );
        }

        self.wpa_cli(&["select_network", &net_id.to_string()]).await?;
        Ok(net_id)
    }

    /// Once associated, keeps the new network and asks for a lease.
    async fn on_associated(&self, status: &WpaStatus) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.pending_net_id.take().is_some() {
            tracing::info!("Association complete. Saving config...");
            self.wpa_cli(&["save_config"]).await?;
        }
        if status.ip_address.is_none() && !state.dhcp_requested {
            state.dhcp_requested = true;
            tracing::debug!("Requesting DHCP lease on {}", self.config.interface_name);
            Command::new("udhcpc")
                .arg("-i")
                .arg(&self.config.interface_name)
                .arg("-q")
                .arg("-n")
                .stdout(Stdio::null())
                .spawn()?;
        }
        Ok(())
    }
}

#[async_trait]
impl WifiDriver for WpaCliDriver {
    async fn mac_address(&self) -> Result<String> {
        let path = format!("/sys/class/net/{}/address", self.config.interface_name);
        let mac = tokio::fs::read_to_string(&path).await?;
        Ok(mac.trim().to_uppercase())
    }

    async fn enter_station_mode(&self) -> Result<()> {
        self.stop_ap().await
    }

    async fn set_auto_reconnect(&self, enabled: bool) -> Result<()> {
        self.wpa_cli(&["sta_autoconnect", if enabled { "1" } else { "0" }])
            .await
            .map(drop)
    }

    async fn begin(&self, ssid: &str, password: &str) -> Result<()> {
        let previous = self.state.lock().await.pending_net_id.take();
        if let Some(net_id) = previous {
            let _ = self.wpa_cli(&["remove_network", &net_id.to_string()]).await;
        }

        let psk = if password.is_empty() {
            None
        } else {
            Some(quoted_passphrase(password).ok_or_else(|| {
                Error::CommandFailed(
                    "passphrase must be 8-63 printable ASCII characters without '\"'".to_string(),
                )
            })?)
        };

        let net_id = self.add_network().await?;
        self.set_network(net_id, "ssid", &hex::encode(ssid)).await?;
        match psk {
            None => self.set_network(net_id, "key_mgmt", "NONE").await?,
            Some(quoted) => self.set_network(net_id, "psk", &quoted).await?,
        }
        self.wpa_cli(&["select_network", &net_id.to_string()]).await?;

        let mut state = self.state.lock().await;
        state.pending_net_id = Some(net_id);
        state.dhcp_requested = false;
        Ok(())
    }

    async fn begin_saved(&self) -> Result<()> {
        self.state.lock().await.dhcp_requested = false;
        self.wpa_cli(&["enable_network", "all"]).await?;
        self.wpa_cli(&["reconnect"]).await.map(drop)
    }

    async fn status(&self) -> Result<LinkStatus> {
        let status = self.read_status().await?;
        if status.wpa_state == "COMPLETED" && !status.ap_mode {
            self.on_associated(&status).await?;
        }
        Ok(status.link_status())
    }

    async fn local_ip(&self) -> Result<Ipv4Addr> {
        self.read_status()
            .await?
            .ip_address
            .ok_or_else(|| Error::CommandFailed("no IP address assigned".to_string()))
    }

    async fn current_ssid(&self) -> Result<String> {
        self.read_status()
            .await?
            .ssid
            .ok_or_else(|| Error::CommandFailed("not associated".to_string()))
    }

    async fn disconnect(&self) -> Result<()> {
        self.wpa_cli(&["disconnect"]).await.map(drop)
    }

    async fn scan(&self) -> Result<Vec<ScanEntry>> {
        self.wpa_cli(&["scan"]).await?;
        // 等待一会儿以获取结果
        tokio::time::sleep(Duration::from_secs(self.config.scan_wait_secs)).await;
        let output = self.wpa_cli(&["scan_results"]).await?;
        Ok(parse_scan_results(&output))
    }

    async fn start_soft_ap(&self, settings: &ApSettings) -> Result<()> {
        if let Err(e) = self.stop_ap().await {
            tracing::warn!(error = %e, "Failed to clean up previous AP, continuing");
        }

        let prefix = netmask_prefix_len(settings.subnet).ok_or_else(|| {
            Error::InvalidConfig(format!("non-contiguous subnet mask {}", settings.subnet))
        })?;
        let cidr = format!("{}/{}", settings.ip, prefix);
        let output = self.ip("add", &cidr).await?;
        if !output.status.success() {
            let err = String::from_utf8_lossy(&output.stderr);
            if !err.contains("File exists") {
                return Err(Error::CommandFailed(format!("Failed to set IP: {}", err)));
            }
        }
        self.state.lock().await.ap_cidr = Some(cidr);

        let net_id = self.add_ap_network(settings).await?;
        self.state.lock().await.ap_net_id = Some(net_id);

        // dnsmasq 提供 DHCP，并把所有域名解析到 AP 地址（captive portal）
        let dnsmasq_child = Command::new("dnsmasq")
            .arg(format!("--interface={}", self.config.interface_name))
            .arg(format!("--dhcp-range={}", self.config.dhcp_range))
            .arg(format!("--dhcp-option=option:router,{}", settings.gateway))
            .arg(format!("--address=/#/{}", settings.ip))
            .arg("--no-resolv")
            .arg("--no-hosts")
            .arg("--no-daemon")
            .kill_on_drop(true)
            .spawn()?;
        *self.dnsmasq.lock().await = Some(dnsmasq_child);

        tracing::info!(
            ssid = %settings.ssid,
            "AP started on {} (via wpa_supplicant)",
            self.config.interface_name
        );
        Ok(())
    }
}
