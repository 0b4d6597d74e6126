use crate::{Error, Result};
use serde::Deserialize;
use std::net::{Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

/// 顶层应用配置
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub station: StationConfig,
    pub access_point: AccessPointConfig,
    pub http: HttpConfig,
    pub mdns: MdnsConfig,
    pub platform: PlatformConfig,
}

// ============= STA 配置 =============

#[derive(Debug, Clone)]
pub struct StationConfig {
    /// Credentials to try at startup; `None` means platform auto-connect.
    pub ssid: Option<String>,
    pub password: String,
    pub max_retry_times: u32,
    pub retry_delay: Duration,
    /// Pause between dropping a live link and joining the new network.
    pub reconnect_settle: Duration,
}

// ============= AP 配置 =============

#[derive(Debug, Clone)]
pub struct AccessPointConfig {
    pub ip: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub subnet: Ipv4Addr,
    pub password: Option<String>,
    /// AP is shut this long after a successful reconfiguration.
    pub shutdown_after: Duration,
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub bind_addr: SocketAddr,
    pub reboot_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct MdnsConfig {
    pub enabled: bool,
    pub port: u16,
}

/// Settings only the Linux backend reads.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    pub interface_name: String,
    pub dhcp_range: String,
    pub scan_wait_secs: u64,
    pub firmware_path: String,
    pub staging_path: String,
    pub reboot_command: Vec<String>,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            interface_name: "wlan0".to_string(),
            dhcp_range: "192.168.4.100,192.168.4.200,12h".to_string(),
            scan_wait_secs: 5,
            firmware_path: "/usr/local/bin/wifi-manager-daemon".to_string(),
            staging_path: "/tmp/wifi-manager-firmware.bin".to_string(),
            reboot_command: vec!["systemctl".to_string(), "reboot".to_string()],
        }
    }
}

// ============= TOML 解析用的临时结构 =============

#[derive(Deserialize, Default)]
#[serde(default)]
struct ManagerConfigFile {
    station: StationToml,
    access_point: AccessPointToml,
    http: HttpToml,
    mdns: MdnsToml,
    platform: PlatformConfig,
}

#[derive(Deserialize)]
#[serde(default)]
struct StationToml {
    ssid: String,
    password: String,
    max_retry_times: u32,
    retry_delay_ms: u64,
    reconnect_settle_ms: u64,
}

impl Default for StationToml {
    fn default() -> Self {
        Self {
            ssid: String::new(),
            password: String::new(),
            max_retry_times: 20,
            retry_delay_ms: 500,
            reconnect_settle_ms: 1000,
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct AccessPointToml {
    ip: String,
    gateway: String,
    subnet: String,
    password: String,
    shutdown_after_secs: u64,
}

impl Default for AccessPointToml {
    fn default() -> Self {
        Self {
            ip: "192.168.4.1".to_string(),
            gateway: "192.168.4.1".to_string(),
            subnet: "255.255.255.0".to_string(),
            password: String::new(),
            shutdown_after_secs: 300,
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct HttpToml {
    bind_addr: String,
    reboot_delay_ms: u64,
}

impl Default for HttpToml {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:80".to_string(),
            reboot_delay_ms: 500,
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct MdnsToml {
    enabled: bool,
    port: u16,
}

impl Default for MdnsToml {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 80,
        }
    }
}

fn parse_ipv4(field: &str, value: &str) -> Result<Ipv4Addr> {
    Ipv4Addr::from_str(value)
        .map_err(|e| Error::InvalidConfig(format!("{field} = {value:?}: {e}")))
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}

impl TryFrom<ManagerConfigFile> for ManagerConfig {
    type Error = Error;

    fn try_from(t: ManagerConfigFile) -> Result<Self> {
        if t.station.retry_delay_ms == 0 {
            return Err(Error::InvalidConfig(
                "station.retry_delay_ms must be greater than zero".to_string(),
            ));
        }
        let bind_addr = SocketAddr::from_str(&t.http.bind_addr).map_err(|e| {
            Error::InvalidConfig(format!("http.bind_addr = {:?}: {e}", t.http.bind_addr))
        })?;

        Ok(ManagerConfig {
            station: StationConfig {
                ssid: non_empty(t.station.ssid),
                password: t.station.password,
                max_retry_times: t.station.max_retry_times,
                retry_delay: Duration::from_millis(t.station.retry_delay_ms),
                reconnect_settle: Duration::from_millis(t.station.reconnect_settle_ms),
            },
            access_point: AccessPointConfig {
                ip: parse_ipv4("access_point.ip", &t.access_point.ip)?,
                gateway: parse_ipv4("access_point.gateway", &t.access_point.gateway)?,
                subnet: parse_ipv4("access_point.subnet", &t.access_point.subnet)?,
                password: non_empty(t.access_point.password),
                shutdown_after: Duration::from_secs(t.access_point.shutdown_after_secs),
            },
            http: HttpConfig {
                bind_addr,
                reboot_delay: Duration::from_millis(t.http.reboot_delay_ms),
            },
            mdns: MdnsConfig {
                enabled: t.mdns.enabled,
                port: t.mdns.port,
            },
            platform: t.platform,
        })
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        ManagerConfig {
            station: StationConfig {
                ssid: None,
                password: String::new(),
                max_retry_times: 20,
                retry_delay: Duration::from_millis(500),
                reconnect_settle: Duration::from_secs(1),
            },
            access_point: AccessPointConfig {
                ip: Ipv4Addr::new(192, 168, 4, 1),
                gateway: Ipv4Addr::new(192, 168, 4, 1),
                subnet: Ipv4Addr::new(255, 255, 255, 0),
                password: None,
                shutdown_after: Duration::from_secs(300),
            },
            http: HttpConfig {
                bind_addr: SocketAddr::from(([0, 0, 0, 0], 80)),
                reboot_delay: Duration::from_millis(500),
            },
            mdns: MdnsConfig {
                enabled: true,
                port: 80,
            },
            platform: PlatformConfig::default(),
        }
    }
}

// ============= 配置加载函数 =============

/// 从 TOML 字符串加载应用配置
pub fn load_config_from_toml_str(s: &str) -> Result<ManagerConfig> {
    let parsed: ManagerConfigFile = toml::from_str(s)?;
    ManagerConfig::try_from(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = load_config_from_toml_str("").unwrap();
        assert_eq!(config.station.ssid, None);
        assert_eq!(config.station.max_retry_times, 20);
        assert_eq!(config.station.retry_delay, Duration::from_millis(500));
        assert_eq!(config.access_point.ip, Ipv4Addr::new(192, 168, 4, 1));
        assert_eq!(config.access_point.subnet, Ipv4Addr::new(255, 255, 255, 0));
        assert_eq!(config.access_point.password, None);
        assert_eq!(config.access_point.shutdown_after, Duration::from_secs(300));
        assert_eq!(config.http.bind_addr.port(), 80);
        assert!(config.mdns.enabled);
        assert_eq!(config.platform.interface_name, "wlan0");
    }

    #[test]
    fn partial_sections_override_defaults() {
        let config = load_config_from_toml_str(
            r#"
            [station]
            ssid = "HomeNet"
            password = "hunter22"
            max_retry_times = 5

            [access_point]
            ip = "10.0.0.1"
            gateway = "10.0.0.1"
            password = "setup123"

            [http]
            bind_addr = "127.0.0.1:8080"
            "#,
        )
        .unwrap();

        assert_eq!(config.station.ssid.as_deref(), Some("HomeNet"));
        assert_eq!(config.station.password, "hunter22");
        assert_eq!(config.station.max_retry_times, 5);
        assert_eq!(config.station.reconnect_settle, Duration::from_secs(1));
        assert_eq!(config.access_point.ip, Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(config.access_point.password.as_deref(), Some("setup123"));
        assert_eq!(config.http.bind_addr, "127.0.0.1:8080".parse().unwrap());
    }

    #[test]
    fn bad_ip_is_invalid_config() {
        let err = load_config_from_toml_str("[access_point]\nip = \"192.168.4\"\n").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(msg) if msg.contains("access_point.ip")));
    }

    #[test]
    fn zero_retry_delay_is_rejected() {
        let err = load_config_from_toml_str("[station]\nretry_delay_ms = 0\n").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let err = load_config_from_toml_str("[station\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
