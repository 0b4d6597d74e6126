use async_trait::async_trait;
use std::borrow::Cow;
use std::net::Ipv4Addr;

// 在这里定义所有平台实现共享的 trait。

/// Represents a single Wi-Fi network found during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEntry {
    pub ssid: String,
    pub rssi: i16, // dBm
    pub open: bool,
}

/// Link state reported by the driver while a connection attempt is polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Idle,
    Connecting,
    Connected,
    NoSsidAvailable,
    ConnectFailed,
    Disconnected,
}

/// Fixed network parameters of the self-hosted access point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApSettings {
    pub ssid: String,
    /// `None` opens an unencrypted network.
    pub password: Option<String>,
    pub ip: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub subnet: Ipv4Addr,
}

/// 前端资源提供者接口。
#[async_trait]
pub trait UiAssetProvider: Send + Sync {
    /// Retrieves a single UI asset.
    ///
    /// # Arguments
    /// * `path` - The path to the asset (e.g., "index.html").
    ///
    /// # Returns
    /// The asset's content and its MIME type, or an `Error` if not found.
    async fn get_asset(&self, path: &str) -> crate::Result<(Cow<'static, [u8]>, String)>;
}

/// The WiFi radio of the device.
///
/// One interface only; the driver switches it between station mode and
/// station plus soft access point.
#[async_trait]
pub trait WifiDriver: Send + Sync {
    /// Hardware MAC address, formatted `AA:BB:CC:DD:EE:FF`.
    async fn mac_address(&self) -> crate::Result<String>;

    /// Station only. Also tears down a running soft AP.
    async fn enter_station_mode(&self) -> crate::Result<()>;

    async fn set_auto_reconnect(&self, enabled: bool) -> crate::Result<()>;

    /// Starts joining `ssid`. Returns before the link is up; poll `status`.
    async fn begin(&self, ssid: &str, password: &str) -> crate::Result<()>;

    /// Starts joining with whatever credentials the platform saved last.
    async fn begin_saved(&self) -> crate::Result<()>;

    async fn status(&self) -> crate::Result<LinkStatus>;

    async fn local_ip(&self) -> crate::Result<Ipv4Addr>;

    /// SSID of the network currently joined.
    async fn current_ssid(&self) -> crate::Result<String>;

    async fn disconnect(&self) -> crate::Result<()>;

    /// Blocking scan. Entries come back in the order the radio reports them.
    async fn scan(&self) -> crate::Result<Vec<ScanEntry>>;

    /// Configures and opens the soft AP next to the station interface.
    async fn start_soft_ap(&self, settings: &ApSettings) -> crate::Result<()>;
}

/// Flash writer for over-the-air firmware images.
#[async_trait]
pub trait FirmwareUpdater: Send + Sync {
    /// Prepares for a new image of unknown size.
    async fn begin(&self) -> crate::Result<()>;

    /// Returns the number of bytes accepted.
    async fn write(&self, chunk: &[u8]) -> crate::Result<usize>;

    /// Finalises the image. With `set_size` the written length becomes the
    /// image size.
    async fn end(&self, set_size: bool) -> crate::Result<()>;

    /// Whether any step of the current update failed.
    async fn has_error(&self) -> bool;

    /// Reboots into the new image.
    async fn restart(&self) -> crate::Result<()>;
}

/// Multicast DNS announcement of the device.
#[async_trait]
pub trait MdnsResponder: Send + Sync {
    async fn announce(&self, hostname: &str, port: u16) -> crate::Result<()>;
}
