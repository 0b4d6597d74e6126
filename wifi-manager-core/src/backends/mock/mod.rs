use crate::traits::{ApSettings, FirmwareUpdater, LinkStatus, MdnsResponder, ScanEntry, WifiDriver};
use crate::{Error, Result};
use async_trait::async_trait;
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;

/// A network the mock radio can see.
#[derive(Debug, Clone)]
pub struct MockNetwork {
    pub ssid: String,
    /// Empty means open.
    pub password: String,
    pub rssi: i16,
}

impl MockNetwork {
    pub fn new(ssid: &str, password: &str, rssi: i16) -> Self {
        Self {
            ssid: ssid.to_string(),
            password: password.to_string(),
            rssi,
        }
    }
}

#[derive(Debug)]
struct MockWifiState {
    mac: String,
    networks: Vec<MockNetwork>,
    saved: Option<(String, String)>,
    target: Option<(String, String)>,
    link_delay: u32,
    polls: u32,
    joined: Option<String>,
    soft_ap: Option<ApSettings>,
    auto_reconnect: bool,
    disconnects: u32,
}

/// A mock WiFi driver for testing purposes.
/// It simulates scanning and connecting without any real hardware interaction.
#[derive(Debug)]
pub struct MockWifi {
    inner: Mutex<MockWifiState>,
}

impl Default for MockWifi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockWifi {
    pub const STATION_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 50);
    const SCAN_TIME: Duration = Duration::from_secs(1);

    pub fn new() -> Self {
        let networks = vec![
            MockNetwork::new("MyHomeWiFi", "correct-horse", -38),
            MockNetwork::new("CafeGuest", "", -56),
            MockNetwork::new("Neighbor's Network", "letmein", -78),
            MockNetwork::new("", "", -81),
            MockNetwork::new("xfinitywifi", "", -62),
        ];
        Self {
            inner: Mutex::new(MockWifiState {
                mac: "24:6F:28:A1:B2:C3".to_string(),
                networks,
                saved: None,
                target: None,
                link_delay: 0,
                polls: 0,
                joined: None,
                soft_ap: None,
                auto_reconnect: false,
                disconnects: 0,
            }),
        }
    }

    pub fn with_mac(mut self, mac: &str) -> Self {
        self.inner.get_mut().mac = mac.to_string();
        self
    }

    pub fn with_networks(mut self, networks: Vec<MockNetwork>) -> Self {
        self.inner.get_mut().networks = networks;
        self
    }

    /// Credentials `begin_saved` will use.
    pub fn with_saved(mut self, ssid: &str, password: &str) -> Self {
        self.inner.get_mut().saved = Some((ssid.to_string(), password.to_string()));
        self
    }

    /// Number of status polls that report `Connecting` before the link
    /// comes up.
    pub fn with_link_delay(mut self, polls: u32) -> Self {
        self.inner.get_mut().link_delay = polls;
        self
    }

    pub async fn set_networks(&self, networks: Vec<MockNetwork>) {
        self.inner.lock().await.networks = networks;
    }

    pub async fn soft_ap(&self) -> Option<ApSettings> {
        self.inner.lock().await.soft_ap.clone()
    }

    pub async fn auto_reconnect(&self) -> bool {
        self.inner.lock().await.auto_reconnect
    }

    pub async fn disconnect_count(&self) -> u32 {
        self.inner.lock().await.disconnects
    }

    /// Status polls since the last `begin`.
    pub async fn status_polls(&self) -> u32 {
        self.inner.lock().await.polls
    }
}

#[async_trait]
impl WifiDriver for MockWifi {
    async fn mac_address(&self) -> Result<String> {
        Ok(self.inner.lock().await.mac.clone())
    }

    async fn enter_station_mode(&self) -> Result<()> {
        tracing::debug!("🤖 [MockWifi] Station mode");
        self.inner.lock().await.soft_ap = None;
        Ok(())
    }

    async fn set_auto_reconnect(&self, enabled: bool) -> Result<()> {
        self.inner.lock().await.auto_reconnect = enabled;
        Ok(())
    }

    async fn begin(&self, ssid: &str, password: &str) -> Result<()> {
        tracing::debug!(
            "🤖 [MockWifi] Joining '{}' with password: '{}'",
            ssid,
            if password.is_empty() { "(empty)" } else { "********" }
        );
        let mut state = self.inner.lock().await;
        state.target = Some((ssid.to_string(), password.to_string()));
        state.polls = 0;
        state.joined = None;
        Ok(())
    }

    async fn begin_saved(&self) -> Result<()> {
        let mut state = self.inner.lock().await;
        tracing::debug!("🤖 [MockWifi] Joining saved network {:?}", state.saved.as_ref().map(|s| &s.0));
        state.target = state.saved.clone();
        state.polls = 0;
        state.joined = None;
        Ok(())
    }

    async fn status(&self) -> Result<LinkStatus> {
        let mut state = self.inner.lock().await;
        state.polls += 1;
        if state.joined.is_some() {
            return Ok(LinkStatus::Connected);
        }

        let Some((ssid, password)) = state.target.clone() else {
            return Ok(LinkStatus::Idle);
        };
        let Some(network) = state.networks.iter().find(|n| !ssid.is_empty() && n.ssid == ssid) else {
            return Ok(LinkStatus::NoSsidAvailable);
        };
        if network.password != password {
            return Ok(LinkStatus::ConnectFailed);
        }
        if state.polls <= state.link_delay {
            return Ok(LinkStatus::Connecting);
        }

        // 平台会缓存成功连接的凭据
        state.saved = Some((ssid.clone(), password));
        state.joined = Some(ssid);
        Ok(LinkStatus::Connected)
    }

    async fn local_ip(&self) -> Result<Ipv4Addr> {
        if self.inner.lock().await.joined.is_some() {
            Ok(Self::STATION_IP)
        } else {
            Err(Error::CommandFailed("not associated".to_string()))
        }
    }

    async fn current_ssid(&self) -> Result<String> {
        Ok(self.inner.lock().await.joined.clone().unwrap_or_default())
    }

    async fn disconnect(&self) -> Result<()> {
        let mut state = self.inner.lock().await;
        state.joined = None;
        state.target = None;
        state.disconnects += 1;
        Ok(())
    }

    async fn scan(&self) -> Result<Vec<ScanEntry>> {
        tracing::debug!("🤖 [MockWifi] Scanning for networks...");
        sleep(Self::SCAN_TIME).await;

        let entries: Vec<ScanEntry> = self
            .inner
            .lock()
            .await
            .networks
            .iter()
            .map(|n| ScanEntry {
                ssid: n.ssid.clone(),
                rssi: n.rssi,
                open: n.password.is_empty(),
            })
            .collect();
        tracing::debug!("🤖 [MockWifi] Found {} networks.", entries.len());
        Ok(entries)
    }

    async fn start_soft_ap(&self, settings: &ApSettings) -> Result<()> {
        tracing::debug!("🤖 [MockWifi] Soft AP '{}' on {}", settings.ssid, settings.ip);
        self.inner.lock().await.soft_ap = Some(settings.clone());
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MockUpdaterState {
    image: Vec<u8>,
    capacity: Option<usize>,
    in_progress: bool,
    finished: bool,
    error: bool,
    restarts: u32,
}

/// Collects the uploaded image in memory.
#[derive(Debug, Default)]
pub struct MockUpdater {
    inner: Mutex<MockUpdaterState>,
}

impl MockUpdater {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects bytes past `capacity`, like a too-small flash partition.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut updater = Self::default();
        updater.inner.get_mut().capacity = Some(capacity);
        updater
    }

    pub async fn image(&self) -> Vec<u8> {
        self.inner.lock().await.image.clone()
    }

    pub async fn is_finished(&self) -> bool {
        self.inner.lock().await.finished
    }

    pub async fn restart_count(&self) -> u32 {
        self.inner.lock().await.restarts
    }
}

#[async_trait]
impl FirmwareUpdater for MockUpdater {
    async fn begin(&self) -> Result<()> {
        let mut state = self.inner.lock().await;
        state.image.clear();
        state.in_progress = true;
        state.finished = false;
        state.error = false;
        Ok(())
    }

    async fn write(&self, chunk: &[u8]) -> Result<usize> {
        let mut state = self.inner.lock().await;
        if !state.in_progress {
            state.error = true;
            return Err(Error::Update("write without begin".to_string()));
        }
        let room = state
            .capacity
            .map_or(chunk.len(), |cap| cap.saturating_sub(state.image.len()).min(chunk.len()));
        if room < chunk.len() {
            state.error = true;
        }
        state.image.extend_from_slice(&chunk[..room]);
        Ok(room)
    }

    async fn end(&self, _set_size: bool) -> Result<()> {
        let mut state = self.inner.lock().await;
        if !state.in_progress || state.error {
            state.error = true;
            return Err(Error::Update("image incomplete".to_string()));
        }
        state.in_progress = false;
        state.finished = true;
        Ok(())
    }

    async fn has_error(&self) -> bool {
        self.inner.lock().await.error
    }

    async fn restart(&self) -> Result<()> {
        tracing::info!("🤖 [MockUpdater] Restart requested (simulated)");
        self.inner.lock().await.restarts += 1;
        Ok(())
    }
}

/// Records announcements instead of sending packets.
#[derive(Debug, Default)]
pub struct MockMdns {
    announced: Mutex<Vec<(String, u16)>>,
}

impl MockMdns {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn announced(&self) -> Vec<(String, u16)> {
        self.announced.lock().await.clone()
    }
}

#[async_trait]
impl MdnsResponder for MockMdns {
    async fn announce(&self, hostname: &str, port: u16) -> Result<()> {
        tracing::debug!("🤖 [MockMdns] {}.local on port {}", hostname, port);
        self.announced.lock().await.push((hostname.to_string(), port));
        Ok(())
    }
}
