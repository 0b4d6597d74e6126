//! The WiFi manager: connection attempts, scans, credential changes and the
//! startup sequence that falls back to a configuration access point.

use crate::config::ManagerConfig;
use crate::hooks::Hooks;
use crate::identity::DeviceIdentity;
use crate::traits::{ApSettings, FirmwareUpdater, LinkStatus, MdnsResponder, WifiDriver};
use crate::Result;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;

/// Mutable connection state. The flag always reflects the last attempt.
#[derive(Debug, Default)]
struct LinkState {
    ssid: String,
    password: String,
    wifi_specified: bool,
    connected: bool,
    ip_addr: String,
    networks: Vec<String>,
}

/// Body of `/getnetinfo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetInfo {
    pub ssid: String,
    #[serde(rename = "ipaddr")]
    pub ip_addr: String,
    #[serde(rename = "macaddr")]
    pub mac_addr: String,
    #[serde(rename = "isConnect")]
    pub is_connected: bool,
}

/// Result of submitting new credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconfigureOutcome {
    Connected,
    Failed,
    /// The device was online; the attempt runs in the background because it
    /// drops the link the request arrived on.
    Pending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Connected { ssid: String, ip: String },
    AccessPoint { ssid: String, ip: String },
}

pub struct WifiManager {
    driver: Arc<dyn WifiDriver>,
    updater: Arc<dyn FirmwareUpdater>,
    mdns: Arc<dyn MdnsResponder>,
    identity: DeviceIdentity,
    config: ManagerConfig,
    hooks: Hooks,
    state: Mutex<LinkState>,
    // 串行化连接尝试；轮询期间不持有 state 锁
    connect_lock: Arc<Mutex<()>>,
    ap_timer: Mutex<Option<JoinHandle<()>>>,
}

impl WifiManager {
    /// Reads the MAC address from the driver and derives the device identity.
    pub async fn new(
        driver: Arc<dyn WifiDriver>,
        updater: Arc<dyn FirmwareUpdater>,
        mdns: Arc<dyn MdnsResponder>,
        config: ManagerConfig,
    ) -> Result<Self> {
        let mac = driver.mac_address().await?;
        let identity = DeviceIdentity::from_mac(&mac)?;
        tracing::info!(mac = %identity.mac(), ap_ssid = %identity.ap_ssid(), "Device identity");

        let mut state = LinkState::default();
        if let Some(ssid) = &config.station.ssid {
            state.ssid = ssid.clone();
            state.password = config.station.password.clone();
            state.wifi_specified = true;
        }

        Ok(Self {
            driver,
            updater,
            mdns,
            identity,
            config,
            hooks: Hooks::default(),
            state: Mutex::new(state),
            connect_lock: Arc::new(Mutex::new(())),
            ap_timer: Mutex::new(None),
        })
    }

    /// Callbacks can only be registered before the manager is shared.
    pub fn hooks_mut(&mut self) -> &mut Hooks {
        &mut self.hooks
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn updater(&self) -> Arc<dyn FirmwareUpdater> {
        self.updater.clone()
    }

    /// Sets the credentials `start` will use instead of auto-connect.
    pub async fn specify_wifi(&self, ssid: &str, password: &str) {
        let mut state = self.state.lock().await;
        state.ssid = ssid.to_string();
        state.password = password.to_string();
        state.wifi_specified = true;
    }

    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.connected
    }

    pub async fn ip_addr(&self) -> String {
        self.state.lock().await.ip_addr.clone()
    }

    /// SSIDs found by the last scan.
    pub async fn networks(&self) -> Vec<String> {
        self.state.lock().await.networks.clone()
    }

    pub async fn net_info(&self) -> NetInfo {
        let state = self.state.lock().await;
        NetInfo {
            ssid: state.ssid.clone(),
            ip_addr: state.ip_addr.clone(),
            mac_addr: self.identity.mac().to_string(),
            is_connected: state.connected,
        }
    }

    /// One connection attempt with the current target, or with the
    /// platform's saved credentials when `auto` is set.
    ///
    /// Polls the link every `retry_delay` until it is up or the poll count
    /// exceeds `max_retry_times`. Every failure cause ends as `false`.
    pub async fn connect(&self, auto: bool) -> bool {
        let _attempt = self.connect_lock.lock().await;
        self.attempt(auto).await
    }

    /// Caller holds `connect_lock`.
    async fn attempt(&self, auto: bool) -> bool {
        let (ssid, password) = {
            let state = self.state.lock().await;
            (state.ssid.clone(), state.password.clone())
        };

        let begun = if auto {
            tracing::info!("Auto connect");
            self.driver.begin_saved().await
        } else {
            tracing::info!(%ssid, "Connecting");
            self.driver.begin(&ssid, &password).await
        };
        self.hooks.connect();

        let linked = match begun {
            Ok(()) => self.wait_for_link().await,
            Err(e) => {
                tracing::warn!("Failed to start connection: {}", e);
                false
            }
        };

        let mut connected = false;
        let mut ip_addr = None;
        let mut joined_ssid = None;
        if linked {
            match self.driver.local_ip().await {
                Ok(ip) => {
                    connected = true;
                    ip_addr = Some(ip.to_string());
                }
                Err(e) => tracing::warn!("Link up but no IP address: {}", e),
            }
            if connected && auto {
                match self.driver.current_ssid().await {
                    Ok(s) => joined_ssid = Some(s),
                    Err(e) => tracing::warn!("Could not read joined SSID: {}", e),
                }
            }
        }

        {
            let mut state = self.state.lock().await;
            state.connected = connected;
            if let Some(ip) = ip_addr {
                state.ip_addr = ip;
            }
            if let Some(s) = joined_ssid {
                state.ssid = s;
            }
            if connected {
                tracing::info!(ssid = %state.ssid, ip = %state.ip_addr, "Connected");
            } else {
                tracing::warn!("Connect fail.");
            }
        }

        self.hooks.after_connect(connected);
        connected
    }

    async fn wait_for_link(&self) -> bool {
        let max_retry_times = self.config.station.max_retry_times;
        let mut polls = 0u32;
        loop {
            match self.driver.status().await {
                Ok(LinkStatus::Connected) => return true,
                Ok(status) => tracing::debug!(?status, polls, "Waiting for link"),
                Err(e) => tracing::debug!(polls, "Status poll failed: {}", e),
            }
            if polls > max_retry_times {
                return false;
            }
            sleep(self.config.station.retry_delay).await;
            polls += 1;
        }
    }

    /// Runs a blocking scan and replaces the stored list with every
    /// non-empty SSID, in the order the driver reported them.
    pub async fn scan(&self) -> Vec<String> {
        tracing::info!("Scan network...");
        self.hooks.scan();

        let entries = match self.driver.scan().await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Scan failed: {}", e);
                Vec::new()
            }
        };
        tracing::info!("Scan OK");

        let networks: Vec<String> = entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| !entry.ssid.is_empty())
            .map(|(i, entry)| {
                tracing::info!(
                    "{}: {} {} {}",
                    i + 1,
                    entry.ssid,
                    entry.rssi,
                    if entry.open { " " } else { "*" }
                );
                entry.ssid.clone()
            })
            .collect();

        self.state.lock().await.networks = networks.clone();
        self.hooks.after_scan();
        networks
    }

    /// Installs new credentials and tries them.
    ///
    /// Failed attempts restore the previous credentials; successful ones arm
    /// the access-point shutdown timer. The connection lock is held from the
    /// swap until the attempt is settled, so overlapping requests queue up.
    pub async fn reconfigure(self: &Arc<Self>, ssid: String, password: String) -> ReconfigureOutcome {
        let attempt = self.connect_lock.clone().lock_owned().await;

        let (backup, was_connected) = {
            let mut state = self.state.lock().await;
            let backup = (
                std::mem::replace(&mut state.ssid, ssid),
                std::mem::replace(&mut state.password, password),
            );
            (backup, state.connected)
        };

        if was_connected {
            let this = Arc::clone(self);
            tokio::spawn(async move {
                let _attempt = attempt;
                if let Err(e) = this.driver.disconnect().await {
                    tracing::warn!("Disconnect before reconnect failed: {}", e);
                }
                this.state.lock().await.connected = false;
                sleep(this.config.station.reconnect_settle).await;
                this.finish_reconfigure(backup).await;
            });
            return ReconfigureOutcome::Pending;
        }

        let connected = self.finish_reconfigure(backup).await;
        drop(attempt);
        if connected {
            ReconfigureOutcome::Connected
        } else {
            ReconfigureOutcome::Failed
        }
    }

    async fn finish_reconfigure(&self, backup: (String, String)) -> bool {
        if self.attempt(false).await {
            self.arm_ap_shutdown().await;
            return true;
        }

        let mut state = self.state.lock().await;
        tracing::info!(ssid = %backup.0, "Restoring previous credentials");
        state.ssid = backup.0;
        state.password = backup.1;
        false
    }

    /// (Re)starts the one-shot timer that turns the soft AP off.
    async fn arm_ap_shutdown(&self) {
        let driver = self.driver.clone();
        let after = self.config.access_point.shutdown_after;
        let task = tokio::spawn(async move {
            sleep(after).await;
            tracing::info!("AP shut.");
            if let Err(e) = driver.enter_station_mode().await {
                tracing::warn!("Failed to leave AP mode: {}", e);
            }
        });

        if let Some(previous) = self.ap_timer.lock().await.replace(task) {
            previous.abort();
        }
    }

    /// Startup policy: station first, announce, connect, and only when that
    /// fails open the configuration access point.
    ///
    /// The HTTP server is expected to be running already.
    pub async fn start(&self) -> Result<StartOutcome> {
        self.driver.enter_station_mode().await?;
        self.driver.set_auto_reconnect(true).await?;

        if self.config.mdns.enabled {
            let hostname = self.identity.ap_ssid();
            if let Err(e) = self.mdns.announce(hostname, self.config.mdns.port).await {
                tracing::warn!(%hostname, "mDNS announce failed: {}", e);
            }
        }

        let specified = self.state.lock().await.wifi_specified;
        if self.connect(!specified).await {
            let state = self.state.lock().await;
            return Ok(StartOutcome::Connected {
                ssid: state.ssid.clone(),
                ip: state.ip_addr.clone(),
            });
        }

        tracing::info!("Open AP");
        let ap = &self.config.access_point;
        let ap_ssid = self.identity.ap_ssid().to_string();
        let ap_ip = ap.ip.to_string();
        {
            let mut state = self.state.lock().await;
            state.ip_addr = ap_ip.clone();
            state.ssid = ap_ssid.clone();
        }

        let settings = ApSettings {
            ssid: ap_ssid.clone(),
            password: ap.password.clone(),
            ip: ap.ip,
            gateway: ap.gateway,
            subnet: ap.subnet,
        };
        self.driver.start_soft_ap(&settings).await?;
        self.hooks.ap_open(&ap_ssid, &ap_ip);

        Ok(StartOutcome::AccessPoint {
            ssid: ap_ssid,
            ip: ap_ip,
        })
    }

    /// Restarts the device after `reboot_delay`, leaving time for the
    /// response in flight to be flushed.
    pub fn schedule_restart(&self) {
        let updater = self.updater.clone();
        let delay = self.config.http.reboot_delay;
        tokio::spawn(async move {
            sleep(delay).await;
            tracing::info!("Rebooting...");
            if let Err(e) = updater.restart().await {
                tracing::error!("Restart failed: {}", e);
            }
        });
    }
}

impl std::fmt::Debug for WifiManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WifiManager")
            .field("identity", &self.identity)
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::mock::{MockMdns, MockNetwork, MockUpdater, MockWifi};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn test_config() -> ManagerConfig {
        let mut config = ManagerConfig::default();
        config.station.max_retry_times = 4;
        config
    }

    async fn manager_with(wifi: Arc<MockWifi>, config: ManagerConfig) -> WifiManager {
        WifiManager::new(
            wifi,
            Arc::new(MockUpdater::new()),
            Arc::new(MockMdns::new()),
            config,
        )
        .await
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn connect_with_valid_credentials_records_ip() {
        let wifi = Arc::new(MockWifi::new().with_link_delay(2));
        let manager = manager_with(wifi.clone(), test_config()).await;
        manager.specify_wifi("MyHomeWiFi", "correct-horse").await;

        assert!(manager.connect(false).await);
        assert!(manager.is_connected().await);
        assert_eq!(manager.ip_addr().await, MockWifi::STATION_IP.to_string());
    }

    #[tokio::test(start_paused = true)]
    async fn connect_gives_up_after_retry_bound() {
        let wifi = Arc::new(MockWifi::new().with_link_delay(100));
        let manager = manager_with(wifi.clone(), test_config()).await;
        manager.specify_wifi("MyHomeWiFi", "correct-horse").await;

        let started = tokio::time::Instant::now();
        assert!(!manager.connect(false).await);
        assert!(!manager.is_connected().await);
        // max_retry_times + 1 delays of 500 ms
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(2500), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(3000), "{elapsed:?}");
        assert_eq!(wifi.status_polls().await, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn wrong_password_fails() {
        let wifi = Arc::new(MockWifi::new());
        let manager = manager_with(wifi, test_config()).await;
        manager.specify_wifi("MyHomeWiFi", "nope").await;

        assert!(!manager.connect(false).await);
        assert_eq!(manager.ip_addr().await, "");
    }

    #[tokio::test(start_paused = true)]
    async fn auto_connect_takes_ssid_from_driver() {
        let wifi = Arc::new(MockWifi::new().with_saved("CafeGuest", ""));
        let manager = manager_with(wifi, test_config()).await;

        assert!(manager.connect(true).await);
        assert_eq!(manager.net_info().await.ssid, "CafeGuest");
    }

    #[tokio::test(start_paused = true)]
    async fn hooks_fire_around_attempt() {
        let wifi = Arc::new(MockWifi::new());
        let mut manager = manager_with(wifi, test_config()).await;

        let before = Arc::new(AtomicUsize::new(0));
        let outcome = Arc::new(std::sync::Mutex::new(None));
        {
            let before = before.clone();
            manager.hooks_mut().set_on_connect(move || {
                before.fetch_add(1, Ordering::SeqCst);
            });
            let outcome = outcome.clone();
            manager.hooks_mut().set_on_after_connect(move |ok| {
                *outcome.lock().unwrap() = Some(ok);
            });
        }
        manager.specify_wifi("Nowhere", "x").await;

        assert!(!manager.connect(false).await);
        assert_eq!(before.load(Ordering::SeqCst), 1);
        assert_eq!(*outcome.lock().unwrap(), Some(false));
    }

    #[tokio::test(start_paused = true)]
    async fn scan_skips_hidden_networks_and_replaces_list() {
        let wifi = Arc::new(MockWifi::new().with_networks(vec![
            MockNetwork::new("Alpha", "pw", -40),
            MockNetwork::new("", "", -60),
            MockNetwork::new("Beta", "", -70),
        ]));
        let mut manager = manager_with(wifi.clone(), test_config()).await;

        let scans = Arc::new(AtomicUsize::new(0));
        let scans_after = Arc::new(AtomicUsize::new(0));
        {
            let scans = scans.clone();
            manager.hooks_mut().set_on_scan(move || {
                scans.fetch_add(1, Ordering::SeqCst);
            });
            let scans = scans_after.clone();
            manager.hooks_mut().set_on_after_scan(move || {
                scans.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(manager.scan().await, vec!["Alpha", "Beta"]);

        wifi.set_networks(vec![MockNetwork::new("Gamma", "", -50)]).await;
        assert_eq!(manager.scan().await, vec!["Gamma"]);
        assert_eq!(manager.networks().await, vec!["Gamma"]);
        assert_eq!(scans.load(Ordering::SeqCst), 2);
        assert_eq!(scans_after.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn net_info_reflects_state() {
        let wifi = Arc::new(MockWifi::new().with_mac("24:6F:28:A1:B2:C3"));
        let manager = manager_with(wifi, test_config()).await;

        let info = manager.net_info().await;
        assert_eq!(
            info,
            NetInfo {
                ssid: String::new(),
                ip_addr: String::new(),
                mac_addr: "24:6F:28:A1:B2:C3".to_string(),
                is_connected: false,
            }
        );

        manager.specify_wifi("MyHomeWiFi", "correct-horse").await;
        manager.connect(false).await;
        let info = manager.net_info().await;
        assert_eq!(info.ssid, "MyHomeWiFi");
        assert!(info.is_connected);
        assert_eq!(
            serde_json::to_value(&info).unwrap(),
            serde_json::json!({
                "ssid": "MyHomeWiFi",
                "ipaddr": MockWifi::STATION_IP.to_string(),
                "macaddr": "24:6F:28:A1:B2:C3",
                "isConnect": true,
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn start_connects_without_opening_ap() {
        let wifi = Arc::new(MockWifi::new());
        let mut config = test_config();
        config.station.ssid = Some("MyHomeWiFi".to_string());
        config.station.password = "correct-horse".to_string();
        let manager = manager_with(wifi.clone(), config).await;

        let outcome = manager.start().await.unwrap();
        assert_eq!(
            outcome,
            StartOutcome::Connected {
                ssid: "MyHomeWiFi".to_string(),
                ip: MockWifi::STATION_IP.to_string(),
            }
        );
        assert!(wifi.soft_ap().await.is_none());
        assert!(wifi.auto_reconnect().await);
    }

    #[tokio::test(start_paused = true)]
    async fn start_falls_back_to_access_point() {
        let wifi = Arc::new(MockWifi::new().with_mac("24:6F:28:A1:B2:C3"));
        let mdns = Arc::new(MockMdns::new());
        let mut manager = WifiManager::new(
            wifi.clone(),
            Arc::new(MockUpdater::new()),
            mdns.clone(),
            test_config(),
        )
        .await
        .unwrap();

        let opened = Arc::new(std::sync::Mutex::new(None));
        {
            let opened = opened.clone();
            manager.hooks_mut().set_on_ap_open(move |ssid, ip| {
                *opened.lock().unwrap() = Some((ssid.to_string(), ip.to_string()));
            });
        }

        // 没有保存的凭据，自动连接必然失败
        let outcome = manager.start().await.unwrap();
        assert_eq!(
            outcome,
            StartOutcome::AccessPoint {
                ssid: "ESP-246F".to_string(),
                ip: "192.168.4.1".to_string(),
            }
        );

        let ap = wifi.soft_ap().await.unwrap();
        assert_eq!(ap.ssid, "ESP-246F");
        assert_eq!(ap.password, None);
        assert_eq!(ap.subnet, std::net::Ipv4Addr::new(255, 255, 255, 0));
        assert_eq!(
            *opened.lock().unwrap(),
            Some(("ESP-246F".to_string(), "192.168.4.1".to_string()))
        );
        assert_eq!(mdns.announced().await, vec![("ESP-246F".to_string(), 80)]);

        let info = manager.net_info().await;
        assert_eq!(info.ssid, "ESP-246F");
        assert_eq!(info.ip_addr, "192.168.4.1");
        assert!(!info.is_connected);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_reconfigure_keeps_previous_credentials() {
        let wifi = Arc::new(MockWifi::new());
        let manager = Arc::new(manager_with(wifi, test_config()).await);
        manager.specify_wifi("OldNet", "old-pass").await;

        let outcome = manager
            .reconfigure("MyHomeWiFi".to_string(), "wrong".to_string())
            .await;
        assert_eq!(outcome, ReconfigureOutcome::Failed);

        let state = manager.state.lock().await;
        assert_eq!(state.ssid, "OldNet");
        assert_eq!(state.password, "old-pass");
        assert!(!state.connected);
    }

    #[tokio::test(start_paused = true)]
    async fn successful_reconfigure_shuts_ap_later() {
        let wifi = Arc::new(MockWifi::new());
        let manager = Arc::new(manager_with(wifi.clone(), test_config()).await);
        manager.start().await.unwrap();
        assert!(wifi.soft_ap().await.is_some());

        let outcome = manager
            .reconfigure("MyHomeWiFi".to_string(), "correct-horse".to_string())
            .await;
        assert_eq!(outcome, ReconfigureOutcome::Connected);
        assert!(wifi.soft_ap().await.is_some());

        sleep(Duration::from_secs(301)).await;
        assert!(wifi.soft_ap().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn reconfigure_while_connected_is_pending() {
        let wifi = Arc::new(MockWifi::new());
        let manager = Arc::new(manager_with(wifi.clone(), test_config()).await);
        manager.specify_wifi("MyHomeWiFi", "correct-horse").await;
        assert!(manager.connect(false).await);

        let outcome = manager
            .reconfigure("CafeGuest".to_string(), String::new())
            .await;
        assert_eq!(outcome, ReconfigureOutcome::Pending);

        sleep(Duration::from_secs(10)).await;
        assert_eq!(wifi.disconnect_count().await, 1);
        assert!(manager.is_connected().await);
        assert_eq!(manager.net_info().await.ssid, "CafeGuest");
    }

    #[tokio::test(start_paused = true)]
    async fn pending_reconfigure_failure_restores_credentials() {
        let wifi = Arc::new(MockWifi::new());
        let manager = Arc::new(manager_with(wifi.clone(), test_config()).await);
        manager.specify_wifi("MyHomeWiFi", "correct-horse").await;
        assert!(manager.connect(false).await);

        let outcome = manager
            .reconfigure("Nowhere".to_string(), "x".to_string())
            .await;
        assert_eq!(outcome, ReconfigureOutcome::Pending);

        sleep(Duration::from_secs(10)).await;
        assert!(!manager.is_connected().await);
        assert_eq!(manager.net_info().await.ssid, "MyHomeWiFi");
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_reconfigures_do_not_clobber_each_other() {
        let wifi = Arc::new(MockWifi::new());
        let manager = Arc::new(manager_with(wifi, test_config()).await);
        manager.specify_wifi("MyHomeWiFi", "correct-horse").await;

        let first = {
            let manager = manager.clone();
            tokio::spawn(async move {
                manager
                    .reconfigure("Nowhere".to_string(), "x".to_string())
                    .await
            })
        };
        // 第一个请求正在轮询时到达
        sleep(Duration::from_millis(100)).await;
        let second = {
            let manager = manager.clone();
            tokio::spawn(async move {
                manager
                    .reconfigure("CafeGuest".to_string(), String::new())
                    .await
            })
        };

        assert_eq!(first.await.unwrap(), ReconfigureOutcome::Failed);
        assert_eq!(second.await.unwrap(), ReconfigureOutcome::Connected);

        let state = manager.state.lock().await;
        assert_eq!(state.ssid, "CafeGuest");
        assert_eq!(state.password, "");
        assert!(state.connected);
    }

    #[tokio::test(start_paused = true)]
    async fn reconfigure_during_settle_delay_waits_its_turn() {
        let wifi = Arc::new(MockWifi::new());
        let manager = Arc::new(manager_with(wifi.clone(), test_config()).await);
        manager.specify_wifi("MyHomeWiFi", "correct-horse").await;
        assert!(manager.connect(false).await);

        let outcome = manager
            .reconfigure("CafeGuest".to_string(), String::new())
            .await;
        assert_eq!(outcome, ReconfigureOutcome::Pending);

        // 仍在 reconnect_settle 等待期内
        sleep(Duration::from_millis(200)).await;
        let second = {
            let manager = manager.clone();
            tokio::spawn(async move {
                manager
                    .reconfigure("Neighbor's Network".to_string(), "letmein".to_string())
                    .await
            })
        };

        // 前一次切换完成后才轮到它，此时设备在线，所以同样是 Pending
        assert_eq!(second.await.unwrap(), ReconfigureOutcome::Pending);

        sleep(Duration::from_secs(10)).await;
        assert_eq!(wifi.disconnect_count().await, 2);
        assert!(manager.is_connected().await);
        assert_eq!(manager.net_info().await.ssid, "Neighbor's Network");
    }

    #[tokio::test(start_paused = true)]
    async fn schedule_restart_waits_for_delay() {
        let wifi = Arc::new(MockWifi::new());
        let updater = Arc::new(MockUpdater::new());
        let manager = WifiManager::new(
            wifi,
            updater.clone(),
            Arc::new(MockMdns::new()),
            test_config(),
        )
        .await
        .unwrap();

        manager.schedule_restart();
        sleep(Duration::from_millis(100)).await;
        assert_eq!(updater.restart_count().await, 0);
        sleep(Duration::from_secs(1)).await;
        assert_eq!(updater.restart_count().await, 1);
    }
}
