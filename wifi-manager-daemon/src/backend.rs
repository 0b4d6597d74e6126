// 基于特性在编译时选择平台实现

use std::sync::Arc;
use wifi_manager_core::config::ManagerConfig;
use wifi_manager_core::traits::{FirmwareUpdater, MdnsResponder, WifiDriver};

type Backend = (
    Arc<dyn WifiDriver>,
    Arc<dyn FirmwareUpdater>,
    Arc<dyn MdnsResponder>,
);

#[cfg(feature = "backend_wpa_cli")]
pub fn create(config: &ManagerConfig) -> Backend {
    use wifi_manager_core::backends::file_update::FileUpdater;
    use wifi_manager_core::backends::wpa_cli::{AvahiResponder, WpaCliDriver};

    tracing::info!("🚀 Using wpa_cli backend on {}", config.platform.interface_name);
    (
        Arc::new(WpaCliDriver::new(config.platform.clone())),
        Arc::new(FileUpdater::from_config(&config.platform)),
        Arc::new(AvahiResponder::new()),
    )
}

#[cfg(all(feature = "backend_mock", not(feature = "backend_wpa_cli")))]
pub fn create(_config: &ManagerConfig) -> Backend {
    use wifi_manager_core::backends::mock::{MockMdns, MockUpdater, MockWifi};

    tracing::info!("🚀 Using mock backend");
    (
        Arc::new(MockWifi::new()),
        Arc::new(MockUpdater::new()),
        Arc::new(MockMdns::new()),
    )
}

// 如果没有选择任何后端，编译失败
#[cfg(not(any(feature = "backend_mock", feature = "backend_wpa_cli")))]
compile_error!(
    "No backend feature selected. Please choose one, e.g., --features wifi-manager-daemon/backend_mock"
);
