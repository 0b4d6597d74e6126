//! Optional callbacks fired around connection attempts, scans and the
//! access point opening.

type Hook = Box<dyn Fn() + Send + Sync>;
type ConnectedHook = Box<dyn Fn(bool) + Send + Sync>;
type ApOpenHook = Box<dyn Fn(&str, &str) + Send + Sync>;

#[derive(Default)]
pub struct Hooks {
    on_connect: Option<Hook>,
    on_after_connect: Option<ConnectedHook>,
    on_scan: Option<Hook>,
    on_after_scan: Option<Hook>,
    on_ap_open: Option<ApOpenHook>,
}

impl Hooks {
    pub fn set_on_connect(&mut self, f: impl Fn() + Send + Sync + 'static) {
        self.on_connect = Some(Box::new(f));
    }

    /// Receives whether the attempt ended connected.
    pub fn set_on_after_connect(&mut self, f: impl Fn(bool) + Send + Sync + 'static) {
        self.on_after_connect = Some(Box::new(f));
    }

    pub fn set_on_scan(&mut self, f: impl Fn() + Send + Sync + 'static) {
        self.on_scan = Some(Box::new(f));
    }

    pub fn set_on_after_scan(&mut self, f: impl Fn() + Send + Sync + 'static) {
        self.on_after_scan = Some(Box::new(f));
    }

    /// Receives the AP SSID and the AP IP address.
    pub fn set_on_ap_open(&mut self, f: impl Fn(&str, &str) + Send + Sync + 'static) {
        self.on_ap_open = Some(Box::new(f));
    }

    pub(crate) fn connect(&self) {
        if let Some(f) = &self.on_connect {
            f();
        }
    }

    pub(crate) fn after_connect(&self, connected: bool) {
        if let Some(f) = &self.on_after_connect {
            f(connected);
        }
    }

    pub(crate) fn scan(&self) {
        if let Some(f) = &self.on_scan {
            f();
        }
    }

    pub(crate) fn after_scan(&self) {
        if let Some(f) = &self.on_after_scan {
            f();
        }
    }

    pub(crate) fn ap_open(&self, ssid: &str, ip: &str) {
        if let Some(f) = &self.on_ap_open {
            f(ssid, ip);
        }
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("on_connect", &self.on_connect.is_some())
            .field("on_after_connect", &self.on_after_connect.is_some())
            .field("on_scan", &self.on_scan.is_some())
            .field("on_after_scan", &self.on_after_scan.is_some())
            .field("on_ap_open", &self.on_ap_open.is_some())
            .finish()
    }
}
