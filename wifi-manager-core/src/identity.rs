use crate::{Error, Result};

const NAME_PREFIX: &str = "ESP-";

/// Identity derived once from the hardware MAC address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    mac: String,
    short_id: String,
    ap_ssid: String,
}

impl DeviceIdentity {
    /// `mac` must be colon separated; the short id is the first two octets.
    /// Hex digits are uppercased whatever case the driver reports.
    pub fn from_mac(mac: &str) -> Result<Self> {
        let mac = mac.to_ascii_uppercase();
        let (first, second) = match (mac.get(0..2), mac.get(3..5)) {
            (Some(a), Some(b)) => (a, b),
            _ => return Err(Error::InvalidMac(mac.clone())),
        };
        let short_id = format!("{first}{second}");

        Ok(Self {
            ap_ssid: format!("{NAME_PREFIX}{short_id}"),
            short_id,
            mac,
        })
    }

    pub fn mac(&self) -> &str {
        &self.mac
    }

    pub fn short_id(&self) -> &str {
        &self.short_id
    }

    /// Default access-point SSID, also used as the mDNS hostname.
    pub fn ap_ssid(&self) -> &str {
        &self.ap_ssid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_names_from_leading_octets() {
        let id = DeviceIdentity::from_mac("24:6F:28:A1:B2:C3").unwrap();
        assert_eq!(id.mac(), "24:6F:28:A1:B2:C3");
        assert_eq!(id.short_id(), "246F");
        assert_eq!(id.ap_ssid(), "ESP-246F");
    }

    #[test]
    fn lowercase_mac_is_normalised() {
        let id = DeviceIdentity::from_mac("24:6f:28:a1:b2:c3").unwrap();
        assert_eq!(id.mac(), "24:6F:28:A1:B2:C3");
        assert_eq!(id.ap_ssid(), "ESP-246F");
    }

    #[test]
    fn rejects_truncated_mac() {
        assert!(matches!(
            DeviceIdentity::from_mac("24:6"),
            Err(Error::InvalidMac(_))
        ));
    }
}
