//! Parsers for `wpa_cli` output and small address helpers used by the Linux
//! backend. Kept free of I/O so they can be tested anywhere.

use crate::traits::{LinkStatus, ScanEntry};
use std::net::Ipv4Addr;

/// 将 wpa_supplicant 输出中的 `\xHH` 转义序列反转义回原始字节。
pub fn unescape_wpa_ssid(s: &str) -> Vec<u8> {
    fn hex_val(b: u8) -> Option<u8> {
        match b {
            b'0'..=b'9' => Some(b - b'0'),
            b'a'..=b'f' => Some(10 + b - b'a'),
            b'A'..=b'F' => Some(10 + b - b'A'),
            _ => None,
        }
    }

    let bs = s.as_bytes();
    let mut out = Vec::with_capacity(bs.len());
    let mut i = 0;
    while i < bs.len() {
        if bs[i] != b'\\' || i + 1 >= bs.len() {
            out.push(bs[i]);
            i += 1;
            continue;
        }
        match bs[i + 1] {
            b'x' | b'X' if i + 3 < bs.len() => {
                match (hex_val(bs[i + 2]), hex_val(bs[i + 3])) {
                    (Some(hi), Some(lo)) => {
                        out.push((hi << 4) | lo);
                        i += 4;
                    }
                    // 格式不正确，按字面量保留反斜杠
                    _ => {
                        out.push(b'\\');
                        i += 1;
                    }
                }
            }
            b'\\' => {
                out.push(b'\\');
                i += 2;
            }
            _ => {
                out.push(b'\\');
                i += 1;
            }
        }
    }

    out
}

/// Parses `wpa_cli scan_results`.
/// 格式: bssid / frequency / signal level / flags / ssid
///
/// Hidden networks come back with an empty SSID and are kept; filtering is
/// the manager's job.
pub fn parse_scan_results(output: &str) -> Vec<ScanEntry> {
    let mut entries = Vec::new();
    for line in output.lines().skip(1) {
        let parts: Vec<&str> = line.split('\t').collect();
        if parts.len() < 4 {
            continue;
        }

        let rssi: i16 = parts[2].trim().parse().unwrap_or(-100);
        let flags = parts[3];
        let ssid_bytes = unescape_wpa_ssid(parts.get(4).copied().unwrap_or(""));
        let ssid = String::from_utf8_lossy(&ssid_bytes)
            .trim_end_matches('\0')
            .to_string();

        let open = !(flags.contains("WPA") || flags.contains("WEP") || flags.contains("SAE"));

        entries.push(ScanEntry { ssid, rssi, open });
    }
    entries
}

/// Fields of `wpa_cli status` this crate cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WpaStatus {
    pub wpa_state: String,
    pub ssid: Option<String>,
    pub ip_address: Option<Ipv4Addr>,
    /// Set while the interface runs the soft AP network (`mode=AP`).
    pub ap_mode: bool,
}

impl WpaStatus {
    /// Associated and holding an address, the equivalent of a usable link.
    pub fn link_status(&self) -> LinkStatus {
        match self.wpa_state.as_str() {
            "COMPLETED" if self.ap_mode => LinkStatus::Idle,
            "COMPLETED" if self.ip_address.is_some() => LinkStatus::Connected,
            "COMPLETED" | "ASSOCIATED" | "ASSOCIATING" | "AUTHENTICATING"
            | "4WAY_HANDSHAKE" | "GROUP_HANDSHAKE" | "SCANNING" => LinkStatus::Connecting,
            "DISCONNECTED" => LinkStatus::Disconnected,
            _ => LinkStatus::Idle,
        }
    }
}

/// Parses `wpa_cli status` key=value lines.
pub fn parse_status(output: &str) -> WpaStatus {
    let mut status = WpaStatus::default();
    for line in output.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        match key.trim() {
            "wpa_state" => status.wpa_state = value.trim().to_string(),
            "ssid" => {
                let bytes = unescape_wpa_ssid(value.trim());
                status.ssid = Some(String::from_utf8_lossy(&bytes).to_string());
            }
            "ip_address" => status.ip_address = value.trim().parse().ok(),
            "mode" => status.ap_mode = value.trim() == "AP",
            _ => {}
        }
    }
    status
}

/// Quotes a WPA passphrase for `set_network psk`.
///
/// WPA-PSK passphrases are 8 to 63 printable ASCII characters. A `"` would
/// end the quoted value early, so it is refused as well.
pub fn quoted_passphrase(passphrase: &str) -> Option<String> {
    let valid_len = (8..=63).contains(&passphrase.len());
    let printable = passphrase
        .bytes()
        .all(|b| (0x20..=0x7e).contains(&b) && b != b'"');
    (valid_len && printable).then(|| format!("\"{}\"", passphrase))
}

/// `255.255.255.0` -> `24`. `None` for non-contiguous masks.
pub fn netmask_prefix_len(mask: Ipv4Addr) -> Option<u8> {
    let bits = u32::from(mask);
    let ones = bits.leading_ones();
    if bits.checked_shl(ones).unwrap_or(0) != 0 {
        return None;
    }
    u8::try_from(ones).ok()
}
