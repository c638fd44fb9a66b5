//! Dock identity derived from the WiFi station MAC address.
//!
//! The hostname is `YIO-Dock-` followed by the six MAC bytes in uppercase
//! hex, e.g. `YIO-Dock-A1B2C3D4E5F6`. It is:
//! - Deterministic across reboots (factory-burned eFuse MAC)
//! - Used as the DHCP/mDNS hostname and the Bluetooth device name
//! - The advertised friendly name until one is set

use core::fmt::Write;

use crate::app::service::Hostname;

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

pub const HOSTNAME_PREFIX: &str = "YIO-Dock-";

/// Read the station MAC address.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    // SAFETY: `mac` is a valid 6-byte buffer.
    let ret = unsafe {
        esp_idf_svc::sys::esp_read_mac(mac.as_mut_ptr(), esp_idf_svc::sys::esp_mac_type_t_ESP_MAC_WIFI_STA)
    };
    if ret != esp_idf_svc::sys::ESP_OK as i32 {
        log::warn!("device_id: esp_read_mac failed ({})", ret);
    }
    mac
}

/// Simulation: returns a deterministic fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
}

pub fn hostname(mac: &MacAddress) -> Hostname {
    let mut name = Hostname::new();
    // 9 + 12 chars always fit
    let _ = write!(
        name,
        "{}{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}",
        HOSTNAME_PREFIX, mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    );
    name
}
