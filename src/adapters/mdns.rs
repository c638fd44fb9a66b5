//! mDNS service advertisement adapter.
//!
//! Advertises the dock under its hostname with two services:
//!
//! | Service           | Port       | TXT                     |
//! |-------------------|------------|-------------------------|
//! | `_yio-dock-api`   | `api_port` | `FriendlyName=<name>`   |
//! | `_yio-dock-ota`   | `ota_port` | -                       |
//!
//! Uses raw ESP-IDF mDNS calls on target and is log-only in simulation.
//! Started when WiFi connects; [`MdnsAdapter::poll`] re-registers every
//! refresh interval so the announcement survives responder hiccups.

use log::{info, warn};

use crate::app::ports::{AdvertiseError, AdvertisePort};
use crate::app::service::Hostname;
use crate::config::FriendlyName;

pub const API_SERVICE: &str = "_yio-dock-api";
pub const OTA_SERVICE: &str = "_yio-dock-ota";
pub const SERVICE_PROTO: &str = "_tcp";
pub const FRIENDLY_NAME_TXT: &str = "FriendlyName";

/// mDNS advertisement adapter.
pub struct MdnsAdapter {
    hostname: Hostname,
    friendly_name: FriendlyName,
    api_port: u16,
    ota_port: u16,
    active: bool,
    refresh_interval_ms: u64,
    last_refresh_ms: u64,
    announcements: u32,
}

impl MdnsAdapter {
    pub fn new(refresh_interval_ms: u32) -> Self {
        Self {
            hostname: Hostname::new(),
            friendly_name: FriendlyName::new(),
            api_port: 0,
            ota_port: 0,
            active: false,
            refresh_interval_ms: u64::from(refresh_interval_ms),
            last_refresh_ms: 0,
            announcements: 0,
        }
    }

    /// Whether mDNS is currently advertising.
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn friendly_name(&self) -> &str {
        &self.friendly_name
    }

    /// Number of successful (re-)registrations.
    pub fn announcements(&self) -> u32 {
        self.announcements
    }

    /// Re-register when the refresh interval elapsed. Returns `true` when
    /// an announcement was made.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        if !self.active {
            self.last_refresh_ms = now_ms;
            return false;
        }
        if now_ms.saturating_sub(self.last_refresh_ms) < self.refresh_interval_ms {
            return false;
        }
        self.last_refresh_ms = now_ms;
        match self.register() {
            Ok(()) => {
                info!("mDNS: refreshed {}.local", self.hostname);
                true
            }
            Err(e) => {
                warn!("mDNS: refresh failed ({})", e);
                false
            }
        }
    }

    fn register(&mut self) -> Result<(), AdvertiseError> {
        self.platform_register()?;
        self.announcements += 1;
        Ok(())
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_register(&self) -> Result<(), AdvertiseError> {
        use esp_idf_svc::sys::*;

        let hostname = c_buf::<40>(&self.hostname);
        let api = c_buf::<16>(API_SERVICE);
        let ota = c_buf::<16>(OTA_SERVICE);
        let proto = c_buf::<8>(SERVICE_PROTO);

        // SAFETY: every pointer below is a null-terminated stack buffer that
        // outlives the call; mdns_* copies what it keeps.
        unsafe {
            mdns_free();
            let ret = mdns_init();
            if ret != ESP_OK as i32 {
                return Err(AdvertiseError::InitFailed(ret));
            }
            let ret = mdns_hostname_set(hostname.as_ptr() as *const _);
            if ret != ESP_OK as i32 {
                return Err(AdvertiseError::InitFailed(ret));
            }

            let ret = mdns_service_add(
                core::ptr::null(),
                ota.as_ptr() as *const _,
                proto.as_ptr() as *const _,
                self.ota_port,
                core::ptr::null_mut(),
                0,
            );
            if ret != ESP_OK as i32 {
                return Err(AdvertiseError::InitFailed(ret));
            }
            let ret = mdns_service_add(
                core::ptr::null(),
                api.as_ptr() as *const _,
                proto.as_ptr() as *const _,
                self.api_port,
                core::ptr::null_mut(),
                0,
            );
            if ret != ESP_OK as i32 {
                return Err(AdvertiseError::InitFailed(ret));
            }
        }

        self.platform_set_txt()
            .map_err(|e| match e {
                AdvertiseError::UpdateFailed(rc) => AdvertiseError::InitFailed(rc),
                other => other,
            })?;
        info!(
            "mDNS(espidf): registered {}.local api={} ota={}",
            self.hostname, self.api_port, self.ota_port
        );
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_set_txt(&self) -> Result<(), AdvertiseError> {
        use esp_idf_svc::sys::*;

        let api = c_buf::<16>(API_SERVICE);
        let proto = c_buf::<8>(SERVICE_PROTO);
        let key = c_buf::<16>(FRIENDLY_NAME_TXT);
        let value = c_buf::<40>(&self.friendly_name);
        // SAFETY: null-terminated stack buffers, copied by mdns.
        let ret = unsafe {
            mdns_service_txt_item_set(
                api.as_ptr() as *const _,
                proto.as_ptr() as *const _,
                key.as_ptr() as *const _,
                value.as_ptr() as *const _,
            )
        };
        if ret != ESP_OK as i32 {
            return Err(AdvertiseError::UpdateFailed(ret));
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_register(&self) -> Result<(), AdvertiseError> {
        info!(
            "mDNS(sim): registered {}.local {}:{} {}:{} {}={}",
            self.hostname,
            API_SERVICE,
            self.api_port,
            OTA_SERVICE,
            self.ota_port,
            FRIENDLY_NAME_TXT,
            self.friendly_name
        );
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_set_txt(&self) -> Result<(), AdvertiseError> {
        info!("mDNS(sim): {}={}", FRIENDLY_NAME_TXT, self.friendly_name);
        Ok(())
    }
}

/// Null-terminated, truncating copy of `s`.
#[cfg(target_os = "espidf")]
fn c_buf<const N: usize>(s: &str) -> [u8; N] {
    let mut buf = [0u8; N];
    let bytes = s.as_bytes();
    let len = bytes.len().min(N - 1);
    buf[..len].copy_from_slice(&bytes[..len]);
    buf
}

fn copy_truncated<const N: usize>(dst: &mut heapless::String<N>, src: &str) {
    dst.clear();
    for c in src.chars() {
        if dst.push(c).is_err() {
            break;
        }
    }
}

impl AdvertisePort for MdnsAdapter {
    fn start(
        &mut self,
        hostname: &str,
        friendly_name: &str,
        api_port: u16,
        ota_port: u16,
    ) -> Result<(), AdvertiseError> {
        copy_truncated(&mut self.hostname, hostname);
        copy_truncated(&mut self.friendly_name, friendly_name);
        self.api_port = api_port;
        self.ota_port = ota_port;

        self.register()?;
        self.active = true;
        info!("mDNS: advertising {}.local as '{}'", self.hostname, self.friendly_name);
        Ok(())
    }

    fn set_friendly_name(&mut self, name: &str) -> Result<(), AdvertiseError> {
        copy_truncated(&mut self.friendly_name, name);
        if !self.active {
            return Err(AdvertiseError::NotStarted);
        }
        self.platform_set_txt()
    }
}
