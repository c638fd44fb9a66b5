//! System configuration parameters
//!
//! All tunable parameters for the dock. The persisted copy lives in NVS
//! (namespace `general`) as a postcard blob; Wi-Fi credentials are kept
//! separately in the `wifi` namespace.

use serde::{Deserialize, Serialize};

/// Lowest LED brightness the dock will drive.
pub const MIN_BRIGHTNESS: u8 = 5;
/// Brightness used when nothing (or zero) was stored.
pub const DEFAULT_BRIGHTNESS: u8 = 50;

pub const FRIENDLY_NAME_MAX: usize = 32;
pub const TOKEN_MAX: usize = 64;
pub const SSID_MAX: usize = 32;
pub const PASSWORD_MAX: usize = 64;

pub type FriendlyName = heapless::String<FRIENDLY_NAME_MAX>;
pub type ApiToken = heapless::String<TOKEN_MAX>;

/// Core dock configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockConfig {
    // --- LED ---
    /// Maximum status LED brightness (5-255). Zero means "not set".
    pub led_brightness: u8,

    // --- Identity ---
    /// Name advertised over mDNS. Empty means "use the hostname".
    pub friendly_name: FriendlyName,

    // --- API ---
    /// Shared static token websocket clients must present.
    pub api_token: ApiToken,
    /// WebSocket API port
    pub api_port: u16,
    /// Port announced for firmware updates
    pub ota_port: u16,
    /// Require an authorized session for Wi-Fi provisioning over websocket
    pub provisioning_requires_auth: bool,

    // --- Timing ---
    /// Main loop period (milliseconds)
    pub loop_interval_ms: u32,
    /// Delay between a restart request and the actual restart (milliseconds)
    pub restart_grace_ms: u32,
    /// Interval between reconnect attempts while offline (milliseconds)
    pub wifi_reconnect_interval_ms: u32,
    /// Failed reconnect attempts before the dock reboots
    pub max_reconnect_attempts: u8,
    /// Interval between mDNS re-announcements (milliseconds)
    pub mdns_refresh_interval_ms: u32,

    // --- Button ---
    /// Shortest hold that counts as a factory reset request (milliseconds)
    pub reset_hold_min_ms: u32,
    /// Longest hold that counts as a factory reset request (milliseconds)
    pub reset_hold_max_ms: u32,
}

impl DockConfig {
    /// Brightness to drive, never below [`MIN_BRIGHTNESS`].
    pub fn effective_brightness(&self) -> u8 {
        match self.led_brightness {
            0 => DEFAULT_BRIGHTNESS,
            b => b.max(MIN_BRIGHTNESS),
        }
    }

    /// Name to advertise: the stored friendly name, or `hostname` if unset.
    pub fn display_name<'a>(&'a self, hostname: &'a str) -> &'a str {
        if self.friendly_name.is_empty() {
            hostname
        } else {
            self.friendly_name.as_str()
        }
    }
}

impl Default for DockConfig {
    fn default() -> Self {
        let mut api_token = ApiToken::new();
        // "0" always fits in TOKEN_MAX
        let _ = api_token.push_str("0");

        Self {
            // LED
            led_brightness: DEFAULT_BRIGHTNESS,

            // Identity
            friendly_name: FriendlyName::new(),

            // API
            api_token,
            api_port: 946,
            ota_port: 3232,
            provisioning_requires_auth: false,

            // Timing
            loop_interval_ms: 100,              // 10 Hz
            restart_grace_ms: 2000,             // 2 s
            wifi_reconnect_interval_ms: 30_000, // 30 s
            max_reconnect_attempts: 5,
            mdns_refresh_interval_ms: 300_000, // 5 min

            // Button
            reset_hold_min_ms: 5_000,
            reset_hold_max_ms: 20_000,
        }
    }
}

/// Clamp a brightness value from the wire into the drivable range.
pub fn clamp_brightness(value: i64) -> u8 {
    value.clamp(i64::from(MIN_BRIGHTNESS), 255) as u8
}

/// Station credentials received through provisioning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiCredentials {
    pub ssid: heapless::String<SSID_MAX>,
    pub password: heapless::String<PASSWORD_MAX>,
}

impl WifiCredentials {
    /// Build credentials, returning `None` if either field is too long.
    pub fn new(ssid: &str, password: &str) -> Option<Self> {
        let mut s = heapless::String::new();
        s.push_str(ssid).ok()?;
        let mut p = heapless::String::new();
        p.push_str(password).ok()?;
        Some(Self { ssid: s, password: p })
    }
}
