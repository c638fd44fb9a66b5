//! WiFi station-mode adapter.
//!
//! Implements [`ConnectivityPort`]: the hexagonal boundary for network
//! connectivity.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: real ESP-IDF WiFi driver via `esp_idf_svc::wifi`.
//! - **all other targets**: simulated link for host-side tests.
//!
//! ## Reconnection policy
//!
//! While the link is down the adapter retries every
//! `wifi_reconnect_interval_ms` (30 s). The attempt that reaches
//! `max_reconnect_attempts` (5) reports [`ConnectivityEvent::GaveUp`]
//! instead, and the service schedules a restart.

use log::{info, warn};

use crate::app::ports::{ConnectivityError, ConnectivityEvent, ConnectivityPort};
use crate::config::{PASSWORD_MAX, SSID_MAX, WifiCredentials};

#[cfg(target_os = "espidf")]
use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi};

// ───────────────────────────────────────────────────────────────
// Reconnect policy
// ───────────────────────────────────────────────────────────────

/// Pure timing logic behind [`WifiAdapter::poll`].
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    interval_ms: u64,
    max_attempts: u8,
    attempts: u8,
    next_check_ms: Option<u64>,
    link_was_up: bool,
}

/// What the adapter should do after a policy step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectAction {
    Idle,
    /// Link came up.
    Connected,
    /// Link dropped.
    Lost,
    /// Tear down and associate again.
    Retry,
    /// Attempts exhausted.
    GiveUp,
}

impl ReconnectPolicy {
    pub fn new(interval_ms: u32, max_attempts: u8) -> Self {
        Self {
            interval_ms: u64::from(interval_ms),
            max_attempts: max_attempts.max(1),
            attempts: 0,
            next_check_ms: None,
            link_was_up: false,
        }
    }

    /// A fresh connect was requested; restart the grace period.
    pub fn reset(&mut self) {
        self.next_check_ms = None;
        self.link_was_up = false;
    }

    pub fn attempts(&self) -> u8 {
        self.attempts
    }

    pub fn step(&mut self, now_ms: u64, link_up: bool) -> ReconnectAction {
        if link_up {
            self.attempts = 0;
            self.next_check_ms = Some(now_ms + self.interval_ms);
            if !self.link_was_up {
                self.link_was_up = true;
                return ReconnectAction::Connected;
            }
            return ReconnectAction::Idle;
        }

        if self.link_was_up {
            self.link_was_up = false;
            // give the stack one interval to recover on its own
            self.next_check_ms = Some(now_ms + self.interval_ms);
            return ReconnectAction::Lost;
        }

        let Some(next) = self.next_check_ms else {
            self.next_check_ms = Some(now_ms + self.interval_ms);
            return ReconnectAction::Idle;
        };
        if now_ms < next {
            return ReconnectAction::Idle;
        }

        self.attempts += 1;
        self.next_check_ms = Some(now_ms + self.interval_ms);
        if self.attempts >= self.max_attempts {
            self.attempts = 0;
            return ReconnectAction::GiveUp;
        }
        ReconnectAction::Retry
    }
}

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn validate_ssid(ssid: &str) -> Result<(), ConnectivityError> {
    if ssid.is_empty() || ssid.len() > SSID_MAX {
        return Err(ConnectivityError::InvalidSsid);
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), ConnectivityError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > PASSWORD_MAX {
        return Err(ConnectivityError::InvalidPassword);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiAdapter {
    credentials: Option<WifiCredentials>,
    /// `connect()` was called and not cancelled by `disconnect()`.
    active: bool,
    policy: ReconnectPolicy,
    #[cfg(target_os = "espidf")]
    wifi: EspWifi<'static>,
    /// Simulation: whether an access point answers.
    #[cfg(not(target_os = "espidf"))]
    sim_ap_available: bool,
    #[cfg(not(target_os = "espidf"))]
    sim_link: bool,
}

impl WifiAdapter {
    #[cfg(target_os = "espidf")]
    pub fn new(mut wifi: EspWifi<'static>, hostname: &str, policy: ReconnectPolicy) -> Self {
        if let Err(e) = wifi.sta_netif_mut().set_hostname(hostname) {
            warn!("WiFi: hostname not set ({})", e);
        }
        Self {
            credentials: None,
            active: false,
            policy,
            wifi,
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            credentials: None,
            active: false,
            policy,
            sim_ap_available: true,
            sim_link: false,
        }
    }

    /// Simulation: make the access point reachable or not. Dropping it
    /// also drops an established link.
    #[cfg(not(target_os = "espidf"))]
    pub fn set_sim_ap_available(&mut self, available: bool) {
        self.sim_ap_available = available;
        if !available {
            self.sim_link = false;
        }
    }

    pub fn reconnect_attempts(&self) -> u8 {
        self.policy.attempts()
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self, creds: &WifiCredentials) -> Result<(), ConnectivityError> {
        let auth_method = if creds.password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        let config = Configuration::Client(ClientConfiguration {
            ssid: creds
                .ssid
                .as_str()
                .try_into()
                .map_err(|_| ConnectivityError::InvalidSsid)?,
            password: creds
                .password
                .as_str()
                .try_into()
                .map_err(|_| ConnectivityError::InvalidPassword)?,
            auth_method,
            ..Default::default()
        });

        self.wifi
            .set_configuration(&config)
            .and_then(|()| {
                if self.wifi.is_started().unwrap_or(false) {
                    Ok(())
                } else {
                    self.wifi.start()
                }
            })
            .and_then(|()| self.wifi.connect())
            .map_err(|e| {
                warn!("WiFi: driver error {}", e);
                ConnectivityError::ConnectionFailed
            })
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self, creds: &WifiCredentials) -> Result<(), ConnectivityError> {
        info!("WiFi(sim): associating with '{}'", creds.ssid);
        self.sim_link = self.sim_ap_available;
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_disconnect(&mut self) {
        if let Err(e) = self.wifi.disconnect() {
            warn!("WiFi: disconnect error {}", e);
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_disconnect(&mut self) {
        self.sim_link = false;
    }

    #[cfg(target_os = "espidf")]
    fn platform_is_connected(&self) -> bool {
        self.wifi.is_up().unwrap_or(false)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_is_connected(&self) -> bool {
        self.sim_link
    }
}

// ───────────────────────────────────────────────────────────────
// ConnectivityPort
// ───────────────────────────────────────────────────────────────

impl ConnectivityPort for WifiAdapter {
    fn set_credentials(&mut self, credentials: &WifiCredentials) -> Result<(), ConnectivityError> {
        validate_ssid(&credentials.ssid)?;
        validate_password(&credentials.password)?;
        self.credentials = Some(credentials.clone());
        info!("WiFi: credentials updated (SSID='{}')", credentials.ssid);
        Ok(())
    }

    fn connect(&mut self) -> Result<(), ConnectivityError> {
        let creds = self.credentials.clone().ok_or(ConnectivityError::NoCredentials)?;
        info!("WiFi: connecting to '{}'", creds.ssid);
        self.active = true;
        self.policy.reset();
        self.platform_connect(&creds)
    }

    fn disconnect(&mut self) {
        self.active = false;
        self.platform_disconnect();
        self.policy.reset();
        info!("WiFi: disconnected");
    }

    fn is_connected(&self) -> bool {
        self.platform_is_connected()
    }

    fn poll(&mut self, now_ms: u64) -> Option<ConnectivityEvent> {
        if !self.active {
            return None;
        }

        match self.policy.step(now_ms, self.platform_is_connected()) {
            ReconnectAction::Idle => None,
            ReconnectAction::Connected => {
                info!("WiFi: connected");
                Some(ConnectivityEvent::Connected)
            }
            ReconnectAction::Lost => {
                warn!("WiFi: connection lost");
                Some(ConnectivityEvent::Disconnected)
            }
            ReconnectAction::Retry => {
                info!("WiFi: reconnect attempt {}", self.policy.attempts());
                self.platform_disconnect();
                let creds = self.credentials.clone()?;
                if let Err(e) = self.platform_connect(&creds) {
                    warn!("WiFi: reconnect failed ({})", e);
                }
                Some(ConnectivityEvent::Connecting)
            }
            ReconnectAction::GiveUp => {
                warn!("WiFi: giving up after repeated failures");
                self.active = false;
                Some(ConnectivityEvent::GaveUp)
            }
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
