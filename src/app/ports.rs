//! Port traits: the hexagonal boundary between the dock core and hardware.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ DockService (domain)
//! ```
//!
//! Adapters (LEDC, RMT, NVS, Wi-Fi, mDNS, restart timer) implement these
//! traits. The [`DockService`](super::service::DockService) receives them
//! bundled in [`DockPorts`] at each call, so the core never touches
//! hardware directly and every collaborator can be replaced by a mock.

use core::fmt;

use crate::config::{DockConfig, WifiCredentials};
use crate::ir::{Capture, IrError, RawCode};

// ───────────────────────────────────────────────────────────────
// LED port
// ───────────────────────────────────────────────────────────────

/// Status LED. The animation itself runs on its own thread; this port
/// only moves the shared brightness ceiling and forces the output off.
pub trait LedPort {
    /// Set the maximum brightness the animator may drive (5–255).
    fn set_max_brightness(&mut self, brightness: u8);

    fn max_brightness(&self) -> u8;

    /// Drive the output to zero immediately.
    fn off(&mut self);
}

// ───────────────────────────────────────────────────────────────
// IR port
// ───────────────────────────────────────────────────────────────

pub trait IrPort {
    /// Transmit carrier plus mark/space timings. Fire-and-forget.
    fn transmit(&mut self, code: &RawCode) -> Result<(), IrError>;

    /// Arm or disarm the receiver.
    fn set_receiving(&mut self, enabled: bool);

    /// Take the next completed capture, if any.
    fn poll_capture(&mut self) -> Option<Capture>;
}

// ───────────────────────────────────────────────────────────────
// Configuration port
// ───────────────────────────────────────────────────────────────

/// Loads and persists dock configuration and station credentials.
///
/// Implementations validate before persisting and reject out-of-range
/// values with [`ConfigError::ValidationFailed`].
pub trait ConfigPort {
    /// Load configuration. Returns [`DockConfig::default()`] if nothing is stored.
    fn load(&self) -> Result<DockConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&mut self, config: &DockConfig) -> Result<(), ConfigError>;

    /// Stored station credentials, if any.
    fn load_credentials(&self) -> Result<Option<WifiCredentials>, ConfigError>;

    fn save_credentials(&mut self, credentials: &WifiCredentials) -> Result<(), ConfigError>;

    /// Clear configuration and credentials and erase the flash partition.
    fn erase_all(&mut self) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port
// ───────────────────────────────────────────────────────────────

/// Namespaced key-value storage backing [`ConfigPort`].
///
/// Write operations MUST be atomic. The ESP-IDF NVS API guarantees this
/// natively; the in-memory simulation achieves it trivially.
pub trait StoragePort {
    /// Read a value. Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key. Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    /// Drop every key in a namespace.
    fn erase_namespace(&mut self, namespace: &str) -> Result<(), StorageError>;

    fn exists(&self, namespace: &str, key: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Connectivity port
// ───────────────────────────────────────────────────────────────

/// Station link changes reported by [`ConnectivityPort::poll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
    /// A (re)connect attempt started.
    Connecting,
    /// Associated and holding an address.
    Connected,
    /// Link lost.
    Disconnected,
    /// Too many failed reconnects; the dock should restart.
    GaveUp,
}

pub trait ConnectivityPort {
    fn set_credentials(&mut self, credentials: &WifiCredentials) -> Result<(), ConnectivityError>;

    /// Begin associating. Returns without waiting for the link.
    fn connect(&mut self) -> Result<(), ConnectivityError>;

    fn disconnect(&mut self);

    fn is_connected(&self) -> bool;

    /// Advance reconnect timers and report at most one link change.
    fn poll(&mut self, now_ms: u64) -> Option<ConnectivityEvent>;
}

// ───────────────────────────────────────────────────────────────
// Advertise port
// ───────────────────────────────────────────────────────────────

/// Service discovery (mDNS).
pub trait AdvertisePort {
    /// Register the API and OTA services under `hostname`.
    fn start(
        &mut self,
        hostname: &str,
        friendly_name: &str,
        api_port: u16,
        ota_port: u16,
    ) -> Result<(), AdvertiseError>;

    /// Update the `FriendlyName` TXT record.
    fn set_friendly_name(&mut self, name: &str) -> Result<(), AdvertiseError>;
}

// ───────────────────────────────────────────────────────────────
// System port
// ───────────────────────────────────────────────────────────────

pub trait SystemPort {
    /// Restart after `delay_ms`, giving queued replies time to leave.
    fn schedule_restart(&mut self, delay_ms: u32);

    fn restart_pending(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Event sink port
// ───────────────────────────────────────────────────────────────

/// The service emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Port bundle
// ───────────────────────────────────────────────────────────────

/// Every collaborator the service may touch while handling one input.
pub struct DockPorts<'a> {
    pub led: &'a mut dyn LedPort,
    pub ir: &'a mut dyn IrPort,
    pub config: &'a mut dyn ConfigPort,
    pub connectivity: &'a mut dyn ConnectivityPort,
    pub advertise: &'a mut dyn AdvertisePort,
    pub system: &'a mut dyn SystemPort,
    pub sink: &'a mut dyn EventSink,
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Underlying storage failed.
    Storage(StorageError),
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Storage partition is full.
    Full,
    /// Generic I/O error.
    IoError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityError {
    NoCredentials,
    InvalidSsid,
    InvalidPassword,
    ConnectionFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvertiseError {
    NotStarted,
    InitFailed(i32),
    UpdateFailed(i32),
}

impl From<StorageError> for ConfigError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::Storage(e) => write!(f, "storage: {}", e),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl fmt::Display for ConnectivityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no WiFi credentials configured"),
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 bytes)"),
            Self::InvalidPassword => write!(f, "password invalid (must be 8-64 bytes, or empty for open)"),
            Self::ConnectionFailed => write!(f, "WiFi connection failed"),
        }
    }
}

impl fmt::Display for AdvertiseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "mDNS not started"),
            Self::InitFailed(code) => write!(f, "mDNS init failed ({})", code),
            Self::UpdateFailed(code) => write!(f, "mDNS update failed ({})", code),
        }
    }
}
