//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements both [`ConfigPort`] and [`StoragePort`] for the dock.
//!
//! | Namespace | Key        | Content                          |
//! |-----------|------------|----------------------------------|
//! | `general` | `dockcfg`  | postcard blob of [`DockConfig`]  |
//! | `wifi`    | `ssid`     | station SSID (UTF-8)             |
//! | `wifi`    | `password` | station password (UTF-8)         |
//!
//! - Config validation: all fields are range-checked before persistence.
//! - A missing or corrupt config blob loads as defaults with a warning.
//! - Atomic writes: ESP-IDF NVS commits are atomic per `nvs_commit()`.

use log::{info, warn};

use crate::app::ports::{ConfigError, ConfigPort, StorageError, StoragePort};
use crate::config::{DockConfig, MIN_BRIGHTNESS, PASSWORD_MAX, SSID_MAX, WifiCredentials};

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

pub const CONFIG_NAMESPACE: &str = "general";
pub const WIFI_NAMESPACE: &str = "wifi";

const CONFIG_KEY: &str = "dockcfg";
const SSID_KEY: &str = "ssid";
const PASSWORD_KEY: &str = "password";

const MAX_BLOB_SIZE: usize = 512;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: HashMap<String, Vec<u8>>,
}

impl NvsAdapter {
    /// Create a new NvsAdapter and initialise NVS flash.
    ///
    /// On first boot or after a version mismatch the NVS partition is
    /// erased and re-initialised automatically.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: nvs_flash_init / nvs_flash_erase are called from the
            // single main-task context before any concurrent NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES as i32 || ret == ESP_ERR_NVS_NEW_VERSION_FOUND as i32 {
                warn!("NVS: erasing and re-initialising flash partition");
                Self::erase_flash().map_err(ConfigError::Storage)?;
            } else if ret != ESP_OK as i32 {
                return Err(ConfigError::Storage(StorageError::IoError));
            }
            info!("NVS: ESP-IDF flash initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NVS: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: HashMap::new(),
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{}::{}", namespace, key)
    }

    fn read_string<const N: usize>(
        &self,
        namespace: &str,
        key: &str,
    ) -> Result<Option<heapless::String<N>>, ConfigError> {
        let mut buf = [0u8; 128];
        let len = match self.read(namespace, key, &mut buf) {
            Ok(len) => len,
            Err(StorageError::NotFound) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let text = core::str::from_utf8(&buf[..len]).map_err(|_| ConfigError::Corrupted)?;
        let mut out = heapless::String::new();
        out.push_str(text).map_err(|_| ConfigError::Corrupted)?;
        Ok(Some(out))
    }

    /// Null-terminated copy of an NVS name (max 15 chars).
    #[cfg(target_os = "espidf")]
    fn c_name(name: &str) -> [u8; 16] {
        let mut buf = [0u8; 16];
        let bytes = name.as_bytes();
        let len = bytes.len().min(15);
        buf[..len].copy_from_slice(&bytes[..len]);
        buf
    }

    /// Open an NVS namespace, execute a closure with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(namespace: &str, write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let ns = Self::c_name(namespace);
        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        // SAFETY: `ns` is null-terminated and outlives the call.
        let ret = unsafe { nvs_open(ns.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK as i32 {
            return Err(ret);
        }

        let result = f(handle);
        // SAFETY: handle was opened above and is closed exactly once.
        unsafe {
            nvs_close(handle);
        }
        result
    }

    #[cfg(target_os = "espidf")]
    fn erase_flash() -> Result<(), StorageError> {
        // SAFETY: main-task only; no NVS handle is open across this call.
        unsafe {
            if nvs_flash_erase() != ESP_OK as i32 {
                return Err(StorageError::IoError);
            }
            if nvs_flash_init() != ESP_OK as i32 {
                return Err(StorageError::IoError);
            }
        }
        Ok(())
    }
}

/// Range-check every persisted field.
pub fn validate_config(cfg: &DockConfig) -> Result<(), ConfigError> {
    if cfg.led_brightness < MIN_BRIGHTNESS {
        return Err(ConfigError::ValidationFailed("led_brightness must be 5–255"));
    }
    if cfg.api_token.is_empty() {
        return Err(ConfigError::ValidationFailed("api_token must not be empty"));
    }
    if cfg.api_port == 0 || cfg.ota_port == 0 {
        return Err(ConfigError::ValidationFailed("api_port and ota_port must be non-zero"));
    }
    if cfg.api_port == cfg.ota_port {
        return Err(ConfigError::ValidationFailed("api_port and ota_port must differ"));
    }
    if !(10..=5000).contains(&cfg.loop_interval_ms) {
        return Err(ConfigError::ValidationFailed("loop_interval_ms must be 10–5000"));
    }
    if cfg.restart_grace_ms > 10_000 {
        return Err(ConfigError::ValidationFailed("restart_grace_ms must be 0–10000"));
    }
    if !(1_000..=600_000).contains(&cfg.wifi_reconnect_interval_ms) {
        return Err(ConfigError::ValidationFailed(
            "wifi_reconnect_interval_ms must be 1000–600000",
        ));
    }
    if cfg.max_reconnect_attempts == 0 {
        return Err(ConfigError::ValidationFailed("max_reconnect_attempts must be >= 1"));
    }
    if cfg.mdns_refresh_interval_ms < 10_000 {
        return Err(ConfigError::ValidationFailed("mdns_refresh_interval_ms must be >= 10000"));
    }
    if cfg.reset_hold_min_ms >= cfg.reset_hold_max_ms {
        return Err(ConfigError::ValidationFailed(
            "reset_hold_min_ms must be < reset_hold_max_ms",
        ));
    }
    Ok(())
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<DockConfig, ConfigError> {
        let mut buf = [0u8; MAX_BLOB_SIZE];
        let len = match self.read(CONFIG_NAMESPACE, CONFIG_KEY, &mut buf) {
            Ok(len) => len,
            Err(StorageError::NotFound) => {
                info!("NVS: no stored config, using defaults");
                return Ok(DockConfig::default());
            }
            Err(e) => {
                warn!("NVS: config read error ({}), using defaults", e);
                return Ok(DockConfig::default());
            }
        };

        let mut cfg: DockConfig = match postcard::from_bytes(&buf[..len]) {
            Ok(cfg) => cfg,
            Err(_) => {
                warn!("NVS: stored config corrupted, using defaults");
                return Ok(DockConfig::default());
            }
        };
        cfg.led_brightness = cfg.effective_brightness();
        info!("NVS: loaded config ({} bytes)", len);
        Ok(cfg)
    }

    fn save(&mut self, config: &DockConfig) -> Result<(), ConfigError> {
        validate_config(config)?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::Corrupted)?;
        if bytes.len() > MAX_BLOB_SIZE {
            return Err(ConfigError::Storage(StorageError::Full));
        }
        self.write(CONFIG_NAMESPACE, CONFIG_KEY, &bytes)?;
        info!("NVS: config saved ({} bytes)", bytes.len());
        Ok(())
    }

    fn load_credentials(&self) -> Result<Option<WifiCredentials>, ConfigError> {
        let Some(ssid) = self.read_string::<SSID_MAX>(WIFI_NAMESPACE, SSID_KEY)? else {
            return Ok(None);
        };
        if ssid.is_empty() {
            return Ok(None);
        }
        let password = self
            .read_string::<PASSWORD_MAX>(WIFI_NAMESPACE, PASSWORD_KEY)?
            .unwrap_or_default();
        Ok(Some(WifiCredentials { ssid, password }))
    }

    fn save_credentials(&mut self, credentials: &WifiCredentials) -> Result<(), ConfigError> {
        if credentials.ssid.is_empty() {
            return Err(ConfigError::ValidationFailed("ssid must not be empty"));
        }
        self.write(WIFI_NAMESPACE, SSID_KEY, credentials.ssid.as_bytes())?;
        self.write(WIFI_NAMESPACE, PASSWORD_KEY, credentials.password.as_bytes())?;
        info!("NVS: credentials saved for '{}'", credentials.ssid);
        Ok(())
    }

    fn erase_all(&mut self) -> Result<(), ConfigError> {
        info!("NVS: resetting configuration");
        self.erase_namespace(CONFIG_NAMESPACE)?;
        self.erase_namespace(WIFI_NAMESPACE)?;

        #[cfg(target_os = "espidf")]
        Self::erase_flash()?;

        #[cfg(not(target_os = "espidf"))]
        self.store.clear();

        info!("NVS: flash erased");
        Ok(())
    }
}

impl StoragePort for NvsAdapter {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            match self.store.get(&Self::composite_key(namespace, key)) {
                Some(data) if data.len() > buf.len() => Err(StorageError::Full),
                Some(data) => {
                    buf[..data.len()].copy_from_slice(data);
                    Ok(data.len())
                }
                None => Err(StorageError::NotFound),
            }
        }

        #[cfg(target_os = "espidf")]
        {
            let key = Self::c_name(key);
            let result = Self::with_nvs_handle(namespace, false, |handle| {
                let mut size = buf.len();
                // SAFETY: buf is valid for `size` bytes; key is null-terminated.
                let ret = unsafe {
                    nvs_get_blob(handle, key.as_ptr() as *const _, buf.as_mut_ptr() as *mut _, &mut size)
                };
                if ret != ESP_OK as i32 {
                    return Err(ret);
                }
                Ok(size)
            });
            match result {
                Ok(size) => Ok(size),
                Err(e) if e == ESP_ERR_NVS_NOT_FOUND as i32 => Err(StorageError::NotFound),
                Err(e) if e == ESP_ERR_NVS_INVALID_LENGTH as i32 => Err(StorageError::Full),
                Err(_) => Err(StorageError::IoError),
            }
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            self.store.insert(Self::composite_key(namespace, key), data.to_vec());
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let key = Self::c_name(key);
            let result = Self::with_nvs_handle(namespace, true, |handle| {
                // SAFETY: data is valid for its length; key is null-terminated.
                let ret = unsafe {
                    nvs_set_blob(handle, key.as_ptr() as *const _, data.as_ptr() as *const _, data.len())
                };
                if ret != ESP_OK as i32 {
                    return Err(ret);
                }
                // SAFETY: handle is open for writing.
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK as i32 {
                    return Err(ret);
                }
                Ok(())
            });
            result.map_err(|e| {
                warn!("NVS: write error {}", e);
                if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE as i32 {
                    StorageError::Full
                } else {
                    StorageError::IoError
                }
            })
        }
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            self.store.remove(&Self::composite_key(namespace, key));
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let key = Self::c_name(key);
            let result = Self::with_nvs_handle(namespace, true, |handle| {
                // SAFETY: key is null-terminated.
                let ret = unsafe { nvs_erase_key(handle, key.as_ptr() as *const _) };
                if ret != ESP_OK as i32 && ret != ESP_ERR_NVS_NOT_FOUND as i32 {
                    return Err(ret);
                }
                // SAFETY: handle is open for writing.
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK as i32 {
                    return Err(ret);
                }
                Ok(())
            });
            result.map_err(|_| StorageError::IoError)
        }
    }

    fn erase_namespace(&mut self, namespace: &str) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let prefix = format!("{}::", namespace);
            self.store.retain(|k, _| !k.starts_with(&prefix));
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(namespace, true, |handle| {
                // SAFETY: handle is open for writing.
                let ret = unsafe { nvs_erase_all(handle) };
                if ret != ESP_OK as i32 {
                    return Err(ret);
                }
                // SAFETY: handle is open for writing.
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK as i32 {
                    return Err(ret);
                }
                Ok(())
            });
            match result {
                Ok(()) => Ok(()),
                // namespace never created: nothing to erase
                Err(e) if e == ESP_ERR_NVS_NOT_FOUND as i32 => Ok(()),
                Err(_) => Err(StorageError::IoError),
            }
        }
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        #[cfg(not(target_os = "espidf"))]
        {
            self.store.contains_key(&Self::composite_key(namespace, key))
        }

        #[cfg(target_os = "espidf")]
        {
            let key = Self::c_name(key);
            let result = Self::with_nvs_handle(namespace, false, |handle| {
                // SAFETY: key is null-terminated.
                let ret = unsafe {
                    nvs_find_key(handle, key.as_ptr() as *const _, core::ptr::null_mut())
                };
                Ok(ret == ESP_OK as i32)
            });
            result.unwrap_or(false)
        }
    }
}
