//! Mock adapters for integration tests.
//!
//! Every port records what the service asked of it so tests can assert on
//! the full call history without touching LEDC, RMT, NVS or the radio.

#![allow(dead_code)]

use std::collections::VecDeque;

use yiodock::app::events::AppEvent;
use yiodock::app::ports::{
    AdvertiseError, AdvertisePort, ConfigError, ConfigPort, ConnectivityError, ConnectivityEvent,
    ConnectivityPort, DockPorts, EventSink, IrPort, LedPort, SystemPort,
};
use yiodock::app::service::DockService;
use yiodock::config::{DockConfig, WifiCredentials};
use yiodock::ir::{Capture, IrError, RawCode};
use yiodock::rpc::auth::Endpoint;
use yiodock::rpc::engine::ResponseFrame;

pub const HOSTNAME: &str = "YIO-Dock-DEADBEEFCAFE";

// ── LED ───────────────────────────────────────────────────────

pub struct MockLed {
    pub max: u8,
    pub off_calls: u32,
}

impl LedPort for MockLed {
    fn set_max_brightness(&mut self, brightness: u8) {
        self.max = brightness.max(yiodock::config::MIN_BRIGHTNESS);
    }

    fn max_brightness(&self) -> u8 {
        self.max
    }

    fn off(&mut self) {
        self.off_calls += 1;
    }
}

// ── IR ────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockIr {
    pub sent: Vec<RawCode>,
    pub receiving: bool,
    pub captures: VecDeque<Capture>,
    pub fail_transmit: bool,
}

impl IrPort for MockIr {
    fn transmit(&mut self, code: &RawCode) -> Result<(), IrError> {
        if self.fail_transmit {
            return Err(IrError::TransmitFailed(-1));
        }
        self.sent.push(code.clone());
        Ok(())
    }

    fn set_receiving(&mut self, enabled: bool) {
        self.receiving = enabled;
    }

    fn poll_capture(&mut self) -> Option<Capture> {
        self.captures.pop_front()
    }
}

// ── Config ────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockConfig {
    pub config: DockConfig,
    pub credentials: Option<WifiCredentials>,
    pub saves: u32,
    pub erased: bool,
    pub fail_saves: bool,
}

impl ConfigPort for MockConfig {
    fn load(&self) -> Result<DockConfig, ConfigError> {
        Ok(self.config.clone())
    }

    fn save(&mut self, config: &DockConfig) -> Result<(), ConfigError> {
        if self.fail_saves {
            return Err(ConfigError::ValidationFailed("mock refuses saves"));
        }
        self.config = config.clone();
        self.saves += 1;
        Ok(())
    }

    fn load_credentials(&self) -> Result<Option<WifiCredentials>, ConfigError> {
        Ok(self.credentials.clone())
    }

    fn save_credentials(&mut self, credentials: &WifiCredentials) -> Result<(), ConfigError> {
        if self.fail_saves {
            return Err(ConfigError::ValidationFailed("mock refuses saves"));
        }
        self.credentials = Some(credentials.clone());
        Ok(())
    }

    fn erase_all(&mut self) -> Result<(), ConfigError> {
        self.config = DockConfig::default();
        self.credentials = None;
        self.erased = true;
        Ok(())
    }
}

// ── WiFi ──────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockWifi {
    pub credentials: Option<WifiCredentials>,
    pub connect_calls: u32,
    pub disconnect_calls: u32,
    pub connected: bool,
    pub events: VecDeque<ConnectivityEvent>,
}

impl ConnectivityPort for MockWifi {
    fn set_credentials(&mut self, credentials: &WifiCredentials) -> Result<(), ConnectivityError> {
        if credentials.ssid.is_empty() {
            return Err(ConnectivityError::InvalidSsid);
        }
        self.credentials = Some(credentials.clone());
        Ok(())
    }

    fn connect(&mut self) -> Result<(), ConnectivityError> {
        if self.credentials.is_none() {
            return Err(ConnectivityError::NoCredentials);
        }
        self.connect_calls += 1;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.disconnect_calls += 1;
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn poll(&mut self, _now_ms: u64) -> Option<ConnectivityEvent> {
        let event = self.events.pop_front()?;
        self.connected = event == ConnectivityEvent::Connected;
        Some(event)
    }
}

// ── mDNS ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertised {
    pub hostname: String,
    pub friendly_name: String,
    pub api_port: u16,
    pub ota_port: u16,
}

#[derive(Default)]
pub struct MockAdvertise {
    pub started: Option<Advertised>,
    pub renames: Vec<String>,
    pub fail_start: bool,
}

impl AdvertisePort for MockAdvertise {
    fn start(
        &mut self,
        hostname: &str,
        friendly_name: &str,
        api_port: u16,
        ota_port: u16,
    ) -> Result<(), AdvertiseError> {
        if self.fail_start {
            return Err(AdvertiseError::InitFailed(-1));
        }
        self.started = Some(Advertised {
            hostname: hostname.into(),
            friendly_name: friendly_name.into(),
            api_port,
            ota_port,
        });
        Ok(())
    }

    fn set_friendly_name(&mut self, name: &str) -> Result<(), AdvertiseError> {
        if self.started.is_none() {
            return Err(AdvertiseError::NotStarted);
        }
        self.renames.push(name.into());
        Ok(())
    }
}

// ── System ────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockSystem {
    pub restart_in: Option<u32>,
    pub requests: u32,
}

impl SystemPort for MockSystem {
    fn schedule_restart(&mut self, delay_ms: u32) {
        self.requests += 1;
        self.restart_in = Some(delay_ms);
    }

    fn restart_pending(&self) -> bool {
        self.restart_in.is_some()
    }
}

// ── Event sink ────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Bundle ────────────────────────────────────────────────────

pub struct Mocks {
    pub led: MockLed,
    pub ir: MockIr,
    pub config: MockConfig,
    pub wifi: MockWifi,
    pub advertise: MockAdvertise,
    pub system: MockSystem,
    pub sink: RecordingSink,
}

impl Mocks {
    pub fn new() -> Self {
        Self {
            led: MockLed { max: 50, off_calls: 0 },
            ir: MockIr::default(),
            config: MockConfig::default(),
            wifi: MockWifi::default(),
            advertise: MockAdvertise::default(),
            system: MockSystem::default(),
            sink: RecordingSink::default(),
        }
    }

    pub fn ports(&mut self) -> DockPorts<'_> {
        DockPorts {
            led: &mut self.led,
            ir: &mut self.ir,
            config: &mut self.config,
            connectivity: &mut self.wifi,
            advertise: &mut self.advertise,
            system: &mut self.system,
            sink: &mut self.sink,
        }
    }
}

impl Default for Mocks {
    fn default() -> Self {
        Self::new()
    }
}

/// Service plus mocks, with one helper per main-loop input.
pub struct Rig {
    pub service: DockService,
    pub mocks: Mocks,
}

impl Rig {
    /// Started service with default config, not charging, no credentials.
    pub fn new() -> Self {
        Self::with_config(DockConfig::default(), None)
    }

    pub fn with_config(config: DockConfig, credentials: Option<WifiCredentials>) -> Self {
        let mut mocks = Mocks::new();
        mocks.config.config = config.clone();
        mocks.config.credentials = credentials;
        let mut service = DockService::new(config, HOSTNAME);
        service.start(false, &mut mocks.ports());
        Self { service, mocks }
    }

    pub fn connect(&mut self, endpoint: Endpoint) -> Option<ResponseFrame> {
        self.service.on_connect(endpoint)
    }

    pub fn disconnect(&mut self, endpoint: Endpoint) {
        self.service.on_disconnect(endpoint);
    }

    pub fn send(&mut self, endpoint: Endpoint, text: &str) -> Vec<ResponseFrame> {
        let mut ports = self.mocks.ports();
        self.service.handle_frame(endpoint, text.as_bytes(), &mut ports)
    }

    /// Send and return the reply texts only.
    pub fn send_texts(&mut self, endpoint: Endpoint, text: &str) -> Vec<String> {
        self.send(endpoint, text).into_iter().map(|f| f.text).collect()
    }

    /// Connect a websocket client and authenticate it with the default token.
    pub fn authorized_ws(&mut self, id: i32) -> Endpoint {
        let ws = Endpoint::websocket(id);
        self.connect(ws);
        let token = self.service.config().api_token.clone();
        let replies = self.send_texts(ws, &format!(r#"{{"type":"auth","token":"{}"}}"#, token));
        assert_eq!(replies, [r#"{"type":"auth_ok"}"#]);
        ws
    }

    pub fn hardware(&mut self, event: yiodock::app::commands::HardwareEvent) {
        let mut ports = self.mocks.ports();
        self.service.on_hardware_event(event, &mut ports);
    }

    pub fn connectivity(&mut self, event: ConnectivityEvent) {
        let mut ports = self.mocks.ports();
        self.service.on_connectivity_event(event, &mut ports);
    }

    pub fn captured(&mut self, durations: Vec<u32>) -> Vec<ResponseFrame> {
        let mut ports = self.mocks.ports();
        self.service.on_ir_captured(&Capture::new(durations), &mut ports)
    }

    pub fn led_sequence_done(&mut self) {
        let mut ports = self.mocks.ports();
        self.service.on_led_sequence_done(&mut ports);
    }

    pub fn events(&self) -> &[AppEvent] {
        &self.mocks.sink.events
    }
}

impl Default for Rig {
    fn default() -> Self {
        Self::new()
    }
}
