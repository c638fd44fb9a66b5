//! Dock service: the hexagonal core.
//!
//! [`DockService`] owns the state machine, the live configuration, the
//! protocol engine (and through it the session registry) and the IR
//! receive flag. It is constructed once at startup and driven by the main
//! loop; all I/O flows through the ports in [`DockPorts`].
//!
//! ```text
//!  frames ──▶ ┌────────────────────────┐ ──▶ ResponseFrames
//!             │      DockService       │
//!  hw events ▶│  FSM · Engine · Config │──▶ LedPort / IrPort / ConfigPort
//!             └────────────────────────┘     ConnectivityPort / AdvertisePort
//! ```

use log::{debug, error, info, warn};

use crate::config::{DockConfig, FriendlyName, WifiCredentials};
use crate::error::{CodecError, CommandError, Error};
use crate::fsm::{DeviceFsm, DeviceState, StateReader, Trigger};
use crate::ir::{self, Capture, IrError, format_capture};
use crate::rpc::auth::{Endpoint, EndpointId};
use crate::rpc::engine::{Action, AuthPolicy, ProtocolEngine, ResponseFrame};
use crate::rpc::messages::Reply;

use super::commands::{DockCommand, HardwareEvent, IrSendRequest};
use super::events::{AppEvent, RestartReason};
use super::ports::{ConnectivityEvent, DockPorts, EventSink};

/// Command name used in the provisioning reply.
const PROVISION_REPLY: &str = "provision";

/// Longest hostname the dock generates (`YIO-Dock-` + 12 hex digits).
pub type Hostname = heapless::String<32>;

/// Copy `hostname` into a [`Hostname`], keeping the longest prefix that
/// fits when it is too long.
fn bounded_hostname(hostname: &str) -> Hostname {
    Hostname::try_from(hostname).unwrap_or_else(|()| {
        warn!(
            "Hostname '{}' exceeds {} bytes, truncating",
            hostname,
            Hostname::new().capacity()
        );
        let mut name = Hostname::new();
        for c in hostname.chars() {
            if name.push(c).is_err() {
                break;
            }
        }
        name
    })
}

// ───────────────────────────────────────────────────────────────
// DockService
// ───────────────────────────────────────────────────────────────

pub struct DockService {
    fsm: DeviceFsm,
    config: DockConfig,
    hostname: Hostname,
    engine: ProtocolEngine,
    /// Forward captured IR signals to clients.
    ir_receiving: bool,
}

impl DockService {
    /// Construct the service. Starts in `Setup`; call [`start`](Self::start) next.
    pub fn new(config: DockConfig, hostname: &str) -> Self {
        Self {
            fsm: DeviceFsm::new(DeviceState::Setup),
            config,
            hostname: bounded_hostname(hostname),
            engine: ProtocolEngine::new(),
            ir_receiving: false,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Apply the stored brightness, reflect the charge pin read at boot and
    /// start associating if credentials are stored.
    pub fn start(&mut self, charging: bool, ports: &mut DockPorts<'_>) {
        ports.led.set_max_brightness(self.config.effective_brightness());
        ports.sink.emit(&AppEvent::Started(self.fsm.current()));
        info!("DockService started as {}", self.hostname);

        if charging {
            self.apply(Trigger::ChargePinAsserted, ports.sink);
        }

        match ports.config.load_credentials() {
            Ok(Some(creds)) => {
                self.connect_wifi(&creds, ports);
            }
            Ok(None) => info!("No WiFi credentials stored, waiting for provisioning"),
            Err(e) => warn!("Reading WiFi credentials failed: {}", e),
        }
    }

    // ── Transport input ───────────────────────────────────────

    pub fn on_connect(&mut self, endpoint: Endpoint) -> Option<ResponseFrame> {
        self.engine.on_connect(endpoint)
    }

    pub fn on_disconnect(&mut self, endpoint: Endpoint) {
        self.engine.on_disconnect(endpoint);
    }

    /// Drop websocket sessions whose connection is gone even though no
    /// disconnect arrived. Returns how many were dropped.
    pub fn prune_websockets(&mut self, is_open: impl Fn(EndpointId) -> bool) -> usize {
        let stale: Vec<Endpoint> = self
            .engine
            .sessions()
            .websockets()
            .filter(|e| !is_open(e.id))
            .collect();
        for &endpoint in &stale {
            warn!("RPC[{}]: connection gone without a disconnect, dropping session", endpoint);
            self.on_disconnect(endpoint);
        }
        stale.len()
    }

    /// Handle one complete frame and return the replies for its sender.
    pub fn handle_frame(
        &mut self,
        endpoint: Endpoint,
        frame: &[u8],
        ports: &mut DockPorts<'_>,
    ) -> Vec<ResponseFrame> {
        let policy = AuthPolicy {
            token: self.config.api_token.as_str(),
            provisioning_requires_auth: self.config.provisioning_requires_auth,
        };
        let Ok(request) = self.engine.dispatch(endpoint, frame, policy) else {
            return Vec::new();
        };

        let mut replies = Vec::new();

        if let Some(provision) = request.provision {
            let ok = self.provision(provision, ports);
            replies.extend(self.engine.respond(endpoint, &Reply::outcome(PROVISION_REPLY, ok)));
        }

        let reply = match request.action {
            Action::None => None,
            Action::Auth(Ok(())) => {
                ports.sink.emit(&AppEvent::Authenticated(endpoint));
                Some(Reply::auth_ok())
            }
            Action::Auth(Err(reason)) => {
                ports.sink.emit(&AppEvent::AuthRejected { endpoint, reason });
                Some(Reply::auth_error(reason))
            }
            Action::Reply(reply) => Some(reply),
            Action::Command(cmd) => self.execute(cmd, ports),
        };
        if let Some(reply) = reply {
            replies.extend(self.engine.respond(endpoint, &reply));
        }

        replies
    }

    // ── Command execution ─────────────────────────────────────

    /// Run an authorized dock command. Returns the reply, if the command has one.
    pub fn execute(&mut self, cmd: DockCommand, ports: &mut DockPorts<'_>) -> Option<Reply> {
        let name = cmd.name();
        debug!("Executing {}", name.as_str());
        match cmd {
            DockCommand::Ping => Some(Reply::pong()),

            DockCommand::LedBrightnessStart { brightness } => {
                self.apply(Trigger::LedSetupStart, ports.sink);
                if let Some(b) = brightness {
                    ports.led.set_max_brightness(b);
                }
                info!("LED brightness setup at {}", ports.led.max_brightness());
                None
            }

            DockCommand::LedBrightnessStop => {
                self.apply(Trigger::LedSetupStop, ports.sink);
                ports.led.off();
                self.config.led_brightness = ports.led.max_brightness();
                if let Err(e) = ports.config.save(&self.config) {
                    warn!("Saving LED brightness failed: {}", e);
                }
                None
            }

            DockCommand::IrSend(req) => {
                let ok = self.send_ir(&req, ports);
                ports.sink.emit(&AppEvent::IrSent { success: ok });
                Some(Reply::outcome(name.as_str(), ok))
            }

            DockCommand::IrReceive(enabled) => {
                self.ir_receiving = enabled;
                ports.ir.set_receiving(enabled);
                info!("IR: receive {}", if enabled { "on" } else { "off" });
                None
            }

            DockCommand::RemoteCharged => {
                self.apply(Trigger::RemoteCharged, ports.sink);
                None
            }

            DockCommand::RemoteLowBattery => {
                self.apply(Trigger::RemoteLowBattery, ports.sink);
                None
            }

            DockCommand::SetFriendlyName(friendly) => {
                let ok = self.set_friendly_name(friendly, ports);
                Some(Reply::outcome(name.as_str(), ok))
            }

            DockCommand::Reboot => {
                self.restart(RestartReason::Requested, ports);
                None
            }

            DockCommand::Reset => {
                self.factory_reset(ports);
                None
            }
        }
    }

    fn send_ir(&mut self, req: &IrSendRequest, ports: &mut DockPorts<'_>) -> bool {
        let result = req
            .decode()
            .map_err(IrError::from)
            .and_then(|code| ir::to_timings(&code))
            .and_then(|raw| ports.ir.transmit(&raw));

        match result {
            Ok(()) => true,
            Err(IrError::Codec(CodecError::OutOfMemory)) => {
                error!("IR: {}", Error::FatalAllocation);
                self.restart(RestartReason::OutOfMemory, ports);
                false
            }
            Err(e) => {
                warn!("IR: send failed ({})", e);
                false
            }
        }
    }

    fn set_friendly_name(&mut self, name: FriendlyName, ports: &mut DockPorts<'_>) -> bool {
        let previous = core::mem::replace(&mut self.config.friendly_name, name);
        if let Err(e) = ports.config.save(&self.config) {
            warn!("Saving friendly name failed: {}", e);
            self.config.friendly_name = previous;
            return false;
        }

        let shown = self.config.display_name(self.hostname.as_str());
        info!("Friendly name set to '{}'", shown);
        if let Err(e) = ports.advertise.set_friendly_name(shown) {
            warn!("mDNS: {}", e);
        }
        ports.sink.emit(&AppEvent::FriendlyNameChanged);
        true
    }

    fn provision(
        &mut self,
        provision: Result<WifiCredentials, CommandError>,
        ports: &mut DockPorts<'_>,
    ) -> bool {
        let creds = match provision {
            Ok(creds) => creds,
            Err(e) => {
                warn!("Provisioning rejected: {}", e);
                return false;
            }
        };
        ports.sink.emit(&AppEvent::CredentialsReceived);

        if let Err(e) = ports.config.save_credentials(&creds) {
            warn!("Saving WiFi credentials failed: {}", e);
            return false;
        }
        ports.connectivity.disconnect();
        self.connect_wifi(&creds, ports)
    }

    fn connect_wifi(&mut self, creds: &WifiCredentials, ports: &mut DockPorts<'_>) -> bool {
        let result = ports
            .connectivity
            .set_credentials(creds)
            .and_then(|()| ports.connectivity.connect());
        match result {
            Ok(()) => {
                self.apply(Trigger::WifiConnectBegin, ports.sink);
                true
            }
            Err(e) => {
                warn!("WiFi: {}", e);
                false
            }
        }
    }

    // ── Asynchronous inputs ───────────────────────────────────

    /// Charge pin edges and reset-button holds, already debounced.
    pub fn on_hardware_event(&mut self, event: HardwareEvent, ports: &mut DockPorts<'_>) {
        match event {
            HardwareEvent::ChargePinAsserted => self.apply(Trigger::ChargePinAsserted, ports.sink),
            HardwareEvent::ChargePinReleased => self.apply(Trigger::ChargePinReleased, ports.sink),
            HardwareEvent::ResetHold => {
                warn!("Reset button held, erasing configuration");
                self.factory_reset(ports);
            }
        }
    }

    pub fn on_connectivity_event(&mut self, event: ConnectivityEvent, ports: &mut DockPorts<'_>) {
        match event {
            ConnectivityEvent::Connecting => self.apply(Trigger::WifiConnectBegin, ports.sink),
            ConnectivityEvent::Connected => {
                self.apply(Trigger::WifiConnected, ports.sink);
                let friendly = self.config.display_name(self.hostname.as_str());
                if let Err(e) = ports.advertise.start(
                    self.hostname.as_str(),
                    friendly,
                    self.config.api_port,
                    self.config.ota_port,
                ) {
                    error!("mDNS: {}", e);
                    self.apply(Trigger::Fault, ports.sink);
                }
            }
            ConnectivityEvent::Disconnected => warn!("WiFi: link lost"),
            ConnectivityEvent::GaveUp => {
                error!("WiFi: reconnect attempts exhausted");
                self.restart(RestartReason::WifiGaveUp, ports);
            }
        }
    }

    /// Forward a finished capture to every authorized websocket client.
    pub fn on_ir_captured(
        &mut self,
        capture: &Capture,
        ports: &mut DockPorts<'_>,
    ) -> Vec<ResponseFrame> {
        if !self.ir_receiving || capture.is_noise() {
            return Vec::new();
        }

        let code = match format_capture(capture) {
            Ok(code) => code,
            Err(CodecError::OutOfMemory) => {
                error!("IR: {}", Error::FatalAllocation);
                self.restart(RestartReason::OutOfMemory, ports);
                return Vec::new();
            }
            Err(e) => {
                warn!("IR: capture dropped ({})", e);
                return Vec::new();
            }
        };

        let frames = self.engine.broadcast(&Reply::ir_receive(code));
        info!("IR: capture forwarded to {} client(s)", frames.len());
        ports.sink.emit(&AppEvent::IrForwarded {
            clients: frames.len(),
        });
        frames
    }

    /// The LED animator finished the connection-success blinks.
    pub fn on_led_sequence_done(&mut self, ports: &mut DockPorts<'_>) {
        self.apply(Trigger::SuccessBlinkDone, ports.sink);
    }

    // ── Restart paths ─────────────────────────────────────────

    /// Clear all stored settings and restart. Supersedes the state machine.
    pub fn factory_reset(&mut self, ports: &mut DockPorts<'_>) {
        if let Err(e) = ports.config.erase_all() {
            error!("Factory reset erase failed: {}", e);
        }
        self.config = DockConfig::default();
        self.restart(RestartReason::FactoryReset, ports);
    }

    /// Schedule a restart after the configured grace delay.
    pub fn restart(&mut self, reason: RestartReason, ports: &mut DockPorts<'_>) {
        if ports.system.restart_pending() {
            return;
        }
        warn!(
            "Restart scheduled in {} ms ({:?})",
            self.config.restart_grace_ms, reason
        );
        ports.system.schedule_restart(self.config.restart_grace_ms);
        ports.sink.emit(&AppEvent::RestartScheduled(reason));
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> DeviceState {
        self.fsm.current()
    }

    /// Read-only state handle for the LED thread.
    pub fn state_reader(&self) -> StateReader {
        self.fsm.reader()
    }

    pub fn config(&self) -> &DockConfig {
        &self.config
    }

    pub fn hostname(&self) -> &str {
        self.hostname.as_str()
    }

    pub fn is_ir_receiving(&self) -> bool {
        self.ir_receiving
    }

    pub fn engine(&self) -> &ProtocolEngine {
        &self.engine
    }

    // ── Internal ──────────────────────────────────────────────

    fn apply(&mut self, trigger: Trigger, sink: &mut dyn EventSink) {
        if let Some(t) = self.fsm.apply(trigger) {
            sink.emit(&AppEvent::StateChanged {
                from: t.from,
                to: t.to,
            });
        }
    }
}
