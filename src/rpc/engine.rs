//! Protocol engine: turns frames into authenticated dock requests.
//!
//! **Transport-decoupled**: the engine does not own a transport. Callers
//! feed `(endpoint, frame)` via [`ProtocolEngine::dispatch`] and get back a
//! [`Request`] describing what the frame asks for. The
//! [`DockService`](crate::app::service::DockService) executes it and turns
//! the outcome into [`ResponseFrame`]s.
//!
//! Every frame passes the same pipeline:
//!
//! 1. **Parse**: malformed JSON is dropped without a response.
//! 2. **Provisioning**: `ssid` + `password` on any message, whatever
//!    its `type`. Optionally gated on authorization for websocket.
//! 3. **Auth**: `type: "auth"` checks the token against the session
//!    registry and always answers the sender.
//! 4. **Dock**: `type: "dock"` runs only for authorized endpoints.
//!    Unauthorized and unknown commands are dropped silently.

use log::{debug, info, warn};

use crate::app::commands::{CommandName, DockCommand, IrFormat, IrSendRequest};
use crate::config::{FriendlyName, WifiCredentials, clamp_brightness};
use crate::error::{AuthError, CommandError, FrameError};

use super::auth::{Endpoint, SessionRegistry};
use super::messages::{Envelope, Reply};

/// Serialized reply tagged with its destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFrame {
    pub to: Endpoint,
    pub text: String,
}

/// Settings the engine needs from the live configuration.
#[derive(Debug, Clone, Copy)]
pub struct AuthPolicy<'a> {
    /// Shared static token.
    pub token: &'a str,
    /// Refuse provisioning from websocket endpoints that have not authenticated.
    pub provisioning_requires_auth: bool,
}

/// What the `type`/`command` part of a frame resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Nothing to run and nothing to say.
    None,
    /// Outcome of an `auth` message; the sender gets a reply either way.
    Auth(Result<(), AuthError>),
    /// Reply without running anything (rejected payload).
    Reply(Reply),
    /// Authorized dock command.
    Command(DockCommand),
}

/// Everything one frame asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Present when the frame carried `ssid` and `password`.
    pub provision: Option<Result<WifiCredentials, CommandError>>,
    pub action: Action,
}

/// Transport-decoupled protocol engine. Owns the session registry.
pub struct ProtocolEngine {
    sessions: SessionRegistry,
    frames: u32,
    dropped: u32,
}

impl ProtocolEngine {
    pub fn new() -> Self {
        Self {
            sessions: SessionRegistry::new(),
            frames: 0,
            dropped: 0,
        }
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Frames dispatched and frames dropped as malformed.
    pub fn frame_counts(&self) -> (u32, u32) {
        (self.frames, self.dropped)
    }

    // ── Connection lifecycle ──────────────────────────────────

    /// A transport endpoint connected. Websocket clients are greeted
    /// with `auth_required`.
    pub fn on_connect(&mut self, endpoint: Endpoint) -> Option<ResponseFrame> {
        if endpoint.is_trusted() {
            return None;
        }
        info!("RPC[{}]: connected", endpoint);
        self.sessions.connect(endpoint);
        self.respond(endpoint, &Reply::auth_required())
    }

    pub fn on_disconnect(&mut self, endpoint: Endpoint) {
        if endpoint.is_trusted() {
            return;
        }
        info!("RPC[{}]: disconnected", endpoint);
        self.sessions.remove(endpoint);
    }

    // ── Dispatch ──────────────────────────────────────────────

    /// Resolve one complete frame from `endpoint`.
    pub fn dispatch(
        &mut self,
        endpoint: Endpoint,
        frame: &[u8],
        policy: AuthPolicy<'_>,
    ) -> Result<Request, FrameError> {
        self.frames = self.frames.wrapping_add(1);

        let envelope = match Envelope::parse(frame) {
            Ok(env) => env,
            Err(e) => {
                self.dropped = self.dropped.wrapping_add(1);
                warn!("RPC[{}]: dropped frame ({})", endpoint, e);
                return Err(e);
            }
        };

        let provision = self.provisioning(endpoint, &envelope, policy);

        let action = if envelope.is_kind("auth") {
            Action::Auth(self.authenticate(endpoint, &envelope, policy.token))
        } else if envelope.is_kind("dock") {
            self.dock(endpoint, &envelope)
        } else {
            Action::None
        };

        Ok(Request { provision, action })
    }

    fn provisioning(
        &self,
        endpoint: Endpoint,
        envelope: &Envelope,
        policy: AuthPolicy<'_>,
    ) -> Option<Result<WifiCredentials, CommandError>> {
        let (ssid, password) = envelope.credentials()?;

        if policy.provisioning_requires_auth && !self.sessions.is_authorized(endpoint) {
            warn!("RPC[{}]: provisioning refused, not authorized", endpoint);
            return None;
        }

        info!("RPC[{}]: new WiFi credentials for '{}'", endpoint, ssid);
        Some(WifiCredentials::new(ssid, password).ok_or(CommandError::InvalidField("ssid")))
    }

    fn authenticate(
        &mut self,
        endpoint: Endpoint,
        envelope: &Envelope,
        expected: &str,
    ) -> Result<(), AuthError> {
        let result = self
            .sessions
            .authenticate(endpoint, envelope.token.as_deref(), expected);
        match result {
            Ok(()) => info!("RPC[{}]: authenticated", endpoint),
            Err(e) => warn!("RPC[{}]: auth rejected ({})", endpoint, e),
        }
        result
    }

    fn dock(&mut self, endpoint: Endpoint, envelope: &Envelope) -> Action {
        if !self.sessions.is_authorized(endpoint) {
            warn!("RPC[{}]: dock command from unauthorized endpoint ignored", endpoint);
            return Action::None;
        }

        let Some(raw) = envelope.command.as_deref() else {
            debug!("RPC[{}]: dock message without command", endpoint);
            return Action::None;
        };
        let Some(name) = CommandName::parse(raw) else {
            debug!("RPC[{}]: unknown command '{}'", endpoint, raw);
            return Action::None;
        };

        match parse_command(name, envelope) {
            Ok(cmd) => {
                info!("RPC[{}]: {}", endpoint, name.as_str());
                Action::Command(cmd)
            }
            Err(e) => {
                warn!("RPC[{}]: {} rejected ({})", endpoint, name.as_str(), e);
                Action::Reply(Reply::outcome(name.as_str(), false))
            }
        }
    }

    // ── Replies ───────────────────────────────────────────────

    /// Serialize `reply` for one endpoint.
    pub fn respond(&self, to: Endpoint, reply: &Reply) -> Option<ResponseFrame> {
        match reply.to_json() {
            Some(text) => Some(ResponseFrame { to, text }),
            None => {
                warn!("RPC[{}]: reply serialization failed", to);
                None
            }
        }
    }

    /// Serialize `reply` once per authorized websocket session.
    pub fn broadcast(&self, reply: &Reply) -> Vec<ResponseFrame> {
        let Some(text) = reply.to_json() else {
            warn!("RPC: broadcast serialization failed");
            return Vec::new();
        };
        self.sessions
            .authorized()
            .map(|to| ResponseFrame {
                to,
                text: text.clone(),
            })
            .collect()
    }
}

impl Default for ProtocolEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ── Command payloads ─────────────────────────────────────────

fn parse_command(name: CommandName, env: &Envelope) -> Result<DockCommand, CommandError> {
    Ok(match name {
        CommandName::Ping => DockCommand::Ping,
        CommandName::LedBrightnessStart => DockCommand::LedBrightnessStart {
            brightness: env.brightness.map(clamp_brightness),
        },
        CommandName::LedBrightnessStop => DockCommand::LedBrightnessStop,
        CommandName::IrSend => DockCommand::IrSend(ir_send_request(env)?),
        CommandName::IrReceiveOn => DockCommand::IrReceive(true),
        CommandName::IrReceiveOff => DockCommand::IrReceive(false),
        CommandName::RemoteCharged => DockCommand::RemoteCharged,
        CommandName::RemoteLowBattery => DockCommand::RemoteLowBattery,
        CommandName::SetFriendlyName => {
            let text = env
                .friendly_name
                .as_deref()
                .ok_or(CommandError::MissingField("friendly_name"))?;
            let mut name = FriendlyName::new();
            name.push_str(text.trim())
                .map_err(|_| CommandError::InvalidField("friendly_name"))?;
            DockCommand::SetFriendlyName(name)
        }
        CommandName::Reboot => DockCommand::Reboot,
        CommandName::Reset => DockCommand::Reset,
    })
}

fn ir_send_request(env: &Envelope) -> Result<IrSendRequest, CommandError> {
    let format = env
        .format
        .as_deref()
        .ok_or(CommandError::MissingField("format"))?;
    let format = IrFormat::parse(format).ok_or(CommandError::InvalidField("format"))?;
    let code = env.code.clone().ok_or(CommandError::MissingField("code"))?;

    Ok(IrSendRequest {
        format,
        code,
        decode_type: small_field(env.decode_type, "decodeType")?,
        bits: small_field(env.bits, "bits")?,
        repeat: small_field(env.repeat, "repeat")?,
    })
}

fn small_field(value: Option<i64>, name: &'static str) -> Result<Option<u16>, CommandError> {
    value
        .map(|v| u16::try_from(v).map_err(|_| CommandError::InvalidField(name)))
        .transpose()
}

#[cfg(all(test, not(target_os = "espidf")))]
mod tests {
    use super::*;

    const POLICY: AuthPolicy<'static> = AuthPolicy {
        token: "0",
        provisioning_requires_auth: false,
    };

    fn dispatch(engine: &mut ProtocolEngine, endpoint: Endpoint, frame: &str) -> Request {
        engine.dispatch(endpoint, frame.as_bytes(), POLICY).unwrap()
    }

    #[test]
    fn websocket_connect_greets_with_auth_required() {
        let mut engine = ProtocolEngine::new();
        let greeting = engine.on_connect(Endpoint::websocket(1)).unwrap();
        assert_eq!(greeting.to, Endpoint::websocket(1));
        assert_eq!(greeting.text, r#"{"type":"auth_required"}"#);
        assert!(engine.on_connect(Endpoint::SERIAL).is_none());
    }

    #[test]
    fn malformed_frame_is_dropped() {
        let mut engine = ProtocolEngine::new();
        assert_eq!(
            engine.dispatch(Endpoint::SERIAL, b"{not json", POLICY),
            Err(FrameError::InvalidJson)
        );
        assert_eq!(engine.frame_counts(), (1, 1));
    }

    #[test]
    fn auth_outcomes() {
        let mut engine = ProtocolEngine::new();
        let ws = Endpoint::websocket(2);
        engine.on_connect(ws);

        let req = dispatch(&mut engine, ws, r#"{"type":"auth"}"#);
        assert_eq!(req.action, Action::Auth(Err(AuthError::TokenRequired)));

        let req = dispatch(&mut engine, ws, r#"{"type":"auth","token":"nope"}"#);
        assert_eq!(req.action, Action::Auth(Err(AuthError::InvalidToken)));

        let req = dispatch(&mut engine, ws, r#"{"type":"auth","token":"0"}"#);
        assert_eq!(req.action, Action::Auth(Ok(())));
        assert!(engine.sessions().is_authorized(ws));
    }

    #[test]
    fn unauthorized_dock_command_is_silent() {
        let mut engine = ProtocolEngine::new();
        let ws = Endpoint::websocket(3);
        engine.on_connect(ws);
        let req = dispatch(&mut engine, ws, r#"{"type":"dock","command":"ping"}"#);
        assert_eq!(req.action, Action::None);
        assert!(req.provision.is_none());
    }

    #[test]
    fn trusted_transports_run_dock_commands() {
        let mut engine = ProtocolEngine::new();
        for endpoint in [Endpoint::SERIAL, Endpoint::BLUETOOTH] {
            let req = dispatch(&mut engine, endpoint, r#"{"type":"dock","command":"ping"}"#);
            assert_eq!(req.action, Action::Command(DockCommand::Ping));
        }
    }

    #[test]
    fn unknown_command_is_ignored() {
        let mut engine = ProtocolEngine::new();
        let req = dispatch(
            &mut engine,
            Endpoint::SERIAL,
            r#"{"type":"dock","command":"warp_drive"}"#,
        );
        assert_eq!(req.action, Action::None);
    }

    #[test]
    fn bad_payload_gets_failure_reply() {
        let mut engine = ProtocolEngine::new();
        let req = dispatch(
            &mut engine,
            Endpoint::SERIAL,
            r#"{"type":"dock","command":"ir_send","format":"morse","code":"..."}"#,
        );
        assert_eq!(req.action, Action::Reply(Reply::outcome("ir_send", false)));

        let req = dispatch(
            &mut engine,
            Endpoint::SERIAL,
            r#"{"type":"dock","command":"ir_send","format":"hex"}"#,
        );
        assert_eq!(req.action, Action::Reply(Reply::outcome("ir_send", false)));
    }

    #[test]
    fn brightness_is_clamped() {
        let mut engine = ProtocolEngine::new();
        let req = dispatch(
            &mut engine,
            Endpoint::SERIAL,
            r#"{"type":"dock","command":"led_brightness_start","brightness":1000}"#,
        );
        assert_eq!(
            req.action,
            Action::Command(DockCommand::LedBrightnessStart {
                brightness: Some(255)
            })
        );
    }

    #[test]
    fn oversized_friendly_name_is_rejected() {
        let mut engine = ProtocolEngine::new();
        let frame = format!(
            r#"{{"type":"dock","command":"set_friendly_name","friendly_name":"{}"}}"#,
            "n".repeat(40)
        );
        let req = dispatch(&mut engine, Endpoint::SERIAL, &frame);
        assert_eq!(
            req.action,
            Action::Reply(Reply::outcome("set_friendly_name", false))
        );
    }

    #[test]
    fn provisioning_is_ungated_by_default() {
        let mut engine = ProtocolEngine::new();
        let ws = Endpoint::websocket(4);
        engine.on_connect(ws);
        let req = dispatch(&mut engine, ws, r#"{"ssid":"home","password":"hunter22"}"#);
        let creds = req.provision.unwrap().unwrap();
        assert_eq!(creds.ssid.as_str(), "home");
        assert_eq!(req.action, Action::None);
    }

    #[test]
    fn provisioning_gate_applies_to_websocket_only() {
        let mut engine = ProtocolEngine::new();
        let policy = AuthPolicy {
            provisioning_requires_auth: true,
            ..POLICY
        };
        let frame = br#"{"ssid":"home","password":"hunter22"}"#;

        let ws = Endpoint::websocket(5);
        engine.on_connect(ws);
        let req = engine.dispatch(ws, frame, policy).unwrap();
        assert!(req.provision.is_none());

        let req = engine.dispatch(Endpoint::BLUETOOTH, frame, policy).unwrap();
        assert!(req.provision.is_some());
    }

    #[test]
    fn broadcast_reaches_authorized_sessions_only() {
        let mut engine = ProtocolEngine::new();
        for id in 1..=3 {
            engine.on_connect(Endpoint::websocket(id));
        }
        dispatch(&mut engine, Endpoint::websocket(1), r#"{"type":"auth","token":"0"}"#);
        dispatch(&mut engine, Endpoint::websocket(3), r#"{"type":"auth","token":"0"}"#);
        engine.on_disconnect(Endpoint::websocket(3));

        let frames = engine.broadcast(&Reply::ir_receive("38000,1,2".into()));
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].to, Endpoint::websocket(1));
    }
}
