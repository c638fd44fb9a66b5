//! Websocket API server.
//!
//! One HTTP server on `api_port` with a websocket endpoint at `/`. Every
//! text message is one API frame. Handlers run in the httpd task, so they
//! only post [`Inbound`] events; replies come back from the main loop
//! through [`WebSocketServer::send`], which uses a detached sender per
//! session.
//!
//! The session table is authoritative. A connection whose `Connected`
//! cannot be queued is refused, and the main loop drops any registry
//! session the table no longer holds (see [`WebSocketServer::is_open`]).
//!
//! - **`target_os = "espidf"`**: `EspHttpServer::ws_handler`.
//! - **all other targets**: sessions are opened and fed by tests.

use core::fmt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::{info, warn};

use crate::rpc::auth::{Endpoint, EndpointId, TransportKind};
use crate::rpc::channels::Inbound;
use crate::rpc::codec::MAX_FRAME_LEN;
use crate::rpc::engine::ResponseFrame;

/// Path of the websocket endpoint.
pub const WS_PATH: &str = "/";

// ───────────────────────────────────────────────────────────────
// Session table
// ───────────────────────────────────────────────────────────────

/// Pushes a text frame to one websocket client from outside its handler.
pub trait FrameSender: Send {
    fn send_text(&mut self, text: &str) -> Result<(), i32>;
}

/// Open websocket sessions keyed by connection id.
pub struct Sessions<S: FrameSender> {
    senders: HashMap<EndpointId, S>,
}

impl<S: FrameSender> Sessions<S> {
    pub fn new() -> Self {
        Self {
            senders: HashMap::new(),
        }
    }

    /// Track a new connection.
    pub fn open(&mut self, id: EndpointId, sender: S) -> Inbound {
        self.senders.insert(id, sender);
        info!("WS: client {} connected ({} open)", id, self.senders.len());
        Inbound::Connected(Endpoint::websocket(id))
    }

    /// Track a new connection and queue its `Connected` through `post`.
    /// When the event cannot be queued the connection is forgotten again
    /// and refused.
    pub fn admit(
        &mut self,
        id: EndpointId,
        sender: S,
        post: impl FnOnce(Inbound) -> bool,
    ) -> Result<(), WsError> {
        let event = self.open(id, sender);
        if post(event) {
            return Ok(());
        }
        self.senders.remove(&id);
        warn!("WS: client {} refused, connect event could not be queued", id);
        Err(WsError::Busy)
    }

    pub fn is_open(&self, id: EndpointId) -> bool {
        self.senders.contains_key(&id)
    }

    /// Forget a connection. `None` if it was not open.
    pub fn close(&mut self, id: EndpointId) -> Option<Inbound> {
        self.senders.remove(&id)?;
        info!("WS: client {} disconnected", id);
        Some(Inbound::Disconnected(Endpoint::websocket(id)))
    }

    /// Deliver `frame` to its session. A failing session is closed and its
    /// disconnect returned alongside `false`.
    pub fn send(&mut self, frame: &ResponseFrame) -> (bool, Option<Inbound>) {
        if frame.to.kind != TransportKind::WebSocket {
            return (false, None);
        }
        let id = frame.to.id;
        let Some(sender) = self.senders.get_mut(&id) else {
            return (false, None);
        };
        match sender.send_text(&frame.text) {
            Ok(()) => (true, None),
            Err(rc) => {
                warn!("WS: send to {} failed ({}), closing", id, rc);
                (false, self.close(id))
            }
        }
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}

impl<S: FrameSender> Default for Sessions<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate one received text message as an API frame.
pub fn accept_message(len: usize) -> Result<(), WsError> {
    if len == 0 {
        return Err(WsError::Empty);
    }
    if len > MAX_FRAME_LEN {
        return Err(WsError::TooLarge(len));
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// Errors
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WsError {
    /// HTTP server or handler registration failed.
    Server(i32),
    Empty,
    TooLarge(usize),
    /// The main loop is backed up; the connection was refused.
    Busy,
}

impl fmt::Display for WsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server(rc) => write!(f, "http server failed ({})", rc),
            Self::Empty => write!(f, "empty message"),
            Self::TooLarge(n) => write!(f, "message of {} bytes exceeds {}", n, MAX_FRAME_LEN),
            Self::Busy => write!(f, "inbound queue busy"),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF server
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
mod esp {
    use esp_idf_svc::http::server::ws::EspHttpWsDetachedSender;
    use esp_idf_svc::ws::FrameType;

    use super::FrameSender;

    pub struct Detached(pub EspHttpWsDetachedSender);

    impl FrameSender for Detached {
        fn send_text(&mut self, text: &str) -> Result<(), i32> {
            self.0
                .send(FrameType::Text(false), text.as_bytes())
                .map_err(|e| e.code())
        }
    }
}

#[cfg(target_os = "espidf")]
type Sender = esp::Detached;

#[cfg(not(target_os = "espidf"))]
type Sender = SimSender;

pub struct WebSocketServer {
    sessions: Arc<Mutex<Sessions<Sender>>>,
    #[cfg(target_os = "espidf")]
    _server: esp_idf_svc::http::server::EspHttpServer<'static>,
}

#[cfg(target_os = "espidf")]
impl WebSocketServer {
    /// Start the HTTP server on `port` and register the websocket handler.
    pub fn start(port: u16) -> Result<Self, WsError> {
        use esp_idf_svc::http::server::{Configuration, EspHttpServer};
        use esp_idf_svc::sys::EspError;
        use esp_idf_svc::ws::FrameType;

        use crate::rpc::channels::{post_frame, post_inbound};

        let config = Configuration {
            http_port: port,
            ..Default::default()
        };
        let mut server = EspHttpServer::new(&config).map_err(|e| WsError::Server(e.code()))?;

        let sessions: Arc<Mutex<Sessions<Sender>>> = Arc::new(Mutex::new(Sessions::new()));
        let table = sessions.clone();

        let to_ws = |e: EspError| WsError::Server(e.code());
        server
            .ws_handler(WS_PATH, move |ws| -> Result<(), WsError> {
                let id = ws.session();
                if ws.is_new() {
                    let sender = esp::Detached(ws.create_detached_sender().map_err(to_ws)?);
                    let mut t = table.lock().map_err(|_| WsError::Busy)?;
                    return t.admit(id, sender, post_inbound);
                }
                if ws.is_closed() {
                    // a lost disconnect is caught by the main loop's is_open sweep
                    if let Some(ev) = table.lock().ok().and_then(|mut t| t.close(id)) {
                        post_inbound(ev);
                    }
                    return Ok(());
                }

                let (frame_type, len) = ws.recv(&mut []).map_err(to_ws)?;
                match accept_message(len) {
                    Ok(()) => {}
                    Err(WsError::Empty) => return Ok(()),
                    // an unread payload would desync the socket, so drop it
                    Err(e) => {
                        warn!("WS: client {}: {}", id, e);
                        return Err(e);
                    }
                }
                let mut buf = vec![0u8; len];
                ws.recv(&mut buf).map_err(to_ws)?;
                if let FrameType::Text(_) = frame_type {
                    post_frame(Endpoint::websocket(id), &buf);
                }
                Ok(())
            })
            .map_err(to_ws)?;

        info!("WS: API server listening on port {}{}", port, WS_PATH);
        Ok(Self {
            sessions,
            _server: server,
        })
    }
}

// ───────────────────────────────────────────────────────────────
// Simulation
// ───────────────────────────────────────────────────────────────

/// Records everything sent to one simulated client.
#[cfg(not(target_os = "espidf"))]
#[derive(Clone, Default)]
pub struct SimSender {
    pub sent: Arc<Mutex<Vec<String>>>,
    pub fail: bool,
}

#[cfg(not(target_os = "espidf"))]
impl FrameSender for SimSender {
    fn send_text(&mut self, text: &str) -> Result<(), i32> {
        if self.fail {
            return Err(-1);
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(text.to_owned());
        }
        Ok(())
    }
}

#[cfg(not(target_os = "espidf"))]
impl WebSocketServer {
    pub fn start(port: u16) -> Result<Self, WsError> {
        info!("WS(sim): API server on port {}{}", port, WS_PATH);
        Ok(Self {
            sessions: Arc::new(Mutex::new(Sessions::new())),
        })
    }

    /// Open a simulated client. Returns its recorder and the connect event.
    pub fn sim_open(&self, id: EndpointId) -> (SimSender, Option<Inbound>) {
        let sender = SimSender::default();
        let ev = self
            .sessions
            .lock()
            .ok()
            .map(|mut t| t.open(id, sender.clone()));
        (sender, ev)
    }

    pub fn sim_close(&self, id: EndpointId) -> Option<Inbound> {
        self.sessions.lock().ok().and_then(|mut t| t.close(id))
    }
}

impl WebSocketServer {
    /// Send a reply to its websocket session. Returns the disconnect event
    /// when the session turned out to be dead.
    pub fn send(&self, frame: &ResponseFrame) -> (bool, Option<Inbound>) {
        match self.sessions.lock() {
            Ok(mut t) => t.send(frame),
            Err(_) => (false, None),
        }
    }

    /// Whether websocket `id` is still connected.
    pub fn is_open(&self, id: EndpointId) -> bool {
        self.sessions.lock().is_ok_and(|t| t.is_open(id))
    }

    pub fn open_sessions(&self) -> usize {
        self.sessions.lock().map(|t| t.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(to: Endpoint, text: &str) -> ResponseFrame {
        ResponseFrame {
            to,
            text: text.into(),
        }
    }

    #[test]
    fn open_send_close() {
        let server = WebSocketServer::start(946).unwrap();
        let (client, ev) = server.sim_open(3);
        assert_eq!(ev, Some(Inbound::Connected(Endpoint::websocket(3))));
        assert_eq!(server.open_sessions(), 1);

        let (ok, gone) = server.send(&frame(Endpoint::websocket(3), "{\"type\":\"auth_required\"}"));
        assert!(ok);
        assert!(gone.is_none());
        assert_eq!(
            client.sent.lock().unwrap().as_slice(),
            ["{\"type\":\"auth_required\"}"]
        );

        assert_eq!(
            server.sim_close(3),
            Some(Inbound::Disconnected(Endpoint::websocket(3)))
        );
        assert!(server.sim_close(3).is_none());
        assert!(!server.send(&frame(Endpoint::websocket(3), "late")).0);
    }

    #[test]
    fn non_websocket_frames_are_refused() {
        let server = WebSocketServer::start(946).unwrap();
        let _ = server.sim_open(0);
        assert!(!server.send(&frame(Endpoint::SERIAL, "x")).0);
    }

    #[test]
    fn failing_sender_closes_session() {
        let mut sessions: Sessions<SimSender> = Sessions::new();
        sessions.open(
            9,
            SimSender {
                fail: true,
                ..SimSender::default()
            },
        );
        let (ok, gone) = sessions.send(&frame(Endpoint::websocket(9), "x"));
        assert!(!ok);
        assert_eq!(gone, Some(Inbound::Disconnected(Endpoint::websocket(9))));
        assert!(sessions.is_empty());
    }

    #[test]
    fn unqueued_connection_is_refused() {
        let mut sessions: Sessions<SimSender> = Sessions::new();
        assert_eq!(
            sessions.admit(4, SimSender::default(), |_| false),
            Err(WsError::Busy)
        );
        assert!(!sessions.is_open(4));

        let mut posted = None;
        assert!(sessions
            .admit(4, SimSender::default(), |ev| {
                posted = Some(ev);
                true
            })
            .is_ok());
        assert_eq!(posted, Some(Inbound::Connected(Endpoint::websocket(4))));
        assert!(sessions.is_open(4));
    }

    #[test]
    fn message_size_limits() {
        assert_eq!(accept_message(0), Err(WsError::Empty));
        assert!(accept_message(MAX_FRAME_LEN).is_ok());
        assert_eq!(
            accept_message(MAX_FRAME_LEN + 1),
            Err(WsError::TooLarge(MAX_FRAME_LEN + 1))
        );
    }
}
