//! Transport ↔ main loop channels.
//!
//! Bounded `embassy-sync` channels bridge the I/O thread (serial and
//! bluetooth read loops) and the websocket server callbacks with the
//! synchronous main loop that owns the [`DockService`](crate::app::DockService).
//!
//! ```text
//! ┌──────────────┐   Inbound   ┌──────────────┐
//! │  Transports  │────────────▶│  Main loop   │
//! │ (I/O thread, │◀────────────│  (sync)      │
//! │  httpd)      │  Outbound   └──────────────┘
//! └──────────────┘
//! ```
//!
//! Connect and disconnect events share `INBOUND` with frames so a client's
//! `Connected` is always handled before anything it sends. Frames may only
//! fill the channel up to [`LIFECYCLE_RESERVE`] free slots; the rest is
//! kept for lifecycle events, so a frame flood cannot crowd them out.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::warn;

use super::auth::Endpoint;
use super::engine::ResponseFrame;

/// Something happened on a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A client attached. Websocket endpoints get the greeting.
    Connected(Endpoint),
    /// One complete `{...}` frame.
    Frame { from: Endpoint, frame: Vec<u8> },
    /// The client went away; its session must be dropped.
    Disconnected(Endpoint),
}

/// Reply text headed for one endpoint.
pub type Outbound = ResponseFrame;

/// Inbound depth.
pub const INBOUND_DEPTH: usize = 16;

/// Slots at the end of `INBOUND` that only lifecycle events may use.
pub const LIFECYCLE_RESERVE: usize = 4;

/// Outbound depth; IR broadcasts can fan out to every session at once.
pub const OUTBOUND_DEPTH: usize = 16;

/// Transports → main loop.
pub static INBOUND: Channel<CriticalSectionRawMutex, Inbound, INBOUND_DEPTH> = Channel::new();

/// Main loop → serial and bluetooth writers.
pub static OUTBOUND: Channel<CriticalSectionRawMutex, Outbound, OUTBOUND_DEPTH> = Channel::new();

/// Queue an inbound event. Returns `false` and logs when there is no room:
/// frames see a channel [`LIFECYCLE_RESERVE`] slots shorter.
pub fn post_inbound(msg: Inbound) -> bool {
    if matches!(msg, Inbound::Frame { .. }) && INBOUND.len() >= INBOUND_DEPTH - LIFECYCLE_RESERVE {
        warn!("RPC: inbound channel busy, dropping frame");
        return false;
    }
    match INBOUND.try_send(msg) {
        Ok(()) => true,
        Err(_) => {
            warn!("RPC: inbound channel full, dropping message");
            false
        }
    }
}

/// Queue a complete frame from `from`.
pub fn post_frame(from: Endpoint, frame: &[u8]) -> bool {
    post_inbound(Inbound::Frame {
        from,
        frame: frame.to_vec(),
    })
}

pub fn try_recv_inbound() -> Option<Inbound> {
    INBOUND.try_receive().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::auth::SessionRegistry;

    fn drain() {
        while try_recv_inbound().is_some() {}
    }

    // The channel is a process-wide static; keep all assertions in one test.
    #[test]
    fn inbound_ordering_and_lifecycle_reserve() {
        drain();
        assert!(post_inbound(Inbound::Connected(Endpoint::websocket(4))));
        assert!(post_frame(Endpoint::SERIAL, b"{\"type\":\"auth\"}"));

        assert_eq!(
            try_recv_inbound(),
            Some(Inbound::Connected(Endpoint::websocket(4)))
        );
        match try_recv_inbound() {
            Some(Inbound::Frame { from, frame }) => {
                assert_eq!(from, Endpoint::SERIAL);
                assert_eq!(frame, b"{\"type\":\"auth\"}");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(try_recv_inbound().is_none());

        // an authorized client leaves and its id is reused during a flood
        let mut registry = SessionRegistry::new();
        let old = Endpoint::websocket(54);
        registry.connect(old);
        registry.authenticate(old, Some("0"), "0").unwrap();

        let mut accepted = 0;
        while post_frame(Endpoint::websocket(55), b"{}") {
            accepted += 1;
        }
        assert_eq!(accepted, INBOUND_DEPTH - LIFECYCLE_RESERVE);
        assert!(post_inbound(Inbound::Disconnected(old)));
        assert!(post_inbound(Inbound::Connected(old)));

        while let Some(msg) = try_recv_inbound() {
            match msg {
                Inbound::Connected(e) => registry.connect(e),
                Inbound::Disconnected(e) => registry.remove(e),
                Inbound::Frame { .. } => {}
            }
        }
        assert!(!registry.is_authorized(old));

        for _ in 0..INBOUND_DEPTH {
            assert!(post_inbound(Inbound::Disconnected(Endpoint::BLUETOOTH)));
        }
        assert!(!post_inbound(Inbound::Disconnected(Endpoint::BLUETOOTH)));
        drain();
    }
}
