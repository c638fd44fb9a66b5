//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (UART0 in production, shared with the serial API).

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started(state) => {
                info!("START | initial_state={:?}", state);
            }
            AppEvent::StateChanged { from, to } => {
                info!("STATE | {:?} -> {:?}", from, to);
            }
            AppEvent::Authenticated(endpoint) => {
                info!("AUTH  | {} authenticated", endpoint);
            }
            AppEvent::AuthRejected { endpoint, reason } => {
                warn!("AUTH  | {} rejected: {}", endpoint, reason);
            }
            AppEvent::CredentialsReceived => {
                info!("WIFI  | new credentials stored");
            }
            AppEvent::IrSent { success } => {
                if *success {
                    info!("IR    | code sent");
                } else {
                    warn!("IR    | send failed");
                }
            }
            AppEvent::IrForwarded { clients } => {
                info!("IR    | capture forwarded to {} client(s)", clients);
            }
            AppEvent::FriendlyNameChanged => {
                info!("MDNS  | friendly name updated");
            }
            AppEvent::RestartScheduled(reason) => {
                warn!("SYS   | restart scheduled ({:?})", reason);
            }
        }
    }
}
