//! Outbound application events.
//!
//! The [`DockService`](super::service::DockService) emits these through
//! the [`EventSink`](super::ports::EventSink) port. The default sink only
//! logs them; tests record them.

use crate::error::AuthError;
use crate::fsm::DeviceState;
use crate::rpc::auth::Endpoint;

/// Why a restart was scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartReason {
    /// `reboot` command.
    Requested,
    /// `reset` command or reset-button hold.
    FactoryReset,
    /// Station reconnect attempts exhausted.
    WifiGaveUp,
    /// A buffer for an IR code could not be allocated.
    OutOfMemory,
}

/// Structured events emitted by the dock service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// The service has started (carries the initial state).
    Started(DeviceState),

    /// The state machine moved.
    StateChanged { from: DeviceState, to: DeviceState },

    /// An endpoint presented the right token.
    Authenticated(Endpoint),

    /// An auth attempt was refused.
    AuthRejected { endpoint: Endpoint, reason: AuthError },

    /// New station credentials arrived.
    CredentialsReceived,

    /// An IR code was handed to the transmitter.
    IrSent { success: bool },

    /// A capture was forwarded to listening clients.
    IrForwarded { clients: usize },

    /// The advertised name changed.
    FriendlyNameChanged,

    /// The dock will restart shortly.
    RestartScheduled(RestartReason),
}
