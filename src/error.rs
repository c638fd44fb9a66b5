//! Unified error types for the dock firmware.
//!
//! A single `Error` enum that every subsystem converts into, so the main
//! loop handles failures uniformly. All variants are `Copy` and carry no
//! heap data, which keeps them usable from the dispatcher hot path.
//!
//! | Category          | Dispatcher reaction                                  |
//! |-------------------|------------------------------------------------------|
//! | `FrameError`      | drop the frame, no response                          |
//! | `AuthError`       | `auth` response with an explanation, link stays open |
//! | `CommandError`    | ignored (unknown) or silently refused (unauthorized) |
//! | `CodecError`      | `success:false` in the `ir_send` response            |
//! | `FatalAllocation` | restart after the configured grace delay             |

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A transport frame could not be turned into a message.
    Frame(FrameError),
    /// Session authentication failed.
    Auth(AuthError),
    /// A dock command could not be executed.
    Command(CommandError),
    /// IR code text was malformed.
    Codec(CodecError),
    /// A communication subsystem failed.
    Comms(CommsError),
    /// Peripheral initialisation failed.
    Init(&'static str),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
    /// A working buffer could not be allocated. The device restarts.
    FatalAllocation,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Frame(e) => write!(f, "frame: {e}"),
            Self::Auth(e) => write!(f, "auth: {e}"),
            Self::Command(e) => write!(f, "command: {e}"),
            Self::Codec(e) => write!(f, "codec: {e}"),
            Self::Comms(e) => write!(f, "comms: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::FatalAllocation => write!(f, "allocation failed, restart required"),
        }
    }
}

// ---------------------------------------------------------------------------
// Frame errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// Frame text is not valid JSON.
    InvalidJson,
    /// Frame parsed but the top level is not an object.
    NotAnObject,
    /// Accumulated frame exceeded the buffer limit and was dropped.
    Overflow,
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidJson => write!(f, "invalid JSON"),
            Self::NotAnObject => write!(f, "message is not a JSON object"),
            Self::Overflow => write!(f, "frame too large"),
        }
    }
}

impl From<FrameError> for Error {
    fn from(e: FrameError) -> Self {
        Self::Frame(e)
    }
}

// ---------------------------------------------------------------------------
// Auth errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// `auth` message without a `token` field.
    TokenRequired,
    /// Token did not match the shared token.
    InvalidToken,
    /// Too many failed attempts from this endpoint.
    RateLimited,
    /// Authorized-session table is full.
    SessionLimit,
}

impl AuthError {
    /// Text placed in the `message` field of the `auth` response.
    pub const fn message(self) -> &'static str {
        match self {
            Self::TokenRequired => "Token needed",
            Self::InvalidToken => "Invalid token",
            Self::RateLimited => "Too many attempts",
            Self::SessionLimit => "Too many sessions",
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl From<AuthError> for Error {
    fn from(e: AuthError) -> Self {
        Self::Auth(e)
    }
}

// ---------------------------------------------------------------------------
// Command errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// Endpoint has not authenticated.
    Unauthorized,
    /// `command` names nothing the dock knows.
    Unknown,
    /// A required payload field is absent.
    MissingField(&'static str),
    /// A payload field has the wrong type or range.
    InvalidField(&'static str),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthorized => write!(f, "endpoint not authorized"),
            Self::Unknown => write!(f, "unknown command"),
            Self::MissingField(name) => write!(f, "missing field '{name}'"),
            Self::InvalidField(name) => write!(f, "invalid field '{name}'"),
        }
    }
}

impl From<CommandError> for Error {
    fn from(e: CommandError) -> Self {
        Self::Command(e)
    }
}

// ---------------------------------------------------------------------------
// IR codec errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    /// Input text was empty.
    Empty,
    /// Fewer numeric values than the format requires.
    TooFewValues { needed: usize, found: usize },
    /// More values than a single code may hold.
    TooManyValues { limit: usize },
    /// Token at `index` is not a valid number for the format.
    InvalidNumber { index: usize },
    /// The `R<n>` repeat prefix is malformed.
    InvalidRepeat,
    /// Protocol form needs exactly four fields.
    FieldCount { found: usize },
    /// Pronto preamble describes something other than a learned code.
    UnsupportedPronto,
    /// Buffer for the decoded values could not be allocated.
    OutOfMemory,
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty code"),
            Self::TooFewValues { needed, found } => {
                write!(f, "need at least {needed} values, found {found}")
            }
            Self::TooManyValues { limit } => write!(f, "more than {limit} values"),
            Self::InvalidNumber { index } => write!(f, "invalid number at position {index}"),
            Self::InvalidRepeat => write!(f, "invalid repeat prefix"),
            Self::FieldCount { found } => write!(f, "expected 4 fields, found {found}"),
            Self::UnsupportedPronto => write!(f, "unsupported pronto preamble"),
            Self::OutOfMemory => write!(f, "out of memory"),
        }
    }
}

impl From<CodecError> for Error {
    fn from(e: CodecError) -> Self {
        match e {
            CodecError::OutOfMemory => Self::FatalAllocation,
            other => Self::Codec(other),
        }
    }
}

// ---------------------------------------------------------------------------
// Communications errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommsError {
    WifiConnectFailed,
    WifiDisconnected,
    MdnsInitFailed,
    TransportClosed,
    ChannelFull,
}

impl fmt::Display for CommsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WifiConnectFailed => write!(f, "WiFi connect failed"),
            Self::WifiDisconnected => write!(f, "WiFi disconnected"),
            Self::MdnsInitFailed => write!(f, "mDNS init failed"),
            Self::TransportClosed => write!(f, "transport closed"),
            Self::ChannelFull => write!(f, "channel full"),
        }
    }
}

impl From<CommsError> for Error {
    fn from(e: CommsError) -> Self {
        Self::Comms(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
