//! Session registry: which endpoints may run dock commands.
//!
//! Serial and Bluetooth are physical links and are always trusted.
//! WebSocket endpoints must present the shared static token once per
//! connection; after that every `dock` command from the endpoint runs.
//!
//! The registry is a bounded set keyed by websocket id. Authenticating
//! twice is idempotent, and a removed id is never authorized again until
//! it sends a fresh `auth` message.
//!
//! Wrong tokens drain one token bucket shared by every websocket endpoint.
//! Once a failure finds it empty the registry locks: every attempt gets
//! [`AuthError::RateLimited`] without a token comparison until the bucket
//! refills. The bucket outlives connections, so reconnecting does not buy
//! more guesses. Correct tokens cost nothing.

use burster::Limiter;
use core::fmt;
use core::time::Duration;
use log::warn;

use crate::error::AuthError;

// ── Constants ────────────────────────────────────────────────

/// Maximum number of websocket endpoints tracked at once.
pub const MAX_SESSIONS: usize = 8;

/// Websocket connection id; meaningless for serial and Bluetooth.
pub type EndpointId = i32;

// ── Endpoints ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    Serial,
    Bluetooth,
    WebSocket,
}

/// An addressable party on one of the transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub kind: TransportKind,
    pub id: EndpointId,
}

impl Endpoint {
    pub const SERIAL: Self = Self {
        kind: TransportKind::Serial,
        id: 0,
    };

    pub const BLUETOOTH: Self = Self {
        kind: TransportKind::Bluetooth,
        id: 0,
    };

    pub const fn websocket(id: EndpointId) -> Self {
        Self {
            kind: TransportKind::WebSocket,
            id,
        }
    }

    /// Physical links bypass token authentication.
    pub const fn is_trusted(&self) -> bool {
        !matches!(self.kind, TransportKind::WebSocket)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TransportKind::Serial => write!(f, "serial"),
            TransportKind::Bluetooth => write!(f, "bt"),
            TransportKind::WebSocket => write!(f, "ws#{}", self.id),
        }
    }
}

// ── Per-endpoint session ─────────────────────────────────────

struct Session {
    id: EndpointId,
    authorized: bool,
}

impl Session {
    const fn new(id: EndpointId) -> Self {
        Self {
            id,
            authorized: false,
        }
    }
}

// ── Failed-attempt limiter ───────────────────────────────────

/// Wrong tokens allowed in a burst, and refilled per second.
pub const FAILED_AUTH_BURST: u64 = 10;

struct FailureLimiter {
    bucket: burster::TokenBucket<fn() -> Duration>,
    locked: bool,
}

impl FailureLimiter {
    fn new() -> Self {
        Self {
            bucket: burster::TokenBucket::new_with_time_provider(
                FAILED_AUTH_BURST,
                FAILED_AUTH_BURST,
                platform_now as fn() -> Duration,
            ),
            locked: false,
        }
    }

    /// Gate an attempt. While locked, the attempt must win a refilled
    /// token to be heard; that token pays for it whatever the outcome.
    /// Returns `Ok(true)` when the attempt is already paid for.
    fn admit(&mut self) -> Result<bool, AuthError> {
        if !self.locked {
            return Ok(false);
        }
        if self.bucket.try_consume(1).is_err() {
            return Err(AuthError::RateLimited);
        }
        self.locked = false;
        Ok(true)
    }

    /// Charge one wrong token. Returns the error to report.
    fn fail(&mut self, paid: bool) -> AuthError {
        if paid || self.bucket.try_consume(1).is_ok() {
            return AuthError::InvalidToken;
        }
        self.locked = true;
        AuthError::RateLimited
    }
}

// ── Registry ─────────────────────────────────────────────────

/// Bounded set of websocket sessions, owned by the dispatcher thread.
pub struct SessionRegistry {
    sessions: heapless::Vec<Session, MAX_SESSIONS>,
    failures: FailureLimiter,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: heapless::Vec::new(),
            failures: FailureLimiter::new(),
        }
    }

    fn find(&self, id: EndpointId) -> Option<usize> {
        self.sessions.iter().position(|s| s.id == id)
    }

    fn slot_for(&mut self, id: EndpointId) -> Result<&mut Session, AuthError> {
        let idx = match self.find(id) {
            Some(idx) => idx,
            None => {
                self.sessions
                    .push(Session::new(id))
                    .map_err(|_| AuthError::SessionLimit)?;
                self.sessions.len() - 1
            }
        };
        Ok(&mut self.sessions[idx])
    }

    /// Start tracking a freshly connected websocket endpoint, unauthorized.
    ///
    /// A reused id starts over: the previous connection's authorization
    /// does not carry across.
    pub fn connect(&mut self, endpoint: Endpoint) {
        if endpoint.is_trusted() {
            return;
        }
        self.remove(endpoint);
        if self.sessions.push(Session::new(endpoint.id)).is_err() {
            warn!("auth: session table full, {} cannot authenticate", endpoint);
        }
    }

    /// Check a presented token against the shared `expected` token.
    pub fn authenticate(
        &mut self,
        endpoint: Endpoint,
        presented: Option<&str>,
        expected: &str,
    ) -> Result<(), AuthError> {
        let token = presented.ok_or(AuthError::TokenRequired)?;

        if endpoint.is_trusted() {
            return if tokens_equal(token, expected) {
                Ok(())
            } else {
                Err(AuthError::InvalidToken)
            };
        }

        let paid = self.failures.admit().inspect_err(|_| {
            warn!("auth: rate limit hit for {}", endpoint);
        })?;
        if !tokens_equal(token, expected) {
            let err = self.failures.fail(paid);
            if err == AuthError::RateLimited {
                warn!("auth: too many failed attempts, locking out");
            }
            return Err(err);
        }
        self.slot_for(endpoint.id)?.authorized = true;
        Ok(())
    }

    /// True for trusted transports and for authenticated websocket ids.
    pub fn is_authorized(&self, endpoint: Endpoint) -> bool {
        if endpoint.is_trusted() {
            return true;
        }
        self.find(endpoint.id)
            .is_some_and(|idx| self.sessions[idx].authorized)
    }

    /// Forget an endpoint (websocket disconnect).
    pub fn remove(&mut self, endpoint: Endpoint) {
        if endpoint.is_trusted() {
            return;
        }
        if let Some(idx) = self.find(endpoint.id) {
            self.sessions.swap_remove(idx);
        }
    }

    /// Authorized websocket endpoints, for broadcasts.
    pub fn authorized(&self) -> impl Iterator<Item = Endpoint> + '_ {
        self.sessions
            .iter()
            .filter(|s| s.authorized)
            .map(|s| Endpoint::websocket(s.id))
    }

    /// Every tracked websocket endpoint, authorized or not.
    pub fn websockets(&self) -> impl Iterator<Item = Endpoint> + '_ {
        self.sessions.iter().map(|s| Endpoint::websocket(s.id))
    }

    pub fn authorized_count(&self) -> usize {
        self.sessions.iter().filter(|s| s.authorized).count()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Exact comparison that does not stop at the first differing byte.
fn tokens_equal(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

// ── Platform time for rate limiter ───────────────────────────

#[cfg(target_os = "espidf")]
fn platform_now() -> Duration {
    let us = unsafe { esp_idf_svc::sys::esp_timer_get_time() };
    Duration::from_micros(us as u64)
}

#[cfg(not(target_os = "espidf"))]
fn platform_now() -> Duration {
    use std::time::Instant;
    static START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
    START.get_or_init(Instant::now).elapsed()
}

// ── Tests ────────────────────────────────────────────────────
