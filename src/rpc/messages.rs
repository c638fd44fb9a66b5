//! JSON message envelope and replies.
//!
//! Every transport carries the same flat JSON object. Inbound fields are
//! all optional; which ones matter depends on `type` and `command`.
//!
//! ```text
//! { "type": "auth" | "dock", "token", "command", "brightness",
//!   "format", "code", "decodeType", "bits", "repeat",
//!   "friendly_name", "ssid", "password" }
//! ```

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{AuthError, FrameError};

// ── Inbound ──────────────────────────────────────────────────

/// One parsed inbound message. Lives for a single dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Envelope {
    /// The `type` field.
    pub kind: Option<String>,
    pub token: Option<String>,
    pub command: Option<String>,
    pub brightness: Option<i64>,
    pub format: Option<String>,
    pub code: Option<String>,
    pub decode_type: Option<i64>,
    pub bits: Option<i64>,
    pub repeat: Option<i64>,
    pub friendly_name: Option<String>,
    pub ssid: Option<String>,
    pub password: Option<String>,
}

impl Envelope {
    /// Parse a complete frame. Anything but a JSON object is rejected.
    pub fn parse(frame: &[u8]) -> Result<Self, FrameError> {
        let value: Value = serde_json::from_slice(frame).map_err(|_| FrameError::InvalidJson)?;
        let Value::Object(map) = value else {
            return Err(FrameError::NotAnObject);
        };

        Ok(Self {
            kind: text(&map, "type"),
            token: text(&map, "token"),
            command: text(&map, "command"),
            brightness: integer(&map, "brightness"),
            format: text(&map, "format"),
            code: text(&map, "code"),
            decode_type: integer(&map, "decodeType"),
            bits: integer(&map, "bits"),
            repeat: integer(&map, "repeat"),
            // older clients sent the name under the command's own key
            friendly_name: text(&map, "friendly_name").or_else(|| text(&map, "set_friendly_name")),
            ssid: text(&map, "ssid"),
            password: text(&map, "password"),
        })
    }

    pub fn is_kind(&self, kind: &str) -> bool {
        self.kind.as_deref() == Some(kind)
    }

    /// `(ssid, password)` when both provisioning fields are present.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        Some((self.ssid.as_deref()?, self.password.as_deref()?))
    }
}

fn text(map: &Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key)? {
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

/// Integers may arrive as JSON numbers or as decimal strings.
fn integer(map: &Map<String, Value>, key: &str) -> Option<i64> {
    match map.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// ── Outbound ─────────────────────────────────────────────────

/// Reply object. Absent fields are left out of the JSON text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reply {
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
}

impl Reply {
    const fn bare(kind: &'static str) -> Self {
        Self {
            kind,
            message: None,
            command: None,
            code: None,
            success: None,
        }
    }

    /// Greeting sent to a websocket client when it connects.
    pub const fn auth_required() -> Self {
        Self::bare("auth_required")
    }

    pub const fn auth_ok() -> Self {
        Self::bare("auth_ok")
    }

    pub const fn auth_error(err: AuthError) -> Self {
        Self {
            kind: "auth",
            message: Some(err.message()),
            command: None,
            code: None,
            success: None,
        }
    }

    pub const fn pong() -> Self {
        Self {
            kind: "dock",
            message: Some("pong"),
            command: None,
            code: None,
            success: None,
        }
    }

    /// `{"type":"dock","message":<command>,"success":<ok>}`
    pub const fn outcome(command: &'static str, ok: bool) -> Self {
        Self {
            kind: "dock",
            message: Some(command),
            command: None,
            code: None,
            success: Some(ok),
        }
    }

    /// Captured IR signal pushed to listening clients.
    pub fn ir_receive(code: String) -> Self {
        Self {
            command: Some("ir_receive"),
            code: Some(code),
            ..Self::bare("dock")
        }
    }

    /// Render as JSON text.
    pub fn to_json(&self) -> Option<String> {
        serde_json::to_string(self).ok()
    }
}
