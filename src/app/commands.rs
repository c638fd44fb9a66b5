//! Inbound commands to the dock service.
//!
//! [`DockCommand`]s are produced by the protocol engine from authorized
//! `dock` messages; [`HardwareEvent`]s come from the main loop after it
//! drains the interrupt queue and ticks the button driver.

use crate::config::FriendlyName;
use crate::error::CodecError;
use crate::ir::{
    DEFAULT_PRONTO_REPEATS, IrCode, ProtocolCode, codec::lenient_hex, decode_pronto,
    decode_protocol, decode_raw,
};

/// Every command name the dock understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandName {
    Ping,
    LedBrightnessStart,
    LedBrightnessStop,
    IrSend,
    IrReceiveOn,
    IrReceiveOff,
    RemoteCharged,
    RemoteLowBattery,
    SetFriendlyName,
    Reboot,
    Reset,
}

impl CommandName {
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "ping" => Self::Ping,
            "led_brightness_start" => Self::LedBrightnessStart,
            "led_brightness_stop" => Self::LedBrightnessStop,
            "ir_send" => Self::IrSend,
            "ir_receive_on" => Self::IrReceiveOn,
            "ir_receive_off" => Self::IrReceiveOff,
            "remote_charged" => Self::RemoteCharged,
            "remote_lowbattery" => Self::RemoteLowBattery,
            "set_friendly_name" => Self::SetFriendlyName,
            "reboot" => Self::Reboot,
            "reset" => Self::Reset,
            _ => return None,
        })
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::LedBrightnessStart => "led_brightness_start",
            Self::LedBrightnessStop => "led_brightness_stop",
            Self::IrSend => "ir_send",
            Self::IrReceiveOn => "ir_receive_on",
            Self::IrReceiveOff => "ir_receive_off",
            Self::RemoteCharged => "remote_charged",
            Self::RemoteLowBattery => "remote_lowbattery",
            Self::SetFriendlyName => "set_friendly_name",
            Self::Reboot => "reboot",
            Self::Reset => "reset",
        }
    }
}

/// A validated dock command with its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DockCommand {
    Ping,
    /// `None` keeps the current brightness.
    LedBrightnessStart { brightness: Option<u8> },
    LedBrightnessStop,
    IrSend(IrSendRequest),
    /// Enable or disable forwarding of captured signals.
    IrReceive(bool),
    RemoteCharged,
    RemoteLowBattery,
    /// Empty name resets to the hostname.
    SetFriendlyName(FriendlyName),
    Reboot,
    Reset,
}

impl DockCommand {
    pub const fn name(&self) -> CommandName {
        match self {
            Self::Ping => CommandName::Ping,
            Self::LedBrightnessStart { .. } => CommandName::LedBrightnessStart,
            Self::LedBrightnessStop => CommandName::LedBrightnessStop,
            Self::IrSend(_) => CommandName::IrSend,
            Self::IrReceive(true) => CommandName::IrReceiveOn,
            Self::IrReceive(false) => CommandName::IrReceiveOff,
            Self::RemoteCharged => CommandName::RemoteCharged,
            Self::RemoteLowBattery => CommandName::RemoteLowBattery,
            Self::SetFriendlyName(_) => CommandName::SetFriendlyName,
            Self::Reboot => CommandName::Reboot,
            Self::Reset => CommandName::Reset,
        }
    }
}

// ── ir_send payload ──────────────────────────────────────────

/// Text representation named by the `format` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrFormat {
    Pronto,
    Hex,
    Raw,
}

impl IrFormat {
    pub fn parse(format: &str) -> Option<Self> {
        match format {
            "pronto" => Some(Self::Pronto),
            "hex" => Some(Self::Hex),
            "raw" => Some(Self::Raw),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrSendRequest {
    pub format: IrFormat,
    pub code: String,
    pub decode_type: Option<u16>,
    pub bits: Option<u16>,
    pub repeat: Option<u16>,
}

impl IrSendRequest {
    /// Decode the code text according to `format`.
    ///
    /// `hex` with a `decodeType` takes protocol, bits and repeat from the
    /// envelope and only the value from `code`; without one, `code` must be
    /// the four-field `protocol,value,bits,repeat` form.
    pub fn decode(&self) -> Result<IrCode, CodecError> {
        let code = self.code.trim();
        match (self.format, self.decode_type) {
            (IrFormat::Pronto, _) => Ok(IrCode::Pronto(decode_pronto(
                code,
                self.repeat.unwrap_or(DEFAULT_PRONTO_REPEATS),
            )?)),
            (IrFormat::Hex, Some(protocol_id)) => {
                if code.is_empty() {
                    return Err(CodecError::Empty);
                }
                Ok(IrCode::Protocol(ProtocolCode {
                    protocol_id,
                    value: lenient_hex(code),
                    bits: self.bits.unwrap_or(0),
                    repeat: self.repeat.unwrap_or(0),
                }))
            }
            (IrFormat::Hex, None) => Ok(IrCode::Protocol(decode_protocol(code)?)),
            (IrFormat::Raw, _) => Ok(IrCode::Raw(decode_raw(code)?)),
        }
    }
}

// ── Hardware ─────────────────────────────────────────────────

/// Hardware inputs after debouncing and interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareEvent {
    ChargePinAsserted,
    ChargePinReleased,
    /// Button released inside the factory-reset hold window.
    ResetHold,
}
