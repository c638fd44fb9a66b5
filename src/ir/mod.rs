//! Infrared code model and conversions.
//!
//! Pure functions only. Nothing in this module touches the RMT
//! peripheral; the IR adapter turns an [`IrCode`] into timings with
//! [`to_timings`] and hands those to hardware.
//!
//! ```text
//!   "R1,0000,006d,..."  ──decode_pronto──▶ Pronto ──pronto_to_raw──┐
//!   "38000,9000,4500"   ──decode_raw─────▶ RawCode ────────────────┼──▶ RawCode ──▶ RMT
//!   "4,0x640c,15,0"     ──decode_protocol▶ ProtocolCode ─encode────┘
//! ```

pub mod capture;
pub mod codec;
pub mod pronto;
pub mod protocols;

use core::fmt;

use crate::error::CodecError;

pub use capture::{Capture, format_capture};
pub use codec::{
    HexSource, decode_pronto, decode_protocol, decode_raw, encode_hex, encode_pronto,
    encode_protocol, encode_raw,
};

/// Minimum number of values in a Pronto code (4 header words + 1 pair).
pub const PRONTO_MIN_LENGTH: usize = 6;

/// Largest number of values accepted in a single code. Matches the
/// receiver capture buffer so every capture can be sent back.
pub const MAX_CODE_VALUES: usize = 1024;

/// Upper bound on timings produced for one transmission, repeats included.
pub const MAX_TRANSMIT_TIMINGS: usize = 4 * MAX_CODE_VALUES;

/// Repeat count used for Pronto codes without an `R<n>` prefix.
pub const DEFAULT_PRONTO_REPEATS: u16 = 1;

/// Default carrier for captured and unknown signals.
pub const DEFAULT_FREQUENCY_HZ: u16 = 38_000;

/// Pronto hex code: optional repeat count plus the hex words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pronto {
    pub repeats: u16,
    pub values: Vec<u16>,
}

/// Carrier frequency followed by alternating mark/space durations in µs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCode {
    pub frequency_hz: u16,
    pub timings: Vec<u16>,
}

/// Compact form naming a known remote-control protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolCode {
    pub protocol_id: u16,
    pub value: u64,
    pub bits: u16,
    pub repeat: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IrCode {
    Pronto(Pronto),
    Raw(RawCode),
    Protocol(ProtocolCode),
}

// ── Errors ───────────────────────────────────────────────────

/// Failure turning a decoded code into something the transmitter can send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrError {
    /// Text could not be decoded.
    Codec(CodecError),
    /// Protocol id has no encoder.
    UnsupportedProtocol(u16),
    /// Bit count outside 1..=64.
    InvalidBits(u16),
    /// Transmitter reported an error code.
    TransmitFailed(i32),
}

impl fmt::Display for IrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Codec(e) => write!(f, "codec: {e}"),
            Self::UnsupportedProtocol(id) => write!(f, "unsupported protocol {id}"),
            Self::InvalidBits(bits) => write!(f, "invalid bit count {bits}"),
            Self::TransmitFailed(code) => write!(f, "transmit failed ({code})"),
        }
    }
}

impl From<CodecError> for IrError {
    fn from(e: CodecError) -> Self {
        Self::Codec(e)
    }
}

/// Resolve any code into carrier plus timings ready for transmission.
pub fn to_timings(code: &IrCode) -> Result<RawCode, IrError> {
    match code {
        IrCode::Raw(raw) => Ok(raw.clone()),
        IrCode::Pronto(p) => Ok(pronto::pronto_to_raw(p)?),
        IrCode::Protocol(p) => protocols::encode(p),
    }
}

/// Reserve exactly `count` slots, refusing oversized or unallocatable requests.
pub(crate) fn alloc_values(count: usize, limit: usize) -> Result<Vec<u16>, CodecError> {
    if count > limit {
        return Err(CodecError::TooManyValues { limit });
    }
    let mut values = Vec::new();
    values
        .try_reserve_exact(count)
        .map_err(|_| CodecError::OutOfMemory)?;
    Ok(values)
}

/// Number of entries [`push_split`] appends for `micros`.
pub(crate) fn split_len(micros: u32) -> usize {
    1 + 2 * (micros.saturating_sub(1) / u32::from(u16::MAX)) as usize
}

/// Append a duration, splitting anything longer than `u16::MAX` into
/// `65535, 0` pairs so the mark/space phase is preserved.
pub(crate) fn push_split(out: &mut Vec<u16>, mut micros: u32) {
    while micros > u32::from(u16::MAX) {
        out.push(u16::MAX);
        out.push(0);
        micros -= u32::from(u16::MAX);
    }
    out.push(micros as u16);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_passes_through() {
        let raw = RawCode {
            frequency_hz: 38_000,
            timings: vec![9000, 4500, 600],
        };
        assert_eq!(to_timings(&IrCode::Raw(raw.clone())).unwrap(), raw);
    }

    #[test]
    fn alloc_rejects_over_limit() {
        assert_eq!(
            alloc_values(MAX_CODE_VALUES + 1, MAX_CODE_VALUES),
            Err(CodecError::TooManyValues {
                limit: MAX_CODE_VALUES
            })
        );
        assert!(alloc_values(8, MAX_CODE_VALUES).unwrap().capacity() >= 8);
    }

    #[test]
    fn push_split_preserves_phase() {
        let mut out = Vec::new();
        push_split(&mut out, 70_000);
        assert_eq!(out, vec![65_535, 0, 4_465]);

        out.clear();
        push_split(&mut out, 600);
        assert_eq!(out, vec![600]);
    }

    #[test]
    fn split_len_matches_push_split() {
        for micros in [0, 1, 600, 65_535, 65_536, 131_070, 131_071, 1_723_000, u32::MAX] {
            let mut out = Vec::new();
            push_split(&mut out, micros);
            assert_eq!(split_len(micros), out.len(), "{micros} µs");
        }
    }
}
