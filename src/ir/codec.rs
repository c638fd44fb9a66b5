//! Text forms of IR codes.
//!
//! Three input forms arrive over the wire:
//!
//! | Form     | Example                          | Numbers        |
//! |----------|----------------------------------|----------------|
//! | Pronto   | `R2,0000,006d,0000,0001,...`     | hex `u16`      |
//! | Raw      | `38000,9000,4500,600`            | decimal `u16`  |
//! | Protocol | `4,0x640C,15,0` or `4;0x640C;..` | lenient fields |
//!
//! Pronto and raw decoding are strict: any bad token fails the whole code.
//! Value counts are checked against [`MAX_CODE_VALUES`] before anything is
//! allocated.

use core::fmt::Write;

use super::{
    MAX_CODE_VALUES, PRONTO_MIN_LENGTH, Pronto, ProtocolCode, RawCode, alloc_values,
};
use crate::error::CodecError;

/// Minimum tokens in a raw code: frequency plus one timing.
pub const RAW_MIN_TOKENS: usize = 2;

const PROTOCOL_FIELDS: usize = 4;

fn count_tokens(text: &str) -> usize {
    if text.trim().is_empty() {
        0
    } else {
        text.split(',').count()
    }
}

// ── Decoding ─────────────────────────────────────────────────

/// Decode a Pronto hex string.
///
/// An optional leading `R<n>,` (or `r<n>,`) overrides `default_repeats`.
/// At least [`PRONTO_MIN_LENGTH`] hex words must follow.
pub fn decode_pronto(text: &str, default_repeats: u16) -> Result<Pronto, CodecError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(CodecError::Empty);
    }

    let (repeats, body) = match text.strip_prefix('R').or_else(|| text.strip_prefix('r')) {
        Some(rest) => {
            let (count, body) = rest.split_once(',').unwrap_or((rest, ""));
            let repeats = count
                .trim()
                .parse::<u16>()
                .map_err(|_| CodecError::InvalidRepeat)?;
            (repeats, body)
        }
        None => (default_repeats, text),
    };

    let count = count_tokens(body);
    if count < PRONTO_MIN_LENGTH {
        return Err(CodecError::TooFewValues {
            needed: PRONTO_MIN_LENGTH,
            found: count,
        });
    }

    let mut values = alloc_values(count, MAX_CODE_VALUES)?;
    for (index, token) in body.split(',').map(str::trim).enumerate() {
        let value =
            u16::from_str_radix(token, 16).map_err(|_| CodecError::InvalidNumber { index })?;
        values.push(value);
    }

    Ok(Pronto { repeats, values })
}

/// Decode `frequency,timing,timing,...` with all numbers in decimal.
pub fn decode_raw(text: &str) -> Result<RawCode, CodecError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(CodecError::Empty);
    }

    let count = count_tokens(text);
    if count < RAW_MIN_TOKENS {
        return Err(CodecError::TooFewValues {
            needed: RAW_MIN_TOKENS,
            found: count,
        });
    }

    let mut tokens = text.split(',').map(str::trim);
    let frequency_hz = tokens
        .next()
        .and_then(|t| t.parse::<u16>().ok())
        .ok_or(CodecError::InvalidNumber { index: 0 })?;

    let mut timings = alloc_values(count - 1, MAX_CODE_VALUES)?;
    for (i, token) in tokens.enumerate() {
        let value = token
            .parse::<u16>()
            .map_err(|_| CodecError::InvalidNumber { index: i + 1 })?;
        timings.push(value);
    }

    Ok(RawCode {
        frequency_hz,
        timings,
    })
}

/// Decode `protocol,hex_value,bits,repeat` (`;` also separates).
///
/// Exactly four fields are required. Individual fields are read
/// leniently: a field with no leading digits reads as zero.
pub fn decode_protocol(text: &str) -> Result<ProtocolCode, CodecError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(CodecError::Empty);
    }

    let mut fields = [""; PROTOCOL_FIELDS];
    let mut found = 0;
    for field in text.split(|c: char| c == ',' || c == ';') {
        if found < PROTOCOL_FIELDS {
            fields[found] = field.trim();
        }
        found += 1;
    }
    if found != PROTOCOL_FIELDS {
        return Err(CodecError::FieldCount { found });
    }

    Ok(ProtocolCode {
        protocol_id: lenient_u16(fields[0]),
        value: lenient_hex(fields[1]),
        bits: lenient_u16(fields[2]),
        repeat: lenient_u16(fields[3]),
    })
}

/// Leading hex digits after an optional `0x`/`0X`; saturates on overflow.
pub fn lenient_hex(field: &str) -> u64 {
    let digits = field
        .strip_prefix("0x")
        .or_else(|| field.strip_prefix("0X"))
        .unwrap_or(field);
    digits
        .chars()
        .map_while(|c| c.to_digit(16))
        .fold(0u64, |acc, d| {
            acc.checked_mul(16)
                .and_then(|a| a.checked_add(u64::from(d)))
                .unwrap_or(u64::MAX)
        })
}

/// Leading decimal digits, clamped to `u16`. Negative or empty reads as 0.
pub fn lenient_u16(field: &str) -> u16 {
    let digits = field.strip_prefix('+').unwrap_or(field);
    let value = digits
        .chars()
        .map_while(|c| c.to_digit(10))
        .fold(0u32, |acc, d| acc.saturating_mul(10).saturating_add(d));
    value.min(u32::from(u16::MAX)) as u16
}

// ── Encoding ─────────────────────────────────────────────────

/// Input for [`encode_hex`].
#[derive(Debug, Clone, Copy)]
pub enum HexSource<'a> {
    /// Byte-array state (air-conditioner style protocols), in array order.
    State(&'a [u8]),
    /// Plain value of a simple protocol.
    Value(u64),
}

/// `0x`-prefixed lowercase hex.
pub fn encode_hex(source: HexSource<'_>) -> String {
    match source {
        HexSource::State(bytes) => {
            let mut out = String::with_capacity(2 + bytes.len() * 2);
            out.push_str("0x");
            for b in bytes {
                let _ = write!(out, "{b:02x}");
            }
            out
        }
        HexSource::Value(v) => format!("{v:#x}"),
    }
}

/// Render a Pronto code with an explicit repeat prefix.
pub fn encode_pronto(code: &Pronto) -> String {
    let mut out = String::with_capacity(8 + code.values.len() * 5);
    let _ = write!(out, "R{}", code.repeats);
    for v in &code.values {
        let _ = write!(out, ",{v:04x}");
    }
    out
}

pub fn encode_raw(code: &RawCode) -> String {
    let mut out = String::with_capacity(6 + code.timings.len() * 6);
    let _ = write!(out, "{}", code.frequency_hz);
    for t in &code.timings {
        let _ = write!(out, ",{t}");
    }
    out
}

pub fn encode_protocol(code: &ProtocolCode) -> String {
    format!(
        "{},{},{},{}",
        code.protocol_id,
        encode_hex(HexSource::Value(code.value)),
        code.bits,
        code.repeat
    )
}
