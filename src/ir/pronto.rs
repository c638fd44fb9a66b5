//! Pronto learned-code expansion.
//!
//! ```text
//!   word 0   0x0000           learned, modulated
//!   word 1   carrier code     f = 1e6 / (code * 0.241246) Hz
//!   word 2   n1               pairs in the once sequence
//!   word 3   n2               pairs in the repeat sequence
//!   word 4.. 2*(n1+n2) words  durations in carrier periods
//! ```
//!
//! The once sequence is sent a single time, then the repeat sequence
//! `repeats` times. A code with only one sequence repeats that one.
//!
//! Long durations expand to several `65535,0` entries, so the output is
//! sized after splitting and checked against [`MAX_TRANSMIT_TIMINGS`]
//! before anything is allocated.

use super::{MAX_TRANSMIT_TIMINGS, Pronto, RawCode, alloc_values, push_split, split_len};
use crate::error::CodecError;

const HEADER_WORDS: usize = 4;
const LEARNED_TYPE: u16 = 0x0000;

/// Carrier period factor in units of 1e-6 µs (0.241246 µs per code step).
const PERIOD_FACTOR: u64 = 241_246;

/// Lowest carrier accepted from a Pronto code. IR remotes sit between
/// roughly 30 and 60 kHz.
pub const MIN_CARRIER_HZ: u16 = 10_000;

/// Carrier frequency in Hz for a Pronto frequency word, `None` outside
/// `MIN_CARRIER_HZ..=u16::MAX`.
pub fn carrier_hz(freq_code: u16) -> Option<u16> {
    if freq_code == 0 {
        return None;
    }
    let hz = 1_000_000_000_000u64 / (u64::from(freq_code) * PERIOD_FACTOR);
    u16::try_from(hz).ok().filter(|&hz| hz >= MIN_CARRIER_HZ)
}

/// Duration in µs of `units` carrier periods.
fn units_to_micros(units: u16, freq_code: u16) -> u32 {
    let us = u64::from(units) * u64::from(freq_code) * PERIOD_FACTOR / 1_000_000;
    us.min(u64::from(u32::MAX)) as u32
}

/// Expand a learned Pronto code into carrier plus timings.
pub fn pronto_to_raw(code: &Pronto) -> Result<RawCode, CodecError> {
    let v = &code.values;
    if v.len() < HEADER_WORDS + 2 {
        return Err(CodecError::TooFewValues {
            needed: HEADER_WORDS + 2,
            found: v.len(),
        });
    }
    if v[0] != LEARNED_TYPE {
        return Err(CodecError::UnsupportedPronto);
    }
    let freq_code = v[1];
    let frequency_hz = carrier_hz(freq_code).ok_or(CodecError::UnsupportedPronto)?;

    let once_len = usize::from(v[2]) * 2;
    let repeat_len = usize::from(v[3]) * 2;
    if v.len() != HEADER_WORDS + once_len + repeat_len {
        return Err(CodecError::UnsupportedPronto);
    }
    let once = &v[HEADER_WORDS..HEADER_WORDS + once_len];
    let repeat = &v[HEADER_WORDS + once_len..];

    let (first, again, times) = match (once.is_empty(), repeat.is_empty()) {
        (false, false) => (once, repeat, usize::from(code.repeats)),
        (false, true) => (once, once, usize::from(code.repeats)),
        (true, false) => (repeat, repeat, usize::from(code.repeats)),
        (true, true) => return Err(CodecError::UnsupportedPronto),
    };

    let entries = |part: &[u16]| -> usize {
        part.iter()
            .map(|&units| split_len(units_to_micros(units, freq_code)))
            .sum()
    };
    let total = entries(again)
        .checked_mul(times)
        .and_then(|n| n.checked_add(entries(first)))
        .ok_or(CodecError::TooManyValues {
            limit: MAX_TRANSMIT_TIMINGS,
        })?;
    let mut timings = alloc_values(total, MAX_TRANSMIT_TIMINGS)?;

    let seq = core::iter::once(first).chain(core::iter::repeat_n(again, times));
    for part in seq {
        for &units in part {
            push_split(&mut timings, units_to_micros(units, freq_code));
        }
    }

    Ok(RawCode {
        frequency_hz,
        timings,
    })
}
