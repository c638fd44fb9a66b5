//! Formatting of received IR signals.
//!
//! A capture is rendered as raw text, `frequency,mark,space,...`, so a
//! client can hand the string straight back to `ir_send` with format
//! `raw`. Durations longer than `u16::MAX` µs are split into
//! `65535,0,rest` to keep the mark/space phase intact.

use core::fmt::Write;

use super::{DEFAULT_FREQUENCY_HZ, MAX_CODE_VALUES, alloc_values, push_split, split_len};
use crate::error::CodecError;

/// Captures shorter than this are treated as noise.
pub const MIN_CAPTURE_LEN: usize = 12;

/// Gap that terminates a capture (milliseconds).
pub const CAPTURE_TIMEOUT_MS: u32 = 15;

/// One received signal: carrier estimate plus durations in µs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    pub frequency_hz: u16,
    pub durations_us: Vec<u32>,
}

impl Capture {
    /// A capture at the default carrier. The receiver demodulates, so
    /// the true carrier is unknown.
    pub fn new(durations_us: Vec<u32>) -> Self {
        Self {
            frequency_hz: DEFAULT_FREQUENCY_HZ,
            durations_us,
        }
    }

    pub fn is_noise(&self) -> bool {
        self.durations_us.len() < MIN_CAPTURE_LEN
    }
}

/// Render a capture as raw code text.
pub fn format_capture(capture: &Capture) -> Result<String, CodecError> {
    if capture.durations_us.is_empty() {
        return Err(CodecError::Empty);
    }

    let entries: usize = capture.durations_us.iter().map(|&d| split_len(d)).sum();
    let mut values = alloc_values(entries, MAX_CODE_VALUES)?;
    for &d in &capture.durations_us {
        push_split(&mut values, d);
    }

    let mut out = String::new();
    out.try_reserve(6 + values.len() * 6)
        .map_err(|_| CodecError::OutOfMemory)?;
    let _ = write!(out, "{}", capture.frequency_hz);
    for v in &values {
        let _ = write!(out, ",{v}");
    }
    Ok(out)
}
