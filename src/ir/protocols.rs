//! Encoders for the protocol ids the dock can send by value.
//!
//! Ids follow the common IR library numbering, so codes captured by the
//! remote's own decoder can be replayed unchanged.
//!
//! | Id | Protocol | Carrier | Notes                               |
//! |----|----------|---------|-------------------------------------|
//! | 3  | NEC      | 38 kHz  | repeats are short repeat frames     |
//! | 4  | Sony     | 40 kHz  | at least 3 frames, 45 ms per frame  |
//! | 7  | Samsung  | 38 kHz  | repeats resend the full frame       |
//!
//! All protocols send data MSB first.

use super::{IrError, MAX_TRANSMIT_TIMINGS, ProtocolCode, RawCode, alloc_values, push_split};

pub const NEC: u16 = 3;
pub const SONY: u16 = 4;
pub const SAMSUNG: u16 = 7;

/// Mark/space layout shared by the pulse-distance protocols.
struct Timing {
    carrier_hz: u16,
    header_mark: u32,
    header_space: u32,
    bit_mark: u32,
    one_space: u32,
    zero_space: u32,
    /// One-bit mark for pulse-width protocols (Sony); otherwise `bit_mark`.
    one_mark: u32,
    footer_mark: u32,
    /// Minimum length of one frame including its trailing gap.
    frame_us: u32,
}

const NEC_TIMING: Timing = Timing {
    carrier_hz: 38_000,
    header_mark: 8_960,
    header_space: 4_480,
    bit_mark: 560,
    one_space: 1_680,
    zero_space: 560,
    one_mark: 560,
    footer_mark: 560,
    frame_us: 108_000,
};

const SAMSUNG_TIMING: Timing = Timing {
    carrier_hz: 38_000,
    header_mark: 4_480,
    header_space: 4_480,
    bit_mark: 560,
    one_space: 1_680,
    zero_space: 560,
    one_mark: 560,
    footer_mark: 560,
    frame_us: 108_000,
};

const SONY_TIMING: Timing = Timing {
    carrier_hz: 40_000,
    header_mark: 2_400,
    header_space: 600,
    bit_mark: 600,
    one_space: 600,
    zero_space: 600,
    one_mark: 1_200,
    footer_mark: 0,
    frame_us: 45_000,
};

const NEC_REPEAT_SPACE: u32 = 2_240;
const SONY_MIN_REPEAT: u16 = 2;

/// Entries one frame can take, with room for a split trailing gap.
fn frame_entries(bits: u16) -> usize {
    2 + usize::from(bits) * 2 + 4
}

/// Encode a protocol code into transmit timings.
pub fn encode(code: &ProtocolCode) -> Result<RawCode, IrError> {
    if !(1..=64).contains(&code.bits) {
        return Err(IrError::InvalidBits(code.bits));
    }
    match code.protocol_id {
        NEC => encode_nec(code),
        SONY => encode_frames(&SONY_TIMING, code, code.repeat.max(SONY_MIN_REPEAT)),
        SAMSUNG => encode_frames(&SAMSUNG_TIMING, code, code.repeat),
        other => Err(IrError::UnsupportedProtocol(other)),
    }
}

/// Append one data frame and return its length in µs without the gap.
fn push_frame(t: &Timing, value: u64, bits: u16, out: &mut Vec<u16>) -> u32 {
    let mut used = 0u32;
    let mut push = |mark: u32, space: u32, out: &mut Vec<u16>| {
        push_split(out, mark);
        push_split(out, space);
        used += mark + space;
    };

    push(t.header_mark, t.header_space, out);
    for i in (0..bits).rev() {
        if (value >> i) & 1 == 1 {
            push(t.one_mark, t.one_space, out);
        } else {
            push(t.bit_mark, t.zero_space, out);
        }
    }
    if t.footer_mark > 0 {
        push_split(out, t.footer_mark);
        used += t.footer_mark;
    } else {
        // pulse-width frames end on a space; fold it into the gap
        out.pop();
        used -= t.zero_space;
    }
    used
}

/// Trailing space that pads a frame to the protocol's frame length.
fn push_gap(t: &Timing, used: u32, out: &mut Vec<u16>) {
    let gap = t.frame_us.saturating_sub(used).max(t.zero_space);
    push_split(out, gap);
}

fn encode_frames(t: &Timing, code: &ProtocolCode, repeat: u16) -> Result<RawCode, IrError> {
    let frames = usize::from(repeat) + 1;
    let mut timings = alloc_values(frames * frame_entries(code.bits), MAX_TRANSMIT_TIMINGS)?;
    for _ in 0..frames {
        let used = push_frame(t, code.value, code.bits, &mut timings);
        push_gap(t, used, &mut timings);
    }
    Ok(RawCode {
        frequency_hz: t.carrier_hz,
        timings,
    })
}

fn encode_nec(code: &ProtocolCode) -> Result<RawCode, IrError> {
    let t = &NEC_TIMING;
    let repeats = usize::from(code.repeat);
    let mut timings = alloc_values(frame_entries(code.bits) + repeats * 6, MAX_TRANSMIT_TIMINGS)?;

    let used = push_frame(t, code.value, code.bits, &mut timings);
    push_gap(t, used, &mut timings);

    for _ in 0..repeats {
        push_split(&mut timings, t.header_mark);
        push_split(&mut timings, NEC_REPEAT_SPACE);
        push_split(&mut timings, t.bit_mark);
        push_gap(
            t,
            t.header_mark + NEC_REPEAT_SPACE + t.bit_mark,
            &mut timings,
        );
    }

    Ok(RawCode {
        frequency_hz: t.carrier_hz,
        timings,
    })
}
