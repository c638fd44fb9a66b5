//! Brace-delimited frame extraction.
//!
//! Serial and Bluetooth deliver an unframed byte stream. A frame is the
//! text from a `{` up to and including the next `}`:
//!
//! ```text
//!   a b { " x " : 1 } c d { " y " : 2 }
//!       └─── frame ───┘     └─── frame ───┘
//! ```
//!
//! # Protocol constraint
//!
//! Matching is depth 1. Nested braces are not counted, so a message must
//! not carry object-valued fields or string values containing `{` or `}`.
//! Any `{` restarts the frame, which also means leading garbage before the
//! first `{` is tolerated. An unterminated frame stays pending until the
//! next `{` or [`BraceFramer::reset`].

use heapless::Vec;

/// Maximum frame size (protects against memory exhaustion).
pub const MAX_FRAME_LEN: usize = 4096;

const OPEN: u8 = b'{';
const CLOSE: u8 = b'}';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FramerState {
    /// Dropping bytes until a `{`.
    Idle,
    /// Recording an open object.
    InObject,
}

/// Streaming brace framer, one per transport.
pub struct BraceFramer {
    state: FramerState,
    buf: Vec<u8, MAX_FRAME_LEN>,
    overflows: u32,
}

impl BraceFramer {
    pub const fn new() -> Self {
        Self {
            state: FramerState::Idle,
            buf: Vec::new(),
            overflows: 0,
        }
    }

    /// Push one byte. Returns the complete frame when `b` closes one.
    ///
    /// The returned slice is valid until the next call.
    pub fn push(&mut self, b: u8) -> Option<&[u8]> {
        if b == OPEN {
            self.buf.clear();
            // OPEN always fits in an empty buffer
            let _ = self.buf.push(b);
            self.state = FramerState::InObject;
            return None;
        }

        if self.state == FramerState::Idle {
            return None;
        }

        if self.buf.push(b).is_err() {
            self.overflows = self.overflows.wrapping_add(1);
            self.reset();
            return None;
        }

        if b == CLOSE {
            self.state = FramerState::Idle;
            return Some(self.buf.as_slice());
        }
        None
    }

    /// Feed a chunk, calling `on_frame` for every frame it completes.
    pub fn feed(&mut self, data: &[u8], mut on_frame: impl FnMut(&[u8])) {
        for &b in data {
            if let Some(frame) = self.push(b) {
                on_frame(frame);
            }
        }
    }

    /// Whether a frame is currently open.
    pub fn is_pending(&self) -> bool {
        self.state == FramerState::InObject
    }

    /// Frames dropped because they exceeded [`MAX_FRAME_LEN`].
    pub fn overflows(&self) -> u32 {
        self.overflows
    }

    /// Drop any partial frame (e.g. after a transport reconnect).
    pub fn reset(&mut self) {
        self.buf.clear();
        self.state = FramerState::Idle;
    }
}

impl Default for BraceFramer {
    fn default() -> Self {
        Self::new()
    }
}
