//! Reset button driver: hold-time measurement for the factory-reset gesture.
//!
//! ## Hardware
//!
//! Active-low momentary switch on the boot pin with pull-up. The GPIO fires
//! on both edges; the ISR latches the press or release timestamp into an
//! atomic, and [`ButtonDriver::tick`] (called from the main loop) measures
//! the hold once the release has been latched.
//!
//! ## Gesture
//!
//! | Hold time                     | Result                     |
//! |-------------------------------|----------------------------|
//! | `<= reset_hold_min_ms`        | ignored                    |
//! | strictly inside the window    | `HardwareEvent::ResetHold` |
//! | `>= reset_hold_max_ms`        | ignored (button stuck)     |

use core::sync::atomic::{AtomicU32, Ordering};

use log::{info, warn};

use crate::app::commands::HardwareEvent;

/// Press/release timestamps written by the ISR (ms since boot, 0 = none).
pub struct ButtonLatch {
    pressed_at: AtomicU32,
    released_at: AtomicU32,
}

impl ButtonLatch {
    pub const fn new() -> Self {
        Self {
            pressed_at: AtomicU32::new(0),
            released_at: AtomicU32::new(0),
        }
    }

    /// Record an edge. `pressed` is the post-edge level (LOW = pressed).
    /// Safe to call from interrupt context.
    pub fn record(&self, pressed: bool, now_ms: u32) {
        // 0 is the "empty" marker
        let stamp = now_ms.max(1);
        if pressed {
            self.released_at.store(0, Ordering::Release);
            self.pressed_at.store(stamp, Ordering::Release);
        } else {
            self.released_at.store(stamp, Ordering::Release);
        }
    }
}

impl Default for ButtonLatch {
    fn default() -> Self {
        Self::new()
    }
}

/// Latch fed by the GPIO interrupt.
pub static BUTTON_LATCH: ButtonLatch = ButtonLatch::new();

/// ISR handler: register this on the button GPIO (any edge).
pub fn button_isr_handler(pressed: bool, now_ms: u32) {
    BUTTON_LATCH.record(pressed, now_ms);
}

pub struct ButtonDriver<'a> {
    latch: &'a ButtonLatch,
    hold_min_ms: u32,
    hold_max_ms: u32,
    overlong_reported: bool,
}

impl<'a> ButtonDriver<'a> {
    pub fn new(latch: &'a ButtonLatch, hold_min_ms: u32, hold_max_ms: u32) -> Self {
        Self {
            latch,
            hold_min_ms,
            hold_max_ms,
            overlong_reported: false,
        }
    }

    /// Call from the main loop each iteration.
    pub fn tick(&mut self, now_ms: u32) -> Option<HardwareEvent> {
        let pressed_at = self.latch.pressed_at.load(Ordering::Acquire);
        if pressed_at == 0 {
            return None;
        }

        let released_at = self.latch.released_at.load(Ordering::Acquire);
        if released_at == 0 {
            // still held
            let held = now_ms.wrapping_sub(pressed_at);
            if held >= self.hold_max_ms && !self.overlong_reported {
                self.overlong_reported = true;
                warn!("Button: held for {} ms, past the reset window", held);
            }
            return None;
        }

        self.latch.pressed_at.store(0, Ordering::Release);
        self.latch.released_at.store(0, Ordering::Release);
        self.overlong_reported = false;

        let held = released_at.wrapping_sub(pressed_at);
        info!("Button: held for {} ms", held);
        (held > self.hold_min_ms && held < self.hold_max_ms).then_some(HardwareEvent::ResetHold)
    }
}
