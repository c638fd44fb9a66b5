//! Status LED animation engine.
//!
//! Renders the current [`DeviceState`] as a sequence of [`LedStep`]s. The
//! LED thread asks for the next step, writes its duty and sleeps for its
//! hold time, so every pattern is a plain step table with no blocking
//! inside the engine.
//!
//! ## Patterns
//!
//! | State              | Pattern                                         |
//! |--------------------|-------------------------------------------------|
//! | Setup              | 800 ms on / 800 ms off at full duty             |
//! | Connecting         | 300 ms on / 300 ms off at full duty             |
//! | ConnSuccess        | four 100 ms blinks, then completion             |
//! | NormalCharging     | breathing up to max brightness, 1 s rest        |
//! | LedSetup           | steady at max brightness                        |
//! | NormalFullyCharged | steady at max brightness                        |
//! | NormalLowBattery   | two 100 ms blinks, then 4 s pause               |
//! | Normal, Error      | off                                             |

use crate::config::MIN_BRIGHTNESS;
use crate::fsm::DeviceState;

/// Full duty at 8-bit resolution.
pub const FULL_DUTY: u8 = 255;

const IDLE_HOLD_MS: u32 = 100;
const SUCCESS_BLINKS: u32 = 4;
const LOW_BATTERY_BLINKS: u32 = 2;
const LOW_BATTERY_PAUSE_MS: u32 = 4_000;
const BREATH_REST_MS: u32 = 1_000;

/// One LED output step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedStep {
    pub duty: u8,
    pub hold_ms: u32,
}

impl LedStep {
    const fn new(duty: u8, hold_ms: u32) -> Self {
        Self { duty, hold_ms }
    }
}

/// Per-state step generator. Stack-allocated, no heap.
pub struct LedAnimator {
    state: Option<DeviceState>,
    phase: u32,
    sequence_done: bool,
}

impl LedAnimator {
    pub fn new() -> Self {
        Self {
            state: None,
            phase: 0,
            sequence_done: false,
        }
    }

    /// Produce the next step for `state`. A state change restarts the pattern.
    pub fn next_step(&mut self, state: DeviceState, max_brightness: u8) -> LedStep {
        if self.state != Some(state) {
            self.state = Some(state);
            self.phase = 0;
            self.sequence_done = false;
        }

        let max = max_brightness.max(MIN_BRIGHTNESS);
        let phase = self.phase;
        self.phase = self.phase.wrapping_add(1);

        match state {
            DeviceState::Setup => blink(phase, FULL_DUTY, 800),
            DeviceState::Connecting => blink(phase, FULL_DUTY, 300),
            DeviceState::ConnSuccess => {
                if phase < 2 * SUCCESS_BLINKS {
                    let step = blink(phase, FULL_DUTY, 100);
                    if phase + 1 == 2 * SUCCESS_BLINKS {
                        self.sequence_done = true;
                    }
                    step
                } else {
                    // waiting for the state machine to move on
                    LedStep::new(0, IDLE_HOLD_MS)
                }
            }
            DeviceState::NormalCharging => breathe(phase, max),
            DeviceState::LedSetup | DeviceState::NormalFullyCharged => {
                LedStep::new(max, IDLE_HOLD_MS)
            }
            DeviceState::NormalLowBattery => {
                let cycle = phase % (2 * LOW_BATTERY_BLINKS + 1);
                if cycle < 2 * LOW_BATTERY_BLINKS {
                    blink(cycle, max, 100)
                } else {
                    LedStep::new(0, LOW_BATTERY_PAUSE_MS)
                }
            }
            DeviceState::Normal | DeviceState::Error => LedStep::new(0, IDLE_HOLD_MS),
        }
    }

    /// Returns `true` once after the connection-success blinks finished.
    pub fn take_sequence_done(&mut self) -> bool {
        core::mem::take(&mut self.sequence_done)
    }
}

impl Default for LedAnimator {
    fn default() -> Self {
        Self::new()
    }
}

fn blink(phase: u32, duty: u8, hold_ms: u32) -> LedStep {
    if phase % 2 == 0 {
        LedStep::new(duty, hold_ms)
    } else {
        LedStep::new(0, hold_ms)
    }
}

/// Ramp 0..=max, pause, ramp max..=0, rest.
fn breathe(phase: u32, max: u8) -> LedStep {
    let (step_ms, pause_ms) = breath_timing(max);
    let ramp = u32::from(max) + 1;
    let cycle = phase % (2 * ramp + 2);

    if cycle < ramp {
        LedStep::new(cycle as u8, step_ms)
    } else if cycle == ramp {
        LedStep::new(max, pause_ms)
    } else if cycle < 2 * ramp + 1 {
        let down = cycle - ramp - 1;
        LedStep::new(max - down as u8, step_ms)
    } else {
        LedStep::new(0, BREATH_REST_MS)
    }
}

/// Brighter ceilings breathe faster: step delay 30..5 ms, pause 800..0 ms.
pub fn breath_timing(max: u8) -> (u32, u32) {
    (
        map_range(max, 30, 5) as u32,
        map_range(max, 800, 0) as u32,
    )
}

/// Linear map of `value` from `MIN_BRIGHTNESS..=255` onto `lo..=hi`.
fn map_range(value: u8, lo: i32, hi: i32) -> i32 {
    let in_lo = i32::from(MIN_BRIGHTNESS);
    let v = i32::from(value.max(MIN_BRIGHTNESS));
    (v - in_lo) * (hi - lo) / (255 - in_lo) + lo
}
