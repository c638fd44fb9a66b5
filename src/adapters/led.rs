//! Status LED adapter and animation thread.
//!
//! The animation runs on its own core-pinned thread: it reads the device
//! state through a [`StateReader`], asks the [`LedAnimator`] for the next
//! step, writes the LEDC duty and sleeps for the step's hold time. The
//! main loop only touches the [`LedShared`] atomics through [`LedAdapter`].
//!
//! ```text
//!  main loop ──LedPort──▶ LedShared ◀── LED thread ──▶ LEDC duty
//!                          (max, done)     ▲
//!                                          └── StateReader
//! ```

use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::info;

use crate::app::ports::LedPort;
use crate::config::{MIN_BRIGHTNESS, clamp_brightness};
use crate::drivers::hw_init::ledc_set;
use crate::drivers::led_patterns::{LedAnimator, LedStep};
use crate::fsm::StateReader;
use crate::pins::LED_LEDC_CHANNEL;

/// State shared between the main loop and the LED thread.
pub struct LedShared {
    max_brightness: AtomicU8,
    sequence_done: AtomicBool,
}

impl LedShared {
    pub fn new(max_brightness: u8) -> Self {
        Self {
            max_brightness: AtomicU8::new(max_brightness.max(MIN_BRIGHTNESS)),
            sequence_done: AtomicBool::new(false),
        }
    }

    pub fn max_brightness(&self) -> u8 {
        self.max_brightness.load(Ordering::Relaxed)
    }
}

// ── Port adapter ─────────────────────────────────────────────

pub struct LedAdapter {
    shared: Arc<LedShared>,
}

impl LedAdapter {
    pub fn new(shared: Arc<LedShared>) -> Self {
        Self { shared }
    }

    /// True once after the animator finished the connection-success blinks.
    pub fn take_sequence_done(&self) -> bool {
        self.shared.sequence_done.swap(false, Ordering::AcqRel)
    }
}

impl LedPort for LedAdapter {
    fn set_max_brightness(&mut self, brightness: u8) {
        let b = clamp_brightness(i64::from(brightness));
        self.shared.max_brightness.store(b, Ordering::Relaxed);
    }

    fn max_brightness(&self) -> u8 {
        self.shared.max_brightness()
    }

    fn off(&mut self) {
        ledc_set(LED_LEDC_CHANNEL, 0);
    }
}

// ── Animation thread ─────────────────────────────────────────

/// Render one animation step. Returns the step for the caller to hold.
pub fn animate_once(animator: &mut LedAnimator, reader: &StateReader, shared: &LedShared) -> LedStep {
    let step = animator.next_step(reader.get(), shared.max_brightness());
    ledc_set(LED_LEDC_CHANNEL, step.duty);
    if animator.take_sequence_done() {
        shared.sequence_done.store(true, Ordering::Release);
    }
    step
}

fn run_led_loop(reader: StateReader, shared: Arc<LedShared>) {
    let mut animator = LedAnimator::new();
    info!("LED task started");
    loop {
        let step = animate_once(&mut animator, &reader, &shared);
        std::thread::sleep(Duration::from_millis(u64::from(step.hold_ms.max(1))));
    }
}

/// Spawn the animation thread on Core 0 at low priority.
pub fn spawn_led_task(
    reader: StateReader,
    shared: Arc<LedShared>,
) -> std::io::Result<std::thread::JoinHandle<()>> {
    crate::drivers::task_pin::spawn_on_core(
        crate::drivers::task_pin::Core::Pro,
        3,
        4,
        "led\0",
        move || run_led_loop(reader, shared),
    )
}
