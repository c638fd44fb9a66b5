//! Interrupt-driven event queue.
//!
//! Events are produced by:
//! - GPIO ISRs (charge-detect pin edges, reset button edges)
//! - The RMT receive callback (a capture is ready to collect)
//!
//! Events are consumed by the main loop, which drains the queue once per
//! iteration and turns each event into a service call. ISRs never touch
//! the state machine directly.
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ Charge ISR  │────▶│              │     │              │
//! │ Button ISR  │────▶│  Event Queue │────▶│  Main Loop   │
//! │ RMT rx done │────▶│  (lock-free) │     │  (consumer)  │
//! └─────────────┘     └──────────────┘     └──────────────┘
//! ```

use core::sync::atomic::{AtomicU8, Ordering};

/// Maximum number of pending events (one slot stays free).
/// Power of 2 for efficient ring buffer modulo.
pub const EVENT_QUEUE_CAP: usize = 32;

/// Hardware event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Event {
    // ── Charging ──────────────────────────────────────────
    /// Charge-detect pin went active (remote on the dock).
    ChargePinAsserted = 0,
    /// Charge-detect pin released.
    ChargePinReleased = 1,

    // ── User input ────────────────────────────────────────
    /// Reset button went down.
    ButtonPressed = 10,
    /// Reset button came up.
    ButtonReleased = 11,

    // ── IR ────────────────────────────────────────────────
    /// The receiver finished a capture.
    IrCaptureReady = 20,
}

impl Event {
    fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::ChargePinAsserted),
            1 => Some(Self::ChargePinReleased),
            10 => Some(Self::ButtonPressed),
            11 => Some(Self::ButtonReleased),
            20 => Some(Self::IrCaptureReady),
            _ => None,
        }
    }
}

// ── Lock-free SPSC ring buffer ────────────────────────────────
//
// ISRs write (produce), main loop reads (consume).
// Slots are atomics too, so no `static mut` is needed.

pub struct EventQueue {
    head: AtomicU8,
    tail: AtomicU8,
    slots: [AtomicU8; EVENT_QUEUE_CAP],
}

impl EventQueue {
    pub const fn new() -> Self {
        Self {
            head: AtomicU8::new(0),
            tail: AtomicU8::new(0),
            slots: [const { AtomicU8::new(0) }; EVENT_QUEUE_CAP],
        }
    }

    /// Safe to call from ISR context (no allocation, no locks).
    /// Returns `false` if the queue is full (event dropped).
    pub fn push(&self, event: Event) -> bool {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        let next_head = (head + 1) % EVENT_QUEUE_CAP as u8;

        if next_head == tail {
            return false;
        }

        self.slots[head as usize].store(event as u8, Ordering::Relaxed);
        self.head.store(next_head, Ordering::Release);
        true
    }

    /// Single consumer only.
    pub fn pop(&self) -> Option<Event> {
        loop {
            let tail = self.tail.load(Ordering::Relaxed);
            let head = self.head.load(Ordering::Acquire);
            if tail == head {
                return None;
            }

            let raw = self.slots[tail as usize].load(Ordering::Relaxed);
            self.tail
                .store((tail + 1) % EVENT_QUEUE_CAP as u8, Ordering::Release);

            // unknown bytes cannot be produced by `push`; skip defensively
            if let Some(event) = Event::from_u8(raw) {
                return Some(event);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tail.load(Ordering::Relaxed) == self.head.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Relaxed) as usize;
        let tail = self.tail.load(Ordering::Relaxed) as usize;
        (head + EVENT_QUEUE_CAP - tail) % EVENT_QUEUE_CAP
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

// ── Global queue ─────────────────────────────────────────────

static EVENTS: EventQueue = EventQueue::new();

/// Push an event into the global queue. ISR-safe.
///
/// GPIO ISRs and the IR receive thread both produce, so pushes are
/// serialised with a critical section to keep the ring single-producer.
pub fn push_event(event: Event) -> bool {
    critical_section::with(|_| EVENTS.push(event))
}

/// Pop the next event from the global queue (main loop only).
pub fn pop_event() -> Option<Event> {
    EVENTS.pop()
}

/// Drain all pending events into a callback, in FIFO order.
pub fn drain_events(mut handler: impl FnMut(Event)) {
    while let Some(event) = pop_event() {
        handler(event);
    }
}

pub fn queue_is_empty() -> bool {
    EVENTS.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order() {
        let q = EventQueue::new();
        assert!(q.push(Event::ButtonPressed));
        assert!(q.push(Event::ChargePinAsserted));
        assert!(q.push(Event::ButtonReleased));
        assert_eq!(q.len(), 3);
        assert_eq!(q.pop(), Some(Event::ButtonPressed));
        assert_eq!(q.pop(), Some(Event::ChargePinAsserted));
        assert_eq!(q.pop(), Some(Event::ButtonReleased));
        assert_eq!(q.pop(), None);
        assert!(q.is_empty());
    }

    #[test]
    fn full_queue_drops_event() {
        let q = EventQueue::new();
        for _ in 0..EVENT_QUEUE_CAP - 1 {
            assert!(q.push(Event::IrCaptureReady));
        }
        assert!(!q.push(Event::ChargePinReleased));
        assert_eq!(q.len(), EVENT_QUEUE_CAP - 1);

        // space frees up after a pop
        q.pop();
        assert!(q.push(Event::ChargePinReleased));
    }

    #[test]
    fn wraps_around() {
        let q = EventQueue::new();
        for round in 0..3 * EVENT_QUEUE_CAP {
            let e = if round % 2 == 0 {
                Event::ChargePinAsserted
            } else {
                Event::ChargePinReleased
            };
            assert!(q.push(e));
            assert_eq!(q.pop(), Some(e));
        }
    }

    #[test]
    fn producer_thread_and_consumer() {
        static Q: EventQueue = EventQueue::new();
        let producer = std::thread::spawn(|| {
            let mut sent = 0;
            while sent < 200 {
                if Q.push(Event::ButtonPressed) {
                    sent += 1;
                }
            }
        });

        let mut received = 0;
        while received < 200 {
            if Q.pop().is_some() {
                received += 1;
            }
        }
        producer.join().unwrap();
        assert!(Q.is_empty());
    }
}
