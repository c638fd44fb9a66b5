//! Charge-detect input.
//!
//! The pin reads LOW while a remote sits on the dock. The ISR fires on
//! both edges and pushes the new level into the event queue; the main
//! loop turns those into charge triggers. The initial level is read once
//! at boot because no edge fires for a remote that was already docked.

use crate::app::commands::HardwareEvent;
use crate::drivers::hw_init;
use crate::events::{Event, push_event};
use crate::pins;

/// `true` when a remote is charging (pin LOW).
pub fn is_charging() -> bool {
    !hw_init::gpio_read(pins::CHARGING_GPIO)
}

/// ISR handler for the charge-detect GPIO. `level_high` is the pin level
/// after the edge.
pub fn charge_isr_handler(level_high: bool) -> bool {
    push_event(edge_event(level_high))
}

fn edge_event(level_high: bool) -> Event {
    if level_high {
        Event::ChargePinReleased
    } else {
        Event::ChargePinAsserted
    }
}

/// Map a queued charge event to a service input.
pub fn hardware_event(event: Event) -> Option<HardwareEvent> {
    match event {
        Event::ChargePinAsserted => Some(HardwareEvent::ChargePinAsserted),
        Event::ChargePinReleased => Some(HardwareEvent::ChargePinReleased),
        _ => None,
    }
}
