//! Board drivers: inputs, status LED animation and peripheral helpers.

pub mod button;
pub mod charge_pin;
pub mod hw_init;
pub mod led_patterns;
pub mod task_pin;
pub mod watchdog;
