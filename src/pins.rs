//! GPIO / peripheral pin assignments for the dock board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Charging
// ---------------------------------------------------------------------------

/// Charge-detect input. LOW while a remote sits on the dock.
pub const CHARGING_GPIO: i32 = 13;

// ---------------------------------------------------------------------------
// User button (active-low, internal pull-up)
// ---------------------------------------------------------------------------

/// Boot / factory-reset button.
pub const BUTTON_GPIO: i32 = 0;

// ---------------------------------------------------------------------------
// Status LED
// ---------------------------------------------------------------------------

pub const LED_GPIO: i32 = 23;

/// LEDC timer resolution (bits). 8-bit gives 0 – 255 duty levels.
pub const LED_PWM_RESOLUTION_BITS: u32 = 8;
/// LEDC frequency for the status LED.
pub const LED_PWM_FREQ_HZ: u32 = 5_000;
/// LEDC channel driving the status LED.
pub const LED_LEDC_CHANNEL: u32 = 0;

// ---------------------------------------------------------------------------
// Infrared
// ---------------------------------------------------------------------------

/// Demodulating IR receiver output.
pub const IR_RECV_GPIO: i32 = 22;
/// IR LED driver.
pub const IR_LED_GPIO: i32 = 19;

/// RMT channel used for transmission.
pub const IR_TX_RMT_CHANNEL: u32 = 0;
/// RMT channel used for reception.
pub const IR_RX_RMT_CHANNEL: u32 = 2;

// ---------------------------------------------------------------------------
// Serial API (UART0, shared with the console)
// ---------------------------------------------------------------------------

pub const SERIAL_UART_NUM: i32 = 0;
pub const SERIAL_BAUD: i32 = 115_200;
/// UART driver RX ring buffer (bytes).
pub const SERIAL_RX_BUF: i32 = 1024;
