//! Infrared adapter: RMT transmitter and receiver.
//!
//! Implements [`IrPort`]. Transmission converts mark/space timings into
//! RMT items and sends them with the carrier enabled. Reception runs on a
//! small thread that pulls finished frames out of the RMT ring buffer,
//! converts them to a [`Capture`] and pushes `Event::IrCaptureReady`; the
//! main loop then collects it through [`IrPort::poll_capture`].
//!
//! - **`target_os = "espidf"`**: legacy RMT driver through raw sys calls
//!   (1 tick = 1 µs).
//! - **all other targets**: transmissions are recorded and captures are
//!   injected by tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use log::{info, warn};

use crate::app::ports::IrPort;
use crate::events::{Event, push_event};
use crate::ir::{Capture, IrError, RawCode};

// ── Constants ────────────────────────────────────────────────

/// APB 80 MHz / 80 = 1 MHz, so RMT ticks are microseconds.
pub const RMT_CLK_DIV: u8 = 80;

/// Largest duration one RMT item half can hold.
pub const MAX_HALF_TICKS: u32 = 0x7FFF;

/// Carrier duty cycle for transmission.
pub const CARRIER_DUTY_PERCENT: u8 = 50;

/// Captures waiting for the main loop. Older ones are kept, newer dropped.
pub const CAPTURE_QUEUE_DEPTH: usize = 4;

// ── RMT item conversion ──────────────────────────────────────

fn item(level0: bool, dur0: u32, level1: bool, dur1: u32) -> u32 {
    (dur0 & MAX_HALF_TICKS)
        | (u32::from(level0) << 15)
        | ((dur1 & MAX_HALF_TICKS) << 16)
        | (u32::from(level1) << 31)
}

fn halves(item: u32) -> [(bool, u32); 2] {
    [
        (item & (1 << 15) != 0, item & MAX_HALF_TICKS),
        (item & (1 << 31) != 0, (item >> 16) & MAX_HALF_TICKS),
    ]
}

/// Encode alternating mark/space µs timings as RMT items. Marks drive the
/// output high. Long durations are split across several halves and the
/// sequence always ends with a zero-length terminator half.
pub fn encode_items(timings: &[u16]) -> Vec<u32> {
    let mut parts: Vec<(bool, u32)> = Vec::with_capacity(timings.len() + 1);
    for (i, &t) in timings.iter().enumerate() {
        let level = i % 2 == 0;
        let mut left = u32::from(t);
        while left > MAX_HALF_TICKS {
            parts.push((level, MAX_HALF_TICKS));
            left -= MAX_HALF_TICKS;
        }
        if left > 0 {
            parts.push((level, left));
        }
    }
    parts.push((false, 0));
    if parts.len() % 2 != 0 {
        parts.push((false, 0));
    }
    parts
        .chunks_exact(2)
        .map(|p| item(p[0].0, p[0].1, p[1].0, p[1].1))
        .collect()
}

/// Decode received RMT items into alternating mark/space durations.
///
/// `mark_level` is the line level during a mark (the demodulating receiver
/// pulls low). Adjacent halves at the same level are merged, leading
/// spaces are skipped and a zero-length half ends the frame.
pub fn decode_items(items: &[u32], mark_level: bool) -> Vec<u32> {
    let mut out: Vec<u32> = Vec::new();
    let mut last_level: Option<bool> = None;
    'items: for &it in items {
        for (level, dur) in halves(it) {
            if dur == 0 {
                break 'items;
            }
            let is_mark = level == mark_level;
            if out.is_empty() && !is_mark {
                continue;
            }
            match (last_level, out.last_mut()) {
                (Some(prev), Some(last)) if prev == level => *last += dur,
                _ => out.push(dur),
            }
            last_level = Some(level);
        }
    }
    out
}

// ── Capture queue ────────────────────────────────────────────

type CaptureQueue = Arc<Mutex<VecDeque<Capture>>>;

/// Queue a capture for the main loop and raise `IrCaptureReady`.
fn enqueue_capture(queue: &CaptureQueue, capture: Capture) -> bool {
    let Ok(mut q) = queue.lock() else {
        return false;
    };
    if q.len() >= CAPTURE_QUEUE_DEPTH {
        warn!("IR: capture queue full, dropping capture");
        return false;
    }
    q.push_back(capture);
    push_event(Event::IrCaptureReady);
    true
}

// ── Adapter ──────────────────────────────────────────────────

pub struct IrAdapter {
    receiving: Arc<AtomicBool>,
    captures: CaptureQueue,
    #[cfg(not(target_os = "espidf"))]
    sim_sent: Vec<RawCode>,
}

#[cfg(target_os = "espidf")]
impl IrAdapter {
    /// Install the TX and RX RMT channels and start the receive thread.
    pub fn new() -> Result<Self, IrError> {
        use crate::ir::DEFAULT_FREQUENCY_HZ;
        use crate::ir::capture::CAPTURE_TIMEOUT_MS;
        use crate::pins::{IR_LED_GPIO, IR_RECV_GPIO, IR_RX_RMT_CHANNEL, IR_TX_RMT_CHANNEL};
        use esp_idf_svc::sys::*;

        unsafe {
            let mut tx: rmt_config_t = core::mem::zeroed();
            tx.rmt_mode = rmt_mode_t_RMT_MODE_TX;
            tx.channel = IR_TX_RMT_CHANNEL as rmt_channel_t;
            tx.gpio_num = IR_LED_GPIO;
            tx.clk_div = RMT_CLK_DIV;
            tx.mem_block_num = 1;
            tx.__bindgen_anon_1.tx_config.carrier_freq_hz = u32::from(DEFAULT_FREQUENCY_HZ);
            tx.__bindgen_anon_1.tx_config.carrier_level = rmt_carrier_level_t_RMT_CARRIER_LEVEL_HIGH;
            tx.__bindgen_anon_1.tx_config.idle_level = rmt_idle_level_t_RMT_IDLE_LEVEL_LOW;
            tx.__bindgen_anon_1.tx_config.carrier_duty_percent = CARRIER_DUTY_PERCENT;
            tx.__bindgen_anon_1.tx_config.carrier_en = true;
            tx.__bindgen_anon_1.tx_config.idle_output_en = true;
            let ret = rmt_config(&tx);
            if ret != ESP_OK as i32 {
                return Err(IrError::TransmitFailed(ret));
            }
            let ret = rmt_driver_install(tx.channel, 0, 0);
            if ret != ESP_OK as i32 {
                return Err(IrError::TransmitFailed(ret));
            }

            let mut rx: rmt_config_t = core::mem::zeroed();
            rx.rmt_mode = rmt_mode_t_RMT_MODE_RX;
            rx.channel = IR_RX_RMT_CHANNEL as rmt_channel_t;
            rx.gpio_num = IR_RECV_GPIO;
            rx.clk_div = RMT_CLK_DIV;
            // a long capture needs more than one 64-item block
            rx.mem_block_num = 2;
            rx.__bindgen_anon_1.rx_config.idle_threshold = (CAPTURE_TIMEOUT_MS * 1000) as u16;
            rx.__bindgen_anon_1.rx_config.filter_ticks_thresh = 100;
            rx.__bindgen_anon_1.rx_config.filter_en = true;
            let ret = rmt_config(&rx);
            if ret != ESP_OK as i32 {
                return Err(IrError::TransmitFailed(ret));
            }
            let ret = rmt_driver_install(rx.channel, 4096, 0);
            if ret != ESP_OK as i32 {
                return Err(IrError::TransmitFailed(ret));
            }
        }

        let receiving = Arc::new(AtomicBool::new(false));
        let captures: CaptureQueue = Arc::new(Mutex::new(VecDeque::new()));
        let (flag, queue) = (receiving.clone(), captures.clone());
        if let Err(e) = crate::drivers::task_pin::spawn_on_core(
            crate::drivers::task_pin::Core::Pro,
            5,
            4,
            "ir-rx\0",
            move || rx_loop(&flag, &queue),
        ) {
            warn!("IR: receive thread failed to start: {}", e);
        }

        info!("IR: RMT ready (tx ch{}, rx ch{})", IR_TX_RMT_CHANNEL, IR_RX_RMT_CHANNEL);
        Ok(Self {
            receiving,
            captures,
        })
    }
}

/// Pull finished frames out of the RMT ring buffer while receiving is on.
#[cfg(target_os = "espidf")]
fn rx_loop(receiving: &AtomicBool, queue: &CaptureQueue) {
    use crate::pins::IR_RX_RMT_CHANNEL;
    use esp_idf_svc::sys::*;

    let mut ring: RingbufHandle_t = core::ptr::null_mut();
    let ret = unsafe { rmt_get_ringbuf_handle(IR_RX_RMT_CHANNEL as rmt_channel_t, &mut ring) };
    if ret != ESP_OK as i32 || ring.is_null() {
        warn!("IR: no RMT ring buffer ({})", ret);
        return;
    }

    loop {
        if !receiving.load(Ordering::Acquire) {
            std::thread::sleep(std::time::Duration::from_millis(50));
            continue;
        }
        let mut size: usize = 0;
        // 50 ms at the default 100 Hz tick
        let raw = unsafe { xRingbufferReceive(ring, &mut size, 5) };
        if raw.is_null() {
            continue;
        }
        let items = unsafe {
            core::slice::from_raw_parts(raw.cast::<u32>(), size / core::mem::size_of::<u32>())
        };
        let durations = decode_items(items, false);
        unsafe { vRingbufferReturnItem(ring, raw) };

        let capture = Capture::new(durations);
        if !capture.is_noise() {
            enqueue_capture(queue, capture);
        }
    }
}

#[cfg(target_os = "espidf")]
impl IrPort for IrAdapter {
    fn transmit(&mut self, code: &RawCode) -> Result<(), IrError> {
        use crate::pins::IR_TX_RMT_CHANNEL;
        use esp_idf_svc::sys::*;

        let items = encode_items(&code.timings);
        let freq = u32::from(code.frequency_hz.max(1));
        // carrier ticks count the undivided 80 MHz APB clock
        let half = (80_000_000 / freq / 2).clamp(1, u32::from(u16::MAX)) as u16;
        let channel = IR_TX_RMT_CHANNEL as rmt_channel_t;
        unsafe {
            let ret = rmt_set_tx_carrier(
                channel,
                true,
                half,
                half,
                rmt_carrier_level_t_RMT_CARRIER_LEVEL_HIGH,
            );
            if ret != ESP_OK as i32 {
                return Err(IrError::TransmitFailed(ret));
            }
            let ret = rmt_write_items(
                channel,
                items.as_ptr().cast::<rmt_item32_t>(),
                items.len() as i32,
                true,
            );
            if ret != ESP_OK as i32 {
                return Err(IrError::TransmitFailed(ret));
            }
        }
        info!("IR: sent {} timings at {} Hz", code.timings.len(), code.frequency_hz);
        Ok(())
    }

    fn set_receiving(&mut self, enabled: bool) {
        use crate::pins::IR_RX_RMT_CHANNEL;
        use esp_idf_svc::sys::*;

        let channel = IR_RX_RMT_CHANNEL as rmt_channel_t;
        let ret = unsafe {
            if enabled {
                rmt_rx_start(channel, true)
            } else {
                rmt_rx_stop(channel)
            }
        };
        if ret != ESP_OK as i32 {
            warn!("IR: receiver {} failed ({})", if enabled { "start" } else { "stop" }, ret);
        }
        self.receiving.store(enabled, Ordering::Release);
    }

    fn poll_capture(&mut self) -> Option<Capture> {
        self.captures.lock().ok()?.pop_front()
    }
}

// ── Simulation ───────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
impl IrAdapter {
    pub fn new() -> Result<Self, IrError> {
        info!("IR(sim): transmitter and receiver ready");
        Ok(Self {
            receiving: Arc::new(AtomicBool::new(false)),
            captures: Arc::new(Mutex::new(VecDeque::new())),
            sim_sent: Vec::new(),
        })
    }

    pub fn is_receiving(&self) -> bool {
        self.receiving.load(Ordering::Acquire)
    }

    /// Deliver RMT items as if the receiver had finished a frame.
    pub fn inject_items(&self, items: &[u32]) -> bool {
        if !self.is_receiving() {
            return false;
        }
        let capture = Capture::new(decode_items(items, false));
        !capture.is_noise() && enqueue_capture(&self.captures, capture)
    }

    pub fn take_sent(&mut self) -> Vec<RawCode> {
        core::mem::take(&mut self.sim_sent)
    }
}

#[cfg(not(target_os = "espidf"))]
impl IrPort for IrAdapter {
    fn transmit(&mut self, code: &RawCode) -> Result<(), IrError> {
        if code.timings.is_empty() {
            return Err(IrError::TransmitFailed(-1));
        }
        info!(
            "IR(sim): sent {} timings at {} Hz ({} items)",
            code.timings.len(),
            code.frequency_hz,
            encode_items(&code.timings).len()
        );
        self.sim_sent.push(code.clone());
        Ok(())
    }

    fn set_receiving(&mut self, enabled: bool) {
        self.receiving.store(enabled, Ordering::Release);
    }

    fn poll_capture(&mut self) -> Option<Capture> {
        self.captures.lock().ok()?.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_pairs_marks_and_spaces() {
        let items = encode_items(&[9000, 4500, 560]);
        assert_eq!(items.len(), 2);
        assert_eq!(halves(items[0]), [(true, 9000), (false, 4500)]);
        assert_eq!(halves(items[1]), [(true, 560), (false, 0)]);
    }

    #[test]
    fn encode_splits_long_durations() {
        let items = encode_items(&[100, 65535]);
        let all: Vec<(bool, u32)> = items.iter().flat_map(|&i| halves(i)).collect();
        assert_eq!(all[0], (true, 100));
        assert_eq!(all[1], (false, MAX_HALF_TICKS));
        assert_eq!(all[2], (false, MAX_HALF_TICKS));
        assert_eq!(all[3], (false, 65535 - 2 * MAX_HALF_TICKS));
        assert_eq!(all.last().map(|h| h.1), Some(0));
    }

    #[test]
    fn decode_inverts_receiver_level_and_merges() {
        // receiver idles high: low = mark
        let items = [
            item(true, 300, false, 9000),
            item(true, 4500, false, 560),
            item(false, 100, true, 1690),
            item(false, 560, false, 0),
        ];
        assert_eq!(decode_items(&items, false), vec![9000, 4500, 660, 1690, 560]);
    }

    #[test]
    fn encode_then_decode_keeps_timings() {
        let timings = [9000u16, 4500, 560, 1690, 560, 560];
        let items = encode_items(&timings);
        let back = decode_items(&items, true);
        assert_eq!(back, timings.iter().map(|&t| u32::from(t)).collect::<Vec<_>>());
    }

    #[test]
    fn sim_captures_only_while_receiving() {
        let mut ir = IrAdapter::new().unwrap();
        let frame: Vec<u32> = (0..8).map(|_| item(false, 560, true, 560)).collect();

        assert!(!ir.inject_items(&frame));
        ir.set_receiving(true);
        assert!(ir.inject_items(&frame));
        let capture = ir.poll_capture().unwrap();
        assert_eq!(capture.durations_us.len(), 16);
        assert!(ir.poll_capture().is_none());
    }

    #[test]
    fn sim_drops_noise_and_overflow() {
        let mut ir = IrAdapter::new().unwrap();
        ir.set_receiving(true);
        assert!(!ir.inject_items(&[item(false, 560, true, 560)]));

        let frame: Vec<u32> = (0..8).map(|_| item(false, 560, true, 560)).collect();
        for _ in 0..CAPTURE_QUEUE_DEPTH {
            assert!(ir.inject_items(&frame));
        }
        assert!(!ir.inject_items(&frame));
    }

    #[test]
    fn sim_records_transmissions() {
        let mut ir = IrAdapter::new().unwrap();
        let code = RawCode {
            frequency_hz: 38_000,
            timings: vec![9000, 4500],
        };
        ir.transmit(&code).unwrap();
        assert_eq!(ir.take_sent(), vec![code]);
        assert!(ir
            .transmit(&RawCode {
                frequency_hz: 38_000,
                timings: vec![]
            })
            .is_err());
    }
}
