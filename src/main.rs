//! YIO Dock Firmware: Main Entry Point
//!
//! Hexagonal architecture with an event-driven main loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  LedAdapter   IrAdapter   NvsAdapter   WifiAdapter             │
//! │  (LedPort)    (IrPort)    (ConfigPort) (ConnectivityPort)      │
//! │  MdnsAdapter  RestartScheduler  LogEventSink                   │
//! │  (Advertise)  (SystemPort)      (EventSink)                    │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │            DockService (pure logic)                    │    │
//! │  │  FSM · ProtocolEngine · IR codecs                      │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  Threads: dock-io (serial + BT) · led · ir-rx · httpd (ws)     │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::EspWifi;
use log::{debug, info, warn};

use yiodock::adapters::bluetooth::BluetoothTransport;
use yiodock::adapters::device_id;
use yiodock::adapters::ir::IrAdapter;
use yiodock::adapters::led::{LedAdapter, LedShared, spawn_led_task};
use yiodock::adapters::log_sink::LogEventSink;
use yiodock::adapters::mdns::MdnsAdapter;
use yiodock::adapters::nvs::NvsAdapter;
use yiodock::adapters::serial::SerialTransport;
use yiodock::adapters::system::RestartScheduler;
use yiodock::adapters::time::MonotonicClock;
use yiodock::adapters::websocket::WebSocketServer;
use yiodock::adapters::wifi::{ReconnectPolicy, WifiAdapter};
use yiodock::app::ports::{ConfigPort, DockPorts};
use yiodock::app::service::DockService;
use yiodock::drivers::button::{BUTTON_LATCH, ButtonDriver};
use yiodock::drivers::{charge_pin, hw_init, watchdog};
use yiodock::events::{Event, drain_events};
use yiodock::rpc::auth::TransportKind;
use yiodock::rpc::channels::{Inbound, try_recv_inbound};
use yiodock::rpc::engine::ResponseFrame;
use yiodock::rpc::io_task;

// ── Reply routing ─────────────────────────────────────────────

/// Websocket replies go straight to their session; serial and bluetooth
/// replies are queued for the I/O task.
fn route(frames: Vec<ResponseFrame>, ws: &WebSocketServer, service: &mut DockService) {
    for frame in frames {
        if frame.to.kind == TransportKind::WebSocket {
            let (_, gone) = ws.send(&frame);
            if let Some(Inbound::Disconnected(endpoint)) = gone {
                service.on_disconnect(endpoint);
            }
        } else {
            io_task::send_response(frame);
        }
    }
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  YIO Dock v{}                      ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Board peripherals ──────────────────────────────────
    hw_init::init_peripherals().map_err(|e| anyhow!("HAL init failed: {}", e))?;
    if let Err(e) = hw_init::init_isr_service() {
        log::error!("ISR service init failed: {}; continuing without ISRs", e);
    }
    let watchdog = watchdog::Watchdog::new(watchdog::WATCHDOG_TIMEOUT_MS);
    let clock = MonotonicClock::new();

    // ── 3. Config and identity ────────────────────────────────
    let mut nvs = NvsAdapter::new().map_err(|e| anyhow!("NVS init failed: {}", e))?;
    let config = nvs.load().unwrap_or_else(|e| {
        warn!("NVS config load failed ({}), using defaults", e);
        Default::default()
    });
    let hostname = device_id::hostname(&device_id::read_mac());
    info!("Hostname: {}", hostname);

    // ── 4. Adapters ───────────────────────────────────────────
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let esp_wifi = EspWifi::new(peripherals.modem, sysloop, EspDefaultNvsPartition::take().ok())?;
    let mut wifi = WifiAdapter::new(
        esp_wifi,
        &hostname,
        ReconnectPolicy::new(config.wifi_reconnect_interval_ms, config.max_reconnect_attempts),
    );
    let mut mdns = MdnsAdapter::new(config.mdns_refresh_interval_ms);

    let led_shared = Arc::new(LedShared::new(config.effective_brightness()));
    let mut led = LedAdapter::new(led_shared.clone());
    let mut ir = IrAdapter::new().map_err(|e| anyhow!("IR init failed: {}", e))?;
    let mut system = RestartScheduler::new();
    let mut sink = LogEventSink::new();

    let loop_interval = Duration::from_millis(u64::from(config.loop_interval_ms.max(1)));
    let mut button = ButtonDriver::new(
        &BUTTON_LATCH,
        config.reset_hold_min_ms,
        config.reset_hold_max_ms,
    );
    let api_port = config.api_port;

    // ── 5. Dock service ───────────────────────────────────────
    let mut service = DockService::new(config, &hostname);
    service.start(
        charge_pin::is_charging(),
        &mut DockPorts {
            led: &mut led,
            ir: &mut ir,
            config: &mut nvs,
            connectivity: &mut wifi,
            advertise: &mut mdns,
            system: &mut system,
            sink: &mut sink,
        },
    );

    // ── 6. Transports and worker threads ──────────────────────
    let serial = SerialTransport::new().map_err(|e| anyhow!("serial: {}", e))?;
    let bluetooth = BluetoothTransport::start(&hostname).map_err(|e| anyhow!("bluetooth: {}", e))?;
    io_task::spawn(serial, bluetooth)?;
    spawn_led_task(service.state_reader(), led_shared)?;
    let ws = WebSocketServer::start(api_port).map_err(|e| anyhow!("websocket: {}", e))?;

    info!("System ready. Entering event loop.");

    // ── 7. Event loop ─────────────────────────────────────────
    loop {
        let now_ms = clock.uptime_ms();
        let sequence_done = led.take_sequence_done();
        mdns.poll(now_ms);

        let mut out: Vec<ResponseFrame> = Vec::new();
        {
            let mut ports = DockPorts {
                led: &mut led,
                ir: &mut ir,
                config: &mut nvs,
                connectivity: &mut wifi,
                advertise: &mut mdns,
                system: &mut system,
                sink: &mut sink,
            };

            // ── Hardware events ───────────────────────────────
            drain_events(|event| match event {
                Event::ChargePinAsserted | Event::ChargePinReleased => {
                    if let Some(hw) = charge_pin::hardware_event(event) {
                        service.on_hardware_event(hw, &mut ports);
                    }
                }
                Event::ButtonPressed | Event::ButtonReleased => {
                    debug!("Button edge: {:?}", event);
                }
                Event::IrCaptureReady => {
                    while let Some(capture) = ports.ir.poll_capture() {
                        out.extend(service.on_ir_captured(&capture, &mut ports));
                    }
                }
            });

            if let Some(hw) = button.tick(clock.uptime_ms_u32()) {
                service.on_hardware_event(hw, &mut ports);
            }

            // ── API input ─────────────────────────────────────
            while let Some(msg) = try_recv_inbound() {
                match msg {
                    Inbound::Connected(endpoint) => out.extend(service.on_connect(endpoint)),
                    Inbound::Frame { from, frame } => {
                        out.extend(service.handle_frame(from, &frame, &mut ports));
                    }
                    Inbound::Disconnected(endpoint) => service.on_disconnect(endpoint),
                }
            }
            service.prune_websockets(|id| ws.is_open(id));

            // ── Connectivity and LED ──────────────────────────
            if let Some(event) = ports.connectivity.poll(now_ms) {
                service.on_connectivity_event(event, &mut ports);
            }
            if sequence_done {
                service.on_led_sequence_done(&mut ports);
            }
        }

        route(out, &ws, &mut service);
        system.poll();

        watchdog.feed();
        std::thread::sleep(loop_interval);
    }
}
