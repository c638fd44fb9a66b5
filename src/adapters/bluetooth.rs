//! Bluetooth serial transport: a UART-style BLE GATT service.
//!
//! The client writes bytes to the RX characteristic and receives replies
//! as notifications on the TX characteristic (the de-facto "Nordic UART"
//! layout, so generic BLE serial terminals work out of the box).
//!
//! ## GATT Service Layout
//!
//! | Characteristic | UUID                                   | Perms          |
//! |----------------|----------------------------------------|----------------|
//! | RX             | `6e400002-b5a3-f393-e0a9-e50e24dcca9e` | Write, WriteNR |
//! | TX             | `6e400003-b5a3-f393-e0a9-e50e24dcca9e` | Notify         |
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: Bluedroid GATT server driven by static
//!   callbacks; received bytes land in a shared [`RxQueue`].
//! - **all other targets**: an in-memory peer for tests.

use core::fmt;
use std::sync::Mutex;

use log::{info, warn};

use crate::rpc::transport::Transport;

// ───────────────────────────────────────────────────────────────
// Constants
// ───────────────────────────────────────────────────────────────

pub const SERVICE_UUID: u128 = 0x6e400001_b5a3_f393_e0a9_e50e24dcca9e;
pub const CHAR_RX_UUID: u128 = 0x6e400002_b5a3_f393_e0a9_e50e24dcca9e;
pub const CHAR_TX_UUID: u128 = 0x6e400003_b5a3_f393_e0a9_e50e24dcca9e;

/// Bytes buffered between the GATT callback and the I/O thread.
pub const RX_CAPACITY: usize = 1024;

const DEFAULT_MTU: u16 = 23;
const ATT_HEADER_LEN: usize = 3;

// ───────────────────────────────────────────────────────────────
// Errors
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BluetoothError {
    /// Controller init/enable failed.
    Controller(i32),
    /// Bluedroid init/enable failed.
    Stack(i32),
    /// No central is connected.
    NotConnected,
    /// Notification send failed.
    Notify(i32),
}

impl fmt::Display for BluetoothError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Controller(rc) => write!(f, "BT controller init failed ({})", rc),
            Self::Stack(rc) => write!(f, "Bluedroid init failed ({})", rc),
            Self::NotConnected => write!(f, "no bluetooth client connected"),
            Self::Notify(rc) => write!(f, "notify failed ({})", rc),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// RX queue
// ───────────────────────────────────────────────────────────────

/// Byte FIFO filled from the GATT write callback (Bluedroid task) and
/// drained by the I/O thread.
pub struct RxQueue {
    inner: Mutex<heapless::Deque<u8, RX_CAPACITY>>,
}

impl RxQueue {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(heapless::Deque::new()),
        }
    }

    /// Append `data`. Returns how many bytes did not fit.
    pub fn push_slice(&self, data: &[u8]) -> usize {
        let Ok(mut q) = self.inner.lock() else {
            return data.len();
        };
        let mut dropped = 0;
        for &b in data {
            if q.push_back(b).is_err() {
                dropped += 1;
            }
        }
        dropped
    }

    /// Move up to `buf.len()` bytes out. Returns the count.
    pub fn pop_into(&self, buf: &mut [u8]) -> usize {
        let Ok(mut q) = self.inner.lock() else {
            return 0;
        };
        let mut n = 0;
        while n < buf.len() {
            match q.pop_front() {
                Some(b) => {
                    buf[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        n
    }

    pub fn clear(&self) {
        if let Ok(mut q) = self.inner.lock() {
            q.clear();
        }
    }
}

impl Default for RxQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Split `data` into notification payloads for the negotiated MTU.
pub fn notify_chunks(data: &[u8], mtu: u16) -> core::slice::Chunks<'_, u8> {
    data.chunks((mtu as usize).saturating_sub(ATT_HEADER_LEN).max(1))
}

fn log_dropped(dropped: usize) {
    if dropped > 0 {
        warn!("BT: RX buffer full, {} byte(s) dropped", dropped);
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF Bluedroid state
// ───────────────────────────────────────────────────────────────
//
// Bluedroid callbacks are C function pointers that cannot capture Rust
// closures. These statics bridge the callback context to the transport.

#[cfg(target_os = "espidf")]
mod gatt {
    use core::sync::atomic::{AtomicBool, AtomicU16, AtomicU8, Ordering};

    use esp_idf_svc::sys::*;
    use log::info;

    use super::{CHAR_RX_UUID, CHAR_TX_UUID, DEFAULT_MTU, RxQueue, SERVICE_UUID, log_dropped};
    use crate::rpc::auth::Endpoint;
    use crate::rpc::channels::{Inbound, post_inbound};

    pub(super) static RX: RxQueue = RxQueue::new();
    pub(super) static CONNECTED: AtomicBool = AtomicBool::new(false);
    pub(super) static MTU: AtomicU16 = AtomicU16::new(DEFAULT_MTU);
    pub(super) static GATTS_IF: AtomicU8 = AtomicU8::new(0);
    pub(super) static CONN_ID: AtomicU16 = AtomicU16::new(0);
    pub(super) static TX_HANDLE: AtomicU16 = AtomicU16::new(0);
    static SVC_HANDLE: AtomicU16 = AtomicU16::new(0);
    static RX_HANDLE: AtomicU16 = AtomicU16::new(0);

    /// Client Characteristic Configuration descriptor.
    const CCCD_UUID: u16 = 0x2902;

    fn uuid128(uuid: u128) -> esp_bt_uuid_t {
        let mut t: esp_bt_uuid_t = unsafe { core::mem::zeroed() };
        t.len = 16;
        t.uuid.uuid128 = uuid.to_le_bytes();
        t
    }

    pub(super) fn adv_params() -> esp_ble_adv_params_t {
        esp_ble_adv_params_t {
            adv_int_min: 0x20,
            adv_int_max: 0x40,
            adv_type: esp_ble_adv_type_t_ADV_TYPE_IND,
            own_addr_type: esp_ble_addr_type_t_BLE_ADDR_TYPE_PUBLIC,
            channel_map: esp_ble_adv_channel_t_ADV_CHNL_ALL,
            adv_filter_policy: esp_ble_adv_filter_t_ADV_FILTER_ALLOW_SCAN_ANY_CON_ANY,
            ..unsafe { core::mem::zeroed() }
        }
    }

    pub(super) unsafe extern "C" fn gap_event_handler(
        event: esp_gap_ble_cb_event_t,
        _param: *mut esp_ble_gap_cb_param_t,
    ) {
        match event {
            esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_DATA_SET_COMPLETE_EVT => {
                let mut params = adv_params();
                unsafe { esp_ble_gap_start_advertising(&mut params) };
            }
            esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_START_COMPLETE_EVT => {
                info!("BT: advertising started");
            }
            _ => {}
        }
    }

    pub(super) unsafe extern "C" fn gatts_event_handler(
        event: esp_gatts_cb_event_t,
        gatts_if: esp_gatt_if_t,
        param: *mut esp_ble_gatts_cb_param_t,
    ) {
        match event {
            esp_gatts_cb_event_t_ESP_GATTS_REG_EVT => {
                GATTS_IF.store(gatts_if, Ordering::Relaxed);
                let mut svc_id = esp_gatt_srvc_id_t {
                    id: esp_gatt_id_t {
                        uuid: uuid128(SERVICE_UUID),
                        inst_id: 0,
                    },
                    is_primary: true,
                };
                unsafe { esp_ble_gatts_create_service(gatts_if, &mut svc_id, 8) };
            }
            esp_gatts_cb_event_t_ESP_GATTS_CREATE_EVT => {
                let svc = unsafe { (*param).create.service_handle };
                SVC_HANDLE.store(svc, Ordering::Relaxed);
                let mut uuid = uuid128(CHAR_RX_UUID);
                unsafe {
                    esp_ble_gatts_start_service(svc);
                    esp_ble_gatts_add_char(
                        svc,
                        &mut uuid,
                        ESP_GATT_PERM_WRITE as esp_gatt_perm_t,
                        (ESP_GATT_CHAR_PROP_BIT_WRITE | ESP_GATT_CHAR_PROP_BIT_WRITE_NR)
                            as esp_gatt_char_prop_t,
                        core::ptr::null_mut(),
                        core::ptr::null_mut(),
                    );
                }
            }
            esp_gatts_cb_event_t_ESP_GATTS_ADD_CHAR_EVT => {
                let handle = unsafe { (*param).add_char.attr_handle };
                let svc = SVC_HANDLE.load(Ordering::Relaxed);
                if RX_HANDLE.load(Ordering::Relaxed) == 0 {
                    RX_HANDLE.store(handle, Ordering::Relaxed);
                    let mut uuid = uuid128(CHAR_TX_UUID);
                    unsafe {
                        esp_ble_gatts_add_char(
                            svc,
                            &mut uuid,
                            ESP_GATT_PERM_READ as esp_gatt_perm_t,
                            ESP_GATT_CHAR_PROP_BIT_NOTIFY as esp_gatt_char_prop_t,
                            core::ptr::null_mut(),
                            core::ptr::null_mut(),
                        );
                    }
                } else {
                    TX_HANDLE.store(handle, Ordering::Relaxed);
                    let mut cccd: esp_bt_uuid_t = unsafe { core::mem::zeroed() };
                    cccd.len = 2;
                    cccd.uuid.uuid16 = CCCD_UUID;
                    unsafe {
                        esp_ble_gatts_add_char_descr(
                            svc,
                            &mut cccd,
                            (ESP_GATT_PERM_READ | ESP_GATT_PERM_WRITE) as esp_gatt_perm_t,
                            core::ptr::null_mut(),
                            core::ptr::null_mut(),
                        );
                    }
                    info!("BT: UART service registered");
                }
            }
            esp_gatts_cb_event_t_ESP_GATTS_CONNECT_EVT => {
                let conn_id = unsafe { (*param).connect.conn_id };
                CONN_ID.store(conn_id, Ordering::Relaxed);
                MTU.store(DEFAULT_MTU, Ordering::Relaxed);
                RX.clear();
                CONNECTED.store(true, Ordering::Release);
                info!("BT: client connected (conn_id={})", conn_id);
                post_inbound(Inbound::Connected(Endpoint::BLUETOOTH));
            }
            esp_gatts_cb_event_t_ESP_GATTS_DISCONNECT_EVT => {
                CONNECTED.store(false, Ordering::Release);
                info!("BT: client disconnected");
                post_inbound(Inbound::Disconnected(Endpoint::BLUETOOTH));
                let mut params = adv_params();
                unsafe { esp_ble_gap_start_advertising(&mut params) };
            }
            esp_gatts_cb_event_t_ESP_GATTS_MTU_EVT => {
                let mtu = unsafe { (*param).mtu.mtu };
                MTU.store(mtu, Ordering::Relaxed);
            }
            esp_gatts_cb_event_t_ESP_GATTS_WRITE_EVT => {
                let p = unsafe { &(*param).write };
                // CCCD writes (notification enable) need no action
                if p.handle == RX_HANDLE.load(Ordering::Relaxed) && !p.value.is_null() {
                    let data = unsafe { core::slice::from_raw_parts(p.value, p.len as usize) };
                    log_dropped(RX.push_slice(data));
                }
            }
            _ => {}
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Transport
// ───────────────────────────────────────────────────────────────

pub struct BluetoothTransport {
    #[cfg(not(target_os = "espidf"))]
    sim: SimPeer,
}

#[cfg(not(target_os = "espidf"))]
struct SimPeer {
    rx: RxQueue,
    connected: bool,
    mtu: u16,
    notifications: Vec<Vec<u8>>,
}

#[cfg(target_os = "espidf")]
impl BluetoothTransport {
    /// Bring up the controller and Bluedroid, register the UART service
    /// and advertise as `name`.
    pub fn start(name: &str) -> Result<Self, BluetoothError> {
        use esp_idf_svc::sys::*;

        unsafe {
            // BLE only; classic BT memory goes back to the heap.
            esp_bt_controller_mem_release(esp_bt_mode_t_ESP_BT_MODE_CLASSIC_BT);

            let mut bt_cfg = esp_bt_controller_config_t::default();
            let ret = esp_bt_controller_init(&mut bt_cfg);
            if ret != ESP_OK as i32 {
                return Err(BluetoothError::Controller(ret));
            }
            let ret = esp_bt_controller_enable(esp_bt_mode_t_ESP_BT_MODE_BLE);
            if ret != ESP_OK as i32 {
                return Err(BluetoothError::Controller(ret));
            }
            let ret = esp_bluedroid_init();
            if ret != ESP_OK as i32 {
                return Err(BluetoothError::Stack(ret));
            }
            let ret = esp_bluedroid_enable();
            if ret != ESP_OK as i32 {
                return Err(BluetoothError::Stack(ret));
            }

            esp_ble_gap_register_callback(Some(gatt::gap_event_handler));
            esp_ble_gatts_register_callback(Some(gatt::gatts_event_handler));
            esp_ble_gatts_app_register(0);

            let mut c_name = [0u8; 33];
            let len = name.len().min(c_name.len() - 1);
            c_name[..len].copy_from_slice(&name.as_bytes()[..len]);
            esp_ble_gap_set_device_name(c_name.as_ptr().cast());

            // Advertising starts once the data is set (GAP callback).
            let mut adv_data = esp_ble_adv_data_t {
                set_scan_rsp: false,
                include_name: true,
                include_txpower: false,
                flag: (ESP_BLE_ADV_FLAG_GEN_DISC | ESP_BLE_ADV_FLAG_BREDR_NOT_SPT) as u8,
                ..core::mem::zeroed()
            };
            esp_ble_gap_config_adv_data(&mut adv_data);
        }

        info!("BT: serial service advertising as '{}'", name);
        Ok(Self {})
    }
}

#[cfg(target_os = "espidf")]
impl Transport for BluetoothTransport {
    type Error = BluetoothError;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, BluetoothError> {
        Ok(gatt::RX.pop_into(buf))
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, BluetoothError> {
        use core::sync::atomic::Ordering;
        use esp_idf_svc::sys::*;

        if !self.is_connected() {
            return Err(BluetoothError::NotConnected);
        }
        let gatts_if = gatt::GATTS_IF.load(Ordering::Relaxed);
        let conn_id = gatt::CONN_ID.load(Ordering::Relaxed);
        let handle = gatt::TX_HANDLE.load(Ordering::Relaxed);
        for chunk in notify_chunks(data, gatt::MTU.load(Ordering::Relaxed)) {
            let ret = unsafe {
                esp_ble_gatts_send_indicate(
                    gatts_if,
                    conn_id,
                    handle,
                    chunk.len() as u16,
                    chunk.as_ptr().cast_mut(),
                    false,
                )
            };
            if ret != ESP_OK as i32 {
                return Err(BluetoothError::Notify(ret));
            }
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<(), BluetoothError> {
        Ok(())
    }

    fn is_connected(&self) -> bool {
        gatt::CONNECTED.load(core::sync::atomic::Ordering::Acquire)
    }
}

// ── Simulation ───────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
impl BluetoothTransport {
    pub fn start(name: &str) -> Result<Self, BluetoothError> {
        info!(
            "BT(sim): advertising '{}' (service {:032x})",
            name, SERVICE_UUID
        );
        Ok(Self {
            sim: SimPeer {
                rx: RxQueue::new(),
                connected: false,
                mtu: DEFAULT_MTU,
                notifications: Vec::new(),
            },
        })
    }

    pub fn sim_connect(&mut self, mtu: u16) {
        self.sim.rx.clear();
        self.sim.connected = true;
        self.sim.mtu = mtu;
    }

    pub fn sim_disconnect(&mut self) {
        self.sim.connected = false;
    }

    /// The peer writes to the RX characteristic.
    pub fn sim_peer_write(&mut self, data: &[u8]) {
        log_dropped(self.sim.rx.push_slice(data));
    }

    /// Notifications sent so far, one entry per packet.
    pub fn take_notifications(&mut self) -> Vec<Vec<u8>> {
        core::mem::take(&mut self.sim.notifications)
    }
}

#[cfg(not(target_os = "espidf"))]
impl Transport for BluetoothTransport {
    type Error = BluetoothError;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, BluetoothError> {
        Ok(self.sim.rx.pop_into(buf))
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, BluetoothError> {
        if !self.sim.connected {
            return Err(BluetoothError::NotConnected);
        }
        for chunk in notify_chunks(data, self.sim.mtu) {
            self.sim.notifications.push(chunk.to_vec());
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<(), BluetoothError> {
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.sim.connected
    }
}

// ── Tests ────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rx_queue_fifo_and_overflow() {
        let q = RxQueue::new();
        assert_eq!(q.push_slice(b"abc"), 0);
        let mut buf = [0u8; 2];
        assert_eq!(q.pop_into(&mut buf), 2);
        assert_eq!(&buf, b"ab");
        assert_eq!(q.pop_into(&mut buf), 1);
        assert_eq!(buf[0], b'c');

        let big = vec![7u8; RX_CAPACITY + 5];
        assert_eq!(q.push_slice(&big), 5);
        q.clear();
        assert_eq!(q.pop_into(&mut buf), 0);
    }

    #[test]
    fn chunks_respect_att_header() {
        let data = [0u8; 45];
        let sizes: Vec<usize> = notify_chunks(&data, 23).map(<[u8]>::len).collect();
        assert_eq!(sizes, vec![20, 20, 5]);
        // degenerate MTU still makes progress
        assert_eq!(notify_chunks(&data, 0).count(), 45);
    }

    #[test]
    fn sim_write_requires_connection() {
        let mut bt = BluetoothTransport::start("YIO-Dock-TEST").unwrap();
        assert!(!bt.is_connected());
        assert_eq!(bt.write(b"x"), Err(BluetoothError::NotConnected));

        bt.sim_connect(23);
        let reply = b"{\"type\":\"auth_ok\"}\n";
        assert_eq!(bt.write(reply).unwrap(), reply.len());
        let packets = bt.take_notifications();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0], reply);
    }

    #[test]
    fn sim_peer_bytes_are_readable() {
        let mut bt = BluetoothTransport::start("YIO-Dock-TEST").unwrap();
        bt.sim_connect(185);
        bt.sim_peer_write(b"{\"a\":1}");
        let mut buf = [0u8; 16];
        let n = bt.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"{\"a\":1}");
    }
}
