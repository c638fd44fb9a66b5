//! Adapters: concrete implementations of the hexagonal port traits and
//! the byte transports behind the API.
//!
//! | Adapter     | Implements         | Connects to                   |
//! |-------------|--------------------|-------------------------------|
//! | `bluetooth` | Transport          | Bluedroid GATT (UART service) |
//! | `device_id` | -                  | eFuse MAC → hostname          |
//! | `ir`        | IrPort             | RMT TX / RX channels          |
//! | `led`       | LedPort            | LEDC PWM + animation thread   |
//! | `log_sink`  | EventSink          | Console log output            |
//! | `mdns`      | AdvertisePort      | ESP-IDF mDNS responder        |
//! | `nvs`       | ConfigPort         | NVS / in-memory store         |
//! |             | StoragePort        |                               |
//! | `serial`    | Transport          | UART0                         |
//! | `system`    | SystemPort         | `esp_restart`                 |
//! | `time`      | -                  | ESP32 system timer            |
//! | `websocket` | -                  | `EspHttpServer` ws endpoint   |
//! | `wifi`      | ConnectivityPort   | ESP-IDF WiFi STA              |

pub mod bluetooth;
pub mod device_id;
pub mod ir;
pub mod led;
pub mod log_sink;
pub mod mdns;
pub mod nvs;
pub mod serial;
pub mod system;
pub mod time;
pub mod websocket;
pub mod wifi;
