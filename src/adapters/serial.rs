//! UART0 serial transport.
//!
//! The API shares UART0 with the log console: frames are cut out of the
//! byte stream by the brace framer, so interleaved log lines on the host
//! side are harmless.
//!
//! - **`target_os = "espidf"`**: raw `uart_driver_install` plus non-blocking
//!   `uart_read_bytes` / `uart_write_bytes`.
//! - **all other targets**: in-memory RX/TX buffers for tests.

use core::fmt;

use log::info;

use crate::rpc::transport::Transport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialError {
    /// Driver install failed with the given `esp_err_t`.
    Install(i32),
    /// Read or write returned a negative count.
    Io,
}

impl fmt::Display for SerialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Install(rc) => write!(f, "uart driver install failed ({})", rc),
            Self::Io => write!(f, "uart I/O error"),
        }
    }
}

pub struct SerialTransport {
    #[cfg(not(target_os = "espidf"))]
    sim_rx: std::collections::VecDeque<u8>,
    #[cfg(not(target_os = "espidf"))]
    sim_tx: Vec<u8>,
}

// ── ESP-IDF ──────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
impl SerialTransport {
    /// Install the UART driver on the console port.
    pub fn new() -> Result<Self, SerialError> {
        use crate::pins::{SERIAL_BAUD, SERIAL_RX_BUF, SERIAL_UART_NUM};
        use esp_idf_svc::sys::*;

        // The console already configured baud and framing; only the
        // driver (for non-blocking reads) is missing.
        unsafe {
            let ret = uart_driver_install(
                SERIAL_UART_NUM as uart_port_t,
                SERIAL_RX_BUF,
                0,
                0,
                core::ptr::null_mut(),
                0,
            );
            // already installed by the console is fine
            if ret != ESP_OK as i32 && ret != ESP_FAIL {
                return Err(SerialError::Install(ret));
            }
        }
        info!("Serial: UART{} at {} baud", SERIAL_UART_NUM, SERIAL_BAUD);
        Ok(Self {})
    }
}

#[cfg(target_os = "espidf")]
impl Transport for SerialTransport {
    type Error = SerialError;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, SerialError> {
        let n = unsafe {
            esp_idf_svc::sys::uart_read_bytes(
                crate::pins::SERIAL_UART_NUM as esp_idf_svc::sys::uart_port_t,
                buf.as_mut_ptr().cast(),
                buf.len() as u32,
                0,
            )
        };
        usize::try_from(n).map_err(|_| SerialError::Io)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, SerialError> {
        let n = unsafe {
            esp_idf_svc::sys::uart_write_bytes(
                crate::pins::SERIAL_UART_NUM as esp_idf_svc::sys::uart_port_t,
                data.as_ptr().cast(),
                data.len(),
            )
        };
        usize::try_from(n).map_err(|_| SerialError::Io)
    }

    fn flush(&mut self) -> Result<(), SerialError> {
        Ok(())
    }
}

// ── Simulation ───────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
impl SerialTransport {
    pub fn new() -> Result<Self, SerialError> {
        info!("Serial(sim): in-memory port");
        Ok(Self {
            sim_rx: std::collections::VecDeque::new(),
            sim_tx: Vec::new(),
        })
    }

    /// Queue bytes as if typed on the host terminal.
    pub fn inject(&mut self, data: &[u8]) {
        self.sim_rx.extend(data);
    }

    /// Everything written so far, clearing the buffer.
    pub fn take_output(&mut self) -> Vec<u8> {
        core::mem::take(&mut self.sim_tx)
    }
}

#[cfg(not(target_os = "espidf"))]
impl Transport for SerialTransport {
    type Error = SerialError;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, SerialError> {
        let n = buf.len().min(self.sim_rx.len());
        for (slot, b) in buf.iter_mut().zip(self.sim_rx.drain(..n)) {
            *slot = b;
        }
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, SerialError> {
        self.sim_tx.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<(), SerialError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::transport::write_all;

    #[test]
    fn sim_reads_injected_bytes_in_chunks() {
        let mut serial = SerialTransport::new().unwrap();
        serial.inject(b"{\"type\":\"auth\"}");

        let mut buf = [0u8; 8];
        assert_eq!(serial.read(&mut buf).unwrap(), 8);
        assert_eq!(&buf, b"{\"type\":");
        let n = serial.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"\"auth\"}");
        assert_eq!(serial.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn sim_collects_writes() {
        let mut serial = SerialTransport::new().unwrap();
        write_all(&mut serial, b"pong\n").unwrap();
        assert_eq!(serial.take_output(), b"pong\n");
        assert!(serial.take_output().is_empty());
        assert!(serial.is_connected());
    }

    #[test]
    fn error_display() {
        assert_eq!(
            SerialError::Install(-1).to_string(),
            "uart driver install failed (-1)"
        );
    }
}
