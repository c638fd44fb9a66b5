//! Transport abstraction: any byte-oriented stream channel.
//!
//! Concrete implementations:
//! - UART0 serial ([`SerialTransport`](crate::adapters::serial::SerialTransport))
//! - BLE UART-style GATT service
//!   ([`BluetoothTransport`](crate::adapters::bluetooth::BluetoothTransport))
//!
//! Websocket is message-oriented and handled by its own adapter; it never
//! goes through this trait.

/// Byte-oriented transport channel.
pub trait Transport {
    /// Error type for this transport.
    type Error: core::fmt::Debug + core::fmt::Display;

    /// Read up to `buf.len()` bytes into `buf`.
    /// Returns 0 if no data is available (non-blocking).
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Write `data`. Returns the number of bytes accepted.
    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error>;

    /// Flush any buffered output.
    fn flush(&mut self) -> Result<(), Self::Error>;

    /// A peer is attached. Serial is always considered connected.
    fn is_connected(&self) -> bool {
        true
    }
}

/// Write all of `data`, looping over short writes.
pub fn write_all<T: Transport + ?Sized>(t: &mut T, mut data: &[u8]) -> Result<(), T::Error> {
    while !data.is_empty() {
        let n = t.write(data)?;
        if n == 0 {
            break;
        }
        data = &data[n..];
    }
    t.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Accepts at most `chunk` bytes per write.
    struct Trickle {
        chunk: usize,
        out: Vec<u8>,
        flushed: bool,
    }

    impl Transport for Trickle {
        type Error = &'static str;

        fn read(&mut self, _buf: &mut [u8]) -> Result<usize, Self::Error> {
            Ok(0)
        }

        fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error> {
            let n = data.len().min(self.chunk);
            self.out.extend_from_slice(&data[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> Result<(), Self::Error> {
            self.flushed = true;
            Ok(())
        }
    }

    #[test]
    fn write_all_loops_over_short_writes() {
        let mut t = Trickle {
            chunk: 3,
            out: Vec::new(),
            flushed: false,
        };
        write_all(&mut t, b"{\"type\":\"dock\"}").unwrap();
        assert_eq!(t.out, b"{\"type\":\"dock\"}");
        assert!(t.flushed);
        assert!(t.is_connected());
    }

    #[test]
    fn write_all_stops_on_zero_progress() {
        let mut t = Trickle {
            chunk: 0,
            out: Vec::new(),
            flushed: false,
        };
        write_all(&mut t, b"abc").unwrap();
        assert!(t.out.is_empty());
    }
}
