//! Async stream-transport I/O task.
//!
//! Runs in a dedicated thread using `edge-executor` for cooperative
//! multi-task scheduling and `async-io-mini` for reactor-driven
//! timers. Two concurrent futures:
//!
//! 1. **Read**: polls the serial and bluetooth links every
//!    [`READ_POLL_MS`], echoes bluetooth input and cuts `{...}` frames
//!    that go to the main loop through [`INBOUND`](super::channels::INBOUND).
//! 2. **Write**: wakes on `OUTBOUND.receive().await` and writes the
//!    reply, newline terminated, to the link it is addressed to.
//!
//! ```text
//!  ┌────────────────────────────────────────────────────────┐
//!  │  I/O Thread                                            │
//!  │  ┌──────────────────────────────────────────────────┐  │
//!  │  │  edge_executor::LocalExecutor                    │  │
//!  │  │   ┌────────────────────┐  ┌──────────────────┐   │  │
//!  │  │   │ Read serial + bt   │  │ Write (async)    │   │  │
//!  │  │   │ 10ms ⏱             │  │ wake-on-send     │   │  │
//!  │  │   └────────────────────┘  └──────────────────┘   │  │
//!  │  └──────────────────────────────────────────────────┘  │
//!  └────────────────────────────────────────────────────────┘
//! ```
//!
//! Websocket traffic never passes through here; the HTTP server owns
//! those sockets.

use core::cell::RefCell;
use core::time::Duration;
use std::rc::Rc;

use log::{debug, info, warn};

use super::auth::{Endpoint, TransportKind};
use super::channels::{OUTBOUND, Outbound, post_frame};
use super::codec::BraceFramer;
use super::engine::ResponseFrame;
use super::transport::{Transport, write_all};

const READ_BUF_SIZE: usize = 256;

/// Interval between read polls of the stream transports.
pub const READ_POLL_MS: u64 = 10;

/// Keep-alive filler some bluetooth serial terminals send continuously.
pub const ECHO_SKIP_BYTE: u8 = 0xFF;

// ── Link ─────────────────────────────────────────────────────

/// Receives every complete frame a link cuts.
pub type FrameSink = fn(Endpoint, &[u8]) -> bool;

/// One stream transport plus its frame extractor.
pub struct Link<T: Transport> {
    endpoint: Endpoint,
    transport: T,
    framer: BraceFramer,
    sink: FrameSink,
    echo: bool,
    was_connected: bool,
}

impl<T: Transport> Link<T> {
    pub fn new(endpoint: Endpoint, transport: T) -> Self {
        Self {
            endpoint,
            transport,
            framer: BraceFramer::new(),
            sink: post_frame,
            echo: false,
            was_connected: false,
        }
    }

    /// Echo every received byte except [`ECHO_SKIP_BYTE`] back to the sender.
    pub fn with_echo(mut self) -> Self {
        self.echo = true;
        self
    }

    /// Deliver frames somewhere other than the inbound channel.
    pub fn with_sink(mut self, sink: FrameSink) -> Self {
        self.sink = sink;
        self
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Read whatever is pending and post complete frames. Returns the
    /// number of frames posted.
    pub fn poll_read(&mut self, buf: &mut [u8]) -> usize {
        let connected = self.transport.is_connected();
        if connected != self.was_connected {
            // a partial frame never survives a reconnect
            self.framer.reset();
            self.was_connected = connected;
        }
        if !connected {
            return 0;
        }

        let n = match self.transport.read(buf) {
            Ok(n) => n,
            Err(e) => {
                warn!("IO[{}]: read failed: {}", self.endpoint, e);
                self.framer.reset();
                return 0;
            }
        };
        if n == 0 {
            return 0;
        }

        let data = &buf[..n];
        if self.echo {
            let echoed: heapless::Vec<u8, READ_BUF_SIZE> = data
                .iter()
                .copied()
                .filter(|&b| b != ECHO_SKIP_BYTE)
                .take(READ_BUF_SIZE)
                .collect();
            if let Err(e) = write_all(&mut self.transport, &echoed) {
                debug!("IO[{}]: echo failed: {}", self.endpoint, e);
            }
        }

        let (endpoint, sink) = (self.endpoint, self.sink);
        let mut frames = 0;
        self.framer.feed(data, |frame| {
            if sink(endpoint, frame) {
                frames += 1;
            }
        });
        frames
    }

    /// Write one reply line.
    pub fn send(&mut self, text: &str) -> bool {
        if !self.transport.is_connected() {
            debug!("IO[{}]: not connected, reply dropped", self.endpoint);
            return false;
        }
        let result = write_all(&mut self.transport, text.as_bytes())
            .and_then(|()| write_all(&mut self.transport, b"\n"));
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!("IO[{}]: write failed: {}", self.endpoint, e);
                false
            }
        }
    }
}

// ── Async I/O loop ───────────────────────────────────────────

type Shared<T> = Rc<RefCell<Link<T>>>;

async fn read_loop<S: Transport, B: Transport>(serial: Shared<S>, bt: Shared<B>) {
    let mut buf = [0u8; READ_BUF_SIZE];
    loop {
        serial.borrow_mut().poll_read(&mut buf);
        bt.borrow_mut().poll_read(&mut buf);
        async_io_mini::Timer::after(Duration::from_millis(READ_POLL_MS)).await;
    }
}

/// Deliver one outbound reply to the matching link.
fn route<S: Transport, B: Transport>(out: &Outbound, serial: &mut Link<S>, bt: &mut Link<B>) -> bool {
    match out.to.kind {
        TransportKind::Serial => serial.send(&out.text),
        TransportKind::Bluetooth => bt.send(&out.text),
        TransportKind::WebSocket => {
            warn!("IO: websocket reply for {} on stream channel, dropped", out.to);
            false
        }
    }
}

async fn write_loop<S: Transport, B: Transport>(serial: Shared<S>, bt: Shared<B>) {
    loop {
        let out = OUTBOUND.receive().await;
        route(&out, &mut serial.borrow_mut(), &mut bt.borrow_mut());
    }
}

fn run_io_loop<S: Transport + 'static, B: Transport + 'static>(serial: S, bt: B) {
    let executor: edge_executor::LocalExecutor<'_, 4> = edge_executor::LocalExecutor::new();

    let serial: Shared<S> = Rc::new(RefCell::new(Link::new(Endpoint::SERIAL, serial)));
    let bt: Shared<B> = Rc::new(RefCell::new(
        Link::new(Endpoint::BLUETOOTH, bt).with_echo(),
    ));

    executor.spawn(read_loop(serial.clone(), bt.clone())).detach();
    executor.spawn(write_loop(serial, bt)).detach();

    info!("IO task started (serial + bluetooth)");

    futures_lite::future::block_on(executor.run(core::future::pending::<()>()));
}

// ── Thread spawn ─────────────────────────────────────────────

/// Spawn the I/O task in a dedicated thread pinned to Core 0 (PRO_CPU),
/// next to the BT controller task.
pub fn spawn<S, B>(serial: S, bt: B) -> std::io::Result<std::thread::JoinHandle<()>>
where
    S: Transport + Send + 'static,
    B: Transport + Send + 'static,
{
    crate::drivers::task_pin::spawn_on_core(
        crate::drivers::task_pin::Core::Pro,
        10,
        8,
        "dock-io\0",
        move || run_io_loop(serial, bt),
    )
}

// ── Channel accessors for the main loop ──────────────────────

/// Queue a reply for a serial or bluetooth endpoint.
pub fn send_response(frame: ResponseFrame) -> bool {
    let to = frame.to;
    if OUTBOUND.try_send(frame).is_err() {
        warn!("RPC: outbound channel full, reply for {} dropped", to);
        return false;
    }
    true
}

// ── Tests ────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;

    #[derive(Default)]
    struct Pipe {
        rx: VecDeque<u8>,
        tx: Vec<u8>,
        down: bool,
    }

    impl Transport for Pipe {
        type Error = &'static str;

        fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
            let n = buf.len().min(self.rx.len());
            for slot in buf.iter_mut().take(n) {
                *slot = self.rx.pop_front().unwrap_or_default();
            }
            Ok(n)
        }

        fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error> {
            self.tx.extend_from_slice(data);
            Ok(data.len())
        }

        fn flush(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }

        fn is_connected(&self) -> bool {
            !self.down
        }
    }

    fn pipe(input: &[u8]) -> Pipe {
        Pipe {
            rx: input.iter().copied().collect(),
            ..Pipe::default()
        }
    }

    thread_local! {
        static FRAMES: RefCell<Vec<(Endpoint, Vec<u8>)>> = const { RefCell::new(Vec::new()) };
    }

    fn collect(from: Endpoint, frame: &[u8]) -> bool {
        FRAMES.with(|f| f.borrow_mut().push((from, frame.to_vec())));
        true
    }

    fn take_frames() -> Vec<(Endpoint, Vec<u8>)> {
        FRAMES.with(|f| core::mem::take(&mut *f.borrow_mut()))
    }

    #[test]
    fn frames_are_posted_and_echo_skips_filler() {
        let mut link = Link::new(Endpoint::BLUETOOTH, pipe(b"\xFF{\"a\":1}\xFFx"))
            .with_echo()
            .with_sink(collect);
        let mut buf = [0u8; 64];
        assert_eq!(link.poll_read(&mut buf), 1);
        assert_eq!(link.transport().tx, b"{\"a\":1}x");
        assert_eq!(
            take_frames(),
            vec![(Endpoint::BLUETOOTH, b"{\"a\":1}".to_vec())]
        );
    }

    #[test]
    fn split_reads_join_into_one_frame() {
        let mut link = Link::new(Endpoint::SERIAL, pipe(b"{\"type\":")).with_sink(collect);
        let mut buf = [0u8; 64];
        assert_eq!(link.poll_read(&mut buf), 0);
        link.transport_mut().rx.extend(b"\"ping\"}");
        assert_eq!(link.poll_read(&mut buf), 1);
        assert_eq!(take_frames()[0].1, b"{\"type\":\"ping\"}");
    }

    #[test]
    fn serial_link_does_not_echo() {
        let mut link = Link::new(Endpoint::SERIAL, pipe(b"abc")).with_sink(collect);
        let mut buf = [0u8; 8];
        assert_eq!(link.poll_read(&mut buf), 0);
        assert!(link.transport().tx.is_empty());
    }

    #[test]
    fn send_appends_newline() {
        let mut link = Link::new(Endpoint::SERIAL, Pipe::default());
        assert!(link.send("{\"type\":\"auth_ok\"}"));
        assert_eq!(link.transport().tx, b"{\"type\":\"auth_ok\"}\n");
    }

    #[test]
    fn disconnected_link_drops_reply_and_partial_frame() {
        let mut link = Link::new(Endpoint::BLUETOOTH, pipe(b"{\"partial\"")).with_sink(collect);
        let mut buf = [0u8; 32];
        link.poll_read(&mut buf);

        link.transport_mut().down = true;
        assert!(!link.send("x"));
        assert_eq!(link.poll_read(&mut buf), 0);

        // reconnect: the stale prefix is gone, so this is a fresh frame
        link.transport_mut().down = false;
        link.transport_mut().rx.extend(b"}");
        assert_eq!(link.poll_read(&mut buf), 0);
    }

    #[test]
    fn route_by_transport_kind() {
        let mut serial = Link::new(Endpoint::SERIAL, Pipe::default());
        let mut bt = Link::new(Endpoint::BLUETOOTH, Pipe::default());

        let to_bt = ResponseFrame {
            to: Endpoint::BLUETOOTH,
            text: "bt".into(),
        };
        assert!(route(&to_bt, &mut serial, &mut bt));
        assert_eq!(bt.transport().tx, b"bt\n");
        assert!(serial.transport().tx.is_empty());

        let to_ws = ResponseFrame {
            to: Endpoint::websocket(3),
            text: "ws".into(),
        };
        assert!(!route(&to_ws, &mut serial, &mut bt));
    }
}
