//! Transport-agnostic JSON API.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        API Stack                            │
//! │                                                             │
//! │  ┌───────────┐   ┌─────────────┐   ┌─────────────────────┐  │
//! │  │ Transport │──▶│ BraceFramer │──▶│ Engine (dispatcher) │  │
//! │  │ (io_task) │   │ (codec)     │   │  → DockService      │  │
//! │  └───────────┘   └─────────────┘   └─────────────────────┘  │
//! │       ▲                                       │             │
//! │       │        channels (Inbound/Outbound)    │             │
//! │       └───────────────────────────────────────┘             │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod auth;
pub mod channels;
pub mod codec;
pub mod engine;
pub mod io_task;
pub mod messages;
pub mod transport;
