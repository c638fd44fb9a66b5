//! YIO dock firmware library.
//!
//! Exposes the dock core, the API protocol, the IR codecs and the board
//! adapters for integration testing and the firmware binary. All
//! ESP-IDF-specific code is guarded by `#[cfg(target_os = "espidf")]`
//! within each module and falls back to a host simulation elsewhere.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod error;
pub mod events;
pub mod fsm;
pub mod ir;
pub mod pins;
pub mod rpc;

pub mod adapters;
pub mod drivers;
