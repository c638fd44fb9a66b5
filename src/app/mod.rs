//! Application core: dock logic, zero I/O.
//!
//! This module contains the business rules for the dock: command
//! execution, state-machine orchestration, provisioning and the IR
//! receive broadcast. All interaction with hardware happens through
//! **port traits** defined in [`ports`], keeping this layer fully
//! testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
