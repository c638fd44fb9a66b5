//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises the dock service
//! against mock adapters. All tests run on the host with no real
//! hardware required.

mod auth_tests;
mod dispatcher_tests;
mod mock_hw;
mod provisioning_flow_tests;
mod state_machine_tests;
