//! Integration test harness.
//!
//! Drives the full supervisory agent against mock ports on the host —
//! no radios, sockets, or flash involved.

#![cfg(not(target_os = "espidf"))]

mod agent_tests;
mod mock_ports;
mod ota_tests;
