//! Local administrative interface.
//!
//! A transport-agnostic request/response surface for the secondary
//! channel (setup portal, local HTTP, serial console — whichever the
//! build wires up).  It stays available when the broker is unreachable,
//! which is the whole point: fallback mode still serves `Info` and
//! basic control.
//!
//! Control requests run through the same dispatch path as broker
//! commands — same actuator write, same state publish attempt, same
//! synchronous persistence.  Bypassing persistence here would fork the
//! stored record from reality.

use serde::Serialize;

use crate::app::ports::{ActuatorPort, BrokerPort, StoragePort};
use crate::commands::Command;
use crate::dispatch::{self, DispatchOutcome};
use crate::identity::DeviceIdentity;
use crate::state::DeviceState;
use crate::telemetry::StatusInfo;

/// Requests the secondary channel can make.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminRequest {
    /// Device identity and health snapshot.
    Info,
    /// Direct power control.
    SetPower { power: bool },
}

/// Identity/health snapshot answered to `Info`.
#[derive(Debug, Serialize)]
pub struct DeviceInfo<'a> {
    pub device_id: &'a str,
    pub device_type: &'a str,
    pub firmware_version: &'a str,
    pub mac_address: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<heapless::String<16>>,
    pub free_heap: u32,
    pub uptime_ms: u64,
    pub power: bool,
}

#[derive(Debug)]
pub enum AdminResponse<'a> {
    Info(DeviceInfo<'a>),
    Ok,
    /// Request not applicable to this device class.
    Rejected(&'static str),
}

/// Answer one administrative request.
#[allow(clippy::too_many_arguments)]
pub fn handle<'a>(
    request: AdminRequest,
    state: &mut DeviceState,
    identity: &'a DeviceIdentity,
    broker: &mut impl BrokerPort,
    hw: &mut impl ActuatorPort,
    store: &mut impl StoragePort,
    info: &StatusInfo,
    now_ms: u64,
) -> AdminResponse<'a> {
    match request {
        AdminRequest::Info => AdminResponse::Info(DeviceInfo {
            device_id: &identity.device_id,
            device_type: identity.class.display_name(),
            firmware_version: identity.firmware_version,
            mac_address: &identity.mac_address,
            ip_address: info.ip_address.clone(),
            free_heap: info.free_heap,
            uptime_ms: info.uptime_ms,
            power: state.power,
        }),
        AdminRequest::SetPower { power } => {
            if !identity.class.has_actuator() {
                return AdminResponse::Rejected("device has no actuator");
            }
            let outcome = dispatch::execute(
                Command::SetPower { power },
                state,
                identity,
                broker,
                hw,
                store,
                info,
                now_ms,
            );
            debug_assert_eq!(outcome, DispatchOutcome::Handled);
            AdminResponse::Ok
        }
    }
}
