//! Command dispatcher.
//!
//! Routes inbound broker messages: the command channel is decoded and
//! dispatched here, the OTA channel is handed to the update executor,
//! anything else is ignored.  Malformed payloads and unknown or
//! class-unsupported command names are logged and dropped with zero
//! side effects — nothing in this module can error out the loop.
//!
//! Every mutating command runs the same four steps, in order: mutate
//! [`DeviceState`], drive the actuator port, publish the state snapshot,
//! persist the record.  The local button and the admin interface reuse
//! [`execute`] so all three input paths share identical semantics.

use log::{debug, info, warn};

use crate::app::ports::{ActuatorPort, BrokerPort, StoragePort};
use crate::commands::{self, Command, DecodedCommand};
use crate::identity::DeviceIdentity;
use crate::ota::OtaExecutor;
use crate::state::{self, DeviceClass, DeviceState};
use crate::telemetry::{self, StatusInfo};

/// What one inbound message amounted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Command applied (or OTA directive accepted).
    Handled,
    /// Malformed, unknown, unsupported, or off-topic; no side effects.
    Ignored,
    /// A graceful restart was requested; `online=false` has already been
    /// announced and the caller owns the flush delay + restart.
    RestartRequested,
}

/// Translate device state into actuator port calls.
///
/// The relay gates everything: with power off the light output is
/// driven to zero regardless of the stored brightness/colour.
pub fn apply_actuators(hw: &mut impl ActuatorPort, state: &DeviceState, class: DeviceClass) {
    if !class.has_actuator() {
        return;
    }
    hw.set_power(state.power);
    if class == DeviceClass::SmartLight {
        if state.power {
            hw.set_brightness(state.brightness);
            hw.set_color(state.color_r, state.color_g, state.color_b);
        } else {
            hw.set_brightness(0);
        }
    }
}

/// Apply one validated, class-supported command.
///
/// Shared by the broker path, the local button, and the admin surface.
#[allow(clippy::too_many_arguments)]
pub fn execute(
    cmd: Command,
    state: &mut DeviceState,
    identity: &DeviceIdentity,
    broker: &mut impl BrokerPort,
    hw: &mut impl ActuatorPort,
    store: &mut impl StoragePort,
    info: &StatusInfo,
    now_ms: u64,
) -> DispatchOutcome {
    match cmd {
        Command::SetPower { power } => {
            state.power = power;
        }
        Command::SetBrightness { brightness } => {
            state.brightness = brightness;
        }
        Command::SetColor { r, g, b } => {
            state.color_r = r;
            state.color_g = g;
            state.color_b = b;
        }
        Command::Toggle => {
            state.power = !state.power;
        }
        Command::GetStatus => {
            telemetry::publish_status(broker, identity, state, info, now_ms);
            telemetry::publish_state(broker, identity, state, now_ms);
            return DispatchOutcome::Handled;
        }
        Command::GetSensors => {
            telemetry::publish_state(broker, identity, state, now_ms);
            return DispatchOutcome::Handled;
        }
        Command::Restart => {
            info!("dispatch: restart requested");
            telemetry::publish_online(broker, identity, state, false, now_ms);
            return DispatchOutcome::RestartRequested;
        }
    }

    // Mutating path: hardware write, state publish, synchronous persist —
    // all before the loop yields, bounding the inconsistency window to
    // this cycle.
    apply_actuators(hw, state, identity.class);
    telemetry::publish_state(broker, identity, state, now_ms);
    if let Err(e) = state::persist(state, identity.class, store) {
        warn!("dispatch: state persist failed — {}", e);
    }
    DispatchOutcome::Handled
}

/// Handle one inbound broker message.
#[allow(clippy::too_many_arguments)]
pub fn handle_message(
    topic: &str,
    payload: &[u8],
    state: &mut DeviceState,
    identity: &DeviceIdentity,
    broker: &mut impl BrokerPort,
    hw: &mut impl ActuatorPort,
    store: &mut impl StoragePort,
    ota: &mut OtaExecutor,
    info: &StatusInfo,
    now_ms: u64,
) -> DispatchOutcome {
    if topic == identity.topics.command.as_str() {
        return handle_command_payload(payload, state, identity, broker, hw, store, info, now_ms);
    }

    if topic == identity.topics.ota.as_str() {
        return match commands::decode_directive(payload) {
            Ok(directive) => {
                ota.handle_directive(directive, broker, identity);
                DispatchOutcome::Handled
            }
            Err(e) => {
                warn!("dispatch: malformed OTA directive — {}", e);
                DispatchOutcome::Ignored
            }
        };
    }

    debug!("dispatch: message on unrecognized topic {}", topic);
    DispatchOutcome::Ignored
}

#[allow(clippy::too_many_arguments)]
fn handle_command_payload(
    payload: &[u8],
    state: &mut DeviceState,
    identity: &DeviceIdentity,
    broker: &mut impl BrokerPort,
    hw: &mut impl ActuatorPort,
    store: &mut impl StoragePort,
    info: &StatusInfo,
    now_ms: u64,
) -> DispatchOutcome {
    let cmd = match commands::decode_command(payload) {
        Ok(DecodedCommand::Command(cmd)) => cmd,
        Ok(DecodedCommand::Unknown(name)) => {
            warn!("dispatch: unknown command '{}', ignoring", name);
            return DispatchOutcome::Ignored;
        }
        Err(e) => {
            warn!("dispatch: malformed command payload — {}", e);
            return DispatchOutcome::Ignored;
        }
    };

    if !identity.class.supports(cmd.kind()) {
        warn!(
            "dispatch: command {:?} not supported by {}, ignoring",
            cmd.kind(),
            identity.class.display_name()
        );
        return DispatchOutcome::Ignored;
    }

    info!("dispatch: handling {:?}", cmd.kind());
    execute(cmd, state, identity, broker, hw, store, info, now_ms)
}
