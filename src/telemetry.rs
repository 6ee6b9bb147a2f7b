//! Telemetry publisher — heartbeat, status, and state channels.
//!
//! Three independent cadences, each tracked by its own
//! "time since last publish" stamp in [`DeviceState`] and compared
//! against the cycle's wall clock; no blocking sleeps.  Publishing is
//! fire-and-forget: with the session down a publish is a no-op and the
//! next scheduled one catches up — there is no queue or replay.

use log::{debug, warn};
use serde::Serialize;

use crate::app::ports::BrokerPort;
use crate::config::AgentConfig;
use crate::identity::DeviceIdentity;
use crate::state::{DeviceClass, DeviceState};

// ───────────────────────────────────────────────────────────────
// Wire payloads
// ───────────────────────────────────────────────────────────────

/// `base/online` — retained liveness announcement; `online=false` is
/// also the registered last-will payload.
#[derive(Debug, Serialize)]
pub struct OnlinePayload {
    pub online: bool,
    pub timestamp: u64,
}

/// `base/status` — retained device metadata and health.
#[derive(Debug, Serialize)]
pub struct StatusPayload<'a> {
    pub device_id: &'a str,
    pub device_type: &'a str,
    pub firmware_version: &'a str,
    pub mac_address: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<&'a str>,
    pub online: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wifi_rssi: Option<i8>,
    pub free_heap: u32,
    pub uptime_ms: u64,
}

/// `base/state` — actuator/sensor snapshot, not retained.  Which fields
/// appear depends on the device class.
#[derive(Debug, Serialize)]
pub struct StatePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brightness: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_r: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_g: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_b: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature_c: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidity_pct: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub motion: Option<bool>,
    pub timestamp: u64,
}

impl StatePayload {
    pub fn build(state: &DeviceState, class: DeviceClass, now_ms: u64) -> Self {
        let actuator = class.has_actuator();
        let color = matches!(class, DeviceClass::SmartLight);
        let sensors = class.has_sensors();
        Self {
            power: actuator.then_some(state.power),
            brightness: color.then_some(state.brightness),
            color_r: color.then_some(state.color_r),
            color_g: color.then_some(state.color_g),
            color_b: color.then_some(state.color_b),
            temperature_c: sensors.then_some(state.sensors.temperature_c),
            humidity_pct: sensors.then_some(state.sensors.humidity_pct),
            motion: sensors.then_some(state.sensors.motion),
            timestamp: now_ms,
        }
    }
}

/// Link-level facts the telemetry layer cannot observe itself; gathered
/// by the supervisory loop from the link port and platform each cycle.
#[derive(Debug, Clone, Default)]
pub struct StatusInfo {
    pub rssi: Option<i8>,
    pub ip_address: Option<heapless::String<16>>,
    pub free_heap: u32,
    pub uptime_ms: u64,
}

// ───────────────────────────────────────────────────────────────
// Publish operations
// ───────────────────────────────────────────────────────────────

fn publish_json<T: Serialize>(
    broker: &mut impl BrokerPort,
    topic: &str,
    payload: &T,
    retain: bool,
) {
    if !broker.is_connected() {
        debug!("telemetry: session down, skipping publish to {}", topic);
        return;
    }
    let bytes = match serde_json::to_vec(payload) {
        Ok(b) => b,
        Err(e) => {
            warn!("telemetry: payload serialization failed: {}", e);
            return;
        }
    };
    if let Err(e) = broker.publish(topic, &bytes, retain) {
        warn!("telemetry: publish to {} failed: {}", topic, e);
    }
}

/// Retained `{online, timestamp}` announcement; stamps the heartbeat.
pub fn publish_online(
    broker: &mut impl BrokerPort,
    identity: &DeviceIdentity,
    state: &mut DeviceState,
    online: bool,
    now_ms: u64,
) {
    let payload = OnlinePayload {
        online,
        timestamp: now_ms,
    };
    publish_json(broker, &identity.topics.online, &payload, true);
    state.last_heartbeat_ms = now_ms;
}

/// Retained status snapshot; stamps the status cadence.
pub fn publish_status(
    broker: &mut impl BrokerPort,
    identity: &DeviceIdentity,
    state: &mut DeviceState,
    info: &StatusInfo,
    now_ms: u64,
) {
    let payload = StatusPayload {
        device_id: &identity.device_id,
        device_type: identity.class.display_name(),
        firmware_version: identity.firmware_version,
        mac_address: &identity.mac_address,
        ip_address: info.ip_address.as_deref(),
        online: broker.is_connected(),
        wifi_rssi: info.rssi,
        free_heap: info.free_heap,
        uptime_ms: info.uptime_ms,
    };
    publish_json(broker, &identity.topics.status, &payload, true);
    state.last_status_ms = now_ms;
}

/// Non-retained actuator/sensor snapshot; stamps the state cadence.
pub fn publish_state(
    broker: &mut impl BrokerPort,
    identity: &DeviceIdentity,
    state: &mut DeviceState,
    now_ms: u64,
) {
    let payload = StatePayload::build(state, identity.class, now_ms);
    publish_json(broker, &identity.topics.state, &payload, false);
    state.last_state_ms = now_ms;
}

/// Run all three cadences against the current wall clock.
pub fn tick(
    broker: &mut impl BrokerPort,
    identity: &DeviceIdentity,
    state: &mut DeviceState,
    config: &AgentConfig,
    info: &StatusInfo,
    now_ms: u64,
) {
    let due = |last_ms: u64, interval_secs: u32| {
        now_ms.saturating_sub(last_ms) >= u64::from(interval_secs) * 1000
    };

    if due(state.last_heartbeat_ms, config.heartbeat_interval_secs) {
        publish_online(broker, identity, state, true, now_ms);
    }
    if due(state.last_status_ms, config.status_interval_secs) {
        publish_status(broker, identity, state, info, now_ms);
    }
    if due(state.last_state_ms, config.state_interval_secs) {
        publish_state(broker, identity, state, now_ms);
    }
}
