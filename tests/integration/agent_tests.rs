//! Full-cycle agent scenarios: connectivity ordering, command
//! dispatch, persistence, reconnection policy, fallback mode.

use homenode::app::agent::{Agent, CycleAction, RestartReason};
use homenode::app::ports::StoragePort;
use homenode::config::AgentConfig;
use homenode::identity::DeviceIdentity;
use homenode::state::{self, DeviceClass, DeviceState};

use crate::mock_ports::{MockBroker, MockFetch, MockFirmware, MockHw, MockNet, MockStore};

const MAC: [u8; 6] = [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE];

fn fast_config() -> AgentConfig {
    AgentConfig {
        link_poll_attempts: 2,
        link_poll_delay_ms: 0,
        link_restart_cycles: 5,
        session_backoff_base_secs: 1,
        session_max_attempts: 3,
        session_fallback_interval_secs: 30,
        ..Default::default()
    }
}

struct Harness {
    agent: Agent,
    net: MockNet,
    broker: MockBroker,
    hw: MockHw,
    store: MockStore,
    fetch: MockFetch,
    firmware: MockFirmware,
    now_ms: u64,
}

impl Harness {
    fn new(class: DeviceClass) -> Self {
        let config = fast_config();
        let identity = DeviceIdentity::new(class, &MAC, &config.topic_namespace);
        let agent = Agent::new(identity, config, DeviceState::default());
        Self {
            agent,
            net: MockNet::up(),
            broker: MockBroker::accepting(),
            hw: MockHw::default(),
            store: MockStore::default(),
            fetch: MockFetch::failing(homenode::app::ports::FetchError::Unreachable),
            firmware: MockFirmware::default(),
            now_ms: 0,
        }
    }

    fn cycle(&mut self) -> CycleAction {
        self.now_ms += 100;
        self.agent.cycle(
            self.now_ms,
            &mut self.net,
            &mut self.broker,
            &mut self.hw,
            &mut self.store,
            &mut self.fetch,
            &mut self.firmware,
        )
    }

    fn command_topic(&self) -> String {
        self.agent.identity().topics.command.to_string()
    }

    fn persisted_record(&self) -> Option<Vec<u8>> {
        let mut buf = [0u8; 8];
        self.store
            .read(state::STORAGE_NAMESPACE, state::RECORD_KEY, &mut buf)
            .ok()
            .map(|n| buf[..n].to_vec())
    }
}

// ── Connectivity bring-up ─────────────────────────────────────

#[test]
fn first_cycle_brings_up_session_with_side_effects() {
    let mut h = Harness::new(DeviceClass::SmartLight);
    assert_eq!(h.cycle(), CycleAction::Continue);

    // Last-will registered on the online channel.
    let (will_topic, will_payload) = h.broker.will.clone().expect("will must be registered");
    assert!(will_topic.ends_with("/online"));
    let will: serde_json::Value = serde_json::from_slice(&will_payload).unwrap();
    assert_eq!(will["online"], false);

    // Subscribed to command + OTA channels.
    assert_eq!(h.broker.subscriptions.len(), 2);
    assert!(h.broker.subscriptions[0].ends_with("/command"));
    assert!(h.broker.subscriptions[1].ends_with("/ota"));

    // Retained online=true and a status snapshot.
    let online = h.broker.published_to("/online");
    assert_eq!(online.len(), 1);
    assert!(online[0].retain);
    assert_eq!(online[0].json()["online"], true);
    assert!(!h.broker.published_to("/status").is_empty());
}

#[test]
fn session_never_attempted_while_link_down() {
    let mut h = Harness::new(DeviceClass::SmartLight);
    h.net.connected = false;
    for _ in 0..3 {
        assert_eq!(h.cycle(), CycleAction::Continue);
    }
    assert!(h.broker.will.is_none(), "no broker attempt while link down");
}

#[test]
fn link_failure_budget_triggers_restart() {
    let mut h = Harness::new(DeviceClass::SmartLight);
    h.net.connected = false;
    for _ in 0..4 {
        assert_eq!(h.cycle(), CycleAction::Continue);
    }
    assert_eq!(
        h.cycle(),
        CycleAction::Restart(RestartReason::LinkFailure)
    );
}

#[test]
fn commands_not_dispatched_while_session_down() {
    let mut h = Harness::new(DeviceClass::SmartLight);
    h.broker.default_accept = false;
    let topic = h.command_topic();
    h.broker
        .push_inbound(&topic, br#"{"command":"set_power","parameters":{"power":true}}"#);

    let _ = h.cycle();
    assert!(!h.agent.state().power, "command must wait for the session");
    assert_eq!(h.broker.inbound.len(), 1, "message stays queued");

    // Once the broker accepts again the queued message is dispatched.
    h.broker.default_accept = true;
    h.now_ms += 10_000; // past the backoff window
    let _ = h.cycle();
    assert!(h.agent.state().power);
}

// ── Command dispatch end-to-end ───────────────────────────────

#[test]
fn set_power_command_full_effect_chain() {
    let mut h = Harness::new(DeviceClass::SmartLight);
    let _ = h.cycle(); // bring up session

    let topic = h.command_topic();
    h.broker
        .push_inbound(&topic, br#"{"command":"set_power","parameters":{"power":true}}"#);
    let _ = h.cycle();

    // Actuator driven on.
    assert!(h.hw.power_on());
    // base/state published with power:true.
    let states = h.broker.published_to("/state");
    let last = states.last().unwrap().json();
    assert_eq!(last["power"], true);
    // Persisted byte for power = 1.
    assert_eq!(h.persisted_record().unwrap()[0], 1);
}

#[test]
fn unknown_command_leaves_everything_untouched() {
    let mut h = Harness::new(DeviceClass::SmartLight);
    let _ = h.cycle();
    let state_before = h.agent.state().clone();
    let publishes_before = h.broker.published.len();

    let topic = h.command_topic();
    h.broker.push_inbound(&topic, br#"{"command":"levitate"}"#);
    let _ = h.cycle();

    assert_eq!(h.agent.state().power, state_before.power);
    assert!(h.persisted_record().is_none());
    assert!(h.hw.calls.is_empty());
    // No publish besides any telemetry cadence that happened to fire.
    let new = &h.broker.published[publishes_before..];
    assert!(new.iter().all(|p| !p.topic.ends_with("/command")));
}

#[test]
fn restart_command_announces_offline_then_restarts() {
    let mut h = Harness::new(DeviceClass::SmartLight);
    let _ = h.cycle();

    let topic = h.command_topic();
    h.broker.push_inbound(&topic, br#"{"command":"restart"}"#);
    assert_eq!(
        h.cycle(),
        CycleAction::Restart(RestartReason::CommandRequested)
    );

    let online = h.broker.published_to("/online");
    let last = online.last().unwrap();
    assert!(last.retain);
    assert_eq!(last.json()["online"], false);
}

// ── Persistence across restart ────────────────────────────────

#[test]
fn persisted_state_reproduces_after_simulated_restart() {
    let mut h = Harness::new(DeviceClass::SmartLight);
    let _ = h.cycle();

    let topic = h.command_topic();
    h.broker.push_inbound(
        &topic,
        br#"{"command":"set_brightness","parameters":{"brightness":33}}"#,
    );
    h.broker.push_inbound(
        &topic,
        br#"{"command":"set_color","parameters":{"r":5,"g":6,"b":7}}"#,
    );
    h.broker
        .push_inbound(&topic, br#"{"command":"set_power","parameters":{"power":true}}"#);
    let _ = h.cycle();

    let live = h.agent.state().clone();

    // Simulated power cycle: reload from the same store.
    let reloaded = state::load(DeviceClass::SmartLight, &h.store);
    assert_eq!(reloaded.power, live.power);
    assert_eq!(reloaded.brightness, live.brightness);
    assert_eq!(reloaded.color_r, live.color_r);
    assert_eq!(reloaded.color_g, live.color_g);
    assert_eq!(reloaded.color_b, live.color_b);
}

// ── Reconnection policy ───────────────────────────────────────

#[test]
fn reconnect_backoff_grows_then_resets_after_success() {
    let mut h = Harness::new(DeviceClass::SmartLight);
    h.broker.default_accept = false;

    // Exhaust the attempt budget; delays are linear in the attempt count.
    let mut delays = Vec::new();
    for _ in 0..3 {
        h.now_ms += 60_000;
        let _ = h.cycle();
        delays.push(h.agent.in_fallback());
    }
    assert!(h.agent.in_fallback());

    // Success resets the policy.
    h.broker.default_accept = true;
    h.now_ms += 60_000;
    let _ = h.cycle();
    assert!(!h.agent.in_fallback());
}

#[test]
fn fallback_mode_keeps_retrying_and_serving_admin() {
    use homenode::admin::{AdminRequest, AdminResponse};

    let mut h = Harness::new(DeviceClass::SmartLight);
    h.broker.default_accept = false;

    for _ in 0..6 {
        h.now_ms += 60_000;
        let _ = h.cycle();
    }
    assert!(h.agent.in_fallback());

    // The administrative surface still answers.
    let response = h.agent.handle_admin(
        AdminRequest::Info,
        &h.net,
        &mut h.broker,
        &mut h.hw,
        &mut h.store,
        h.now_ms,
    );
    match response {
        AdminResponse::Info(info) => {
            assert_eq!(info.device_id, "smart_light_deadbeefcafe");
        }
        other => panic!("expected Info, got {other:?}"),
    }

    // And the broker keeps being retried at the slow interval.
    let wills_before = h.broker.will.is_some();
    h.now_ms += 60_000;
    let _ = h.cycle();
    assert!(wills_before, "retries continued into fallback");
}

#[test]
fn admin_set_power_matches_broker_command_persistence() {
    use homenode::admin::AdminRequest;

    let mut h = Harness::new(DeviceClass::SmartLight);
    let _ = h.cycle();

    let _ = h.agent.handle_admin(
        AdminRequest::SetPower { power: true },
        &h.net,
        &mut h.broker,
        &mut h.hw,
        &mut h.store,
        h.now_ms,
    );
    assert!(h.agent.state().power);
    assert_eq!(h.persisted_record().unwrap()[0], 1);
    assert!(h.hw.power_on());
}

// ── Telemetry cadence ─────────────────────────────────────────

#[test]
fn heartbeat_cadence_republishes_liveness() {
    let mut h = Harness::new(DeviceClass::SmartLight);
    let _ = h.cycle(); // connect publishes the first online=true

    let heartbeats_then = h.broker.published_to("/online").len();

    // Jump past the heartbeat interval; one more retained online=true.
    h.now_ms += u64::from(h.agent.config().heartbeat_interval_secs) * 1000 + 1_000;
    let _ = h.cycle();

    let heartbeats_now = h.broker.published_to("/online").len();
    assert_eq!(heartbeats_now, heartbeats_then + 1);
    assert!(h.broker.published_to("/online").last().unwrap().retain);
}

#[test]
fn sensor_node_reports_readings_in_state() {
    let mut h = Harness::new(DeviceClass::SensorNode);
    h.hw.readings = homenode::state::SensorReadings {
        temperature_c: 22.5,
        humidity_pct: 51.0,
        motion: true,
    };
    // Land past the state cadence so the snapshot goes out this cycle.
    h.now_ms = 10_000;
    let _ = h.cycle();

    let states = h.broker.published_to("/state");
    let last = states.last().expect("state cadence due on this cycle");
    let v = last.json();
    assert_eq!(v["motion"], true);
    assert!(v.get("power").is_none(), "sensor node has no actuator field");
}

// ── Local input ───────────────────────────────────────────────

#[test]
fn button_press_toggles_and_persists() {
    let mut h = Harness::new(DeviceClass::SmartLight);
    let _ = h.cycle();

    h.agent.button_handle().record_edge(5_000);
    let _ = h.cycle();

    assert!(h.agent.state().power);
    assert!(h.hw.power_on());
    assert_eq!(h.persisted_record().unwrap()[0], 1);
    assert!(h.agent.state().last_input_edge_ms.is_some());
}
