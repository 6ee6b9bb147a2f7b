//! OTA executor scenarios: the publish sequences, failure categories,
//! single-flight semantics, and the never-brick invariant.

use homenode::app::agent::{Agent, CycleAction, RestartReason};
use homenode::app::ports::FetchError;
use homenode::commands::{self, OtaDirective};
use homenode::config::AgentConfig;
use homenode::identity::DeviceIdentity;
use homenode::ota::{OtaExecutor, OtaState};
use homenode::state::{DeviceClass, DeviceState};

use crate::mock_ports::{sha256_hex, MockBroker, MockFetch, MockFirmware, MockHw, MockNet, MockStore};

const MAC: [u8; 6] = [0x00, 0x11, 0x22, 0x33, 0x44, 0x55];

fn identity() -> DeviceIdentity {
    DeviceIdentity::new(DeviceClass::SmartLight, &MAC, "homeauto")
}

fn update_directive(json: &str) -> OtaDirective {
    commands::decode_directive(json.as_bytes()).expect("directive must decode")
}

/// Drive the executor until it settles back into a terminal/idle state.
/// Returns the per-advance outcomes.
fn run_to_completion(
    ota: &mut OtaExecutor,
    broker: &mut MockBroker,
    identity: &DeviceIdentity,
    fetch: &mut MockFetch,
    firmware: &mut MockFirmware,
    config: &AgentConfig,
) -> Vec<homenode::ota::OtaOutcome> {
    let mut outcomes = Vec::new();
    for _ in 0..8 {
        if let Some(outcome) = ota.advance(broker, identity, fetch, firmware, config) {
            outcomes.push(outcome);
        }
        if !ota.busy() || ota.state() == OtaState::Succeeded {
            break;
        }
    }
    outcomes
}

fn connected_broker() -> MockBroker {
    let mut b = MockBroker::accepting();
    b.connected = true;
    b
}

// ── Success path ──────────────────────────────────────────────

#[test]
fn update_publishes_updating_then_success_and_flashes_image() {
    let identity = identity();
    let config = AgentConfig::default();
    let image = b"new firmware image bytes";
    let mut ota = OtaExecutor::new();
    let mut broker = connected_broker();
    let mut fetch = MockFetch::serving(image);
    let mut firmware = MockFirmware::default();

    let sha = sha256_hex(image);
    let directive = update_directive(&format!(
        r#"{{"action":"update","url":"http://fw.local/light.bin","version":"9.9.9","sha256":"{sha}"}}"#
    ));
    ota.handle_directive(directive, &mut broker, &identity);
    assert_eq!(ota.state(), OtaState::Idle, "queued, not started");

    let outcomes = run_to_completion(&mut ota, &mut broker, &identity, &mut fetch, &mut firmware, &config);

    assert_eq!(outcomes, vec![homenode::ota::OtaOutcome::Applied]);
    assert_eq!(ota.state(), OtaState::Succeeded);

    // Publish order: updating (progress 0) strictly before success.
    let updating = broker.ota_statuses("updating");
    assert_eq!(updating.len(), 1);
    assert_eq!(updating[0]["progress"], 0);
    assert_eq!(broker.ota_statuses("success").len(), 1);
    let statuses: Vec<String> = broker
        .published_to("/status")
        .iter()
        .map(|p| p.json()["status"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(statuses, vec!["updating", "success"]);

    // Exactly the served image reached the firmware slot.
    assert_eq!(firmware.written, image);
    assert!(firmware.finalized);
}

#[test]
fn successful_update_restarts_via_agent_cycle() {
    let config = AgentConfig {
        link_poll_attempts: 1,
        link_poll_delay_ms: 0,
        ..Default::default()
    };
    let identity = DeviceIdentity::new(DeviceClass::SmartLight, &MAC, &config.topic_namespace);
    let ota_topic = identity.topics.ota.to_string();
    let mut agent = Agent::new(identity, config, DeviceState::default());

    let mut net = MockNet::up();
    let mut broker = MockBroker::accepting();
    let mut hw = MockHw::default();
    let mut store = MockStore::default();
    let image = b"image";
    let mut fetch = MockFetch::serving(image);
    let mut firmware = MockFirmware::default();

    let cycle = |agent: &mut Agent,
                     broker: &mut MockBroker,
                     net: &mut MockNet,
                     hw: &mut MockHw,
                     store: &mut MockStore,
                     fetch: &mut MockFetch,
                     firmware: &mut MockFirmware,
                     now: u64| {
        agent.cycle(now, net, broker, hw, store, fetch, firmware)
    };

    // Cycle 1: session up. Directive arrives afterwards.
    assert_eq!(
        cycle(&mut agent, &mut broker, &mut net, &mut hw, &mut store, &mut fetch, &mut firmware, 100),
        CycleAction::Continue
    );
    broker.push_inbound(&ota_topic, br#"{"action":"update","url":"http://fw/img.bin"}"#);

    // Cycle 2: directive dispatched, executor enters Downloading.
    assert_eq!(
        cycle(&mut agent, &mut broker, &mut net, &mut hw, &mut store, &mut fetch, &mut firmware, 200),
        CycleAction::Continue
    );
    assert_eq!(agent.ota_state(), OtaState::Downloading);

    // Cycle 3: image fetched and verified.
    assert_eq!(
        cycle(&mut agent, &mut broker, &mut net, &mut hw, &mut store, &mut fetch, &mut firmware, 300),
        CycleAction::Continue
    );
    assert_eq!(agent.ota_state(), OtaState::Applying);

    // Cycle 4: applied → restart into the new image.
    assert_eq!(
        cycle(&mut agent, &mut broker, &mut net, &mut hw, &mut store, &mut fetch, &mut firmware, 400),
        CycleAction::Restart(RestartReason::OtaApplied)
    );
    assert!(firmware.finalized);
}

// ── Failure categories ────────────────────────────────────────

#[test]
fn transport_failure_leaves_idle_and_firmware_untouched() {
    let identity = identity();
    let config = AgentConfig::default();
    let mut ota = OtaExecutor::new();
    let mut broker = connected_broker();
    let mut fetch = MockFetch::failing(FetchError::Unreachable);
    let mut firmware = MockFirmware::default();

    ota.handle_directive(
        update_directive(r#"{"action":"update","url":"http://down.example/fw.bin"}"#),
        &mut broker,
        &identity,
    );
    let outcomes = run_to_completion(&mut ota, &mut broker, &identity, &mut fetch, &mut firmware, &config);

    assert_eq!(
        outcomes,
        vec![homenode::ota::OtaOutcome::Failed(homenode::ota::OtaFailure::Transport)]
    );
    assert_eq!(ota.state(), OtaState::Idle);
    assert!(!firmware.finalized, "prior firmware must stay active");

    // Exactly one failed publish, categorised as transport.
    let failed = broker.ota_statuses("failed");
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0]["error"], "transport");
}

#[test]
fn checksum_mismatch_is_a_verification_failure() {
    let identity = identity();
    let config = AgentConfig::default();
    let mut ota = OtaExecutor::new();
    let mut broker = connected_broker();
    let mut fetch = MockFetch::serving(b"actual image");
    let mut firmware = MockFirmware::default();

    let wrong_sha = "00".repeat(32);
    ota.handle_directive(
        update_directive(&format!(
            r#"{{"action":"update","url":"http://fw/img.bin","sha256":"{wrong_sha}"}}"#
        )),
        &mut broker,
        &identity,
    );
    let outcomes = run_to_completion(&mut ota, &mut broker, &identity, &mut fetch, &mut firmware, &config);

    assert_eq!(
        outcomes,
        vec![homenode::ota::OtaOutcome::Failed(homenode::ota::OtaFailure::Verification)]
    );
    assert_eq!(ota.state(), OtaState::Idle);
    assert!(firmware.aborted);
    assert!(!firmware.finalized);
    assert_eq!(broker.ota_statuses("failed")[0]["error"], "verification");
}

#[test]
fn no_space_is_a_storage_failure() {
    let identity = identity();
    let config = AgentConfig::default();
    let mut ota = OtaExecutor::new();
    let mut broker = connected_broker();
    let mut fetch = MockFetch::serving(b"image");
    let mut firmware = MockFirmware {
        fail_begin: true,
        ..Default::default()
    };

    ota.handle_directive(
        update_directive(r#"{"action":"update","url":"http://fw/img.bin"}"#),
        &mut broker,
        &identity,
    );
    let outcomes = run_to_completion(&mut ota, &mut broker, &identity, &mut fetch, &mut firmware, &config);

    assert_eq!(
        outcomes,
        vec![homenode::ota::OtaOutcome::Failed(homenode::ota::OtaFailure::Storage)]
    );
    assert_eq!(broker.ota_statuses("failed")[0]["error"], "storage");
    assert_eq!(fetch.calls, 0, "nothing fetched without a staging slot");
}

// ── No-op and check ───────────────────────────────────────────

#[test]
fn matching_version_reports_no_update_without_fetching() {
    let identity = identity();
    let config = AgentConfig::default();
    let mut ota = OtaExecutor::new();
    let mut broker = connected_broker();
    let mut fetch = MockFetch::serving(b"image");
    let mut firmware = MockFirmware::default();

    let running = identity.firmware_version;
    ota.handle_directive(
        update_directive(&format!(
            r#"{{"action":"update","url":"http://fw/img.bin","version":"{running}"}}"#
        )),
        &mut broker,
        &identity,
    );
    let outcomes = run_to_completion(&mut ota, &mut broker, &identity, &mut fetch, &mut firmware, &config);

    assert_eq!(outcomes, vec![homenode::ota::OtaOutcome::NoUpdate]);
    assert_eq!(ota.state(), OtaState::Idle);
    assert_eq!(fetch.calls, 0);
    assert_eq!(broker.ota_statuses("no_update").len(), 1);
    assert!(broker.ota_statuses("updating").is_empty());
}

#[test]
fn check_answers_synchronously_and_never_mutates_state() {
    let identity = identity();
    let mut ota = OtaExecutor::new();
    let mut broker = connected_broker();

    ota.handle_directive(
        commands::decode_directive(br#"{"action":"check"}"#).unwrap(),
        &mut broker,
        &identity,
    );

    // Answered immediately — no advance() needed.
    assert_eq!(ota.state(), OtaState::Idle);
    assert!(!ota.busy());
    let ready = broker.ota_statuses("ready_for_update");
    assert_eq!(ready.len(), 1);
    assert_eq!(ready[0]["current_version"], identity.firmware_version);
}

// ── Single-flight semantics ───────────────────────────────────

#[test]
fn directive_during_download_is_ignored() {
    let identity = identity();
    let config = AgentConfig::default();
    let mut ota = OtaExecutor::new();
    let mut broker = connected_broker();
    let mut fetch = MockFetch::serving(b"first image");
    let mut firmware = MockFirmware::default();

    ota.handle_directive(
        update_directive(r#"{"action":"update","url":"http://fw/one.bin"}"#),
        &mut broker,
        &identity,
    );
    // First advance: Idle → Downloading.
    assert!(ota
        .advance(&mut broker, &identity, &mut fetch, &mut firmware, &config)
        .is_none());
    assert_eq!(ota.state(), OtaState::Downloading);

    // Second directive arrives mid-operation: logged and dropped.
    ota.handle_directive(
        update_directive(r#"{"action":"update","url":"http://fw/two.bin"}"#),
        &mut broker,
        &identity,
    );

    let _ = run_to_completion(&mut ota, &mut broker, &identity, &mut fetch, &mut firmware, &config);
    assert_eq!(fetch.calls, 1, "only the in-flight operation ran");
    assert_eq!(firmware.written, b"first image");
}

#[test]
fn queued_directive_while_idle_is_not_lost() {
    let identity = identity();
    let mut ota = OtaExecutor::new();
    let mut broker = connected_broker();

    ota.handle_directive(
        update_directive(r#"{"action":"update","url":"http://fw/one.bin"}"#),
        &mut broker,
        &identity,
    );
    // A second one while the first is still queued is also rejected.
    ota.handle_directive(
        update_directive(r#"{"action":"update","url":"http://fw/two.bin"}"#),
        &mut broker,
        &identity,
    );
    assert!(ota.busy());

    let mut fetch = MockFetch::serving(b"payload");
    let mut firmware = MockFirmware::default();
    let config = AgentConfig::default();
    let _ = run_to_completion(&mut ota, &mut broker, &identity, &mut fetch, &mut firmware, &config);
    assert_eq!(fetch.calls, 1);
}
