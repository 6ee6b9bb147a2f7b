//! The supervisory agent — the hexagonal core.
//!
//! [`Agent`] owns every piece of mutable state (identity, config,
//! device state, connection managers, OTA executor, button) and runs
//! one full supervisory iteration per [`cycle`](Agent::cycle) call.
//! All I/O flows through port traits injected at the call site, so the
//! entire loop body runs against mocks on the host.
//!
//! ```text
//!  NetworkLinkPort ──▶ ┌──────────────────────────┐ ──▶ ActuatorPort
//!  BrokerPort ───────▶ │          Agent           │ ──▶ StoragePort
//!  SensorPort ───────▶ │ link · session · dispatch│ ──▶ FirmwarePort
//!  FetchPort ────────▶ │ telemetry · ota · input  │
//!                      └──────────────────────────┘
//! ```
//!
//! Per-cycle ordering: local input → link up → session up → inbound
//! drain → sensor refresh → telemetry cadences → OTA progress (at most
//! one transition).  A command is therefore never dispatched while the
//! link or session is down, and OTA keeps single-flight semantics.

use log::info;

use crate::admin::{self, AdminRequest, AdminResponse};
use crate::commands::Command;
use crate::config::AgentConfig;
use crate::dispatch::{self, DispatchOutcome};
use crate::drivers::button::ButtonDriver;
use crate::identity::DeviceIdentity;
use crate::link::{ConnectionState, LinkManager, LinkOutcome};
use crate::ota::{OtaExecutor, OtaOutcome, OtaState};
use crate::session::SessionManager;
use crate::state::DeviceState;
use crate::telemetry::{self, StatusInfo};

use super::ports::{
    ActuatorPort, BrokerPort, FetchPort, FirmwarePort, NetworkLinkPort, SensorPort, StoragePort,
};

/// Why the agent wants the device restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartReason {
    /// Link failure budget exhausted; ungraceful — relies on the
    /// broker-delivered last-will to reveal the device as offline.
    LinkFailure,
    /// `restart` command; graceful — `online=false` already published.
    CommandRequested,
    /// New firmware applied; reboot into it.
    OtaApplied,
}

/// Result of one supervisory iteration.
///
/// The agent never restarts the device itself: `main` owns the actual
/// reset (and the flush delay before it), keeping the loop body
/// host-testable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleAction {
    Continue,
    Restart(RestartReason),
}

pub struct Agent {
    identity: DeviceIdentity,
    config: AgentConfig,
    state: DeviceState,
    link: LinkManager,
    session: SessionManager,
    ota: OtaExecutor,
    button: ButtonDriver,
    cycle_count: u64,
}

impl Agent {
    /// Construct the agent around a boot-time state (loaded from the
    /// persistent store by the caller).
    pub fn new(identity: DeviceIdentity, config: AgentConfig, state: DeviceState) -> Self {
        let button = ButtonDriver::new(config.button_debounce_ms);
        Self {
            identity,
            config,
            state,
            link: LinkManager::new(),
            session: SessionManager::new(),
            ota: OtaExecutor::new(),
            button,
            cycle_count: 0,
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub fn ota_state(&self) -> OtaState {
        self.ota.state()
    }

    /// Combined connectivity phase: the session's view once the link is
    /// up, the link's otherwise.
    pub fn connection_state(&self) -> ConnectionState {
        match self.link.state() {
            ConnectionState::LinkUp => match self.session.state() {
                ConnectionState::Disconnected => ConnectionState::LinkUp,
                s => s,
            },
            s => s,
        }
    }

    /// Whether the session manager is in degraded fallback mode.
    pub fn in_fallback(&self) -> bool {
        self.session.in_fallback()
    }

    /// Supervisory iterations since boot.
    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    /// Producer half of the input edge flag, for GPIO ISR registration.
    pub fn button_handle(&self) -> crate::drivers::button::ButtonHandle {
        self.button.handle()
    }

    // ── Supervisory iteration ─────────────────────────────────

    /// Run one full supervisory iteration.
    #[allow(clippy::too_many_arguments)]
    pub fn cycle(
        &mut self,
        now_ms: u64,
        net: &mut impl NetworkLinkPort,
        broker: &mut impl BrokerPort,
        hw: &mut (impl ActuatorPort + SensorPort),
        store: &mut impl StoragePort,
        fetch: &mut impl FetchPort,
        firmware: &mut impl FirmwarePort,
    ) -> CycleAction {
        self.cycle_count += 1;

        // 1. Local input — works with or without connectivity.
        if self.button.poll() {
            self.handle_button(now_ms, net, broker, hw, store);
        }

        // 2. Network link.  A broker session is never attempted while
        //    the link is down.
        match self.link.ensure_link(net, &self.config) {
            LinkOutcome::RestartRequired => {
                return CycleAction::Restart(RestartReason::LinkFailure);
            }
            LinkOutcome::Down => return CycleAction::Continue,
            LinkOutcome::Up => {}
        }

        let info = Self::status_info(net, now_ms);

        // 3. Broker session (with backoff / fallback inside).
        let conn = self.session.ensure_session(
            broker,
            &self.identity,
            &self.config,
            &mut self.state,
            &info,
            now_ms,
        );

        // 4. Drain inbound commands/directives while the session is up.
        if conn == ConnectionState::SessionUp {
            while let Some(msg) = broker.poll_inbound() {
                let outcome = dispatch::handle_message(
                    &msg.topic,
                    &msg.payload,
                    &mut self.state,
                    &self.identity,
                    broker,
                    hw,
                    store,
                    &mut self.ota,
                    &info,
                    now_ms,
                );
                if outcome == DispatchOutcome::RestartRequested {
                    return CycleAction::Restart(RestartReason::CommandRequested);
                }
            }
        }

        // 5. Sensor refresh ahead of the state snapshot.
        if self.identity.class.has_sensors() {
            self.state.sensors = hw.read();
        }

        // 6. Telemetry cadences (no-ops while the session is down).
        telemetry::tick(
            broker,
            &self.identity,
            &mut self.state,
            &self.config,
            &info,
            now_ms,
        );

        // 7. OTA progress — at most one state transition per cycle.
        if let Some(OtaOutcome::Applied) =
            self.ota
                .advance(broker, &self.identity, fetch, firmware, &self.config)
        {
            return CycleAction::Restart(RestartReason::OtaApplied);
        }

        CycleAction::Continue
    }

    // ── Secondary surfaces ────────────────────────────────────

    /// Serve the local administrative channel.  Available regardless of
    /// broker connectivity (fallback mode included).
    pub fn handle_admin(
        &mut self,
        request: AdminRequest,
        net: &impl NetworkLinkPort,
        broker: &mut impl BrokerPort,
        hw: &mut impl ActuatorPort,
        store: &mut impl StoragePort,
        now_ms: u64,
    ) -> AdminResponse<'_> {
        let info = Self::status_info(net, now_ms);
        admin::handle(
            request,
            &mut self.state,
            &self.identity,
            broker,
            hw,
            store,
            &info,
            now_ms,
        )
    }

    // ── Internal ──────────────────────────────────────────────

    fn handle_button(
        &mut self,
        now_ms: u64,
        net: &impl NetworkLinkPort,
        broker: &mut impl BrokerPort,
        hw: &mut impl ActuatorPort,
        store: &mut impl StoragePort,
    ) {
        self.state.last_input_edge_ms = Some(now_ms);
        if !self.identity.class.has_actuator() {
            return;
        }
        info!("input: button press, toggling power");
        let info = Self::status_info(net, now_ms);
        let _ = dispatch::execute(
            Command::Toggle,
            &mut self.state,
            &self.identity,
            broker,
            hw,
            store,
            &info,
            now_ms,
        );
    }

    fn status_info(net: &impl NetworkLinkPort, now_ms: u64) -> StatusInfo {
        StatusInfo {
            rssi: net.rssi(),
            ip_address: net.ip_address(),
            free_heap: crate::adapters::sysinfo::free_heap_bytes(),
            uptime_ms: now_ms,
        }
    }
}
