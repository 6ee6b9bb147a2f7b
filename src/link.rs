//! Network link manager.
//!
//! Supervises the underlying wireless link through
//! [`NetworkLinkPort`](crate::app::ports::NetworkLinkPort).  Each
//! `ensure_link` call makes a bounded number of short polling attempts
//! and never blocks indefinitely; repeated total failure across many
//! supervisory cycles ends in a deliberate self-restart rather than
//! spinning forever disconnected.

use log::{info, warn};

use crate::app::ports::{LinkError, NetworkLinkPort};
use crate::config::AgentConfig;

/// Connectivity phases, link first, session second.
///
/// Owned by the link/session managers; the supervisory loop only reads
/// it to decide which phase to run next.  A broker session is never
/// attempted while the link is down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    LinkConnecting,
    LinkUp,
    SessionConnecting,
    SessionUp,
}

/// Outcome of one `ensure_link` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    Up,
    /// Still down; retried next cycle.
    Down,
    /// Failure budget exhausted — the device should restart itself.
    RestartRequired,
}

pub struct LinkManager {
    state: ConnectionState,
    /// Supervisory cycles in a row that ended with the link down.
    failed_cycles: u32,
    provisioning_logged: bool,
}

impl LinkManager {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            failed_cycles: 0,
            provisioning_logged: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Bring the link up, or report why not.
    ///
    /// Polls `net.is_connected()` up to `link_poll_attempts` times with a
    /// fixed short delay — the only blocking this manager ever does, and
    /// it is bounded by `attempts × delay`.
    pub fn ensure_link(&mut self, net: &mut impl NetworkLinkPort, config: &AgentConfig) -> LinkOutcome {
        if net.is_connected() {
            if self.state != ConnectionState::LinkUp {
                info!("link: up (RSSI={:?})", net.rssi());
            }
            self.state = ConnectionState::LinkUp;
            self.failed_cycles = 0;
            self.provisioning_logged = false;
            return LinkOutcome::Up;
        }

        if !net.has_credentials() {
            // Provisioning sub-mode: the portal adapter owns credential
            // entry and restarts the device when done.  Nothing to retry
            // here, and no failure budget is consumed.
            if !self.provisioning_logged {
                warn!("link: no credentials stored, waiting for provisioning");
                self.provisioning_logged = true;
            }
            self.state = ConnectionState::Disconnected;
            return LinkOutcome::Down;
        }

        self.state = ConnectionState::LinkConnecting;
        match net.connect() {
            Ok(()) => {}
            Err(LinkError::NoCredentials) => {
                self.state = ConnectionState::Disconnected;
                return LinkOutcome::Down;
            }
            Err(e) => warn!("link: connect attempt failed — {}", e),
        }

        for _ in 0..config.link_poll_attempts {
            if net.is_connected() {
                info!("link: connected (RSSI={:?})", net.rssi());
                self.state = ConnectionState::LinkUp;
                self.failed_cycles = 0;
                return LinkOutcome::Up;
            }
            crate::adapters::time::sleep_ms(config.link_poll_delay_ms);
        }

        self.failed_cycles += 1;
        self.state = ConnectionState::Disconnected;

        if self.failed_cycles >= config.link_restart_cycles {
            warn!(
                "link: {} consecutive failed cycles, requesting restart",
                self.failed_cycles
            );
            return LinkOutcome::RestartRequired;
        }

        warn!(
            "link: still down ({}/{} failed cycles)",
            self.failed_cycles, config.link_restart_cycles
        );
        LinkOutcome::Down
    }
}

impl Default for LinkManager {
    fn default() -> Self {
        Self::new()
    }
}
