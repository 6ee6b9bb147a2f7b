//! Broker session manager.
//!
//! Maintains the publish/subscribe session on top of an established
//! network link: last-will registration, command/OTA subscriptions, and
//! the retained online/status announcements that every (re)connect must
//! refresh — session start is the only point at which retained state is
//! guaranteed synchronized with the broker.
//!
//! ## Reconnection policy
//!
//! Each failed attempt grows the delay linearly (`base × attempts`) up
//! to a configured attempt ceiling.  Past the ceiling the manager drops
//! to a degraded fallback mode: local/administrative interfaces keep
//! being served and the broker is retried at a fixed slow interval,
//! forever.  A successful connection resets the attempt counter.

use log::{info, warn};

use crate::app::ports::{BrokerPort, SessionParams};
use crate::config::AgentConfig;
use crate::identity::DeviceIdentity;
use crate::link::ConnectionState;
use crate::state::DeviceState;
use crate::telemetry::{self, OnlinePayload, StatusInfo};

pub struct SessionManager {
    state: ConnectionState,
    attempts: u32,
    next_attempt_ms: u64,
    fallback: bool,
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            attempts: 0,
            next_attempt_ms: 0,
            fallback: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether the manager has exhausted its backoff attempts and is
    /// retrying at the slow fixed interval.
    pub fn in_fallback(&self) -> bool {
        self.fallback
    }

    /// Failed attempts since the last successful connection.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Delay applied after the most recent failure, in seconds.
    pub fn current_delay_secs(&self, config: &AgentConfig) -> u32 {
        if self.fallback {
            config.session_fallback_interval_secs
        } else {
            config.session_backoff_base_secs * self.attempts
        }
    }

    /// Ensure the broker session is up.  Callable only when the link is
    /// up; the supervisory loop guarantees the ordering.
    pub fn ensure_session(
        &mut self,
        broker: &mut impl BrokerPort,
        identity: &DeviceIdentity,
        config: &AgentConfig,
        state: &mut DeviceState,
        info: &StatusInfo,
        now_ms: u64,
    ) -> ConnectionState {
        if broker.is_connected() {
            self.state = ConnectionState::SessionUp;
            return self.state;
        }

        // Previous session dropped (or never came up).
        if self.state == ConnectionState::SessionUp {
            warn!("session: connection lost");
            self.state = ConnectionState::Disconnected;
        }

        if now_ms < self.next_attempt_ms {
            return self.state;
        }

        self.state = ConnectionState::SessionConnecting;
        info!(
            "session: connecting to {}:{} (attempt {})",
            config.broker_host,
            config.broker_port,
            self.attempts + 1
        );

        let will = OnlinePayload {
            online: false,
            timestamp: now_ms,
        };
        let will_payload = match serde_json::to_vec(&will) {
            Ok(b) => b,
            Err(e) => {
                // Unreachable for a two-field struct; treated as a failed
                // attempt rather than a panic.
                warn!("session: will serialization failed: {}", e);
                self.register_failure(config, now_ms);
                return self.state;
            }
        };

        let params = SessionParams {
            client_id: &identity.device_id,
            config,
            will_topic: &identity.topics.online,
            will_payload: &will_payload,
        };

        match broker.connect(&params) {
            Ok(()) => {
                self.attempts = 0;
                self.fallback = false;
                self.next_attempt_ms = 0;
                self.state = ConnectionState::SessionUp;
                self.on_connected(broker, identity, config, state, info, now_ms);
                self.state
            }
            Err(e) => {
                warn!("session: connect failed — {}", e);
                self.register_failure(config, now_ms);
                self.state
            }
        }
    }

    /// Post-connect side effects: subscriptions and the retained
    /// announcements that make the broker's view consistent again.
    fn on_connected(
        &mut self,
        broker: &mut impl BrokerPort,
        identity: &DeviceIdentity,
        _config: &AgentConfig,
        state: &mut DeviceState,
        info: &StatusInfo,
        now_ms: u64,
    ) {
        info!("session: connected as {}", identity.device_id);

        for topic in [&identity.topics.command, &identity.topics.ota] {
            match broker.subscribe(topic) {
                Ok(()) => info!("session: subscribed to {}", topic),
                Err(e) => warn!("session: subscribe to {} failed — {}", topic, e),
            }
        }

        telemetry::publish_online(broker, identity, state, true, now_ms);
        telemetry::publish_status(broker, identity, state, info, now_ms);
    }

    fn register_failure(&mut self, config: &AgentConfig, now_ms: u64) {
        self.attempts += 1;
        self.state = ConnectionState::Disconnected;

        if !self.fallback && self.attempts >= config.session_max_attempts {
            self.fallback = true;
            warn!(
                "session: {} attempts exhausted, entering fallback (retry every {}s)",
                self.attempts, config.session_fallback_interval_secs
            );
        }

        let delay_secs = self.current_delay_secs(config);
        self.next_attempt_ms = now_ms + u64::from(delay_secs) * 1000;
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}
