//! Agent configuration parameters
//!
//! All tunable parameters for the connectivity/update agent.
//! Values can be overridden via NVS (non-volatile storage) or the
//! first-time setup portal.

use serde::{Deserialize, Serialize};

/// Core agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    // --- Broker ---
    /// MQTT broker hostname or IP address
    pub broker_host: heapless::String<64>,
    /// MQTT broker port
    pub broker_port: u16,
    /// MQTT username (empty = anonymous)
    pub broker_username: heapless::String<32>,
    /// MQTT password
    pub broker_password: heapless::String<64>,
    /// MQTT keep-alive interval (seconds)
    pub keep_alive_secs: u16,
    /// Topic namespace prefix (`<namespace>/devices/<deviceId>/...`)
    pub topic_namespace: heapless::String<32>,

    // --- Telemetry cadences ---
    /// Heartbeat (retained online=true) interval (seconds)
    pub heartbeat_interval_secs: u32,
    /// Status (device metadata) interval (seconds)
    pub status_interval_secs: u32,
    /// State (actuator/sensor snapshot) interval (seconds)
    pub state_interval_secs: u32,

    // --- Network link ---
    /// Polling attempts per `ensure_link` call
    pub link_poll_attempts: u8,
    /// Delay between polling attempts (milliseconds)
    pub link_poll_delay_ms: u32,
    /// Consecutive failed supervisory cycles before self-restart
    pub link_restart_cycles: u32,

    // --- Broker session reconnect ---
    /// Linear backoff base (seconds); delay = base × attempt count
    pub session_backoff_base_secs: u32,
    /// Attempts before degraded fallback mode
    pub session_max_attempts: u32,
    /// Fixed slow retry interval in fallback mode (seconds)
    pub session_fallback_interval_secs: u32,

    // --- OTA ---
    /// Upper bound on the firmware image fetch (seconds)
    pub ota_fetch_timeout_secs: u32,

    // --- Local input / timing ---
    /// Minimum time between accepted button edges (milliseconds)
    pub button_debounce_ms: u32,
    /// Delay before restarting, letting the final publish flush (milliseconds)
    pub restart_flush_delay_ms: u32,
    /// Supervisory loop sleep per cycle (milliseconds)
    pub loop_delay_ms: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        let mut broker_host = heapless::String::new();
        let _ = broker_host.push_str("192.168.1.100");
        let mut topic_namespace = heapless::String::new();
        let _ = topic_namespace.push_str("homeauto");

        Self {
            // Broker
            broker_host,
            broker_port: 1883,
            broker_username: heapless::String::new(),
            broker_password: heapless::String::new(),
            keep_alive_secs: 60,
            topic_namespace,

            // Telemetry
            heartbeat_interval_secs: 30,
            status_interval_secs: 60,
            state_interval_secs: 5,

            // Link
            link_poll_attempts: 20,
            link_poll_delay_ms: 500,
            link_restart_cycles: 30,

            // Session
            session_backoff_base_secs: 5,
            session_max_attempts: 10,
            session_fallback_interval_secs: 300,

            // OTA
            ota_fetch_timeout_secs: 60,

            // Input / timing
            button_debounce_ms: 50,
            restart_flush_delay_ms: 1000,
            loop_delay_ms: 100,
        }
    }
}
