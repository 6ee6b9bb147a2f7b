//! Port traits — the hexagonal boundary between the agent core and the
//! outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Agent (domain)
//! ```
//!
//! Driven adapters (WiFi, MQTT, NVS, HTTP, actuators) implement these
//! traits.  The [`Agent`](super::agent::Agent) consumes them via
//! generics, so the core never touches hardware or sockets directly and
//! the whole loop runs against mocks on the host.
//!
//! All port errors are typed — callers must handle every variant
//! explicitly; none of them may escape the supervisory loop.

use core::fmt;

use crate::config::AgentConfig;
use crate::state::SensorReadings;

// ───────────────────────────────────────────────────────────────
// Network link port (driven adapter: WiFi STA)
// ───────────────────────────────────────────────────────────────

/// Errors from [`NetworkLinkPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// No credentials stored — provisioning must supply them.
    NoCredentials,
    /// Credentials failed validation (SSID/passphrase constraints).
    InvalidCredentials,
    /// Radio / driver failure starting the association attempt.
    Radio,
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no network credentials stored"),
            Self::InvalidCredentials => write!(f, "credentials failed validation"),
            Self::Radio => write!(f, "radio failure"),
        }
    }
}

/// Supervision of the underlying wireless/wired link.
///
/// `connect` kicks off an association attempt and returns promptly; the
/// link manager polls `is_connected` a bounded number of times per
/// supervisory cycle.  Implementations own the provisioning portal when
/// no credentials exist.
pub trait NetworkLinkPort {
    /// Whether network credentials are stored.
    fn has_credentials(&self) -> bool;

    /// Begin (or refresh) an association attempt.  Must not block beyond
    /// driver call overhead.
    fn connect(&mut self) -> Result<(), LinkError>;

    /// Current link status.
    fn is_connected(&self) -> bool;

    /// Signal strength in dBm when associated.
    fn rssi(&self) -> Option<i8>;

    /// Assigned IPv4 address, dotted-quad, when associated.
    fn ip_address(&self) -> Option<heapless::String<16>>;
}

// ───────────────────────────────────────────────────────────────
// Broker session port (driven adapter: MQTT client)
// ───────────────────────────────────────────────────────────────

/// Errors from [`BrokerPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerError {
    /// TCP/TLS connection or CONNECT handshake failed.
    ConnectFailed,
    /// Broker refused the credentials.
    NotAuthorized,
    /// Operation requires a live session.
    NotConnected,
    /// Publish or subscribe was rejected by the client/broker.
    Rejected,
}

impl fmt::Display for BrokerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectFailed => write!(f, "broker connect failed"),
            Self::NotAuthorized => write!(f, "broker refused credentials"),
            Self::NotConnected => write!(f, "no broker session"),
            Self::Rejected => write!(f, "broker rejected operation"),
        }
    }
}

/// Connection parameters for one session attempt, including the
/// last-will announcement registered with the broker.
pub struct SessionParams<'a> {
    pub client_id: &'a str,
    pub config: &'a AgentConfig,
    pub will_topic: &'a str,
    pub will_payload: &'a [u8],
}

/// One inbound publish delivered to the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Publish/subscribe session to the message broker.
pub trait BrokerPort {
    /// Establish a session (bounded by the client's own timeout).
    fn connect(&mut self, params: &SessionParams<'_>) -> Result<(), BrokerError>;

    /// Whether the session is currently up.
    fn is_connected(&self) -> bool;

    fn subscribe(&mut self, topic: &str) -> Result<(), BrokerError>;

    /// Fire-and-forget publish.  Callers treat failure as a logged no-op.
    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), BrokerError>;

    /// Drain one pending inbound message, if any.
    fn poll_inbound(&mut self) -> Option<InboundMessage>;

    /// Tear the session down (used before a graceful restart).
    fn disconnect(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Actuator + sensor ports (driven adapters: GPIO / PWM / sensors)
// ───────────────────────────────────────────────────────────────

/// Write-side port: the dispatcher calls this to drive hardware.
pub trait ActuatorPort {
    /// Drive the relay (and light output gate).
    fn set_power(&mut self, on: bool);

    /// Set light output level (0–100); only meaningful while powered.
    fn set_brightness(&mut self, percent: u8);

    /// Set RGB colour channels.
    fn set_color(&mut self, r: u8, g: u8, b: u8);
}

/// Read-side port for environmental sensors (sensor-node classes).
pub trait SensorPort {
    fn read(&mut self) -> SensorReadings;
}

// ───────────────────────────────────────────────────────────────
// Storage ports (driven adapter: NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Storage partition is full.
    Full,
    /// Generic I/O error.
    IoError,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

/// Persistent key-value blob storage.  Writes MUST be atomic — no
/// partial records on power loss (NVS commits guarantee this natively;
/// the in-memory simulation trivially so).
pub trait StoragePort {
    /// Read a value.  Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key.  Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    /// Check whether a key exists without reading it.
    fn exists(&self, namespace: &str, key: &str) -> bool;
}

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored config failed integrity / deserialization check.
    Corrupted,
    /// A config field failed range validation; the `&'static str` says
    /// which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

/// Loads and persists the agent configuration.
///
/// Implementations MUST validate before persisting: invalid ranges are
/// rejected with [`ConfigError::ValidationFailed`], not silently
/// clamped.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`AgentConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<AgentConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &AgentConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// OTA ports (driven adapters: HTTP fetch, OTA partition)
// ───────────────────────────────────────────────────────────────

/// Errors from [`FetchPort`] operations — the transport half of an OTA
/// failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchError {
    /// DNS/TCP/TLS failure or non-2xx response.
    Unreachable,
    /// The bounded fetch exceeded its timeout.
    Timeout,
    /// Image larger than the advertised or permitted size.
    TooLarge,
    /// Sink (flash write) failed mid-stream; carried through unchanged.
    Sink(FirmwareError),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreachable => write!(f, "source unreachable"),
            Self::Timeout => write!(f, "fetch timed out"),
            Self::TooLarge => write!(f, "image too large"),
            Self::Sink(e) => write!(f, "write during fetch failed: {}", e),
        }
    }
}

/// Errors from [`FirmwarePort`] operations — the storage half of an OTA
/// failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirmwareError {
    /// No inactive partition / insufficient space for the image.
    NoSpace,
    /// Partition open failed.
    BeginFailed,
    /// Flash write failed.
    WriteFailed,
    /// Image validation or boot-partition switch failed.
    FinalizeFailed,
}

impl fmt::Display for FirmwareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSpace => write!(f, "no space for image"),
            Self::BeginFailed => write!(f, "OTA begin failed"),
            Self::WriteFailed => write!(f, "OTA write failed"),
            Self::FinalizeFailed => write!(f, "OTA finalize failed"),
        }
    }
}

/// Receives firmware image bytes as they stream in.
pub trait FirmwareSink {
    fn write(&mut self, chunk: &[u8]) -> Result<(), FirmwareError>;
}

/// Bounded firmware image fetch.
pub trait FetchPort {
    /// Stream the image at `url` into `sink`.  Blocks at most
    /// `timeout_ms`; returns the total byte count on success.
    fn fetch(
        &mut self,
        url: &str,
        timeout_ms: u32,
        sink: &mut dyn FirmwareSink,
    ) -> Result<u32, FetchError>;
}

/// Staged write of a new firmware image to the inactive slot.
///
/// `begin` → N × `write` → `finalize` marks the new image bootable.
/// Dropping the stage without `finalize` (or calling `abort`) leaves the
/// running firmware untouched — the executor relies on this for its
/// never-brick invariant.
pub trait FirmwarePort {
    fn begin(&mut self) -> Result<(), FirmwareError>;
    fn write(&mut self, chunk: &[u8]) -> Result<(), FirmwareError>;
    fn finalize(&mut self) -> Result<(), FirmwareError>;
    fn abort(&mut self);
}
