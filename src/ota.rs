//! OTA update executor.
//!
//! Strictly sequential state machine, advanced at most one transition
//! per supervisory cycle:
//!
//! ```text
//! Idle ──directive──▶ Downloading ──image ok──▶ Applying ──▶ Succeeded ──▶ restart
//!                        │                         │
//!                        └──────── any failure ────┴──▶ Failed ──▶ Idle
//! ```
//!
//! Every failure is categorised (transport / storage / verification),
//! produces exactly one `{status:"failed"}` publish, and leaves the
//! prior firmware active and fully functional — the executor never
//! marks a new image bootable unless fetch, checksum, and finalize all
//! succeeded.  A directive arriving mid-operation is logged and
//! ignored; there is no cancellation.

use log::{info, warn};
use serde::Serialize;

use crate::app::ports::{
    BrokerPort, FetchError, FetchPort, FirmwareError, FirmwarePort, FirmwareSink,
};
use crate::commands::OtaDirective;
use crate::config::AgentConfig;
use crate::identity::DeviceIdentity;

// ───────────────────────────────────────────────────────────────
// States and outcomes
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtaState {
    Idle,
    Downloading,
    Applying,
    Succeeded,
    Failed,
}

/// Failure category, surfaced in the `error` field of the status publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtaFailure {
    /// Source unreachable or fetch timed out.
    Transport,
    /// Partition open/write/space failure.
    Storage,
    /// Checksum mismatch or image validation failure.
    Verification,
}

impl OtaFailure {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::Storage => "storage",
            Self::Verification => "verification",
        }
    }
}

/// Terminal result of one update operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtaOutcome {
    /// New image applied and marked bootable; the device should restart.
    Applied,
    /// Directive matched the running version; nothing fetched.
    NoUpdate,
    Failed(OtaFailure),
}

// ───────────────────────────────────────────────────────────────
// Wire payload
// ───────────────────────────────────────────────────────────────

/// OTA progress/outcome report, published on `base/status`.
#[derive(Debug, Serialize)]
struct OtaStatusPayload<'a> {
    device_id: &'a str,
    status: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    progress: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    current_version: Option<&'a str>,
}

fn publish_ota_status(broker: &mut impl BrokerPort, identity: &DeviceIdentity, payload: &OtaStatusPayload<'_>) {
    if !broker.is_connected() {
        return;
    }
    match serde_json::to_vec(payload) {
        Ok(bytes) => {
            if let Err(e) = broker.publish(&identity.topics.status, &bytes, false) {
                warn!("ota: status publish failed — {}", e);
            }
        }
        Err(e) => warn!("ota: status serialization failed: {}", e),
    }
}

// ───────────────────────────────────────────────────────────────
// Executor
// ───────────────────────────────────────────────────────────────

struct ActiveJob {
    url: heapless::String<128>,
    expected_sha256: Option<[u8; 32]>,
    computed_sha256: Option<[u8; 32]>,
}

/// Streams fetched chunks into the firmware slot while hashing them.
struct HashingSink<'a, W: FirmwarePort> {
    firmware: &'a mut W,
    hasher: hmac_sha256::Hash,
}

impl<W: FirmwarePort> FirmwareSink for HashingSink<'_, W> {
    fn write(&mut self, chunk: &[u8]) -> Result<(), FirmwareError> {
        self.hasher.update(chunk);
        self.firmware.write(chunk)
    }
}

pub struct OtaExecutor {
    state: OtaState,
    /// Directive accepted while `Idle`; consumed on the next advance.
    pending: Option<OtaDirective>,
    job: Option<ActiveJob>,
}

impl OtaExecutor {
    pub fn new() -> Self {
        Self {
            state: OtaState::Idle,
            pending: None,
            job: None,
        }
    }

    pub fn state(&self) -> OtaState {
        self.state
    }

    /// Whether an update operation is in flight (or queued to start).
    pub fn busy(&self) -> bool {
        self.pending.is_some() || !matches!(self.state, OtaState::Idle)
    }

    /// Entry point for decoded directives from the OTA channel.
    ///
    /// `check` is answered synchronously and never touches the state
    /// machine.  `update` is queued for the next supervisory cycle, or
    /// logged and dropped when an operation is already in flight.
    pub fn handle_directive(
        &mut self,
        directive: OtaDirective,
        broker: &mut impl BrokerPort,
        identity: &DeviceIdentity,
    ) {
        match directive {
            OtaDirective::Check => {
                publish_ota_status(
                    broker,
                    identity,
                    &OtaStatusPayload {
                        device_id: &identity.device_id,
                        status: "ready_for_update",
                        progress: None,
                        error: None,
                        current_version: Some(identity.firmware_version),
                    },
                );
            }
            OtaDirective::Update { url, version, sha256 } => {
                if self.busy() {
                    warn!("ota: update directive while {:?}, ignoring", self.state);
                    return;
                }
                info!("ota: update directive accepted (url={})", url);
                self.pending = Some(OtaDirective::Update { url, version, sha256 });
            }
        }
    }

    /// Advance the state machine by at most one transition.
    ///
    /// The `Downloading` step is the one bounded-blocking operation in
    /// the cycle; everything else returns promptly.
    pub fn advance(
        &mut self,
        broker: &mut impl BrokerPort,
        identity: &DeviceIdentity,
        fetch: &mut impl FetchPort,
        firmware: &mut impl FirmwarePort,
        config: &AgentConfig,
    ) -> Option<OtaOutcome> {
        match self.state {
            OtaState::Idle => self.start_pending(broker, identity),
            OtaState::Downloading => self.run_download(broker, identity, fetch, firmware, config),
            OtaState::Applying => Some(self.run_apply(broker, identity, firmware)),
            // Terminal until the restart that follows.
            OtaState::Succeeded | OtaState::Failed => None,
        }
    }

    fn start_pending(
        &mut self,
        broker: &mut impl BrokerPort,
        identity: &DeviceIdentity,
    ) -> Option<OtaOutcome> {
        let OtaDirective::Update { url, version, sha256 } = self.pending.take()? else {
            return None;
        };

        if let Some(target) = &version {
            if target.as_str() == identity.firmware_version {
                info!("ota: already running {}, no update needed", target);
                publish_ota_status(
                    broker,
                    identity,
                    &OtaStatusPayload {
                        device_id: &identity.device_id,
                        status: "no_update",
                        progress: None,
                        error: None,
                        current_version: Some(identity.firmware_version),
                    },
                );
                return Some(OtaOutcome::NoUpdate);
            }
        }

        info!("ota: starting download from {}", url);
        self.job = Some(ActiveJob {
            url,
            expected_sha256: sha256,
            computed_sha256: None,
        });
        self.state = OtaState::Downloading;
        publish_ota_status(
            broker,
            identity,
            &OtaStatusPayload {
                device_id: &identity.device_id,
                status: "updating",
                progress: Some(0),
                error: None,
                current_version: None,
            },
        );
        None
    }

    fn run_download(
        &mut self,
        broker: &mut impl BrokerPort,
        identity: &DeviceIdentity,
        fetch: &mut impl FetchPort,
        firmware: &mut impl FirmwarePort,
        config: &AgentConfig,
    ) -> Option<OtaOutcome> {
        let Some(mut job) = self.job.take() else {
            // Downloading without a job cannot happen; recover to Idle.
            self.state = OtaState::Idle;
            return None;
        };

        if let Err(e) = firmware.begin() {
            warn!("ota: begin failed — {}", e);
            return Some(self.fail(broker, identity, OtaFailure::Storage));
        }

        let mut sink = HashingSink {
            firmware: &mut *firmware,
            hasher: hmac_sha256::Hash::new(),
        };
        let timeout_ms = config.ota_fetch_timeout_secs * 1000;

        match fetch.fetch(&job.url, timeout_ms, &mut sink) {
            Ok(total) => {
                job.computed_sha256 = Some(sink.hasher.finalize());
                info!("ota: fetched {} bytes", total);
            }
            Err(FetchError::Sink(e)) => {
                warn!("ota: flash write during fetch failed — {}", e);
                firmware.abort();
                return Some(self.fail(broker, identity, OtaFailure::Storage));
            }
            Err(e) => {
                warn!("ota: fetch failed — {}", e);
                firmware.abort();
                return Some(self.fail(broker, identity, OtaFailure::Transport));
            }
        }

        if let (Some(expected), Some(computed)) = (job.expected_sha256, job.computed_sha256) {
            if expected != computed {
                warn!("ota: image checksum mismatch");
                firmware.abort();
                return Some(self.fail(broker, identity, OtaFailure::Verification));
            }
        }

        self.job = Some(job);
        self.state = OtaState::Applying;
        None
    }

    fn run_apply(
        &mut self,
        broker: &mut impl BrokerPort,
        identity: &DeviceIdentity,
        firmware: &mut impl FirmwarePort,
    ) -> OtaOutcome {
        match firmware.finalize() {
            Ok(()) => {
                info!("ota: image applied, restart pending");
                self.state = OtaState::Succeeded;
                self.job = None;
                publish_ota_status(
                    broker,
                    identity,
                    &OtaStatusPayload {
                        device_id: &identity.device_id,
                        status: "success",
                        progress: None,
                        error: None,
                        current_version: None,
                    },
                );
                OtaOutcome::Applied
            }
            Err(e) => {
                warn!("ota: finalize failed — {}", e);
                firmware.abort();
                let category = match e {
                    FirmwareError::FinalizeFailed => OtaFailure::Verification,
                    _ => OtaFailure::Storage,
                };
                self.fail(broker, identity, category)
            }
        }
    }

    /// One `{status:"failed"}` publish, then straight back to `Idle`
    /// with the prior firmware untouched.
    fn fail(
        &mut self,
        broker: &mut impl BrokerPort,
        identity: &DeviceIdentity,
        category: OtaFailure,
    ) -> OtaOutcome {
        self.state = OtaState::Failed;
        self.job = None;
        publish_ota_status(
            broker,
            identity,
            &OtaStatusPayload {
                device_id: &identity.device_id,
                status: "failed",
                progress: None,
                error: Some(category.as_str()),
                current_version: None,
            },
        );
        self.state = OtaState::Idle;
        OtaOutcome::Failed(category)
    }
}

impl Default for OtaExecutor {
    fn default() -> Self {
        Self::new()
    }
}
