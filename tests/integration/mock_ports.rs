//! Mock port implementations for integration tests.
//!
//! Record every call so tests can assert on the full interaction
//! history without touching radios, sockets, or flash.

use std::collections::{HashMap, VecDeque};

use homenode::app::ports::{
    ActuatorPort, BrokerError, BrokerPort, FetchError, FetchPort, FirmwareError, FirmwarePort,
    FirmwareSink, InboundMessage, LinkError, NetworkLinkPort, SensorPort, SessionParams,
    StorageError, StoragePort,
};
use homenode::state::SensorReadings;

// ── Network link ──────────────────────────────────────────────

pub struct MockNet {
    pub connected: bool,
    pub credentials: bool,
    pub connect_calls: u32,
}

impl MockNet {
    pub fn up() -> Self {
        Self {
            connected: true,
            credentials: true,
            connect_calls: 0,
        }
    }

    pub fn down() -> Self {
        Self {
            connected: false,
            credentials: true,
            connect_calls: 0,
        }
    }
}

impl NetworkLinkPort for MockNet {
    fn has_credentials(&self) -> bool {
        self.credentials
    }

    fn connect(&mut self) -> Result<(), LinkError> {
        self.connect_calls += 1;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn rssi(&self) -> Option<i8> {
        self.connected.then_some(-52)
    }

    fn ip_address(&self) -> Option<heapless::String<16>> {
        if !self.connected {
            return None;
        }
        let mut ip = heapless::String::new();
        let _ = ip.push_str("10.0.0.7");
        Some(ip)
    }
}

// ── Broker ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct PublishRecord {
    pub topic: String,
    pub payload: Vec<u8>,
    pub retain: bool,
}

impl PublishRecord {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.payload).expect("published payload must be JSON")
    }
}

pub struct MockBroker {
    /// Scripted connect outcomes; when exhausted, `default_accept`
    /// decides every further attempt.
    pub connect_outcomes: VecDeque<Result<(), BrokerError>>,
    pub default_accept: bool,
    pub connected: bool,
    pub will: Option<(String, Vec<u8>)>,
    pub subscriptions: Vec<String>,
    pub published: Vec<PublishRecord>,
    pub inbound: VecDeque<InboundMessage>,
}

impl MockBroker {
    /// Broker that accepts every connection attempt.
    pub fn accepting() -> Self {
        Self {
            connect_outcomes: VecDeque::new(),
            default_accept: true,
            connected: false,
            will: None,
            subscriptions: Vec::new(),
            published: Vec::new(),
            inbound: VecDeque::new(),
        }
    }

    /// Broker that refuses every connection attempt.
    pub fn refusing() -> Self {
        let mut b = Self::accepting();
        b.default_accept = false;
        b
    }

    pub fn push_inbound(&mut self, topic: &str, payload: &[u8]) {
        self.inbound.push_back(InboundMessage {
            topic: topic.to_string(),
            payload: payload.to_vec(),
        });
    }

    pub fn published_to(&self, suffix: &str) -> Vec<&PublishRecord> {
        self.published
            .iter()
            .filter(|p| p.topic.ends_with(suffix))
            .collect()
    }

    /// Status publishes carrying an OTA `status` field equal to `status`.
    pub fn ota_statuses(&self, status: &str) -> Vec<serde_json::Value> {
        self.published_to("/status")
            .iter()
            .map(|p| p.json())
            .filter(|v| v["status"] == status)
            .collect()
    }
}

impl BrokerPort for MockBroker {
    fn connect(&mut self, params: &SessionParams<'_>) -> Result<(), BrokerError> {
        self.will = Some((params.will_topic.to_string(), params.will_payload.to_vec()));
        let outcome = match self.connect_outcomes.pop_front() {
            Some(o) => o,
            None if self.default_accept => Ok(()),
            None => Err(BrokerError::ConnectFailed),
        };
        self.connected = outcome.is_ok();
        outcome
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), BrokerError> {
        self.subscriptions.push(topic.to_string());
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), BrokerError> {
        if !self.connected {
            return Err(BrokerError::NotConnected);
        }
        self.published.push(PublishRecord {
            topic: topic.to_string(),
            payload: payload.to_vec(),
            retain,
        });
        Ok(())
    }

    fn poll_inbound(&mut self) -> Option<InboundMessage> {
        self.inbound.pop_front()
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }
}

// ── Hardware ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum ActuatorCall {
    SetPower(bool),
    SetBrightness(u8),
    SetColor(u8, u8, u8),
}

#[derive(Default)]
pub struct MockHw {
    pub calls: Vec<ActuatorCall>,
    pub readings: SensorReadings,
}

impl MockHw {
    pub fn power_on(&self) -> bool {
        self.calls
            .iter()
            .rev()
            .find_map(|c| match c {
                ActuatorCall::SetPower(on) => Some(*on),
                _ => None,
            })
            .unwrap_or(false)
    }
}

impl ActuatorPort for MockHw {
    fn set_power(&mut self, on: bool) {
        self.calls.push(ActuatorCall::SetPower(on));
    }

    fn set_brightness(&mut self, percent: u8) {
        self.calls.push(ActuatorCall::SetBrightness(percent));
    }

    fn set_color(&mut self, r: u8, g: u8, b: u8) {
        self.calls.push(ActuatorCall::SetColor(r, g, b));
    }
}

impl SensorPort for MockHw {
    fn read(&mut self) -> SensorReadings {
        self.readings
    }
}

// ── Storage ───────────────────────────────────────────────────

#[derive(Default)]
pub struct MockStore {
    pub map: HashMap<String, Vec<u8>>,
    pub writes: u32,
}

impl StoragePort for MockStore {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let v = self
            .map
            .get(&format!("{namespace}::{key}"))
            .ok_or(StorageError::NotFound)?;
        let n = v.len().min(buf.len());
        buf[..n].copy_from_slice(&v[..n]);
        Ok(n)
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.writes += 1;
        self.map.insert(format!("{namespace}::{key}"), data.to_vec());
        Ok(())
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.map.remove(&format!("{namespace}::{key}"));
        Ok(())
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.map.contains_key(&format!("{namespace}::{key}"))
    }
}

// ── OTA fetch + firmware slot ─────────────────────────────────

pub struct MockFetch {
    /// Image served on success, or the scripted transport failure.
    pub outcome: Result<Vec<u8>, FetchError>,
    pub calls: u32,
}

impl MockFetch {
    pub fn serving(image: &[u8]) -> Self {
        Self {
            outcome: Ok(image.to_vec()),
            calls: 0,
        }
    }

    pub fn failing(error: FetchError) -> Self {
        Self {
            outcome: Err(error),
            calls: 0,
        }
    }
}

impl FetchPort for MockFetch {
    fn fetch(
        &mut self,
        _url: &str,
        _timeout_ms: u32,
        sink: &mut dyn FirmwareSink,
    ) -> Result<u32, FetchError> {
        self.calls += 1;
        match &self.outcome {
            Ok(image) => {
                for chunk in image.chunks(4) {
                    sink.write(chunk).map_err(FetchError::Sink)?;
                }
                Ok(image.len() as u32)
            }
            Err(e) => Err(*e),
        }
    }
}

#[derive(Default)]
pub struct MockFirmware {
    pub written: Vec<u8>,
    pub staged: bool,
    pub finalized: bool,
    pub aborted: bool,
    pub fail_begin: bool,
    pub fail_finalize: bool,
}

impl FirmwarePort for MockFirmware {
    fn begin(&mut self) -> Result<(), FirmwareError> {
        if self.fail_begin {
            return Err(FirmwareError::NoSpace);
        }
        self.staged = true;
        self.written.clear();
        Ok(())
    }

    fn write(&mut self, chunk: &[u8]) -> Result<(), FirmwareError> {
        if !self.staged {
            return Err(FirmwareError::BeginFailed);
        }
        self.written.extend_from_slice(chunk);
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), FirmwareError> {
        if self.fail_finalize {
            return Err(FirmwareError::FinalizeFailed);
        }
        if !self.staged {
            return Err(FirmwareError::BeginFailed);
        }
        self.finalized = true;
        Ok(())
    }

    fn abort(&mut self) {
        self.aborted = true;
        self.staged = false;
    }
}

/// SHA-256 of an image, for directives that carry a checksum.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = hmac_sha256::Hash::new();
    hasher.update(data);
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
