//! Device state, device-class table, and the persisted actuator record.
//!
//! The firmware variants of the fleet differ only in which commands they
//! accept and which actuator bytes they persist.  Both differences are
//! captured here as a per-class table so the rest of the agent is
//! class-agnostic.

use crate::commands::CommandKind;

// ───────────────────────────────────────────────────────────────
// Device class table
// ───────────────────────────────────────────────────────────────

/// The firmware variant baked into this image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    /// Relay + PWM dimmable RGB light.
    SmartLight,
    /// Single relay, on/off only.
    SmartSwitch,
    /// Read-only environmental sensor node, no actuator.
    SensorNode,
}

/// Actuator attributes a class persists, in record-byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistedField {
    Power,
    Brightness,
    ColorR,
    ColorG,
    ColorB,
}

impl DeviceClass {
    /// Class baked in at build time via cargo feature.
    #[cfg(feature = "smart-switch")]
    pub const BUILD: DeviceClass = DeviceClass::SmartSwitch;
    #[cfg(all(feature = "sensor-node", not(feature = "smart-switch")))]
    pub const BUILD: DeviceClass = DeviceClass::SensorNode;
    #[cfg(not(any(feature = "smart-switch", feature = "sensor-node")))]
    pub const BUILD: DeviceClass = DeviceClass::SmartLight;

    /// Machine-readable slug used in device IDs.
    pub const fn slug(self) -> &'static str {
        match self {
            Self::SmartLight => "smart_light",
            Self::SmartSwitch => "smart_switch",
            Self::SensorNode => "sensor_node",
        }
    }

    /// Human-readable class name reported in status payloads.
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::SmartLight => "Smart Light",
            Self::SmartSwitch => "Smart Switch",
            Self::SensorNode => "Sensor Node",
        }
    }

    /// Whether this class drives any actuator hardware.
    pub const fn has_actuator(self) -> bool {
        !matches!(self, Self::SensorNode)
    }

    /// Whether this class reports environmental sensor readings.
    pub const fn has_sensors(self) -> bool {
        matches!(self, Self::SensorNode)
    }

    /// Closed command set for this class.  Commands outside the set are
    /// logged and ignored by the dispatcher, exactly like unknown names.
    pub fn supports(self, kind: CommandKind) -> bool {
        use CommandKind::*;
        match self {
            Self::SmartLight => matches!(
                kind,
                SetPower | SetBrightness | SetColor | Toggle | GetStatus | Restart
            ),
            Self::SmartSwitch => matches!(kind, SetPower | Toggle | GetStatus | Restart),
            Self::SensorNode => matches!(kind, GetSensors | GetStatus | Restart),
        }
    }

    /// Persisted record layout, one byte per field.
    pub fn persisted_layout(self) -> &'static [PersistedField] {
        use PersistedField::*;
        match self {
            Self::SmartLight => &[Power, Brightness, ColorR, ColorG, ColorB],
            Self::SmartSwitch => &[Power],
            Self::SensorNode => &[],
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Device state
// ───────────────────────────────────────────────────────────────

/// Last-observed environmental readings (never persisted).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SensorReadings {
    pub temperature_c: f32,
    pub humidity_pct: f32,
    pub motion: bool,
}

/// Mutable in-memory device state, mirrored to the persistent store.
///
/// Mutated only on the supervisory loop's thread of control: by the
/// command dispatcher, the admin interface, and the debounced local
/// input.  Every actuator-affecting mutation is flushed to storage
/// before the cycle ends.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceState {
    pub power: bool,
    /// Brightness percent, 0–100.
    pub brightness: u8,
    pub color_r: u8,
    pub color_g: u8,
    pub color_b: u8,

    /// Last sensor snapshot (sensor-node classes only; zeroed otherwise).
    pub sensors: SensorReadings,

    // Cadence bookkeeping, milliseconds of monotonic uptime.
    pub last_heartbeat_ms: u64,
    pub last_status_ms: u64,
    pub last_state_ms: u64,
    /// Last accepted local input edge; `None` until the first press.
    pub last_input_edge_ms: Option<u64>,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            power: false,
            brightness: 100,
            color_r: 255,
            color_g: 255,
            color_b: 255,
            sensors: SensorReadings::default(),
            last_heartbeat_ms: 0,
            last_status_ms: 0,
            last_state_ms: 0,
            last_input_edge_ms: None,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Persisted record
// ───────────────────────────────────────────────────────────────

/// Maximum record length across all classes.
pub const MAX_RECORD_LEN: usize = 5;

impl DeviceState {
    /// Encode the persisted subset of this state, one byte per field in
    /// the class's layout order.
    pub fn to_record(&self, class: DeviceClass) -> heapless::Vec<u8, MAX_RECORD_LEN> {
        let mut record = heapless::Vec::new();
        for field in class.persisted_layout() {
            let byte = match field {
                PersistedField::Power => u8::from(self.power),
                PersistedField::Brightness => self.brightness,
                PersistedField::ColorR => self.color_r,
                PersistedField::ColorG => self.color_g,
                PersistedField::ColorB => self.color_b,
            };
            // Layout length is bounded by MAX_RECORD_LEN.
            let _ = record.push(byte);
        }
        record
    }

    /// Decode a persisted record into this state.  Total over arbitrary
    /// input: a short buffer leaves the missing fields at their defaults,
    /// and any out-of-range byte decodes to the field's safe default
    /// (erased flash reads 0xFF everywhere).
    pub fn apply_record(&mut self, class: DeviceClass, bytes: &[u8]) {
        for (i, field) in class.persisted_layout().iter().enumerate() {
            let Some(&byte) = bytes.get(i) else {
                break;
            };
            match field {
                PersistedField::Power => self.power = byte == 1,
                PersistedField::Brightness => {
                    self.brightness = if byte > 100 { 100 } else { byte };
                }
                PersistedField::ColorR => self.color_r = byte,
                PersistedField::ColorG => self.color_g = byte,
                PersistedField::ColorB => self.color_b = byte,
            }
        }
    }

    /// Rebuild boot-time state from a stored record, or defaults when no
    /// record exists.
    pub fn from_record(class: DeviceClass, bytes: Option<&[u8]>) -> Self {
        let mut state = Self::default();
        if let Some(bytes) = bytes {
            state.apply_record(class, bytes);
        }
        state
    }
}

// ───────────────────────────────────────────────────────────────
// Storage binding
// ───────────────────────────────────────────────────────────────

/// NVS namespace holding the agent's blobs.
pub const STORAGE_NAMESPACE: &str = "homenode";
/// Key of the persisted actuator record.
pub const RECORD_KEY: &str = "actuators";

/// Synchronously flush the actuator record.  Classes that persist
/// nothing skip the write entirely.
pub fn persist(
    state: &DeviceState,
    class: DeviceClass,
    store: &mut impl crate::app::ports::StoragePort,
) -> Result<(), crate::app::ports::StorageError> {
    let record = state.to_record(class);
    if record.is_empty() {
        return Ok(());
    }
    store.write(STORAGE_NAMESPACE, RECORD_KEY, &record)
}

/// Boot-time load: stored record, or defaults when absent.
pub fn load(class: DeviceClass, store: &impl crate::app::ports::StoragePort) -> DeviceState {
    let mut buf = [0u8; MAX_RECORD_LEN];
    match store.read(STORAGE_NAMESPACE, RECORD_KEY, &mut buf) {
        Ok(len) => DeviceState::from_record(class, Some(&buf[..len])),
        Err(_) => DeviceState::from_record(class, None),
    }
}
