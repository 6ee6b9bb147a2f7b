//! Inbound wire schemas: commands and OTA directives.
//!
//! Both arrive as JSON over the broker.  Decoding is strict: a payload
//! either produces a fully-typed value, a typed `Unknown` outcome (name
//! not in any class's vocabulary), or a [`DecodeError`] — the dispatcher
//! drops the last two without side effects.  Decoding never panics,
//! whatever the bytes.

use core::fmt;

use serde::Deserialize;
use serde_json::Value;

// ───────────────────────────────────────────────────────────────
// Errors
// ───────────────────────────────────────────────────────────────

/// Malformed-input decode failures.  Always logged and dropped; never
/// propagated out of the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Payload is not valid JSON or not an object.
    NotJson,
    /// Required field missing or wrong type; the `&'static str` names it.
    BadField(&'static str),
    /// Field present but outside its valid range.
    OutOfRange(&'static str),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotJson => write!(f, "payload is not a JSON object"),
            Self::BadField(name) => write!(f, "missing or ill-typed field '{}'", name),
            Self::OutOfRange(name) => write!(f, "field '{}' out of range", name),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Commands
// ───────────────────────────────────────────────────────────────

/// Discriminant used for the per-class supported-command table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    SetPower,
    SetBrightness,
    SetColor,
    Toggle,
    GetStatus,
    GetSensors,
    Restart,
}

/// A fully-decoded, validated command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SetPower { power: bool },
    /// Brightness percent, validated to 0–100 at decode time.
    SetBrightness { brightness: u8 },
    SetColor { r: u8, g: u8, b: u8 },
    Toggle,
    GetStatus,
    GetSensors,
    Restart,
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::SetPower { .. } => CommandKind::SetPower,
            Self::SetBrightness { .. } => CommandKind::SetBrightness,
            Self::SetColor { .. } => CommandKind::SetColor,
            Self::Toggle => CommandKind::Toggle,
            Self::GetStatus => CommandKind::GetStatus,
            Self::GetSensors => CommandKind::GetSensors,
            Self::Restart => CommandKind::Restart,
        }
    }

    /// Whether this command mutates actuator state (and therefore
    /// triggers the hardware-write / publish / persist sequence).
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Self::SetPower { .. } | Self::SetBrightness { .. } | Self::SetColor { .. } | Self::Toggle
        )
    }
}

/// Decode outcome: a known command, or a name outside the vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedCommand {
    Command(Command),
    /// Name not in the command vocabulary; carried for the log line.
    Unknown(heapless::String<32>),
}

#[derive(Deserialize)]
struct RawCommand {
    command: heapless::String<32>,
    #[serde(default)]
    parameters: Value,
}

fn param_bool(params: &Value, name: &'static str) -> Result<bool, DecodeError> {
    params
        .get(name)
        .and_then(Value::as_bool)
        .ok_or(DecodeError::BadField(name))
}

fn param_u8(params: &Value, name: &'static str, max: u8) -> Result<u8, DecodeError> {
    let v = params
        .get(name)
        .and_then(Value::as_u64)
        .ok_or(DecodeError::BadField(name))?;
    if v > u64::from(max) {
        return Err(DecodeError::OutOfRange(name));
    }
    Ok(v as u8)
}

/// Decode a command payload.
pub fn decode_command(payload: &[u8]) -> Result<DecodedCommand, DecodeError> {
    let raw: RawCommand = serde_json::from_slice(payload).map_err(|_| DecodeError::NotJson)?;

    let command = match raw.command.as_str() {
        "set_power" => Command::SetPower {
            power: param_bool(&raw.parameters, "power")?,
        },
        "set_brightness" => Command::SetBrightness {
            brightness: param_u8(&raw.parameters, "brightness", 100)?,
        },
        "set_color" => Command::SetColor {
            r: param_u8(&raw.parameters, "r", 255)?,
            g: param_u8(&raw.parameters, "g", 255)?,
            b: param_u8(&raw.parameters, "b", 255)?,
        },
        "toggle" => Command::Toggle,
        "get_status" => Command::GetStatus,
        "get_sensors" => Command::GetSensors,
        "restart" => Command::Restart,
        _ => return Ok(DecodedCommand::Unknown(raw.command)),
    };
    Ok(DecodedCommand::Command(command))
}

// ───────────────────────────────────────────────────────────────
// OTA directives
// ───────────────────────────────────────────────────────────────

/// Decoded `{action, url?, version?, sha256?}` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OtaDirective {
    /// Fetch and apply the image at `url`.
    Update {
        url: heapless::String<128>,
        /// Target version; when it matches the running version the
        /// executor reports `no_update` without fetching.
        version: Option<heapless::String<24>>,
        /// Expected SHA-256 of the image, when the backend supplies one.
        sha256: Option<[u8; 32]>,
    },
    /// Report the running version and readiness; never mutates firmware.
    Check,
}

#[derive(Deserialize)]
struct RawDirective {
    action: heapless::String<16>,
    url: Option<heapless::String<128>>,
    version: Option<heapless::String<24>>,
    sha256: Option<heapless::String<64>>,
}

fn parse_sha256(hex: &str) -> Result<[u8; 32], DecodeError> {
    if hex.len() != 64 {
        return Err(DecodeError::OutOfRange("sha256"));
    }
    let mut out = [0u8; 32];
    for (i, chunk) in hex.as_bytes().chunks_exact(2).enumerate() {
        let hi = (chunk[0] as char)
            .to_digit(16)
            .ok_or(DecodeError::BadField("sha256"))?;
        let lo = (chunk[1] as char)
            .to_digit(16)
            .ok_or(DecodeError::BadField("sha256"))?;
        out[i] = ((hi << 4) | lo) as u8;
    }
    Ok(out)
}

/// Decode an OTA directive payload.
pub fn decode_directive(payload: &[u8]) -> Result<OtaDirective, DecodeError> {
    let raw: RawDirective = serde_json::from_slice(payload).map_err(|_| DecodeError::NotJson)?;

    match raw.action.as_str() {
        "update" => {
            let url = raw.url.ok_or(DecodeError::BadField("url"))?;
            let sha256 = match raw.sha256 {
                Some(hex) => Some(parse_sha256(&hex)?),
                None => None,
            };
            Ok(OtaDirective::Update {
                url,
                version: raw.version,
                sha256,
            })
        }
        "check" => Ok(OtaDirective::Check),
        _ => Err(DecodeError::BadField("action")),
    }
}
