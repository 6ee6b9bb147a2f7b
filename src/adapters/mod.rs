//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements        | Connects to                |
//! |-------------|-------------------|----------------------------|
//! | `wifi`      | NetworkLinkPort   | ESP-IDF WiFi STA           |
//! | `mqtt`      | BrokerPort        | ESP-IDF MQTT client        |
//! | `nvs`       | ConfigPort        | NVS / in-memory store      |
//! |             | StoragePort       |                            |
//! | `http`      | FetchPort         | ESP-IDF HTTP client        |
//! | `firmware`  | FirmwarePort      | esp-ota partition API      |
//! | `hardware`  | ActuatorPort      | ESP32 GPIO, LEDC PWM       |
//! |             | SensorPort        | sensor board boundary      |
//! | `device_id` | —                 | eFuse factory MAC          |
//! | `time`      | —                 | ESP32 system timer         |
//! | `sysinfo`   | —                 | heap stats, soft reset     |
//!
//! Every adapter is cfg-gated: real driver calls on
//! `target_os = "espidf"`, simulation backends everywhere else so the
//! whole agent runs on the host.

pub mod device_id;
pub mod firmware;
pub mod hardware;
pub mod http;
pub mod mqtt;
pub mod nvs;
pub mod sysinfo;
pub mod time;
pub mod wifi;
