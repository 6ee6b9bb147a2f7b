//! Per-boot device identity and the broker topic layout derived from it.
//!
//! The identity is immutable after boot: the ID comes from the factory
//! MAC address, the class from the build, the version from the crate.
//! Every topic name the agent publishes or subscribes to is built once
//! here and borrowed everywhere else.

use core::fmt::Write;

use crate::adapters::device_id::MacAddress;
use crate::state::DeviceClass;

/// `<class_slug>_<12 lowercase hex digits>`, e.g. `smart_light_deadbeefcafe`.
pub type DeviceId = heapless::String<32>;

/// Topic names, one per channel of the broker contract.
#[derive(Debug, Clone)]
pub struct TopicSet {
    pub base: heapless::String<64>,
    pub status: heapless::String<72>,
    pub state: heapless::String<72>,
    pub online: heapless::String<72>,
    pub command: heapless::String<72>,
    pub ota: heapless::String<72>,
}

impl TopicSet {
    /// Build the per-device topic tree: `<namespace>/devices/<deviceId>/…`.
    pub fn new(namespace: &str, device_id: &str) -> Self {
        let mut base = heapless::String::new();
        let _ = write!(base, "{}/devices/{}", namespace, device_id);

        let suffixed = |suffix: &str| {
            let mut t = heapless::String::new();
            let _ = write!(t, "{}/{}", base, suffix);
            t
        };

        Self {
            status: suffixed("status"),
            state: suffixed("state"),
            online: suffixed("online"),
            command: suffixed("command"),
            ota: suffixed("ota"),
            base,
        }
    }
}

/// Immutable per-boot identity.
#[derive(Debug, Clone)]
pub struct DeviceIdentity {
    pub device_id: DeviceId,
    /// Colon-separated uppercase MAC, as reported in status payloads.
    pub mac_address: heapless::String<18>,
    pub class: DeviceClass,
    pub firmware_version: &'static str,
    pub topics: TopicSet,
}

impl DeviceIdentity {
    pub fn new(class: DeviceClass, mac: &MacAddress, namespace: &str) -> Self {
        let mut device_id = DeviceId::new();
        let _ = write!(device_id, "{}_", class.slug());
        for byte in mac {
            let _ = write!(device_id, "{:02x}", byte);
        }

        let mut mac_address = heapless::String::new();
        for (i, byte) in mac.iter().enumerate() {
            if i > 0 {
                let _ = mac_address.push(':');
            }
            let _ = write!(mac_address, "{:02X}", byte);
        }

        let topics = TopicSet::new(namespace, &device_id);

        Self {
            device_id,
            mac_address,
            class,
            firmware_version: env!("CARGO_PKG_VERSION"),
            topics,
        }
    }
}
