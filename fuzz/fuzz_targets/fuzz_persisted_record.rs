//! Fuzz the persisted-record decoder: any stored bytes (corrupt,
//! truncated, erased flash) must produce an in-range device state.

#![no_main]

use homenode::state::{DeviceClass, DeviceState};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    for class in [
        DeviceClass::SmartLight,
        DeviceClass::SmartSwitch,
        DeviceClass::SensorNode,
    ] {
        let state = DeviceState::from_record(class, Some(data));
        assert!(state.brightness <= 100);
    }
});
