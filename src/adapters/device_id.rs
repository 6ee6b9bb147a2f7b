//! Factory MAC address, the root of the device identity.
//!
//! The ID derived from it is deterministic across reboots (the MAC is
//! burned into eFuse at the factory) and feeds every broker topic name.

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

/// Read the factory MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    unsafe {
        esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
    }
    mac
}

/// Simulation: returns a deterministic fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_mac_deterministic() {
        assert_eq!(read_mac(), read_mac());
    }
}
