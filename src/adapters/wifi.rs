//! WiFi station-mode adapter.
//!
//! Implements [`NetworkLinkPort`] — the hexagonal boundary for network
//! connectivity.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: real ESP-IDF WiFi driver calls via an
//!   attached `EspWifi` handle (constructed and wired in `main`).
//! - **all other targets**: simulation stubs for host-side tests.
//!
//! Credentials arrive from the provisioning portal (an external
//! collaborator) through `set_credentials`; until then the link manager
//! stays in its provisioning sub-mode.

use core::fmt::Write as _;
use log::{info, warn};

use crate::app::ports::{LinkError, NetworkLinkPort};

#[cfg(target_os = "espidf")]
use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi};

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

fn credentials_valid(ssid: &str, password: &str) -> bool {
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return false;
    }
    password.is_empty() || (8..=64).contains(&password.len())
}

pub struct WifiAdapter {
    ssid: heapless::String<32>,
    password: heapless::String<64>,
    #[cfg(target_os = "espidf")]
    wifi: Option<EspWifi<'static>>,
    /// Simulation link status.
    #[cfg(not(target_os = "espidf"))]
    sim_connected: bool,
    #[cfg(not(target_os = "espidf"))]
    sim_connect_counter: u32,
}

impl WifiAdapter {
    pub fn new() -> Self {
        Self {
            ssid: heapless::String::new(),
            password: heapless::String::new(),
            #[cfg(target_os = "espidf")]
            wifi: None,
            #[cfg(not(target_os = "espidf"))]
            sim_connected: false,
            #[cfg(not(target_os = "espidf"))]
            sim_connect_counter: 0,
        }
    }

    /// Attach the driver handle created during bootstrap.
    #[cfg(target_os = "espidf")]
    pub fn attach(&mut self, wifi: EspWifi<'static>) {
        self.wifi = Some(wifi);
    }

    /// Store station credentials (from the provisioning portal or NVS).
    /// Invalid credentials are rejected, not stored.
    pub fn set_credentials(&mut self, ssid: &str, password: &str) -> Result<(), LinkError> {
        if !credentials_valid(ssid, password) {
            warn!("wifi: rejecting invalid credentials (SSID '{}')", ssid);
            return Err(LinkError::InvalidCredentials);
        }
        self.ssid.clear();
        self.password.clear();
        let _ = self.ssid.push_str(ssid);
        let _ = self.password.push_str(password);
        info!("wifi: credentials updated (SSID '{}')", self.ssid);
        Ok(())
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self) -> Result<(), LinkError> {
        let Some(wifi) = self.wifi.as_mut() else {
            return Err(LinkError::Radio);
        };
        let config = Configuration::Client(ClientConfiguration {
            ssid: self.ssid.as_str().try_into().map_err(|_| LinkError::Radio)?,
            password: self
                .password
                .as_str()
                .try_into()
                .map_err(|_| LinkError::Radio)?,
            auth_method: if self.password.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            },
            ..Default::default()
        });
        wifi.set_configuration(&config).map_err(|e| {
            warn!("wifi: set_configuration failed: {}", e);
            LinkError::Radio
        })?;
        if !wifi.is_started().unwrap_or(false) {
            wifi.start().map_err(|e| {
                warn!("wifi: start failed: {}", e);
                LinkError::Radio
            })?;
        }
        wifi.connect().map_err(|e| {
            warn!("wifi: connect failed: {}", e);
            LinkError::Radio
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self) -> Result<(), LinkError> {
        self.sim_connect_counter = self.sim_connect_counter.wrapping_add(1);
        self.sim_connected = true;
        info!(
            "wifi(sim): associated with '{}' (attempt {})",
            self.ssid, self.sim_connect_counter
        );
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_is_connected(&self) -> bool {
        self.wifi
            .as_ref()
            .is_some_and(|w| w.is_connected().unwrap_or(false))
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_is_connected(&self) -> bool {
        self.sim_connected
    }

    #[cfg(target_os = "espidf")]
    fn platform_rssi(&self) -> Option<i8> {
        if !self.platform_is_connected() {
            return None;
        }
        let mut ap_info: esp_idf_svc::sys::wifi_ap_record_t = unsafe { core::mem::zeroed() };
        let ret = unsafe { esp_idf_svc::sys::esp_wifi_sta_get_ap_info(&mut ap_info) };
        (ret == esp_idf_svc::sys::ESP_OK).then_some(ap_info.rssi)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_rssi(&self) -> Option<i8> {
        if !self.sim_connected {
            return None;
        }
        // Oscillate between -66 and -54 dBm for realistic variation.
        let swing = ((self.sim_connect_counter % 12) as i8) - 6;
        Some(-60_i8.saturating_add(swing))
    }

    #[cfg(target_os = "espidf")]
    fn platform_ip(&self) -> Option<heapless::String<16>> {
        let wifi = self.wifi.as_ref()?;
        let ip_info = wifi.sta_netif().get_ip_info().ok()?;
        let mut out = heapless::String::new();
        let _ = write!(out, "{}", ip_info.ip);
        Some(out)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_ip(&self) -> Option<heapless::String<16>> {
        if !self.sim_connected {
            return None;
        }
        let mut out = heapless::String::new();
        let _ = write!(out, "192.168.1.42");
        Some(out)
    }
}

impl Default for WifiAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkLinkPort for WifiAdapter {
    fn has_credentials(&self) -> bool {
        !self.ssid.is_empty()
    }

    fn connect(&mut self) -> Result<(), LinkError> {
        if self.ssid.is_empty() {
            return Err(LinkError::NoCredentials);
        }
        self.platform_connect()
    }

    fn is_connected(&self) -> bool {
        self.platform_is_connected()
    }

    fn rssi(&self) -> Option<i8> {
        self.platform_rssi()
    }

    fn ip_address(&self) -> Option<heapless::String<16>> {
        self.platform_ip()
    }
}
