//! HTTP firmware fetch adapter.
//!
//! Implements [`FetchPort`]: a bounded, streaming GET of the firmware
//! image.  The whole transfer is wrapped in the caller's timeout — both
//! the connection and each socket read inherit it — so the OTA executor
//! can treat the fetch as a single blocking-but-bounded step.

use log::info;
#[cfg(target_os = "espidf")]
use log::warn;

use crate::app::ports::{FetchError, FetchPort, FirmwareSink};

/// Read granularity; matches the flash write block the firmware port
/// stages internally.
#[allow(dead_code)]
const CHUNK_SIZE: usize = 4096;

/// Largest image the fetch will accept, before the firmware port's own
/// space check.
const MAX_IMAGE_SIZE: u64 = 4 * 1024 * 1024; // 4 MB

pub struct HttpFetchAdapter;

impl HttpFetchAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for HttpFetchAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "espidf")]
impl FetchPort for HttpFetchAdapter {
    fn fetch(
        &mut self,
        url: &str,
        timeout_ms: u32,
        sink: &mut dyn FirmwareSink,
    ) -> Result<u32, FetchError> {
        use embedded_svc::http::client::Client;
        use esp_idf_svc::http::client::{Configuration, EspHttpConnection};

        let connection = EspHttpConnection::new(&Configuration {
            timeout: Some(core::time::Duration::from_millis(u64::from(timeout_ms))),
            ..Default::default()
        })
        .map_err(|e| {
            warn!("http: connection setup failed: {}", e);
            FetchError::Unreachable
        })?;
        let mut client = Client::wrap(connection);

        let request = client.get(url).map_err(|e| {
            warn!("http: GET {} failed: {}", url, e);
            FetchError::Unreachable
        })?;
        let response = request.submit().map_err(|e| {
            warn!("http: request submit failed: {}", e);
            FetchError::Unreachable
        })?;

        let status = response.status();
        if !(200..300).contains(&status) {
            warn!("http: server answered {}", status);
            return Err(FetchError::Unreachable);
        }

        if let Some(len) = response
            .header("Content-Length")
            .and_then(|v| v.parse::<u64>().ok())
        {
            if len > MAX_IMAGE_SIZE {
                return Err(FetchError::TooLarge);
            }
        }

        let mut total: u64 = 0;
        let mut buf = [0u8; CHUNK_SIZE];
        let mut reader = response;
        loop {
            let n = reader.read(&mut buf).map_err(|e| {
                warn!("http: read failed mid-transfer: {}", e);
                FetchError::Timeout
            })?;
            if n == 0 {
                break;
            }
            total += n as u64;
            if total > MAX_IMAGE_SIZE {
                return Err(FetchError::TooLarge);
            }
            sink.write(&buf[..n]).map_err(FetchError::Sink)?;
        }

        info!("http: fetched {} bytes from {}", total, url);
        Ok(total as u32)
    }
}

/// Host simulation: there is no firmware server to reach; tests drive
/// the OTA executor through mock fetch ports instead.
#[cfg(not(target_os = "espidf"))]
impl FetchPort for HttpFetchAdapter {
    fn fetch(
        &mut self,
        url: &str,
        _timeout_ms: u32,
        _sink: &mut dyn FirmwareSink,
    ) -> Result<u32, FetchError> {
        info!("http(sim): no fetch backend, {} unreachable", url);
        Err(FetchError::Unreachable)
    }
}
