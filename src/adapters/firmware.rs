//! Firmware slot adapter — backed by the `esp-ota` crate.
//!
//! Implements [`FirmwarePort`]: `begin` opens the inactive partition,
//! `write` streams image bytes into it, `finalize` validates the image
//! and marks it bootable.  Dropping the in-flight update (or `abort`)
//! leaves the running firmware untouched, which is what keeps a failed
//! OTA from ever bricking the device.
//!
//! The simulation backend accumulates bytes in memory so host tests can
//! assert on exactly what would have been flashed.

use log::{info, warn};

use crate::app::ports::{FirmwareError, FirmwarePort};

pub struct FirmwareSlotAdapter {
    #[cfg(target_os = "espidf")]
    update: Option<esp_ota::OtaUpdate>,
    #[cfg(not(target_os = "espidf"))]
    staged: Option<Vec<u8>>,
    #[cfg(not(target_os = "espidf"))]
    finalized: bool,
}

impl FirmwareSlotAdapter {
    pub fn new() -> Self {
        Self {
            #[cfg(target_os = "espidf")]
            update: None,
            #[cfg(not(target_os = "espidf"))]
            staged: None,
            #[cfg(not(target_os = "espidf"))]
            finalized: false,
        }
    }

    /// Simulation only: bytes written so far.
    #[cfg(not(target_os = "espidf"))]
    pub fn staged_bytes(&self) -> Option<&[u8]> {
        self.staged.as_deref()
    }

    /// Simulation only: whether `finalize` completed.
    #[cfg(not(target_os = "espidf"))]
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }
}

impl Default for FirmwareSlotAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "espidf")]
impl FirmwarePort for FirmwareSlotAdapter {
    fn begin(&mut self) -> Result<(), FirmwareError> {
        if self.update.is_some() {
            // Stale stage from an aborted run; drop it first.
            self.update = None;
        }
        let update = esp_ota::OtaUpdate::begin().map_err(|e| {
            warn!("firmware: begin failed: {:?}", e);
            FirmwareError::BeginFailed
        })?;
        self.update = Some(update);
        info!("firmware: inactive slot opened");
        Ok(())
    }

    fn write(&mut self, chunk: &[u8]) -> Result<(), FirmwareError> {
        let Some(update) = self.update.as_mut() else {
            return Err(FirmwareError::BeginFailed);
        };
        update.write(chunk).map_err(|e| {
            warn!("firmware: write failed: {:?}", e);
            FirmwareError::WriteFailed
        })
    }

    fn finalize(&mut self) -> Result<(), FirmwareError> {
        let Some(update) = self.update.take() else {
            return Err(FirmwareError::BeginFailed);
        };
        let mut completed = update.finalize().map_err(|e| {
            warn!("firmware: finalize failed: {:?}", e);
            FirmwareError::FinalizeFailed
        })?;
        completed.set_as_boot_partition().map_err(|e| {
            warn!("firmware: set_as_boot_partition failed: {:?}", e);
            FirmwareError::FinalizeFailed
        })?;
        info!("firmware: new image marked bootable");
        Ok(())
    }

    fn abort(&mut self) {
        // esp-ota aborts automatically when OtaUpdate is dropped.
        if self.update.take().is_some() {
            warn!("firmware: stage aborted, running image untouched");
        }
    }
}

#[cfg(not(target_os = "espidf"))]
impl FirmwarePort for FirmwareSlotAdapter {
    fn begin(&mut self) -> Result<(), FirmwareError> {
        self.staged = Some(Vec::new());
        self.finalized = false;
        Ok(())
    }

    fn write(&mut self, chunk: &[u8]) -> Result<(), FirmwareError> {
        match self.staged.as_mut() {
            Some(buf) => {
                buf.extend_from_slice(chunk);
                Ok(())
            }
            None => Err(FirmwareError::BeginFailed),
        }
    }

    fn finalize(&mut self) -> Result<(), FirmwareError> {
        if self.staged.is_none() {
            return Err(FirmwareError::BeginFailed);
        }
        self.finalized = true;
        info!("firmware(sim): image finalized");
        Ok(())
    }

    fn abort(&mut self) {
        if self.staged.take().is_some() {
            warn!("firmware(sim): stage aborted");
        }
        self.finalized = false;
    }
}

/// Check OTA image state on startup and mark this firmware as valid.
///
/// Without this, the rollback watchdog reverts to the previous firmware
/// after three consecutive failed boots.
#[cfg(target_os = "espidf")]
pub fn mark_boot_valid() {
    match esp_ota::mark_app_valid() {
        Ok(()) => info!("firmware: image marked valid (rollback cancelled)"),
        Err(e) => warn!("firmware: mark_app_valid failed: {:?}", e),
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn mark_boot_valid() {
    log::info!("firmware(sim): rollback check skipped");
}
