//! Platform health queries and the soft-reset primitive.

/// Free heap in bytes, as reported in status telemetry.
#[cfg(target_os = "espidf")]
pub fn free_heap_bytes() -> u32 {
    unsafe { esp_idf_svc::sys::esp_get_free_heap_size() }
}

/// Simulation: a fixed plausible figure.
#[cfg(not(target_os = "espidf"))]
pub fn free_heap_bytes() -> u32 {
    180_000
}

/// Soft-reset the chip.  Never returns.
#[cfg(target_os = "espidf")]
pub fn restart() -> ! {
    log::warn!("sysinfo: restarting device");
    unsafe {
        esp_idf_svc::sys::esp_restart();
    }
    unreachable!()
}

/// Simulation: terminate the process instead of resetting silicon.
#[cfg(not(target_os = "espidf"))]
pub fn restart() -> ! {
    log::warn!("sysinfo: restart requested (simulation) — exiting");
    std::process::exit(0)
}
