//! Monotonic time for the supervisory loop.
//!
//! - **`target_os = "espidf"`** — wraps `esp_timer_get_time()` from the
//!   ESP-IDF high-resolution timer (microsecond precision, monotonic).
//! - **all other targets** — `std::time::Instant` for host-side tests
//!   and simulation.

/// Monotonic uptime clock.
pub struct MonotonicClock {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    /// Milliseconds since boot (monotonic).
    #[cfg(target_os = "espidf")]
    pub fn uptime_ms(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1_000
    }

    /// Milliseconds since boot (monotonic).
    #[cfg(not(target_os = "espidf"))]
    pub fn uptime_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// Bounded blocking delay.  On device this yields to the scheduler so
/// the idle task can feed its own watchdog.
#[cfg(target_os = "espidf")]
pub fn sleep_ms(ms: u32) {
    if ms > 0 {
        esp_idf_hal::delay::FreeRtos::delay_ms(ms);
    }
}

/// Bounded blocking delay (host).
#[cfg(not(target_os = "espidf"))]
pub fn sleep_ms(ms: u32) {
    if ms > 0 {
        std::thread::sleep(std::time::Duration::from_millis(u64::from(ms)));
    }
}
