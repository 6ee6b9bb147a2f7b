//! Board pin assignments.
//!
//! Shared across the device classes; classes that lack a peripheral
//! simply never drive its pin.

/// Status/light PWM output.
pub const LED_GPIO: i32 = 2;

/// User button (active-low, falling-edge interrupt).
pub const BUTTON_GPIO: i32 = 0;

/// Load relay output.
pub const RELAY_GPIO: i32 = 4;

/// LEDC PWM channel for the light output.
pub const PWM_CHANNEL: u32 = 0;

/// LEDC PWM frequency (Hz).
pub const PWM_FREQ_HZ: u32 = 5000;
