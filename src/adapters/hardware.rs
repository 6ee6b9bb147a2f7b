//! Hardware adapter — relay, light PWM, and the sensor-board boundary.
//!
//! Implements [`ActuatorPort`] over the load relay GPIO and the LEDC
//! PWM channel driving the light output, and [`SensorPort`] as the
//! boundary to the sensor board.  The sensor acquisition logic itself
//! (DHT/PIR conditioning, calibration) lives with the board support,
//! not here; this adapter only surfaces the latest conditioned values.

use log::{debug, info};

use crate::app::ports::{ActuatorPort, SensorPort};
use crate::state::SensorReadings;

#[cfg(target_os = "espidf")]
use esp_idf_hal::gpio::{AnyOutputPin, Output, PinDriver};
#[cfg(target_os = "espidf")]
use esp_idf_hal::ledc::LedcDriver;

pub struct HardwareAdapter {
    #[cfg(target_os = "espidf")]
    relay: PinDriver<'static, AnyOutputPin, Output>,
    #[cfg(target_os = "espidf")]
    light_pwm: LedcDriver<'static>,
    /// Last commanded outputs, for read-back and the simulation.
    power: bool,
    brightness: u8,
    color: (u8, u8, u8),
    /// Latest conditioned sensor values, refreshed by the board support.
    readings: SensorReadings,
}

impl HardwareAdapter {
    #[cfg(target_os = "espidf")]
    pub fn new(
        relay: PinDriver<'static, AnyOutputPin, Output>,
        light_pwm: LedcDriver<'static>,
    ) -> Self {
        Self {
            relay,
            light_pwm,
            power: false,
            brightness: 0,
            color: (255, 255, 255),
            readings: SensorReadings::default(),
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Self {
        info!("hardware(sim): adapter ready");
        Self {
            power: false,
            brightness: 0,
            color: (255, 255, 255),
            readings: SensorReadings::default(),
        }
    }

    /// Last commanded power state.
    pub fn power(&self) -> bool {
        self.power
    }

    /// Last commanded brightness.
    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    /// Board support pushes fresh conditioned readings here.
    pub fn update_readings(&mut self, readings: SensorReadings) {
        self.readings = readings;
    }

    #[cfg(target_os = "espidf")]
    fn drive_pwm(&mut self, percent: u8) {
        let max = self.light_pwm.get_max_duty();
        let duty = max * u32::from(percent) / 100;
        if let Err(e) = self.light_pwm.set_duty(duty) {
            log::warn!("hardware: PWM duty set failed: {}", e);
        }
    }
}

#[cfg(not(target_os = "espidf"))]
impl Default for HardwareAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ActuatorPort for HardwareAdapter {
    fn set_power(&mut self, on: bool) {
        self.power = on;
        #[cfg(target_os = "espidf")]
        {
            let result = if on {
                self.relay.set_high()
            } else {
                self.relay.set_low()
            };
            if let Err(e) = result {
                log::warn!("hardware: relay write failed: {}", e);
            }
            if !on {
                self.drive_pwm(0);
            }
        }
        #[cfg(not(target_os = "espidf"))]
        debug!("hardware(sim): relay {}", if on { "on" } else { "off" });
    }

    fn set_brightness(&mut self, percent: u8) {
        self.brightness = percent;
        #[cfg(target_os = "espidf")]
        self.drive_pwm(percent);
        #[cfg(not(target_os = "espidf"))]
        debug!("hardware(sim): brightness {}%", percent);
    }

    fn set_color(&mut self, r: u8, g: u8, b: u8) {
        // Colour is carried in state and telemetry; the single-channel
        // light output only tracks brightness on this board revision.
        self.color = (r, g, b);
        debug!("hardware: colour set to ({}, {}, {})", r, g, b);
    }
}

impl SensorPort for HardwareAdapter {
    fn read(&mut self) -> SensorReadings {
        self.readings
    }
}
