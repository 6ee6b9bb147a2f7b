//! HomeNode Firmware — Main Entry Point
//!
//! Hexagonal architecture around a single cooperative supervisory loop:
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  WifiAdapter     MqttAdapter      NvsAdapter    HardwareAdapter│
//! │  (NetworkLink)   (Broker)         (Config+Store)(Actuator+Sens)│
//! │  HttpFetchAdapter FirmwareSlotAdapter  MonotonicClock          │
//! │  (Fetch)         (Firmware)            (time)                  │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │               Agent (pure logic)                       │    │
//! │  │  link · session · dispatch · telemetry · OTA           │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `main` owns what the agent must not: the watchdog feed, the loop
//! sleep, and the actual device reset when a cycle asks for one.

#![deny(unused_must_use)]

use anyhow::Result;
use log::{info, warn};

use homenode::adapters::firmware::{self, FirmwareSlotAdapter};
use homenode::adapters::hardware::HardwareAdapter;
use homenode::adapters::http::HttpFetchAdapter;
use homenode::adapters::mqtt::MqttAdapter;
use homenode::adapters::nvs::NvsAdapter;
use homenode::adapters::sysinfo;
use homenode::adapters::time::{self, MonotonicClock};
use homenode::adapters::wifi::WifiAdapter;
use homenode::adapters::device_id;
use homenode::app::agent::{Agent, CycleAction, RestartReason};
use homenode::app::ports::{ConfigPort, StoragePort};
use homenode::config::AgentConfig;
use homenode::drivers::watchdog::Watchdog;
use homenode::identity::DeviceIdentity;
use homenode::state::{self, DeviceClass};

/// TWDT budget; generous next to the worst-case bounded cycle
/// (link polling plus one OTA fetch step).
const WATCHDOG_TIMEOUT_MS: u32 = 30_000;

/// NVS keys under which the provisioning portal stores link credentials.
const WIFI_SSID_KEY: &str = "wifi_ssid";
const WIFI_PASS_KEY: &str = "wifi_pass";

fn load_credentials(nvs: &NvsAdapter, wifi: &mut WifiAdapter) {
    let mut ssid_buf = [0u8; 32];
    let mut pass_buf = [0u8; 64];

    let Ok(ssid_len) = nvs.read(state::STORAGE_NAMESPACE, WIFI_SSID_KEY, &mut ssid_buf) else {
        info!("boot: no stored WiFi credentials, provisioning required");
        return;
    };
    let pass_len = nvs
        .read(state::STORAGE_NAMESPACE, WIFI_PASS_KEY, &mut pass_buf)
        .unwrap_or(0);

    match (
        core::str::from_utf8(&ssid_buf[..ssid_len]),
        core::str::from_utf8(&pass_buf[..pass_len]),
    ) {
        (Ok(ssid), Ok(pass)) => {
            if let Err(e) = wifi.set_credentials(ssid, pass) {
                warn!("boot: stored credentials invalid ({}), ignoring", e);
            }
        }
        _ => warn!("boot: stored credentials not UTF-8, ignoring"),
    }
}

fn main() -> Result<()> {
    // ── 1. Platform bootstrap ─────────────────────────────────
    #[cfg(target_os = "espidf")]
    {
        esp_idf_svc::sys::link_patches();
        esp_idf_logger::init()?;
    }
    #[cfg(not(target_os = "espidf"))]
    env_logger_init();

    info!("HomeNode v{} starting", env!("CARGO_PKG_VERSION"));

    // ── 1b. OTA rollback check ────────────────────────────────
    firmware::mark_boot_valid();

    // ── 2. Persistent storage + config ────────────────────────
    let mut nvs = match NvsAdapter::new() {
        Ok(n) => n,
        Err(e) => {
            warn!("NVS init failed ({}), running without persistence", e);
            NvsAdapter::default()
        }
    };
    let config = match nvs.load() {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("config load failed ({}), using defaults", e);
            AgentConfig::default()
        }
    };

    // ── 3. Identity + boot-time state ─────────────────────────
    let mac = device_id::read_mac();
    let identity = DeviceIdentity::new(DeviceClass::BUILD, &mac, &config.topic_namespace);
    info!(
        "Device ID: {} ({} v{})",
        identity.device_id,
        identity.class.display_name(),
        identity.firmware_version
    );
    let boot_state = state::load(identity.class, &nvs);

    // ── 4. Agent core ─────────────────────────────────────────
    let loop_delay_ms = config.loop_delay_ms;
    let flush_delay_ms = config.restart_flush_delay_ms;
    let mut agent = Agent::new(identity, config, boot_state);

    // ── 5. Adapters ───────────────────────────────────────────
    let mut wifi = WifiAdapter::new();
    load_credentials(&nvs, &mut wifi);

    #[cfg(target_os = "espidf")]
    let mut hw = {
        use esp_idf_hal::gpio::{OutputPin, PinDriver};
        use esp_idf_hal::ledc::{config::TimerConfig, LedcDriver, LedcTimerDriver};
        use esp_idf_hal::peripherals::Peripherals;
        use esp_idf_hal::units::Hertz;

        let peripherals = Peripherals::take()?;

        // Network stack wiring for the WiFi adapter.
        let sysloop = esp_idf_svc::eventloop::EspSystemEventLoop::take()?;
        let nvs_partition = esp_idf_svc::nvs::EspDefaultNvsPartition::take()?;
        wifi.attach(esp_idf_svc::wifi::EspWifi::new(
            peripherals.modem,
            sysloop,
            Some(nvs_partition),
        )?);

        // Load relay + light PWM.
        let relay = PinDriver::output(peripherals.pins.gpio4.downgrade_output())?;
        let timer = LedcTimerDriver::new(
            peripherals.ledc.timer0,
            &TimerConfig::new().frequency(Hertz(homenode::pins::PWM_FREQ_HZ)),
        )?;
        let light_pwm =
            LedcDriver::new(peripherals.ledc.channel0, timer, peripherals.pins.gpio2)?;

        // Button edge interrupt → lock-free timestamp flag.
        let isr_handle = agent.button_handle();
        let mut button = PinDriver::input(peripherals.pins.gpio0)?;
        button.set_pull(esp_idf_hal::gpio::Pull::Up)?;
        button.set_interrupt_type(esp_idf_hal::gpio::InterruptType::NegEdge)?;
        // SAFETY: the handler only performs a lock-free atomic store.
        unsafe {
            button.subscribe(move || {
                let now_ms =
                    (unsafe { esp_idf_svc::sys::esp_timer_get_time() } / 1000) as u32;
                isr_handle.record_edge(now_ms);
            })?;
        }
        button.enable_interrupt()?;
        core::mem::forget(button);

        HardwareAdapter::new(relay, light_pwm)
    };
    #[cfg(not(target_os = "espidf"))]
    let mut hw = HardwareAdapter::new();

    let mut broker = MqttAdapter::new();
    let mut fetch = HttpFetchAdapter::new();
    let mut fw_slot = FirmwareSlotAdapter::new();

    let watchdog = Watchdog::new(WATCHDOG_TIMEOUT_MS);
    let clock = MonotonicClock::new();

    // ── 6. Supervisory loop ───────────────────────────────────
    info!("System ready. Entering supervisory loop.");

    loop {
        let now_ms = clock.uptime_ms();
        let action = agent.cycle(
            now_ms,
            &mut wifi,
            &mut broker,
            &mut hw,
            &mut nvs,
            &mut fetch,
            &mut fw_slot,
        );

        match action {
            CycleAction::Continue => {}
            CycleAction::Restart(reason) => {
                match reason {
                    RestartReason::LinkFailure => {
                        // Ungraceful path: the broker's last-will reveals
                        // the device as offline.
                        warn!("restarting: link failure budget exhausted");
                    }
                    RestartReason::CommandRequested => {
                        info!("restarting: remote command");
                        time::sleep_ms(flush_delay_ms);
                    }
                    RestartReason::OtaApplied => {
                        info!("restarting: booting new firmware");
                        time::sleep_ms(flush_delay_ms);
                    }
                }
                sysinfo::restart();
            }
        }

        watchdog.feed();
        time::sleep_ms(loop_delay_ms);
    }
}

/// Minimal host-side logger so the simulation binary prints something.
#[cfg(not(target_os = "espidf"))]
fn env_logger_init() {
    struct StderrLogger;
    impl log::Log for StderrLogger {
        fn enabled(&self, _metadata: &log::Metadata) -> bool {
            true
        }
        fn log(&self, record: &log::Record) {
            eprintln!("[{}] {}", record.level(), record.args());
        }
        fn flush(&self) {}
    }
    static LOGGER: StderrLogger = StderrLogger;
    let _ = log::set_logger(&LOGGER).map(|()| log::set_max_level(log::LevelFilter::Info));
}
