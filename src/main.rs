//! Asset Tracker Firmware: Main Entry Point
//!
//! Hexagonal architecture with one event consumer.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  NvsAdapter       SpiBus / I2cBus   BatterySensor  Esp32Clock  │
//! │  (Config+KV)      (Bus A / Bus B)   (BatteryPort)  (Clock)     │
//! │  StdNetwork       HttpDownloader    LogEventSink   Ticker      │
//! │  (Mirror link)    (FOTA)            (EventSink)    (TimerTick) │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  FSM · Scheduler · Dispatcher · Mirror · FOTA          │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  EventQueue (bounded, many producers, one consumer)            │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::sync::Arc;

use anyhow::Result;
use log::{error, info, warn};

use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::spi::{SpiDeviceDriver, SpiDriverConfig, config::Config as SpiConfig};
use esp_idf_hal::units::Hertz;

use assettracker::adapters::battery::BatterySensor;
use assettracker::adapters::bus::{I2cBus, SpiBus};
use assettracker::adapters::downloader::{self, HttpDownloader};
use assettracker::adapters::log_sink::LogEventSink;
use assettracker::adapters::net::StdNetwork;
use assettracker::adapters::nvs::NvsAdapter;
use assettracker::adapters::ticker::Ticker;
use assettracker::adapters::time::Esp32Clock;
use assettracker::app::ports::ConfigPort;
use assettracker::app::service::{AppService, Collaborators};
use assettracker::command::Backends;
use assettracker::config::{DeviceConfig, SystemConfig};
use assettracker::events::{Event, EventQueue};

// ── Board wiring ──────────────────────────────────────────────
//
// Bus A: SPI2, SCLK=GPIO18, MOSI=GPIO23, MISO=GPIO19, CS=GPIO5
// Bus B: I2C0, SDA=GPIO21, SCL=GPIO22
// Battery divider on ADC1 channel 6 (GPIO34)

const BATTERY_ADC_CHANNEL: u32 = 6;
const SPI_BAUD_HZ: u32 = 1_000_000;
const I2C_BAUD_HZ: u32 = 100_000;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Asset Tracker v{}                ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 1b. Confirm the running image ─────────────────────────
    downloader::mark_running_image_valid();

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let nvs = NvsAdapter::new().map_err(|e| anyhow::anyhow!("NVS init failed: {}", e))?;
    let config = match nvs.load() {
        Ok(cfg) => {
            info!("Config loaded from NVS");
            cfg
        }
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            SystemConfig::default()
        }
    };

    // ── 3. Peripheral buses ───────────────────────────────────
    let peripherals = Peripherals::take()?;

    let spi_config = SpiConfig::new()
        .baudrate(Hertz(SPI_BAUD_HZ))
        .data_mode(embedded_hal::spi::MODE_0);
    let spi = SpiDeviceDriver::new_single(
        peripherals.spi2,
        peripherals.pins.gpio18,
        peripherals.pins.gpio23,
        Some(peripherals.pins.gpio19),
        Some(peripherals.pins.gpio5),
        &SpiDriverConfig::default(),
        &spi_config,
    )?;
    let bus_a = SpiBus::new(spi, FreeRtos, config.bus_a_settle_ms);

    let i2c = I2cDriver::new(
        peripherals.i2c0,
        peripherals.pins.gpio21,
        peripherals.pins.gpio22,
        &I2cConfig::new().baudrate(Hertz(I2C_BAUD_HZ)),
    )?;
    let bus_b = I2cBus::new(i2c, config.bus_b_address);

    // ── 4. Construct adapters ─────────────────────────────────
    let battery = BatterySensor::new(BATTERY_ADC_CHANNEL)
        .map_err(|e| anyhow::anyhow!("battery ADC init failed: {}", e))?;

    let queue = Arc::new(EventQueue::new());
    let backends = Backends {
        store: Box::new(nvs),
        bus_a: Box::new(bus_a),
        bus_b: Box::new(bus_b),
    };
    let collab = Collaborators {
        battery: Box::new(battery),
        clock: Box::new(Esp32Clock::new()),
        network: Box::new(StdNetwork::new()),
        downloader: Box::new(HttpDownloader::new()),
    };

    // ── 5. Construct app service ──────────────────────────────
    let mut log_sink = LogEventSink::new();
    let mut app = AppService::new(&config, Arc::clone(&queue), backends, collab);
    app.start(&mut log_sink);

    // The configuration module publishes the stored sampling settings
    // at boot; until it is wired in, start from the defaults.
    if let Err(e) = queue.push(Event::ConfigInit(DeviceConfig::default())) {
        error!("Boot: {}", e);
    }

    let _ticker = Ticker::start(Arc::clone(&queue), config.tick_interval_ms)
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    info!("System ready. Entering event loop.");

    // ── 6. Event loop ─────────────────────────────────────────
    app.run(&mut log_sink);
    app.join_fota();

    info!("Event loop finished; waiting for power-off");
    loop {
        FreeRtos::delay_ms(1000);
    }
}
