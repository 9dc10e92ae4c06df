//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter      | Implements         | Connects to                    |
//! |--------------|--------------------|--------------------------------|
//! | `battery`    | BatteryPort        | ESP32 ADC / injected value     |
//! | `bus`        | BusTransactor      | embedded-hal SPI and I2C       |
//! | `downloader` | FirmwareDownloader | HTTP client + OTA partition    |
//! | `log_sink`   | EventSink          | Serial log output              |
//! | `net`        | NetworkPort        | UDP / TCP sockets              |
//! | `nvs`        | ConfigPort         | NVS / in-memory store          |
//! |              | KvStore            |                                |
//! | `ticker`     | —                  | esp_timer / thread → TimerTick |
//! | `time`       | Clock              | ESP32 system timer             |

pub mod battery;
pub mod bus;
#[cfg(target_os = "espidf")]
pub mod downloader;
pub mod log_sink;
pub mod net;
pub mod nvs;
pub mod ticker;
pub mod time;
