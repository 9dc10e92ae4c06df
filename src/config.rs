//! Configuration.
//!
//! Two kinds of configuration live here:
//!
//! - [`DeviceConfig`]: the runtime sampling configuration pushed by the
//!   cloud/data collaborator.  The consumer keeps one snapshot and replaces
//!   it wholesale on every configuration event.
//! - [`SystemConfig`]: static wiring (buffer budget, bus addresses, mirror
//!   endpoint, update target).  Persisted to NVS with `postcard`.

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;

/// Bounded string used for host names, file names and greetings.
pub type ConfigString = heapless::String<64>;

/// Copy `s` into a [`ConfigString`], truncating at capacity.
pub fn config_string(s: &str) -> ConfigString {
    let mut out = ConfigString::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

// ── Device (sampling) configuration ───────────────────────────

/// Which data categories the operator suppressed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoDataConfig {
    /// Do not report neighbour-cell measurements.
    pub neighbor_cell: bool,
    /// Do not report GNSS fixes.
    pub gnss: bool,
}

/// Runtime sampling configuration snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// `true` = fixed-cadence sampling, `false` = movement-driven.
    pub active_mode: bool,
    /// Sampling cadence in active mode (seconds).
    pub active_wait_timeout: u32,
    /// Passive-mode sampling cadence and movement debounce window (seconds).
    pub movement_resolution: u32,
    /// Passive-mode keep-alive sample interval (seconds).
    pub movement_timeout: u32,
    pub no_data: NoDataConfig,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            active_mode: true,
            active_wait_timeout: 120,
            movement_resolution: 120,
            movement_timeout: 3600,
            no_data: NoDataConfig::default(),
        }
    }
}

impl DeviceConfig {
    /// Decode a configuration document in the cloud JSON format.
    ///
    /// Missing fields take their defaults.
    pub fn from_json(bytes: &[u8]) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_slice(bytes).map_err(|_| ConfigError::Corrupted)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Range-check the timer periods.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.active_wait_timeout == 0 {
            return Err(ConfigError::ValidationFailed(
                "active_wait_timeout must be > 0",
            ));
        }
        if self.movement_resolution == 0 {
            return Err(ConfigError::ValidationFailed(
                "movement_resolution must be > 0",
            ));
        }
        if self.movement_timeout == 0 {
            return Err(ConfigError::ValidationFailed("movement_timeout must be > 0"));
        }
        Ok(())
    }

    /// Location is only requested when neither location source is suppressed.
    pub fn location_enabled(&self) -> bool {
        !self.no_data.neighbor_cell && !self.no_data.gnss
    }

    /// The sampling cadence that bounds a data request's timeout.
    pub fn cadence_secs(&self) -> u32 {
        if self.active_mode {
            self.active_wait_timeout
        } else {
            self.movement_resolution
        }
    }
}

// ── System (static) configuration ─────────────────────────────

/// Transport used by the remote mirror link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MirrorProtocol {
    Udp,
    Tcp,
}

/// Where the remote mirror connects and what it says first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorEndpoint {
    pub host: ConfigString,
    pub protocol: MirrorProtocol,
    pub udp_port: u16,
    pub tcp_port: u16,
    /// Sent once right after the link comes up.
    pub greeting: ConfigString,
    /// Size of the receive buffer; one inbound chunk per read.
    pub recv_buf_len: u16,
}

impl MirrorEndpoint {
    pub fn port(&self) -> u16 {
        match self.protocol {
            MirrorProtocol::Udp => self.udp_port,
            MirrorProtocol::Tcp => self.tcp_port,
        }
    }
}

impl Default for MirrorEndpoint {
    fn default() -> Self {
        Self {
            host: config_string("182.61.144.86"),
            protocol: MirrorProtocol::Udp,
            udp_port: 50001,
            tcp_port: 50000,
            greeting: config_string("Hello from tracker\n"),
            recv_buf_len: 80,
        }
    }
}

/// Firmware image location handed to the downloader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FotaTarget {
    /// `host:port`
    pub host: ConfigString,
    pub file: ConfigString,
    /// TLS security tag; negative means plain transport.
    pub sec_tag: i32,
}

impl Default for FotaTarget {
    fn default() -> Self {
        Self {
            host: config_string("182.61.144.86:50002"),
            file: config_string("app_update.bin"),
            sec_tag: -1,
        }
    }
}

/// Static system configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Identity ---
    /// Id carried in the shutdown acknowledgement.
    pub module_id: u8,

    // --- Buffers ---
    /// Total bytes of command buffers that may be alive at once.
    pub heap_budget_bytes: u32,

    // --- Command backends ---
    /// Record id used by KV_WRITE / KV_READ.
    pub kv_record_id: u16,
    /// 7-bit address of the bus B peripheral.
    pub bus_b_address: u8,
    /// Delay between the request and the response phase of a bus A read.
    pub bus_a_settle_ms: u32,

    // --- Timing ---
    /// Period of the sampling ticker (milliseconds).
    pub tick_interval_ms: u32,

    // --- Remote ---
    pub mirror: MirrorEndpoint,
    pub fota: FotaTarget,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            module_id: 1,
            heap_budget_bytes: 4096,
            kv_record_id: 0x01,
            bus_b_address: 0x48,
            bus_a_settle_ms: 1000,
            tick_interval_ms: 1000,
            mirror: MirrorEndpoint::default(),
            fota: FotaTarget::default(),
        }
    }
}

impl SystemConfig {
    /// Range-check every field.  Persisting adapters must call this first.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(256..=65_536).contains(&self.heap_budget_bytes) {
            return Err(ConfigError::ValidationFailed(
                "heap_budget_bytes must be 256–65536",
            ));
        }
        if self.bus_b_address > 0x7f {
            return Err(ConfigError::ValidationFailed(
                "bus_b_address must be a 7-bit address",
            ));
        }
        if self.bus_a_settle_ms > 10_000 {
            return Err(ConfigError::ValidationFailed(
                "bus_a_settle_ms must be 0–10000",
            ));
        }
        if !(100..=10_000).contains(&self.tick_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "tick_interval_ms must be 100–10000",
            ));
        }
        if self.mirror.host.is_empty() {
            return Err(ConfigError::ValidationFailed("mirror.host must not be empty"));
        }
        if !(1..=1024).contains(&self.mirror.recv_buf_len) {
            return Err(ConfigError::ValidationFailed(
                "mirror.recv_buf_len must be 1–1024",
            ));
        }
        if self.fota.host.is_empty() || self.fota.file.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "fota.host and fota.file must not be empty",
            ));
        }
        Ok(())
    }
}
