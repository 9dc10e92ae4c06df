//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AppService (domain)
//! ```
//!
//! Driven adapters (storage, buses, battery ADC, network, downloader, event
//! sinks) implement these traits.  The [`AppService`](super::service::AppService)
//! receives them as boxed trait objects at construction (or, for the event
//! sink, at the call site), so the domain core never touches hardware.
//!
//! All port errors are typed; callers must handle every variant explicitly.

use crate::config::{FotaTarget, MirrorEndpoint, SystemConfig};
use crate::error::SensorError;
use crate::fota::FotaError;

// ───────────────────────────────────────────────────────────────
// Key-value store port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent record store addressed by numeric id.
pub trait KvStore: Send {
    /// Read a record into `buf`.  Returns the number of bytes copied.
    fn read(&self, id: u16, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a record atomically.
    fn write(&mut self, id: u16, data: &[u8]) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Peripheral bus port (driven adapter: domain → SPI / I2C)
// ───────────────────────────────────────────────────────────────

/// Byte-level transactor for one peripheral bus.
pub trait BusTransactor: Send {
    /// Blocking write of `data` to the peripheral.
    fn write(&mut self, data: &[u8]) -> Result<(), BusError>;

    /// Blocking read filling all of `buf`.
    fn read(&mut self, buf: &mut [u8]) -> Result<(), BusError>;

    /// Send `request`, then read the peripheral's answer into `response`.
    fn transact(&mut self, request: &[u8], response: &mut [u8]) -> Result<(), BusError> {
        self.write(request)?;
        self.read(response)
    }
}

// ───────────────────────────────────────────────────────────────
// Battery port (driven adapter: ADC → domain)
// ───────────────────────────────────────────────────────────────

pub trait BatteryPort: Send {
    /// Supply voltage in millivolts.
    fn read_millivolts(&mut self) -> Result<i32, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Monotonic time since boot.
pub trait Clock: Send {
    fn uptime_ms(&self) -> u64;

    fn uptime_secs(&self) -> u64 {
        self.uptime_ms() / 1000
    }
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / cloud)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go (serial log, the
/// data module, the cloud module, etc.).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent<'_>);
}

// ───────────────────────────────────────────────────────────────
// Network port (driven adapter: domain ↔ remote mirror)
// ───────────────────────────────────────────────────────────────

/// Opens the remote mirror link.
pub trait NetworkPort: Send {
    fn connect(&mut self, endpoint: &MirrorEndpoint) -> Result<Box<dyn MirrorChannel>, NetError>;
}

/// A connected duplex channel (UDP association or TCP stream).
pub trait MirrorChannel: Send {
    /// Send one chunk.  Returns the number of bytes accepted.
    fn send(&mut self, data: &[u8]) -> Result<usize, NetError>;

    /// Block until one chunk arrives.  A closed peer is an error.
    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, NetError>;

    /// Second handle on the same link, for the receive thread.
    fn try_clone(&self) -> Result<Box<dyn MirrorChannel>, NetError>;
}

// ───────────────────────────────────────────────────────────────
// Firmware downloader port
// ───────────────────────────────────────────────────────────────

/// The external firmware-update downloader.
pub trait FirmwareDownloader: Send {
    /// Prepare the downloader (partition handles, client state).
    fn init(&mut self) -> Result<(), FotaError>;

    /// Download and write the image.  Blocks until done.
    fn start(&mut self, target: &FotaTarget) -> Result<(), FotaError>;
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists system configuration.
///
/// Implementations MUST call [`SystemConfig::validate`] before persisting.
/// Invalid ranges are rejected with [`ConfigError::ValidationFailed`],
/// not silently clamped.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`SystemConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<SystemConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed integrity / deserialization check.
    Corrupted,
    /// A config field failed range validation.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`KvStore`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested record does not exist.
    NotFound,
    /// Storage partition is full.
    Full,
    /// Generic I/O error.
    IoError,
}

/// Errors from [`BusTransactor`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    /// The peripheral did not acknowledge.
    NoAcknowledge,
    /// Transfer failed mid-way.
    Transfer,
    /// Bus is not initialised.
    NotReady,
}

/// Errors from [`NetworkPort`] and [`MirrorChannel`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetError {
    /// Host name did not resolve to an address.
    Resolve,
    /// Socket could not be created or connected.
    Connect,
    /// Send failed.
    Send,
    /// Receive failed.
    Recv,
    /// The peer closed the link.
    Closed,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "record not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for BusError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NoAcknowledge => write!(f, "no acknowledge"),
            Self::Transfer => write!(f, "transfer failed"),
            Self::NotReady => write!(f, "bus not ready"),
        }
    }
}

impl core::fmt::Display for NetError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Resolve => write!(f, "address resolution failed"),
            Self::Connect => write!(f, "connect failed"),
            Self::Send => write!(f, "send failed"),
            Self::Recv => write!(f, "receive failed"),
            Self::Closed => write!(f, "connection closed"),
        }
    }
}
