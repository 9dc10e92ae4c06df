//! Unified error type for the tracker control plane.
//!
//! Every port returns its own typed error; all of them convert into
//! [`Error`] so the consumer loop can log and publish failures uniformly.
//! All variants are `Copy` so they can ride inside [`AppEvent`]s without
//! allocation.
//!
//! [`AppEvent`]: crate::app::events::AppEvent

use core::fmt;

use crate::app::ports::{BusError, ConfigError, NetError, StorageError};
use crate::command::AllocError;
use crate::fota::FotaError;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the control plane funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Persistent key-value store failed.
    Storage(StorageError),
    /// A peripheral bus transaction failed.
    Bus(BusError),
    /// The remote mirror link failed.
    Net(NetError),
    /// The battery voltage could not be read.
    Sensor(SensorError),
    /// The firmware-update workflow failed or was rejected.
    Fota(FotaError),
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
    /// The command buffer budget is exhausted.
    Alloc(AllocError),
    /// The event queue was full; the event was handed back to its producer.
    QueueFull,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Bus(e) => write!(f, "bus: {e}"),
            Self::Net(e) => write!(f, "net: {e}"),
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Fota(e) => write!(f, "fota: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Alloc(e) => write!(f, "alloc: {e}"),
            Self::QueueFull => write!(f, "event queue full"),
        }
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<BusError> for Error {
    fn from(e: BusError) -> Self {
        Self::Bus(e)
    }
}

impl From<NetError> for Error {
    fn from(e: NetError) -> Self {
        Self::Net(e)
    }
}

impl From<FotaError> for Error {
    fn from(e: FotaError) -> Self {
        Self::Fota(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<AllocError> for Error {
    fn from(e: AllocError) -> Self {
        Self::Alloc(e)
    }
}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// ADC controller is not ready or the channel could not be configured.
    NotReady,
    /// ADC read returned an error.
    AdcReadFailed,
    /// Raw-to-millivolt conversion is unavailable.
    ConversionFailed,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotReady => write!(f, "ADC not ready"),
            Self::AdcReadFailed => write!(f, "ADC read failed"),
            Self::ConversionFailed => write!(f, "millivolt conversion failed"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
