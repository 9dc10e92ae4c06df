//! Peripheral bus adapters.
//!
//! Both command buses are plain `embedded-hal` 1.0 devices, so the same
//! adapters drive the ESP-IDF peripherals on target and mocks on host.
//!
//! | Adapter  | Bus                     | Read                                 |
//! |----------|-------------------------|--------------------------------------|
//! | `SpiBus` | bus A, SPI device       | request, settle delay, then response |
//! | `I2cBus` | bus B, fixed I2C address| plain read                           |

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{self, I2c};
use embedded_hal::spi::{self, SpiDevice};
use log::debug;

use crate::app::ports::{BusError, BusTransactor};

// ── Bus A: SPI ────────────────────────────────────────────────

/// SPI peripheral that needs time between a request and its answer.
pub struct SpiBus<D, T> {
    dev: D,
    delay: T,
    settle_ms: u32,
}

impl<D: SpiDevice, T: DelayNs> SpiBus<D, T> {
    pub fn new(dev: D, delay: T, settle_ms: u32) -> Self {
        Self {
            dev,
            delay,
            settle_ms,
        }
    }
}

impl<D, T> BusTransactor for SpiBus<D, T>
where
    D: SpiDevice + Send,
    T: DelayNs + Send,
{
    fn write(&mut self, data: &[u8]) -> Result<(), BusError> {
        self.dev.write(data).map_err(spi_error)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<(), BusError> {
        self.dev.read(buf).map_err(spi_error)
    }

    fn transact(&mut self, request: &[u8], response: &mut [u8]) -> Result<(), BusError> {
        self.write(request)?;
        debug!("SpiBus: settling {} ms", self.settle_ms);
        self.delay.delay_ms(self.settle_ms);
        self.read(response)
    }
}

fn spi_error(e: impl spi::Error) -> BusError {
    debug!("SpiBus: {:?}", e.kind());
    BusError::Transfer
}

// ── Bus B: I2C ────────────────────────────────────────────────

/// One I2C peripheral at a fixed 7-bit address.
pub struct I2cBus<I> {
    bus: I,
    address: u8,
}

impl<I: I2c> I2cBus<I> {
    pub fn new(bus: I, address: u8) -> Self {
        Self { bus, address }
    }
}

impl<I: I2c + Send> BusTransactor for I2cBus<I> {
    fn write(&mut self, data: &[u8]) -> Result<(), BusError> {
        self.bus.write(self.address, data).map_err(i2c_error)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<(), BusError> {
        self.bus.read(self.address, buf).map_err(i2c_error)
    }
}

fn i2c_error(e: impl i2c::Error) -> BusError {
    match e.kind() {
        i2c::ErrorKind::NoAcknowledge(_) => BusError::NoAcknowledge,
        kind => {
            debug!("I2cBus: {:?}", kind);
            BusError::Transfer
        }
    }
}
