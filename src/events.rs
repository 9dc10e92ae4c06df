//! Event system.
//!
//! Events are produced by:
//! - External modules (configuration, sensors, modem, data, cloud, UI)
//! - The sampling ticker thread
//! - The mirror receive thread
//! - The firmware-update worker
//! - The consumer itself (follow-up events such as `DataGet`)
//!
//! Events are consumed by exactly one consumer, one at a time, in FIFO
//! order.  Producers that find the queue full get their event back.
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ Modules     │────▶│              │     │              │
//! │ Ticker      │────▶│  EventQueue  │────▶│  AppService  │
//! │ Mirror RX   │────▶│  (bounded)   │     │  (consumer)  │
//! │ FOTA worker │────▶│              │     │              │
//! └─────────────┘     └──────────────┘     └──────────────┘
//! ```

use core::fmt;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, TrySendError};

use crate::command::{CmdBuffer, CommandResult};
use crate::config::DeviceConfig;
use crate::fota::FotaProgress;
use crate::scheduler::DataRequest;

/// Maximum number of pending events.
pub const EVENT_QUEUE_CAP: usize = 16;

/// Every message the consumer understands.
#[derive(Debug)]
pub enum Event {
    // ── Configuration ─────────────────────────────────────
    /// First configuration after boot; moves `Init` to `Running`.
    ConfigInit(DeviceConfig),
    /// Configuration update.
    ConfigReady(DeviceConfig),

    // ── Connectivity ──────────────────────────────────────
    CloudConnected,

    // ── Movement sensor ───────────────────────────────────
    MovementActivity,
    MovementInactivity,
    MovementImpact,

    // ── Modem / data ──────────────────────────────────────
    ModemStaticDataReady,
    /// All samplers answered the outstanding request.
    DataReady,

    // ── Util ──────────────────────────────────────────────
    ShutdownRequest,

    // ── UI ────────────────────────────────────────────────
    ButtonPressed(u8),

    // ── Inbound command bytes (cloud or mirror) ───────────
    CustomCommand(CmdBuffer),

    // ── Sampling ticker ───────────────────────────────────
    TimerTick,

    // ── Emitted by the consumer itself ────────────────────
    DataGetAll,
    DataGet(DataRequest),
    BatteryReady { millivolts: i32, timestamp_ms: u64 },
    BatteryNotReady,
    CommandResultReady(CommandResult),
    MirrorSend(CmdBuffer),
    ShutdownReady { module_id: u8 },

    // ── Firmware update worker ────────────────────────────
    FotaProgress(FotaProgress),
}

impl Event {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ConfigInit(_) => "CONFIG_INIT",
            Self::ConfigReady(_) => "CONFIG_READY",
            Self::CloudConnected => "CLOUD_CONNECTED",
            Self::MovementActivity => "MOVEMENT_ACTIVITY",
            Self::MovementInactivity => "MOVEMENT_INACTIVITY",
            Self::MovementImpact => "MOVEMENT_IMPACT",
            Self::ModemStaticDataReady => "MODEM_STATIC_DATA_READY",
            Self::DataReady => "DATA_READY",
            Self::ShutdownRequest => "SHUTDOWN_REQUEST",
            Self::ButtonPressed(_) => "BUTTON_PRESSED",
            Self::CustomCommand(_) => "CUSTOM_COMMAND",
            Self::TimerTick => "TIMER_TICK",
            Self::DataGetAll => "DATA_GET_ALL",
            Self::DataGet(_) => "DATA_GET",
            Self::BatteryReady { .. } => "BATTERY_READY",
            Self::BatteryNotReady => "BATTERY_NOT_READY",
            Self::CommandResultReady(_) => "COMMAND_RESULT_READY",
            Self::MirrorSend(_) => "MIRROR_SEND",
            Self::ShutdownReady { .. } => "SHUTDOWN_READY",
            Self::FotaProgress(_) => "FOTA_PROGRESS",
        }
    }
}

// ── Queue ─────────────────────────────────────────────────────

/// The queue was full.  Carries the rejected event back to the producer.
pub struct QueueFull(pub Event);

impl fmt::Debug for QueueFull {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QueueFull({})", self.0.name())
    }
}

impl fmt::Display for QueueFull {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "event queue full, {} rejected", self.0.name())
    }
}

/// Bounded multi-producer, single-consumer FIFO.
///
/// Shared between threads behind an `Arc`; every method takes `&self`.
pub struct EventQueue {
    chan: Channel<CriticalSectionRawMutex, Event, EVENT_QUEUE_CAP>,
}

impl EventQueue {
    pub const fn new() -> Self {
        Self {
            chan: Channel::new(),
        }
    }

    /// Enqueue without blocking.
    pub fn push(&self, event: Event) -> Result<(), QueueFull> {
        self.chan.try_send(event).map_err(|e| match e {
            TrySendError::Full(ev) => QueueFull(ev),
        })
    }

    /// Dequeue without blocking.
    pub fn pop(&self) -> Option<Event> {
        self.chan.try_receive().ok()
    }

    /// Wait for the next event.
    pub async fn next(&self) -> Event {
        self.chan.receive().await
    }

    /// Block the calling thread until the next event arrives.
    pub fn next_blocking(&self) -> Event {
        futures_lite::future::block_on(self.chan.receive())
    }

    /// Pop every pending event into `handler`, in FIFO order.
    pub fn drain(&self, mut handler: impl FnMut(Event)) {
        while let Some(event) = self.pop() {
            handler(event);
        }
    }

    pub fn len(&self) -> usize {
        self.chan.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chan.is_empty()
    }

    pub fn capacity(&self) -> usize {
        EVENT_QUEUE_CAP
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}
