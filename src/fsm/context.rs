//! Shared mutable context threaded through every FSM handler.
//!
//! `FsmContext` is the one struct state handlers read from and write to:
//! the configuration snapshot, the sampling flags, the FOTA lock, the
//! sampling timers and the follow-up events a handler wants enqueued.
//! Only the consumer thread ever touches it.

use crate::config::DeviceConfig;
use crate::events::Event;
use crate::scheduler::{DataRequest, SamplingScheduler};

/// Follow-up events one handler pass may produce.
pub const OUTBOX_CAP: usize = 4;

/// Signal-only events queued by handlers; the service enqueues them after
/// the handlers return.
pub type Outbox = heapless::Vec<Event, OUTBOX_CAP>;

pub struct FsmContext {
    /// Latest configuration snapshot.  Replaced wholesale, never patched.
    pub config: DeviceConfig,
    /// Sticky: the static modem data has been collected once.
    pub modem_static_sampled: bool,
    /// A data request is outstanding.
    pub sample_request_ongoing: bool,
    /// Latest movement state reported by the sensor.
    pub activity: bool,
    /// A firmware update owns the device.
    pub fota_lock: bool,
    /// Uptime of the event being handled.
    pub now_ms: u64,
    pub scheduler: SamplingScheduler,
    pub outbox: Outbox,
    /// Module id used in `ShutdownReady`.
    pub module_id: u8,
}

impl FsmContext {
    pub fn new(module_id: u8) -> Self {
        Self {
            config: DeviceConfig::default(),
            modem_static_sampled: false,
            sample_request_ongoing: false,
            activity: false,
            fota_lock: false,
            now_ms: 0,
            scheduler: SamplingScheduler::new(),
            outbox: Outbox::new(),
            module_id,
        }
    }

    /// Queue a follow-up event.  Overflow means a handler produced more
    /// than it ever should; the event is dropped and logged.
    pub fn emit(&mut self, event: Event) {
        if let Err(ev) = self.outbox.push(event) {
            log::error!("FSM: outbox full, {} dropped", ev.name());
        }
    }

    /// Queue a "fetch all" unless a request is already outstanding.
    /// Returns whether one was queued.
    pub fn request_sample(&mut self) -> bool {
        if self.sample_request_ongoing {
            log::debug!("FSM: sample request ongoing, skipping");
            return false;
        }
        if self
            .outbox
            .iter()
            .any(|e| matches!(e, Event::DataGetAll))
        {
            return false;
        }
        self.emit(Event::DataGetAll);
        true
    }

    /// Build the request for the current configuration and flags.
    pub fn build_request(&self) -> DataRequest {
        DataRequest::fetch_all(&self.config, self.modem_static_sampled)
    }

    pub fn take_outbox(&mut self) -> Outbox {
        core::mem::take(&mut self.outbox)
    }
}
