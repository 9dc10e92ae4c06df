//! Application service, the hexagonal core.
//!
//! [`AppService`] owns the FSM, its shared context, the command
//! dispatcher, the remote mirror and the firmware-update coordinator.  It
//! is the single consumer of the [`EventQueue`]; every event runs to
//! completion before the next is dequeued.  All I/O flows through port
//! traits injected at construction, or at the call site for the sink.
//!
//! ```text
//!  EventQueue ──▶ ┌────────────────────────────┐ ──▶ EventSink
//!                 │        AppService          │
//!  BatteryPort ◀──│  FSM · Dispatcher · Mirror │──▶ NetworkPort
//!  KvStore/Bus ◀──│  FOTA                      │──▶ FirmwareDownloader
//!                 └────────────────────────────┘
//! ```

use std::sync::Arc;

use log::{debug, error, info, warn};

use crate::command::{Backends, BufferPool, CommandResult, Dispatcher};
use crate::config::{DeviceConfig, SystemConfig};
use crate::error::Error;
use crate::events::{Event, EventQueue};
use crate::fota::{FotaCoordinator, FotaProgress, ProgressReporter};
use crate::fsm::{Fsm, FsmContext, StateId, SubState};
use crate::mirror::{Mirror, MirrorError};
use crate::scheduler::{DataRequest, DataType};

use super::events::AppEvent;
use super::ports::{BatteryPort, Clock, EventSink, FirmwareDownloader, NetworkPort};

/// Button that starts a firmware update.
pub const BUTTON_FOTA: u8 = 1;
/// Button that opens the remote mirror.
pub const BUTTON_MIRROR: u8 = 2;

/// Driven adapters the service needs besides the command backends.
pub struct Collaborators {
    pub battery: Box<dyn BatteryPort>,
    pub clock: Box<dyn Clock>,
    pub network: Box<dyn NetworkPort>,
    pub downloader: Box<dyn FirmwareDownloader>,
}

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

pub struct AppService {
    fsm: Fsm,
    ctx: FsmContext,
    queue: Arc<EventQueue>,
    dispatcher: Dispatcher,
    mirror: Mirror,
    fota: FotaCoordinator,
    battery: Box<dyn BatteryPort>,
    clock: Box<dyn Clock>,
    network: Box<dyn NetworkPort>,
    events_handled: u64,
}

impl AppService {
    /// Construct the service.  Does **not** announce itself; call
    /// [`start`](Self::start) next.
    pub fn new(
        config: &SystemConfig,
        queue: Arc<EventQueue>,
        backends: Backends,
        collab: Collaborators,
    ) -> Self {
        let pool = BufferPool::new(config.heap_budget_bytes as usize);
        Self {
            fsm: Fsm::new(),
            ctx: FsmContext::new(config.module_id),
            queue,
            dispatcher: Dispatcher::new(backends, pool, config.kv_record_id),
            mirror: Mirror::new(config.mirror.clone()),
            fota: FotaCoordinator::new(collab.downloader, config.fota.clone()),
            battery: collab.battery,
            clock: collab.clock,
            network: collab.network,
            events_handled: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    pub fn start(&mut self, sink: &mut impl EventSink) {
        sink.emit(&AppEvent::Started(self.fsm.state()));
        info!("AppService started in {}", self.fsm.state().name());
    }

    /// Consume events until the device has shut down and the queue has
    /// drained.
    pub fn run(&mut self, sink: &mut impl EventSink) {
        loop {
            let event = self.queue.next_blocking();
            self.handle(event, sink);
            if self.fsm.state() == StateId::Shutdown && self.queue.is_empty() {
                info!("AppService: shut down after {} events", self.events_handled);
                return;
            }
        }
    }

    /// Handle everything currently queued, including follow-ups produced
    /// on the way.  Returns the number of events handled.
    pub fn process_pending(&mut self, sink: &mut impl EventSink) -> usize {
        let mut n = 0;
        while let Some(event) = self.queue.pop() {
            self.handle(event, sink);
            n += 1;
        }
        n
    }

    // ── Per-event orchestration ───────────────────────────────

    /// Run one event to completion.
    pub fn handle(&mut self, event: Event, sink: &mut impl EventSink) {
        self.events_handled += 1;
        self.ctx.now_ms = self.clock.uptime_ms();
        let prev_state = self.fsm.state();
        let prev_sub = self.fsm.sub_state();
        debug!("Event: {} in {}", event.name(), prev_state.name());

        // 1. Pure state logic
        self.fsm.handle(&mut self.ctx, &event);

        // 2. Effects that need ports or take ownership of buffers
        match event {
            Event::DataGet(req) => self.on_data_get(&req, sink),
            Event::BatteryReady {
                millivolts,
                timestamp_ms,
            } => sink.emit(&AppEvent::BatteryData {
                millivolts,
                timestamp_ms,
            }),
            Event::BatteryNotReady => sink.emit(&AppEvent::BatteryNotReady),
            Event::ShutdownReady { module_id } => {
                sink.emit(&AppEvent::ShutdownReady { module_id });
            }
            Event::FotaProgress(FotaProgress::Finished) => sink.emit(&AppEvent::FotaFinished),
            Event::FotaProgress(FotaProgress::Error) => sink.emit(&AppEvent::FotaFailed),
            other if self.fsm.state() == StateId::Running => self.on_running(other, sink),
            other => debug!("Event: {} dropped in {}", other.name(), self.fsm.state().name()),
        }

        // 3. Follow-ups queued by the handlers
        for follow_up in self.ctx.take_outbox() {
            self.enqueue(follow_up, sink);
        }

        // 4. Report transitions
        let state = self.fsm.state();
        if state != prev_state {
            sink.emit(&AppEvent::StateChanged {
                from: prev_state,
                to: state,
            });
        }
        if let Some(sub) = self.fsm.sub_state() {
            if Some(sub) != prev_sub {
                sink.emit(&AppEvent::ModeChanged(sub));
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> StateId {
        self.fsm.state()
    }

    pub fn sub_state(&self) -> Option<SubState> {
        self.fsm.sub_state()
    }

    /// Live device configuration.
    pub fn config(&self) -> &DeviceConfig {
        &self.ctx.config
    }

    pub fn is_sample_in_flight(&self) -> bool {
        self.ctx.sample_request_ongoing
    }

    pub fn is_fota_locked(&self) -> bool {
        self.ctx.fota_lock
    }

    pub fn is_mirror_active(&self) -> bool {
        self.mirror.is_active()
    }

    pub fn modem_static_sampled(&self) -> bool {
        self.ctx.modem_static_sampled
    }

    pub fn activity(&self) -> bool {
        self.ctx.activity
    }

    /// Command buffer pool shared by the dispatcher and the mirror.
    pub fn pool(&self) -> &BufferPool {
        self.dispatcher.pool()
    }

    pub fn queue(&self) -> &Arc<EventQueue> {
        &self.queue
    }

    /// Total events handled since construction.
    pub fn events_handled(&self) -> u64 {
        self.events_handled
    }

    /// Wait for a running firmware update worker to finish.
    pub fn join_fota(&mut self) {
        self.fota.join();
    }

    // ── Internal ──────────────────────────────────────────────

    fn on_running(&mut self, event: Event, sink: &mut impl EventSink) {
        match event {
            Event::CustomCommand(frame) => {
                let out = self.dispatcher.dispatch(frame, self.mirror.is_active());
                if let Some(result) = out.result {
                    self.enqueue(Event::CommandResultReady(result), sink);
                }
                if let Some(copy) = out.mirror_copy {
                    self.enqueue(Event::MirrorSend(copy), sink);
                }
            }
            Event::CommandResultReady(result) => publish_result(&result, sink),
            Event::MirrorSend(buf) => self.mirror.send(buf),
            Event::ButtonPressed(button) => self.on_button(button, sink),
            _ => {}
        }
    }

    fn on_data_get(&mut self, req: &DataRequest, sink: &mut impl EventSink) {
        sink.emit(&AppEvent::DataRequested(req));
        for _ in req.types.iter().filter(|t| **t == DataType::Battery) {
            let reading = match self.battery.read_millivolts() {
                Ok(millivolts) => Event::BatteryReady {
                    millivolts,
                    timestamp_ms: self.clock.uptime_ms(),
                },
                Err(e) => {
                    warn!("Battery: {}", e);
                    Event::BatteryNotReady
                }
            };
            self.enqueue(reading, sink);
        }
    }

    fn on_button(&mut self, button: u8, sink: &mut impl EventSink) {
        if self.ctx.fota_lock {
            warn!("FOTA in progress, button {} ignored", button);
            return;
        }
        match button {
            BUTTON_FOTA => self.start_fota(sink),
            BUTTON_MIRROR => self.start_mirror(sink),
            other => debug!("Button {} has no action", other),
        }
    }

    fn start_fota(&mut self, sink: &mut impl EventSink) {
        self.ctx.fota_lock = true;
        match self
            .fota
            .begin(ProgressReporter::new(Arc::clone(&self.queue)))
        {
            Ok(()) => sink.emit(&AppEvent::FotaStarted),
            Err(e) => {
                self.ctx.fota_lock = false;
                warn!("FOTA: {}", e);
                sink.emit(&AppEvent::Error(Error::Fota(e)));
            }
        }
    }

    fn start_mirror(&mut self, sink: &mut impl EventSink) {
        match self.mirror.trigger(
            self.network.as_mut(),
            &self.queue,
            self.dispatcher.pool(),
        ) {
            Ok(()) => sink.emit(&AppEvent::MirrorConnected),
            Err(MirrorError::AlreadyTriggered) => warn!("Mirror: already triggered"),
            Err(MirrorError::Net(e)) => {
                warn!("Mirror: {}", e);
                sink.emit(&AppEvent::Error(Error::Net(e)));
            }
            Err(e @ MirrorError::SpawnFailed) => error!("Mirror: {}", e),
        }
    }

    /// Enqueue a self-produced event.  Overflow is logged and reported;
    /// the rejected event is dropped, releasing any buffer it carries.
    fn enqueue(&self, event: Event, sink: &mut impl EventSink) {
        if let Err(full) = self.queue.push(event) {
            error!("AppService: {}", full);
            sink.emit(&AppEvent::Error(Error::QueueFull));
        }
    }
}

fn publish_result(result: &CommandResult, sink: &mut impl EventSink) {
    sink.emit(&AppEvent::CommandResult {
        ok: result.ok,
        data: result.data.as_ref().map_or(&[][..], |d| d.as_slice()),
    });
}
