//! Mock adapters for integration tests.
//!
//! Every mock keeps its observable state behind an `Arc` so the test can
//! hold one handle while the service owns the boxed port.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Arc, Mutex};

use assettracker::app::events::AppEvent;
use assettracker::app::ports::{
    BatteryPort, BusError, BusTransactor, Clock, EventSink, FirmwareDownloader, KvStore,
    MirrorChannel, NetError, NetworkPort, StorageError,
};
use assettracker::app::service::{AppService, Collaborators};
use assettracker::command::Backends;
use assettracker::config::{DeviceConfig, FotaTarget, MirrorEndpoint, SystemConfig};
use assettracker::error::{Error, SensorError};
use assettracker::events::{Event, EventQueue};
use assettracker::fota::FotaError;
use assettracker::fsm::{StateId, SubState};
use assettracker::scheduler::DataRequest;

// ── Record store ──────────────────────────────────────────────

#[derive(Default, Clone)]
pub struct MemStore(pub Arc<Mutex<HashMap<u16, Vec<u8>>>>);

impl KvStore for MemStore {
    fn read(&self, id: u16, buf: &mut [u8]) -> Result<usize, StorageError> {
        let map = self.0.lock().unwrap();
        let data = map.get(&id).ok_or(StorageError::NotFound)?;
        let n = data.len().min(buf.len());
        buf[..n].copy_from_slice(&data[..n]);
        Ok(n)
    }

    fn write(&mut self, id: u16, data: &[u8]) -> Result<(), StorageError> {
        self.0.lock().unwrap().insert(id, data.to_vec());
        Ok(())
    }
}

// ── Bus ───────────────────────────────────────────────────────

/// Records writes; answers reads with `0xA0, 0xA1, ...`.
#[derive(Default, Clone)]
pub struct EchoBus {
    pub written: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl BusTransactor for EchoBus {
    fn write(&mut self, data: &[u8]) -> Result<(), BusError> {
        self.written.lock().unwrap().push(data.to_vec());
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<(), BusError> {
        for (i, b) in buf.iter_mut().enumerate() {
            *b = 0xA0 + i as u8;
        }
        Ok(())
    }
}

// ── Battery ───────────────────────────────────────────────────

/// Millivolts to report; negative means not ready.
#[derive(Clone)]
pub struct MockBattery(pub Arc<AtomicI32>);

impl BatteryPort for MockBattery {
    fn read_millivolts(&mut self) -> Result<i32, SensorError> {
        match self.0.load(Ordering::Relaxed) {
            mv if mv < 0 => Err(SensorError::NotReady),
            mv => Ok(mv),
        }
    }
}

// ── Clock ─────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct ManualClock(pub Arc<AtomicU64>);

#[allow(dead_code)]
impl ManualClock {
    pub fn set_secs(&self, secs: u64) {
        self.0.store(secs * 1000, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn uptime_ms(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

// ── Network ───────────────────────────────────────────────────

/// Link backed by in-process channels.
pub struct ChanLink {
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
    inbound: Arc<Mutex<Receiver<Vec<u8>>>>,
}

impl MirrorChannel for ChanLink {
    fn send(&mut self, data: &[u8]) -> Result<usize, NetError> {
        self.sent.lock().unwrap().push(data.to_vec());
        Ok(data.len())
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, NetError> {
        let chunk = self
            .inbound
            .lock()
            .unwrap()
            .recv()
            .map_err(|_| NetError::Closed)?;
        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        Ok(n)
    }

    fn try_clone(&self) -> Result<Box<dyn MirrorChannel>, NetError> {
        Ok(Box::new(ChanLink {
            sent: Arc::clone(&self.sent),
            inbound: Arc::clone(&self.inbound),
        }))
    }
}

pub struct MockNetwork {
    link: Option<ChanLink>,
    pub connects: Arc<AtomicUsize>,
}

impl NetworkPort for MockNetwork {
    fn connect(&mut self, _ep: &MirrorEndpoint) -> Result<Box<dyn MirrorChannel>, NetError> {
        self.connects.fetch_add(1, Ordering::Relaxed);
        match self.link.take() {
            Some(l) => Ok(Box::new(l)),
            None => Err(NetError::Connect),
        }
    }
}

/// Test-side handles on a [`MockNetwork`].
pub struct NetHandles {
    pub sent: Arc<Mutex<Vec<Vec<u8>>>>,
    pub inbound: Sender<Vec<u8>>,
    pub connects: Arc<AtomicUsize>,
}

pub fn mock_network() -> (MockNetwork, NetHandles) {
    let sent = Arc::new(Mutex::new(Vec::new()));
    let connects = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = channel();
    let net = MockNetwork {
        link: Some(ChanLink {
            sent: Arc::clone(&sent),
            inbound: Arc::new(Mutex::new(rx)),
        }),
        connects: Arc::clone(&connects),
    };
    (
        net,
        NetHandles {
            sent,
            inbound: tx,
            connects,
        },
    )
}

/// A network whose every connect attempt fails.
#[allow(dead_code)]
pub fn failing_network() -> (MockNetwork, Arc<AtomicUsize>) {
    let connects = Arc::new(AtomicUsize::new(0));
    (
        MockNetwork {
            link: None,
            connects: Arc::clone(&connects),
        },
        connects,
    )
}

// ── Firmware downloader ───────────────────────────────────────

/// Downloader whose outcome the test scripts.  When `gate` is set the
/// transfer blocks until the test sends on it.
pub struct FakeDownloader {
    pub init_result: Result<(), FotaError>,
    pub start_result: Result<(), FotaError>,
    pub gate: Option<Receiver<()>>,
    pub starts: Arc<AtomicUsize>,
}

impl FakeDownloader {
    pub fn ok() -> Self {
        Self {
            init_result: Ok(()),
            start_result: Ok(()),
            gate: None,
            starts: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl FirmwareDownloader for FakeDownloader {
    fn init(&mut self) -> Result<(), FotaError> {
        self.init_result
    }

    fn start(&mut self, _target: &FotaTarget) -> Result<(), FotaError> {
        self.starts.fetch_add(1, Ordering::Relaxed);
        if let Some(gate) = &self.gate {
            let _ = gate.recv();
        }
        self.start_result
    }
}

// ── Event sink ────────────────────────────────────────────────

/// Owned copy of an [`AppEvent`].
#[derive(Debug, Clone, PartialEq)]
pub enum Seen {
    Started(StateId),
    StateChanged { from: StateId, to: StateId },
    ModeChanged(SubState),
    DataRequested(DataRequest),
    BatteryData { millivolts: i32 },
    BatteryNotReady,
    CommandResult { ok: bool, data: Vec<u8> },
    ShutdownReady { module_id: u8 },
    FotaStarted,
    FotaFinished,
    FotaFailed,
    MirrorConnected,
    Error(Error),
}

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<Seen>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<&DataRequest> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Seen::DataRequested(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    pub fn results(&self) -> Vec<(bool, Vec<u8>)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Seen::CommandResult { ok, data } => Some((*ok, data.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, wanted: &Seen) -> usize {
        self.events.iter().filter(|e| *e == wanted).count()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent<'_>) {
        let seen = match event {
            AppEvent::Started(s) => Seen::Started(*s),
            AppEvent::StateChanged { from, to } => Seen::StateChanged {
                from: *from,
                to: *to,
            },
            AppEvent::ModeChanged(s) => Seen::ModeChanged(*s),
            AppEvent::DataRequested(r) => Seen::DataRequested((*r).clone()),
            AppEvent::BatteryData { millivolts, .. } => Seen::BatteryData {
                millivolts: *millivolts,
            },
            AppEvent::BatteryNotReady => Seen::BatteryNotReady,
            AppEvent::CommandResult { ok, data } => Seen::CommandResult {
                ok: *ok,
                data: data.to_vec(),
            },
            AppEvent::ShutdownReady { module_id } => Seen::ShutdownReady {
                module_id: *module_id,
            },
            AppEvent::FotaStarted => Seen::FotaStarted,
            AppEvent::FotaFinished => Seen::FotaFinished,
            AppEvent::FotaFailed => Seen::FotaFailed,
            AppEvent::MirrorConnected => Seen::MirrorConnected,
            AppEvent::Error(e) => Seen::Error(*e),
        };
        self.events.push(seen);
    }
}

// ── Rig ───────────────────────────────────────────────────────

/// A service wired to mocks, plus the test-side handles.
pub struct Rig {
    pub app: AppService,
    pub sink: RecordingSink,
    pub queue: Arc<EventQueue>,
    pub clock: ManualClock,
    pub store: MemStore,
    pub bus_a: EchoBus,
    pub bus_b: EchoBus,
    pub battery: Arc<AtomicI32>,
}

#[allow(dead_code)]
impl Rig {
    /// Default system config, mock network, downloader that succeeds.
    pub fn new() -> (Self, NetHandles) {
        let (net, handles) = mock_network();
        let rig = Self::build(
            &SystemConfig::default(),
            Box::new(net),
            Box::new(FakeDownloader::ok()),
        );
        (rig, handles)
    }

    pub fn build(
        config: &SystemConfig,
        network: Box<dyn NetworkPort>,
        downloader: Box<dyn FirmwareDownloader>,
    ) -> Self {
        let queue = Arc::new(EventQueue::new());
        let clock = ManualClock::default();
        let store = MemStore::default();
        let bus_a = EchoBus::default();
        let bus_b = EchoBus::default();
        let battery = Arc::new(AtomicI32::new(3700));

        let backends = Backends {
            store: Box::new(store.clone()),
            bus_a: Box::new(bus_a.clone()),
            bus_b: Box::new(bus_b.clone()),
        };
        let collab = Collaborators {
            battery: Box::new(MockBattery(Arc::clone(&battery))),
            clock: Box::new(clock.clone()),
            network,
            downloader,
        };
        let mut app = AppService::new(config, Arc::clone(&queue), backends, collab);
        let mut sink = RecordingSink::new();
        app.start(&mut sink);

        Self {
            app,
            sink,
            queue,
            clock,
            store,
            bus_a,
            bus_b,
            battery,
        }
    }

    /// Push one event at `secs` and run everything that follows from it.
    pub fn at(&mut self, secs: u64, event: Event) {
        self.clock.set_secs(secs);
        self.push(event);
        self.app.process_pending(&mut self.sink);
    }

    pub fn push(&self, event: Event) {
        if self.queue.push(event).is_err() {
            panic!("test queue overflow");
        }
    }

    /// Boot into `Running` with `cfg`.
    pub fn boot(&mut self, cfg: DeviceConfig) {
        self.at(0, Event::ConfigInit(cfg));
    }

    /// Frame bytes wrapped in a pool buffer, as a `CustomCommand`.
    pub fn command(&self, frame: &[u8]) -> Event {
        Event::CustomCommand(self.app.pool().alloc_from(frame).unwrap())
    }

    /// Wait up to one second for a producer thread to enqueue something.
    pub fn wait_for_event(&self) -> bool {
        for _ in 0..200 {
            if !self.queue.is_empty() {
                return true;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        false
    }
}

pub fn passive_config(resolution: u32, timeout: u32) -> DeviceConfig {
    DeviceConfig {
        active_mode: false,
        movement_resolution: resolution,
        movement_timeout: timeout,
        ..DeviceConfig::default()
    }
}

pub fn active_config(wait: u32) -> DeviceConfig {
    DeviceConfig {
        active_mode: true,
        active_wait_timeout: wait,
        ..DeviceConfig::default()
    }
}
