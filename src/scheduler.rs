//! Sampling scheduler.
//!
//! Decides when a "fetch all" data request is due.  Timers are plain
//! deadlines evaluated against the uptime clock whenever the consumer
//! processes a `TimerTick`, so all timer state stays on the consumer.
//!
//! ```text
//!  Active mode                     Passive mode
//!  ───────────                     ────────────
//!  ActiveSample   (periodic,       PassiveSample      (periodic, movement_resolution)
//!                 active_wait)     MovementResolution (one-shot debounce gate)
//!                                  MovementTimeout    (periodic, movement_timeout)
//! ```
//!
//! The debounce gate is armed whenever a movement-triggered sample is
//! issued; a second activity before it expires is discarded.  A tick that
//! arrives late fires a periodic timer once and re-arms it one period from
//! the current time.

use log::{debug, warn};

use crate::config::DeviceConfig;

// ═══════════════════════════════════════════════════════════════
//  Data requests
// ═══════════════════════════════════════════════════════════════

/// Data categories a request can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Environmental,
    Movement,
    ModemStatic,
    ModemDynamic,
    Battery,
    Location,
}

pub const DATA_TYPE_COUNT: usize = 6;

/// Timeout for a request that does not include location (seconds).
pub const DATA_FETCH_TIMEOUT_DEFAULT: u32 = 2;

/// A sparse set of requested categories plus how long samplers may take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRequest {
    pub types: heapless::Vec<DataType, DATA_TYPE_COUNT>,
    /// Informational; nothing enforces it.
    pub timeout_secs: u32,
}

impl DataRequest {
    /// Build the "fetch all" request for the current configuration.
    pub fn fetch_all(cfg: &DeviceConfig, modem_static_sampled: bool) -> Self {
        let mut types = heapless::Vec::new();
        let mut add = |t: DataType| {
            if types.push(t).is_err() {
                warn!("DataRequest: type list full, {:?} dropped", t);
            }
        };

        add(DataType::ModemDynamic);
        add(DataType::Battery);
        add(DataType::Environmental);
        if !modem_static_sampled {
            add(DataType::ModemStatic);
        }

        let timeout_secs = if cfg.location_enabled() {
            add(DataType::Location);
            cfg.cadence_secs().saturating_sub(5).clamp(5, 110)
        } else {
            DATA_FETCH_TIMEOUT_DEFAULT
        };

        Self {
            types,
            timeout_secs,
        }
    }

    pub fn contains(&self, t: DataType) -> bool {
        self.types.contains(&t)
    }
}

// ═══════════════════════════════════════════════════════════════
//  Timers
// ═══════════════════════════════════════════════════════════════

/// The scheduler's timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TimerId {
    ActiveSample = 0,
    PassiveSample = 1,
    MovementResolution = 2,
    MovementTimeout = 3,
}

const TIMER_COUNT: usize = 4;

/// Shortest allowed period.
const MIN_PERIOD_MS: u64 = 1000;

#[derive(Debug, Clone, Copy, Default)]
struct TimerSlot {
    period_ms: u64,
    deadline_ms: Option<u64>,
    periodic: bool,
}

/// Timers that fired during one [`SamplingScheduler::poll`].
pub type Fired = heapless::Vec<TimerId, TIMER_COUNT>;

/// The sampling timer set.
pub struct SamplingScheduler {
    timers: [TimerSlot; TIMER_COUNT],
}

impl SamplingScheduler {
    pub fn new() -> Self {
        Self {
            timers: [TimerSlot::default(); TIMER_COUNT],
        }
    }

    // ── Mode timer sets ───────────────────────────────────────

    /// Run the active cadence timer; stop everything passive.
    pub fn start_active(&mut self, cfg: &DeviceConfig, now_ms: u64) {
        self.stop(TimerId::PassiveSample);
        self.stop(TimerId::MovementResolution);
        self.stop(TimerId::MovementTimeout);
        self.start(TimerId::ActiveSample, cfg.active_wait_timeout, true, now_ms);
    }

    /// Run the passive timers; stop the active one.  The debounce gate
    /// starts open.
    pub fn start_passive(&mut self, cfg: &DeviceConfig, now_ms: u64) {
        self.stop(TimerId::ActiveSample);
        self.stop(TimerId::MovementResolution);
        self.start(TimerId::PassiveSample, cfg.movement_resolution, true, now_ms);
        self.start(TimerId::MovementTimeout, cfg.movement_timeout, true, now_ms);
    }

    /// Restart all passive timers after a movement-triggered sample,
    /// arming the debounce gate.
    pub fn restart_passive(&mut self, cfg: &DeviceConfig, now_ms: u64) {
        self.start_passive(cfg, now_ms);
        self.start(
            TimerId::MovementResolution,
            cfg.movement_resolution,
            false,
            now_ms,
        );
    }

    pub fn stop_all(&mut self) {
        for slot in &mut self.timers {
            slot.deadline_ms = None;
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn is_running(&self, id: TimerId) -> bool {
        self.timers[id as usize].deadline_ms.is_some()
    }

    /// Milliseconds until `id` expires; 0 when stopped or expired.
    pub fn remaining_ms(&self, id: TimerId, now_ms: u64) -> u64 {
        self.timers[id as usize]
            .deadline_ms
            .map_or(0, |d| d.saturating_sub(now_ms))
    }

    /// `true` once the movement debounce window has passed.
    pub fn debounce_elapsed(&self, now_ms: u64) -> bool {
        self.remaining_ms(TimerId::MovementResolution, now_ms) == 0
    }

    // ── Tick ──────────────────────────────────────────────────

    /// Expire due timers.  Returns the periodic sampling timers that
    /// fired; the debounce gate simply closes.
    pub fn poll(&mut self, now_ms: u64) -> Fired {
        let mut fired = Fired::new();
        for (idx, slot) in self.timers.iter_mut().enumerate() {
            let Some(deadline) = slot.deadline_ms else {
                continue;
            };
            if now_ms < deadline {
                continue;
            }
            if slot.periodic {
                slot.deadline_ms = Some(now_ms + slot.period_ms);
                let _ = fired.push(timer_from_index(idx));
            } else {
                slot.deadline_ms = None;
            }
        }
        fired
    }

    // ── Internal ──────────────────────────────────────────────

    fn start(&mut self, id: TimerId, period_secs: u32, periodic: bool, now_ms: u64) {
        let mut period_ms = u64::from(period_secs) * 1000;
        if period_ms < MIN_PERIOD_MS {
            warn!("Scheduler: {:?} period {}s clamped to 1s", id, period_secs);
            period_ms = MIN_PERIOD_MS;
        }
        self.timers[id as usize] = TimerSlot {
            period_ms,
            deadline_ms: Some(now_ms + period_ms),
            periodic,
        };
        debug!("Scheduler: {:?} started ({} ms)", id, period_ms);
    }

    fn stop(&mut self, id: TimerId) {
        self.timers[id as usize].deadline_ms = None;
    }
}

impl Default for SamplingScheduler {
    fn default() -> Self {
        Self::new()
    }
}

fn timer_from_index(idx: usize) -> TimerId {
    match idx {
        0 => TimerId::ActiveSample,
        1 => TimerId::PassiveSample,
        2 => TimerId::MovementResolution,
        _ => TimerId::MovementTimeout,
    }
}
