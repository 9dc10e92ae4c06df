//! Sampling ticker.
//!
//! Pushes a `TimerTick` into the event queue at a fixed interval so the
//! consumer can evaluate its sampling timers.
//!
//! On ESP-IDF a periodic `esp_timer` runs the callback in the timer task
//! (not ISR), which is allowed to use the queue.  On simulation targets a
//! sleeping thread approximates the same cadence.
//!
//! A tick that finds the queue full is logged and dropped; the next one
//! catches up.

use core::fmt;
use std::sync::Arc;

use log::{info, warn};

use crate::events::{Event, EventQueue};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickerError {
    /// `esp_timer_create` / `esp_timer_start_periodic` failed.
    TimerFailed(i32),
    /// The simulation thread could not be spawned.
    SpawnFailed,
}

impl fmt::Display for TickerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TimerFailed(rc) => write!(f, "tick timer failed (rc={})", rc),
            Self::SpawnFailed => write!(f, "could not spawn ticker thread"),
        }
    }
}

/// Returns `false` when the tick was dropped.
fn tick(queue: &EventQueue) -> bool {
    match queue.push(Event::TimerTick) {
        Ok(()) => true,
        Err(full) => {
            warn!("Ticker: tick dropped: {}", full);
            false
        }
    }
}

// ── ESP-IDF: esp_timer ────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe extern "C" fn tick_cb(arg: *mut core::ffi::c_void) {
    // SAFETY: `arg` is the `Arc<EventQueue>` pointer leaked in `start`;
    // it stays valid until `Drop` reclaims it after stopping the timer.
    let queue = unsafe { &*(arg as *const EventQueue) };
    tick(queue);
}

#[cfg(target_os = "espidf")]
pub struct Ticker {
    handle: esp_timer_handle_t,
    queue: *const EventQueue,
}

#[cfg(target_os = "espidf")]
impl Ticker {
    pub fn start(queue: Arc<EventQueue>, interval_ms: u32) -> Result<Self, TickerError> {
        let queue = Arc::into_raw(queue);
        let args = esp_timer_create_args_t {
            callback: Some(tick_cb),
            arg: queue as *mut _,
            dispatch_method: esp_timer_dispatch_t_ESP_TIMER_TASK,
            name: b"sample_tick\0".as_ptr() as *const _,
            skip_unhandled_events: true,
        };

        let mut handle: esp_timer_handle_t = core::ptr::null_mut();
        // SAFETY: `args` and `handle` outlive the call.
        let ret = unsafe { esp_timer_create(&args, &mut handle) };
        if ret != ESP_OK {
            // SAFETY: the timer was never created, so nothing else holds `queue`.
            drop(unsafe { Arc::from_raw(queue) });
            return Err(TickerError::TimerFailed(ret));
        }
        let ret = unsafe { esp_timer_start_periodic(handle, u64::from(interval_ms) * 1000) };
        if ret != ESP_OK {
            unsafe {
                esp_timer_delete(handle);
                drop(Arc::from_raw(queue));
            }
            return Err(TickerError::TimerFailed(ret));
        }

        info!("Ticker: esp_timer every {} ms", interval_ms);
        Ok(Self { handle, queue })
    }
}

#[cfg(target_os = "espidf")]
impl Drop for Ticker {
    fn drop(&mut self) {
        // SAFETY: the timer is stopped and deleted before the queue
        // reference it uses is released.
        unsafe {
            esp_timer_stop(self.handle);
            esp_timer_delete(self.handle);
            drop(Arc::from_raw(self.queue));
        }
    }
}

// ── Simulation: sleeping thread ───────────────────────────────

#[cfg(not(target_os = "espidf"))]
pub struct Ticker {
    stop: Arc<std::sync::atomic::AtomicBool>,
    thread: Option<std::thread::JoinHandle<()>>,
}

#[cfg(not(target_os = "espidf"))]
impl Ticker {
    pub fn start(queue: Arc<EventQueue>, interval_ms: u32) -> Result<Self, TickerError> {
        use std::sync::atomic::{AtomicBool, Ordering};

        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let period = std::time::Duration::from_millis(u64::from(interval_ms));
        let thread = std::thread::Builder::new()
            .name("ticker".into())
            .spawn(move || {
                while !flag.load(Ordering::Relaxed) {
                    std::thread::sleep(period);
                    tick(&queue);
                }
            })
            .map_err(|_| TickerError::SpawnFailed)?;

        info!("Ticker(sim): every {} ms", interval_ms);
        Ok(Self {
            stop,
            thread: Some(thread),
        })
    }
}

#[cfg(not(target_os = "espidf"))]
impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop.store(true, std::sync::atomic::Ordering::Relaxed);
        if let Some(t) = self.thread.take() {
            let _ = t.join();
        }
    }
}
