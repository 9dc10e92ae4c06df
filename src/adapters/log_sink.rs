//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART / USB-CDC in production).
//! The cloud and data collaborators would implement the same trait.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent<'_>) {
        match event {
            AppEvent::Started(state) => info!("START | initial_state={}", state.name()),
            AppEvent::StateChanged { from, to } => {
                info!("STATE | {} -> {}", from.name(), to.name());
            }
            AppEvent::ModeChanged(sub) => info!("MODE  | {}", sub.name()),
            AppEvent::DataRequested(req) => {
                info!(
                    "DATA  | request {:?} timeout={}s",
                    req.types.as_slice(),
                    req.timeout_secs
                );
            }
            AppEvent::BatteryData {
                millivolts,
                timestamp_ms,
            } => info!("BATT  | {} mV @ {} ms", millivolts, timestamp_ms),
            AppEvent::BatteryNotReady => warn!("BATT  | not ready"),
            AppEvent::CommandResult { ok, data } => {
                info!("CMD   | ok={} len={} data={:02x?}", ok, data.len(), data);
            }
            AppEvent::ShutdownReady { module_id } => info!("UTIL  | shutdown ready ({})", module_id),
            AppEvent::FotaStarted => info!("FOTA  | started"),
            AppEvent::FotaFinished => info!("FOTA  | finished, press 'Reset' to apply"),
            AppEvent::FotaFailed => warn!("FOTA  | failed"),
            AppEvent::MirrorConnected => info!("MIRR  | connected"),
            AppEvent::Error(e) => warn!("ERROR | {}", e),
        }
    }
}
