//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: log to serial, hand the data request
//! to the samplers, publish a command result to the cloud, and so on.

use crate::error::Error;
use crate::fsm::{StateId, SubState};
use crate::scheduler::DataRequest;

/// Structured events emitted by the application core.
///
/// Borrowed payloads stay valid only for the duration of the `emit` call.
#[derive(Debug, Clone)]
pub enum AppEvent<'a> {
    /// The application service has started (carries initial state).
    Started(StateId),

    /// The FSM transitioned between top-level states.
    StateChanged { from: StateId, to: StateId },

    /// The sampling mode changed.
    ModeChanged(SubState),

    /// Samplers should collect the listed data.
    DataRequested(&'a DataRequest),

    /// Battery voltage for a data request.
    BatteryData { millivolts: i32, timestamp_ms: u64 },

    /// The battery could not be read.
    BatteryNotReady,

    /// Outcome of a read command, for the cloud.
    CommandResult { ok: bool, data: &'a [u8] },

    /// Shutdown acknowledged.
    ShutdownReady { module_id: u8 },

    /// A firmware update was started.
    FotaStarted,

    /// A firmware update finished; a reset applies it.
    FotaFinished,

    /// A firmware update failed.
    FotaFailed,

    /// The remote mirror link is up.
    MirrorConnected,

    /// A recoverable error the owner of the sink should know about.
    Error(Error),
}
