//! Firmware-update coordinator.
//!
//! Flow: trigger → `init` (consumer thread) → worker thread runs `start`
//! → `FotaProgress` event → consumer clears the lock.
//!
//! The single-flight lock itself lives in the consumer's context; this
//! module only runs the workflow.  There is no retry; a finished update
//! takes effect after an external reset.

use core::fmt;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use log::{error, info, warn};

use crate::app::ports::FirmwareDownloader;
use crate::config::FotaTarget;
use crate::events::{Event, EventQueue};

const WORKER_STACK_SIZE: usize = 16 * 1024;

// ── Error type ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FotaError {
    /// The downloader could not be initialised.
    InitFailed,
    /// The worker thread could not be spawned.
    SpawnFailed,
    /// Connecting to the image server failed.
    ConnectFailed,
    /// The transfer broke off or returned a bad status.
    DownloadFailed,
    /// Writing the image to the update partition failed.
    WriteFailed,
}

impl fmt::Display for FotaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InitFailed => write!(f, "downloader init failed"),
            Self::SpawnFailed => write!(f, "could not spawn update worker"),
            Self::ConnectFailed => write!(f, "could not reach image server"),
            Self::DownloadFailed => write!(f, "image download failed"),
            Self::WriteFailed => write!(f, "image write failed"),
        }
    }
}

// ── Progress reporting ────────────────────────────────────────

/// Terminal outcome of an update attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FotaProgress {
    Finished,
    Error,
}

/// Worker-side handle that reports the outcome to the consumer.
#[derive(Clone)]
pub struct ProgressReporter {
    queue: Arc<EventQueue>,
}

impl ProgressReporter {
    pub fn new(queue: Arc<EventQueue>) -> Self {
        Self { queue }
    }

    pub fn report(&self, progress: FotaProgress) {
        if let Err(e) = self.queue.push(Event::FotaProgress(progress)) {
            error!("FOTA: could not report {:?}: {}", progress, e);
        }
    }
}

// ── Coordinator ───────────────────────────────────────────────

pub struct FotaCoordinator {
    downloader: Arc<Mutex<Box<dyn FirmwareDownloader>>>,
    target: FotaTarget,
    worker: Option<JoinHandle<()>>,
}

impl FotaCoordinator {
    pub fn new(downloader: Box<dyn FirmwareDownloader>, target: FotaTarget) -> Self {
        Self {
            downloader: Arc::new(Mutex::new(downloader)),
            target,
            worker: None,
        }
    }

    /// Initialise the downloader and hand the transfer to a worker thread.
    ///
    /// The caller holds the lock; on `Err` it must release it again.  A
    /// previous worker has already reported by the time the lock is free,
    /// so joining it here only waits for the thread to unwind.
    pub fn begin(&mut self, reporter: ProgressReporter) -> Result<(), FotaError> {
        self.join();

        self.downloader
            .lock()
            .map_err(|_| FotaError::InitFailed)?
            .init()?;

        let downloader = Arc::clone(&self.downloader);
        let target = self.target.clone();
        let handle = std::thread::Builder::new()
            .name("fota".into())
            .stack_size(WORKER_STACK_SIZE)
            .spawn(move || {
                let outcome = match downloader.lock() {
                    Ok(mut d) => d.start(&target),
                    Err(_) => Err(FotaError::DownloadFailed),
                };
                match outcome {
                    Ok(()) => {
                        info!("FOTA: download finished, press 'Reset' to apply");
                        reporter.report(FotaProgress::Finished);
                    }
                    Err(e) => {
                        warn!("FOTA: {}", e);
                        reporter.report(FotaProgress::Error);
                    }
                }
            })
            .map_err(|_| FotaError::SpawnFailed)?;

        info!("FOTA: fetching {} from {}", self.target.file, self.target.host);
        self.worker = Some(handle);
        Ok(())
    }

    /// Wait for the worker, if any.
    pub fn join(&mut self) {
        if let Some(w) = self.worker.take() {
            let _ = w.join();
        }
    }
}
