//! HTTP firmware downloader backed by `esp-idf-svc` HTTP and `esp-ota`.
//!
//! `init` opens the inactive OTA partition; `start` streams the image
//! from `http(s)://<host>/<file>` into it and marks it bootable.  The new
//! firmware runs after the next reset.
//!
//! The `esp-ota` crate provides a safe wrapper around the ESP-IDF OTA
//! partition API; an unfinished `OtaUpdate` aborts itself on drop.

use log::{info, warn};

use esp_idf_svc::http::Method;
use esp_idf_svc::http::client::{Configuration, EspHttpConnection};
use esp_idf_svc::io::Read;

use crate::app::ports::FirmwareDownloader;
use crate::config::FotaTarget;
use crate::fota::FotaError;

const CHUNK_SIZE: usize = 1024;
const MAX_FIRMWARE_SIZE: usize = 4 * 1024 * 1024; // 4 MB

pub struct HttpDownloader {
    update: Option<esp_ota::OtaUpdate>,
}

// SAFETY: the OTA handle is only touched through `&mut self`, and the
// coordinator serialises access behind a mutex.
unsafe impl Send for HttpDownloader {}

impl HttpDownloader {
    pub fn new() -> Self {
        Self { update: None }
    }
}

impl Default for HttpDownloader {
    fn default() -> Self {
        Self::new()
    }
}

/// Confirm the running image so the bootloader cancels a pending rollback.
pub fn mark_running_image_valid() {
    match esp_ota::mark_app_valid() {
        Ok(()) => info!("FOTA: running image marked valid"),
        Err(e) => warn!("FOTA: mark_app_valid failed: {:?}", e),
    }
}

impl FirmwareDownloader for HttpDownloader {
    fn init(&mut self) -> Result<(), FotaError> {
        // Dropping a stale session aborts it.
        self.update = None;
        let update = esp_ota::OtaUpdate::begin().map_err(|e| {
            warn!("esp-ota begin failed: {:?}", e);
            FotaError::InitFailed
        })?;
        self.update = Some(update);
        Ok(())
    }

    fn start(&mut self, target: &FotaTarget) -> Result<(), FotaError> {
        let mut update = self.update.take().ok_or(FotaError::InitFailed)?;

        let tls = target.sec_tag >= 0;
        let url = format!(
            "{}://{}/{}",
            if tls { "https" } else { "http" },
            target.host,
            target.file
        );
        let cfg = Configuration {
            crt_bundle_attach: if tls {
                Some(esp_idf_svc::sys::esp_crt_bundle_attach)
            } else {
                None
            },
            ..Default::default()
        };

        let mut conn = EspHttpConnection::new(&cfg).map_err(|e| {
            warn!("FOTA: http client: {:?}", e);
            FotaError::ConnectFailed
        })?;
        conn.initiate_request(Method::Get, &url, &[])
            .map_err(|e| {
                warn!("FOTA: request to {} failed: {:?}", url, e);
                FotaError::ConnectFailed
            })?;
        conn.initiate_response().map_err(|e| {
            warn!("FOTA: no response: {:?}", e);
            FotaError::DownloadFailed
        })?;
        let status = conn.status();
        if !(200..300).contains(&status) {
            warn!("FOTA: server answered {}", status);
            return Err(FotaError::DownloadFailed);
        }

        let mut buf = [0u8; CHUNK_SIZE];
        let mut total = 0usize;
        loop {
            let n = conn.read(&mut buf).map_err(|e| {
                warn!("FOTA: read failed after {} bytes: {:?}", total, e);
                FotaError::DownloadFailed
            })?;
            if n == 0 {
                break;
            }
            total += n;
            if total > MAX_FIRMWARE_SIZE {
                warn!("FOTA: image larger than {} bytes", MAX_FIRMWARE_SIZE);
                return Err(FotaError::DownloadFailed);
            }
            update.write(&buf[..n]).map_err(|e| {
                warn!("esp-ota write failed: {:?}", e);
                FotaError::WriteFailed
            })?;
        }
        info!("FOTA: {} bytes received", total);

        let mut completed = update.finalize().map_err(|e| {
            warn!("esp-ota finalize failed: {:?}", e);
            FotaError::WriteFailed
        })?;
        completed.set_as_boot_partition().map_err(|e| {
            warn!("esp-ota set_as_boot_partition failed: {:?}", e);
            FotaError::WriteFailed
        })?;
        Ok(())
    }
}
