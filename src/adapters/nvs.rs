//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements both [`ConfigPort`] and [`KvStore`] for the tracker.
//!
//! - Config: the [`SystemConfig`] is stored as one postcard blob and
//!   range-checked before it is persisted.
//! - Records: command records are blobs keyed `rec_XXXX` (hex id) in
//!   their own namespace.
//! - Atomic writes: ESP-IDF NVS commits are atomic per `nvs_commit()`.
//!   The simulation backend is an in-memory map (dev/test only).

use core::fmt::Write as _;

use log::{info, warn};

use crate::app::ports::{ConfigError, ConfigPort, KvStore, StorageError};
use crate::config::SystemConfig;

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;
#[cfg(not(target_os = "espidf"))]
use std::sync::Mutex;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

const CONFIG_NAMESPACE: &str = "tracker";
const RECORD_NAMESPACE: &str = "records";

#[cfg(target_os = "espidf")]
const MAX_BLOB_SIZE: usize = 4000;

/// NVS keys are at most 15 bytes plus the terminator.
type NvsKey = heapless::String<15>;

fn config_key() -> NvsKey {
    let mut key = NvsKey::new();
    let _ = key.push_str("syscfg");
    key
}

fn record_key(id: u16) -> NvsKey {
    let mut key = NvsKey::new();
    // "rec_" + 4 hex digits always fits.
    let _ = write!(key, "rec_{:04x}", id);
    key
}

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: Mutex<HashMap<String, Vec<u8>>>,
}

impl NvsAdapter {
    /// Bring up the default NVS partition, erasing it first when it is
    /// blank or was written by an older layout.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called once from the main task before any other
            // NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES as esp_err_t
                || ret == ESP_ERR_NVS_NEW_VERSION_FOUND as esp_err_t
            {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
                if unsafe { nvs_flash_init() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(ConfigError::IoError);
            }
            info!("nvs: flash ready");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: Mutex::new(HashMap::new()),
        })
    }

    // ── Blob primitives ───────────────────────────────────────

    #[cfg(not(target_os = "espidf"))]
    fn get_blob(&self, namespace: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let store = self.store.lock().map_err(|_| StorageError::IoError)?;
        store
            .get(&format!("{}::{}", namespace, key))
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    #[cfg(not(target_os = "espidf"))]
    fn set_blob(&self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        let mut store = self.store.lock().map_err(|_| StorageError::IoError)?;
        store.insert(format!("{}::{}", namespace, key), data.to_vec());
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn get_blob(&self, namespace: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let key = c_key(key);
        let result = Self::with_nvs_handle(namespace, false, |handle| {
            let mut size: usize = 0;
            // First call: get size
            let ret = unsafe {
                nvs_get_blob(
                    handle,
                    key.as_ptr() as *const _,
                    core::ptr::null_mut(),
                    &mut size,
                )
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            if size > MAX_BLOB_SIZE {
                return Err(ESP_ERR_NVS_INVALID_LENGTH as esp_err_t);
            }

            let mut buf = vec![0u8; size];
            let ret = unsafe {
                nvs_get_blob(
                    handle,
                    key.as_ptr() as *const _,
                    buf.as_mut_ptr() as *mut _,
                    &mut size,
                )
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            buf.truncate(size);
            Ok(buf)
        });
        result.map_err(storage_error)
    }

    #[cfg(target_os = "espidf")]
    fn set_blob(&self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        let key = c_key(key);
        let result = Self::with_nvs_handle(namespace, true, |handle| {
            let ret = unsafe {
                nvs_set_blob(
                    handle,
                    key.as_ptr() as *const _,
                    data.as_ptr() as *const _,
                    data.len(),
                )
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            let ret = unsafe { nvs_commit(handle) };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(())
        });
        result.map_err(storage_error)
    }

    /// Run `f` against an open handle on `namespace`; the handle is closed afterwards.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(namespace: &str, write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let ns = c_key(namespace);
        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        let ret = unsafe { nvs_open(ns.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }

        let result = f(handle);
        unsafe {
            nvs_close(handle);
        }
        result
    }
}

#[cfg(target_os = "espidf")]
fn storage_error(code: esp_err_t) -> StorageError {
    if code == ESP_ERR_NVS_NOT_FOUND as esp_err_t {
        StorageError::NotFound
    } else if code == ESP_ERR_NVS_NOT_ENOUGH_SPACE as esp_err_t {
        StorageError::Full
    } else {
        StorageError::IoError
    }
}

/// NUL-terminated copy of an NVS name.
#[cfg(target_os = "espidf")]
fn c_key(name: &str) -> [u8; 16] {
    let mut buf = [0u8; 16];
    let len = name.len().min(15);
    buf[..len].copy_from_slice(&name.as_bytes()[..len]);
    buf
}

impl KvStore for NvsAdapter {
    fn read(&self, id: u16, buf: &mut [u8]) -> Result<usize, StorageError> {
        let data = self.get_blob(RECORD_NAMESPACE, &record_key(id))?;
        let len = data.len().min(buf.len());
        buf[..len].copy_from_slice(&data[..len]);
        Ok(len)
    }

    fn write(&mut self, id: u16, data: &[u8]) -> Result<(), StorageError> {
        self.set_blob(RECORD_NAMESPACE, &record_key(id), data)?;
        info!("NvsAdapter: record 0x{:04x} written ({} bytes)", id, data.len());
        Ok(())
    }
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        match self.get_blob(CONFIG_NAMESPACE, &config_key()) {
            Ok(bytes) => {
                let cfg: SystemConfig =
                    postcard::from_bytes(&bytes).map_err(|_| ConfigError::Corrupted)?;
                cfg.validate()?;
                info!("NvsAdapter: loaded config ({} bytes)", bytes.len());
                Ok(cfg)
            }
            Err(StorageError::NotFound) => {
                info!("NvsAdapter: no stored config, using defaults");
                Ok(SystemConfig::default())
            }
            Err(e) => {
                warn!("NvsAdapter: config read error ({}), using defaults", e);
                Ok(SystemConfig::default())
            }
        }
    }

    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        self.set_blob(CONFIG_NAMESPACE, &config_key(), &bytes)
            .map_err(|e| {
                warn!("NvsAdapter: config write error ({})", e);
                ConfigError::IoError
            })?;
        info!("NvsAdapter: config saved ({} bytes)", bytes.len());
        Ok(())
    }
}
