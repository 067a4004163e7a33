//! NVS (Non-Volatile Storage) settings for ESP32.
//!
//! NVS has no float type, so `f32` values are stored as their `u32` bit
//! pattern. Booleans are stored as `u8`. Keys are limited to 15 characters,
//! which every feeder key fits.

use std::sync::Mutex;

use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};
use esp_idf_svc::sys::{EspError, ESP_ERR_NVS_TYPE_MISMATCH};
use feeder_core::{SettingsStorage, StorageError};
use log::debug;

/// Longest string value read back from flash (a WiFi password is at most 64).
const MAX_STRING_LEN: usize = 96;

/// Settings stored in one NVS namespace.
pub struct NvsSettings {
    nvs: Mutex<EspNvs<NvsDefault>>,
}

impl NvsSettings {
    /// Open (creating if needed) the namespace on the default partition.
    pub fn new(partition: EspDefaultNvsPartition, namespace: &str) -> Result<Self, EspError> {
        let nvs = EspNvs::new(partition, namespace, true)?;
        debug!("Opened NVS namespace '{}'", namespace);
        Ok(Self { nvs: Mutex::new(nvs) })
    }

    fn with_nvs<T>(
        &self,
        key: &str,
        f: impl FnOnce(&EspNvs<NvsDefault>) -> Result<T, EspError>,
    ) -> Result<Result<T, EspError>, StorageError> {
        let nvs = self.nvs.lock().map_err(|_| {
            StorageError::Unavailable(format!("NVS lock poisoned while accessing '{}'", key))
        })?;
        Ok(f(&nvs))
    }

    fn read<T>(
        &self,
        key: &str,
        f: impl FnOnce(&EspNvs<NvsDefault>) -> Result<Option<T>, EspError>,
    ) -> Result<Option<T>, StorageError> {
        match self.with_nvs(key, f)? {
            Ok(value) => Ok(value),
            Err(e) if e.code() == ESP_ERR_NVS_TYPE_MISMATCH as i32 => Ok(None),
            Err(e) => Err(StorageError::read(key, e)),
        }
    }

    fn write(
        &self,
        key: &str,
        f: impl FnOnce(&EspNvs<NvsDefault>) -> Result<(), EspError>,
    ) -> Result<(), StorageError> {
        self.with_nvs(key, f)?.map_err(|e| StorageError::write(key, e))
    }
}

impl SettingsStorage for NvsSettings {
    fn get_i32(&self, key: &str) -> Result<Option<i32>, StorageError> {
        self.read(key, |nvs| nvs.get_i32(key))
    }

    fn put_i32(&self, key: &str, value: i32) -> Result<(), StorageError> {
        self.write(key, |nvs| nvs.set_i32(key, value))
    }

    fn get_f32(&self, key: &str) -> Result<Option<f32>, StorageError> {
        Ok(self.read(key, |nvs| nvs.get_u32(key))?.map(f32::from_bits))
    }

    fn put_f32(&self, key: &str, value: f32) -> Result<(), StorageError> {
        self.write(key, |nvs| nvs.set_u32(key, value.to_bits()))
    }

    fn get_bool(&self, key: &str) -> Result<Option<bool>, StorageError> {
        Ok(self.read(key, |nvs| nvs.get_u8(key))?.map(|v| v != 0))
    }

    fn put_bool(&self, key: &str, value: bool) -> Result<(), StorageError> {
        self.write(key, |nvs| nvs.set_u8(key, u8::from(value)))
    }

    fn get_string(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut buf = [0u8; MAX_STRING_LEN];
        self.read(key, |nvs| Ok(nvs.get_str(key, &mut buf)?.map(str::to_string)))
    }

    fn put_string(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.write(key, |nvs| nvs.set_str(key, value))
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.write(key, |nvs| nvs.remove(key).map(|_| ()))
    }

    fn contains(&self, key: &str) -> Result<bool, StorageError> {
        self.with_nvs(key, |nvs| nvs.contains(key))?
            .map_err(|e| StorageError::read(key, e))
    }
}
