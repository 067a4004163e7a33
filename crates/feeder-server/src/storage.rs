//! JSON-file settings storage for Linux hosts.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use feeder_core::{MemorySettings, SettingsStorage, StorageError, StoredValue};
use tracing::{debug, info};

/// Settings kept in memory and rewritten to a JSON file on every change.
///
/// The file is an object of typed values:
///
/// ```json
/// { "speed": { "type": "float", "value": 12.0 }, "feedTimesCount": { "type": "int", "value": 2 } }
/// ```
#[derive(Debug)]
pub struct FileSettings {
    path: PathBuf,
    cache: MemorySettings,
}

impl FileSettings {
    /// Open the settings file, starting empty if it does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let entries = if path.exists() {
            let text = fs::read_to_string(&path)
                .map_err(|e| StorageError::Unavailable(format!("{}: {}", path.display(), e)))?;
            serde_json::from_str::<HashMap<String, StoredValue>>(&text)
                .map_err(|e| StorageError::Unavailable(format!("{}: {}", path.display(), e)))?
        } else {
            info!("Settings file {} not found, starting with defaults", path.display());
            HashMap::new()
        };
        debug!(entries = entries.len(), "Loaded settings from {}", path.display());

        Ok(Self {
            path,
            cache: MemorySettings::from_entries(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, key: &str) -> Result<(), StorageError> {
        let entries = self.cache.snapshot()?;
        let json = serde_json::to_string_pretty(&entries).map_err(|e| StorageError::write(key, e))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StorageError::write(key, e))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| StorageError::write(key, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| StorageError::write(key, e))
    }
}

impl SettingsStorage for FileSettings {
    fn get_i32(&self, key: &str) -> Result<Option<i32>, StorageError> {
        self.cache.get_i32(key)
    }

    fn put_i32(&self, key: &str, value: i32) -> Result<(), StorageError> {
        self.cache.put_i32(key, value)?;
        self.flush(key)
    }

    fn get_f32(&self, key: &str) -> Result<Option<f32>, StorageError> {
        self.cache.get_f32(key)
    }

    fn put_f32(&self, key: &str, value: f32) -> Result<(), StorageError> {
        self.cache.put_f32(key, value)?;
        self.flush(key)
    }

    fn get_bool(&self, key: &str) -> Result<Option<bool>, StorageError> {
        self.cache.get_bool(key)
    }

    fn put_bool(&self, key: &str, value: bool) -> Result<(), StorageError> {
        self.cache.put_bool(key, value)?;
        self.flush(key)
    }

    fn get_string(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.cache.get_string(key)
    }

    fn put_string(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.cache.put_string(key, value)?;
        self.flush(key)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        if !self.cache.contains(key)? {
            return Ok(());
        }
        self.cache.remove(key)?;
        self.flush(key)
    }

    fn contains(&self, key: &str) -> Result<bool, StorageError> {
        self.cache.contains(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feeder_core::{RawSlotInput, Schedule};

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("feeder-settings-{}-{}", name, std::process::id()))
            .join("settings.json")
    }

    #[test]
    fn test_missing_file_starts_empty() {
        let path = temp_path("missing");
        let _ = fs::remove_file(&path);
        let settings = FileSettings::open(&path).unwrap();
        assert_eq!(settings.get_i32("feedTimesCount").unwrap(), None);
    }

    #[test]
    fn test_values_survive_reopen() {
        let path = temp_path("reopen");
        let _ = fs::remove_file(&path);

        let settings = FileSettings::open(&path).unwrap();
        settings.put_f32("speed", 12.5).unwrap();
        settings.put_bool("powerSaveMode", false).unwrap();
        settings.put_string("wifiSSID", "Home").unwrap();
        settings.put_i32("gone", 1).unwrap();
        settings.remove("gone").unwrap();

        let reopened = FileSettings::open(&path).unwrap();
        assert_eq!(reopened.get_f32("speed").unwrap(), Some(12.5));
        assert_eq!(reopened.get_bool("powerSaveMode").unwrap(), Some(false));
        assert_eq!(reopened.get_string("wifiSSID").unwrap().as_deref(), Some("Home"));
        assert!(!reopened.contains("gone").unwrap());

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_schedule_round_trip_through_file() {
        let path = temp_path("schedule");
        let _ = fs::remove_file(&path);

        let mut schedule = Schedule::new();
        schedule.replace(vec![RawSlotInput::new(6, 45, 2), RawSlotInput::new(18, 0, 1)]);
        schedule.persist(&FileSettings::open(&path).unwrap()).unwrap();

        let loaded = Schedule::load(&FileSettings::open(&path).unwrap()).unwrap();
        assert_eq!(loaded, schedule);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let path = temp_path("corrupt");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "not json").unwrap();
        assert!(matches!(FileSettings::open(&path), Err(StorageError::Unavailable(_))));
        let _ = fs::remove_file(&path);
    }
}
