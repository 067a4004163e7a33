//! Settings storage abstraction.
//!
//! This module provides the key-value contract that persistent settings are
//! written through. It is implemented differently on each platform:
//! - Linux: JSON file (`feeder-server::FileSettings`)
//! - ESP32: NVS (Non-Volatile Storage)
//! - Tests/simulation: [`MemorySettings`]
//!
//! All methods are synchronous and take `&self` so a storage handle can be
//! shared with HTTP handlers on embedded platforms.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;

/// Errors reported by a settings backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Failed to read a value.
    #[error("Read error for '{key}': {message}")]
    Read { key: String, message: String },

    /// Failed to write or remove a value.
    #[error("Write error for '{key}': {message}")]
    Write { key: String, message: String },

    /// The backend itself is not usable.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    pub fn read(key: &str, message: impl std::fmt::Display) -> Self {
        StorageError::Read {
            key: key.to_string(),
            message: message.to_string(),
        }
    }

    pub fn write(key: &str, message: impl std::fmt::Display) -> Self {
        StorageError::Write {
            key: key.to_string(),
            message: message.to_string(),
        }
    }
}

/// Typed key-value settings storage.
///
/// Missing keys are reported as `Ok(None)`, never as errors. A key stored
/// with one type and read with another is also treated as missing.
pub trait SettingsStorage: Send + Sync {
    fn get_i32(&self, key: &str) -> Result<Option<i32>, StorageError>;
    fn put_i32(&self, key: &str, value: i32) -> Result<(), StorageError>;

    fn get_f32(&self, key: &str) -> Result<Option<f32>, StorageError>;
    fn put_f32(&self, key: &str, value: f32) -> Result<(), StorageError>;

    fn get_bool(&self, key: &str) -> Result<Option<bool>, StorageError>;
    fn put_bool(&self, key: &str, value: bool) -> Result<(), StorageError>;

    fn get_string(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn put_string(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete a key. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Check if a key exists, whatever its type.
    fn contains(&self, key: &str) -> Result<bool, StorageError>;
}

macro_rules! forward_settings_storage {
    ($($ty:ty),*) => {$(
        impl<T: SettingsStorage + ?Sized> SettingsStorage for $ty {
            fn get_i32(&self, key: &str) -> Result<Option<i32>, StorageError> {
                (**self).get_i32(key)
            }
            fn put_i32(&self, key: &str, value: i32) -> Result<(), StorageError> {
                (**self).put_i32(key, value)
            }
            fn get_f32(&self, key: &str) -> Result<Option<f32>, StorageError> {
                (**self).get_f32(key)
            }
            fn put_f32(&self, key: &str, value: f32) -> Result<(), StorageError> {
                (**self).put_f32(key, value)
            }
            fn get_bool(&self, key: &str) -> Result<Option<bool>, StorageError> {
                (**self).get_bool(key)
            }
            fn put_bool(&self, key: &str, value: bool) -> Result<(), StorageError> {
                (**self).put_bool(key, value)
            }
            fn get_string(&self, key: &str) -> Result<Option<String>, StorageError> {
                (**self).get_string(key)
            }
            fn put_string(&self, key: &str, value: &str) -> Result<(), StorageError> {
                (**self).put_string(key, value)
            }
            fn remove(&self, key: &str) -> Result<(), StorageError> {
                (**self).remove(key)
            }
            fn contains(&self, key: &str) -> Result<bool, StorageError> {
                (**self).contains(key)
            }
        }
    )*};
}

forward_settings_storage!(&T, std::sync::Arc<T>, Box<T>);

/// A single stored value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum StoredValue {
    Int(i32),
    Float(f32),
    Bool(bool),
    Text(String),
}

/// In-memory settings storage.
#[derive(Debug, Default)]
pub struct MemorySettings {
    data: RwLock<HashMap<String, StoredValue>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a storage pre-populated with `entries`.
    pub fn from_entries(entries: HashMap<String, StoredValue>) -> Self {
        Self {
            data: RwLock::new(entries),
        }
    }

    /// Copy of every stored entry.
    pub fn snapshot(&self) -> Result<HashMap<String, StoredValue>, StorageError> {
        Ok(self.read_guard()?.clone())
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.data.read().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read_guard(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, StoredValue>>, StorageError> {
        self.data
            .read()
            .map_err(|_| StorageError::Unavailable("settings lock poisoned".to_string()))
    }

    fn get(&self, key: &str) -> Result<Option<StoredValue>, StorageError> {
        Ok(self.read_guard()?.get(key).cloned())
    }

    fn put(&self, key: &str, value: StoredValue) -> Result<(), StorageError> {
        self.data
            .write()
            .map_err(|_| StorageError::write(key, "settings lock poisoned"))?
            .insert(key.to_string(), value);
        Ok(())
    }
}

impl SettingsStorage for MemorySettings {
    fn get_i32(&self, key: &str) -> Result<Option<i32>, StorageError> {
        Ok(match self.get(key)? {
            Some(StoredValue::Int(v)) => Some(v),
            _ => None,
        })
    }

    fn put_i32(&self, key: &str, value: i32) -> Result<(), StorageError> {
        self.put(key, StoredValue::Int(value))
    }

    fn get_f32(&self, key: &str) -> Result<Option<f32>, StorageError> {
        Ok(match self.get(key)? {
            Some(StoredValue::Float(v)) => Some(v),
            _ => None,
        })
    }

    fn put_f32(&self, key: &str, value: f32) -> Result<(), StorageError> {
        self.put(key, StoredValue::Float(value))
    }

    fn get_bool(&self, key: &str) -> Result<Option<bool>, StorageError> {
        Ok(match self.get(key)? {
            Some(StoredValue::Bool(v)) => Some(v),
            _ => None,
        })
    }

    fn put_bool(&self, key: &str, value: bool) -> Result<(), StorageError> {
        self.put(key, StoredValue::Bool(value))
    }

    fn get_string(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(match self.get(key)? {
            Some(StoredValue::Text(v)) => Some(v),
            _ => None,
        })
    }

    fn put_string(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.put(key, StoredValue::Text(value.to_string()))
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.data
            .write()
            .map_err(|_| StorageError::write(key, "settings lock poisoned"))?
            .remove(key);
        Ok(())
    }

    fn contains(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.read_guard()?.contains_key(key))
    }
}
