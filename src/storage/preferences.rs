//! Key-value preference storage.
//!
//! Settings, profile fields and login tracking live outside the record
//! store in a flat string-keyed map. [`FilePreferences`] persists the map as
//! a JSON file with atomic writes; [`MemoryPreferences`] keeps it in memory
//! for tests and dry runs.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::{Error, Result};
use crate::sync::file::atomic_write;

/// Well-known preference keys.
pub mod keys {
    /// Epoch millis of the last successful remote backup.
    pub const LAST_BACKUP_AT: &str = "backup.last_backup_at";

    pub const PROFILE_USER_ID: &str = "profile.user_id";
    pub const PROFILE_EMAIL: &str = "profile.email";
    pub const PROFILE_DISPLAY_NAME: &str = "profile.display_name";
    pub const PROFILE_BUSINESS_NAME: &str = "profile.business_name";
    pub const PROFILE_PHONE: &str = "profile.phone";
    pub const PROFILE_CURRENCY: &str = "profile.currency";
    pub const PROFILE_PHOTO: &str = "profile.photo";
    pub const PROFILE_BUSINESS_LOGO: &str = "profile.business_logo";

    pub const SESSION_USER_ID: &str = "session.user_id";
    pub const SESSION_USER_EMAIL: &str = "session.user_email";
    pub const SESSION_LAST_LOGIN_AT: &str = "session.last_login_at";

    pub const THEME: &str = "theme";
    pub const INTERFACE_SCALE: &str = "interface_scale";

    /// Prefixes that never travel in the settings map of a snapshot.
    pub const RESERVED_PREFIXES: &[&str] = &["profile.", "session.", "backup."];

    /// Whether a key is a plain setting (not profile, login or backup state).
    #[must_use]
    pub fn is_setting(key: &str) -> bool {
        !RESERVED_PREFIXES.iter().any(|prefix| key.starts_with(prefix))
    }
}

/// Typed access to a flat key-value store.
///
/// Implementors provide raw JSON get/put; the typed helpers mirror the
/// string/long/float/bool accessors of platform preference APIs.
pub trait PreferenceStore {
    /// Raw value for a key.
    fn get(&self, key: &str) -> Option<Value>;

    /// Store a raw value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be persisted.
    fn put(&mut self, key: &str, value: Value) -> Result<()>;

    /// Remove a key. Missing keys are not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the change cannot be persisted.
    fn remove(&mut self, key: &str) -> Result<()>;

    /// Snapshot of every entry, ordered by key.
    fn entries(&self) -> BTreeMap<String, Value>;

    fn get_string(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) => Some(s),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    fn get_i64(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn get_f64(&self, key: &str) -> Option<f64> {
        match self.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            Value::Bool(b) => Some(b),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// # Errors
    ///
    /// Returns an error if the value cannot be persisted.
    fn put_string(&mut self, key: &str, value: &str) -> Result<()> {
        self.put(key, Value::String(value.to_string()))
    }

    /// # Errors
    ///
    /// Returns an error if the value cannot be persisted.
    fn put_i64(&mut self, key: &str, value: i64) -> Result<()> {
        self.put(key, Value::from(value))
    }

    /// # Errors
    ///
    /// Returns an error for non-finite values or if the value cannot be persisted.
    fn put_f64(&mut self, key: &str, value: f64) -> Result<()> {
        let number = serde_json::Number::from_f64(value).ok_or_else(|| {
            Error::InvalidArgument(format!("{key}: non-finite value {value}"))
        })?;
        self.put(key, Value::Number(number))
    }

    /// # Errors
    ///
    /// Returns an error if the value cannot be persisted.
    fn put_bool(&mut self, key: &str, value: bool) -> Result<()> {
        self.put(key, Value::Bool(value))
    }
}

/// In-memory preference store.
#[derive(Debug, Default, Clone)]
pub struct MemoryPreferences {
    values: BTreeMap<String, Value>,
}

impl MemoryPreferences {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferences {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    fn put(&mut self, key: &str, value: Value) -> Result<()> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.values.remove(key);
        Ok(())
    }

    fn entries(&self) -> BTreeMap<String, Value> {
        self.values.clone()
    }
}

/// Preference store persisted as a JSON object on disk.
///
/// Every mutation rewrites the file atomically, so a crash mid-write
/// leaves the previous contents intact.
#[derive(Debug)]
pub struct FilePreferences {
    path: PathBuf,
    values: BTreeMap<String, Value>,
}

impl FilePreferences {
    /// Open the preference file, starting empty if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: &Path) -> Result<Self> {
        let values = if path.exists() {
            let content = fs::read_to_string(path)?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content).map_err(|e| {
                    Error::Config(format!(
                        "Failed to parse preferences {}: {e}",
                        path.display()
                    ))
                })?
            }
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            values,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<()> {
        let content = serde_json::to_vec_pretty(&self.values)?;
        atomic_write(&self.path, &content)
    }
}

impl PreferenceStore for FilePreferences {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    fn put(&mut self, key: &str, value: Value) -> Result<()> {
        self.values.insert(key.to_string(), value);
        self.persist()
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        if self.values.remove(key).is_some() {
            self.persist()?;
        }
        Ok(())
    }

    fn entries(&self) -> BTreeMap<String, Value> {
        self.values.clone()
    }
}
