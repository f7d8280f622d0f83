//! Configuration management.
//!
//! This module resolves where Stockbook keeps its data and who the current
//! user is.
//!
//! # Layout
//!
//! Everything lives under one data root, `~/.stockbook/` by default
//! (override with `STOCKBOOK_HOME`):
//!
//! ```text
//! ~/.stockbook/
//! ├── config.json          remote storage settings
//! ├── data/
//! │   ├── stockbook.db     record store
//! │   └── preferences.json settings, profile and session state
//! ├── cache/               downloaded photos, restore staging
//! └── files/               images referenced by records
//! ```

use std::path::{Path, PathBuf};

use crate::storage::{PreferenceStore, keys};
use crate::sync::AssetDirs;

/// Get the data root.
///
/// `STOCKBOOK_HOME` wins when set; otherwise `~/.stockbook/`.
#[must_use]
pub fn global_stockbook_dir() -> Option<PathBuf> {
    if let Ok(home) = std::env::var("STOCKBOOK_HOME") {
        if !home.trim().is_empty() {
            return Some(PathBuf::from(home));
        }
    }
    directories::BaseDirs::new().map(|b| b.home_dir().join(".stockbook"))
}

/// Resolve the database path.
///
/// Priority:
/// 1. If `explicit_path` is provided, use it directly
/// 2. `STOCKBOOK_DB` environment variable
/// 3. `<data root>/data/stockbook.db`
#[must_use]
pub fn resolve_db_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }

    if let Ok(db_path) = std::env::var("STOCKBOOK_DB") {
        if !db_path.trim().is_empty() {
            return Some(PathBuf::from(db_path));
        }
    }

    global_stockbook_dir().map(|dir| dir.join("data").join("stockbook.db"))
}

/// Preferences file, kept next to the database.
#[must_use]
pub fn preferences_path(db_path: &Path) -> PathBuf {
    db_path
        .parent()
        .map_or_else(|| PathBuf::from("preferences.json"), |dir| dir.join("preferences.json"))
}

/// Remote settings file.
#[must_use]
pub fn config_path() -> Option<PathBuf> {
    global_stockbook_dir().map(|dir| dir.join("config.json"))
}

/// Image directories under `root`.
#[must_use]
pub fn asset_dirs_in(root: &Path) -> AssetDirs {
    AssetDirs::new(root.join("cache"), root.join("files"))
}

/// Image directories under the data root.
#[must_use]
pub fn asset_dirs() -> Option<AssetDirs> {
    global_stockbook_dir().map(|root| asset_dirs_in(&root))
}

/// Parent of per-restore staging directories.
#[must_use]
pub fn staging_parent(dirs: &AssetDirs) -> PathBuf {
    dirs.cache.join("staging")
}

/// Resolve the current user.
///
/// Priority:
/// 1. Explicit `--user` flag
/// 2. `STOCKBOOK_USER` environment variable
/// 3. The signed-in session stored in preferences
/// 4. `None`; callers that need a user fail with `NotAuthenticated`
#[must_use]
pub fn resolve_principal<P: PreferenceStore + ?Sized>(
    explicit_user: Option<&str>,
    prefs: &P,
) -> Option<String> {
    if let Some(user) = explicit_user.filter(|u| !u.trim().is_empty()) {
        return Some(user.to_string());
    }

    if let Ok(user) = std::env::var("STOCKBOOK_USER") {
        if !user.trim().is_empty() {
            return Some(user);
        }
    }

    prefs
        .get_string(keys::SESSION_USER_ID)
        .filter(|u| !u.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryPreferences;

    #[test]
    fn test_resolve_db_path_with_explicit() {
        let explicit = PathBuf::from("/custom/path/db.sqlite");
        let result = resolve_db_path(Some(&explicit));
        assert_eq!(result, Some(explicit));
    }

    #[test]
    fn test_preferences_live_next_to_database() {
        let prefs = preferences_path(Path::new("/data/stockbook.db"));
        assert_eq!(prefs, PathBuf::from("/data/preferences.json"));
    }

    #[test]
    fn test_asset_dirs_layout() {
        let dirs = asset_dirs_in(Path::new("/root/.stockbook"));
        assert_eq!(dirs.cache, PathBuf::from("/root/.stockbook/cache"));
        assert_eq!(dirs.external, PathBuf::from("/root/.stockbook/files"));
        assert_eq!(staging_parent(&dirs), PathBuf::from("/root/.stockbook/cache/staging"));
    }

    #[test]
    fn test_explicit_principal_wins() {
        let mut prefs = MemoryPreferences::new();
        prefs.put_string(keys::SESSION_USER_ID, "stored").unwrap();

        assert_eq!(resolve_principal(Some("flag"), &prefs).as_deref(), Some("flag"));
    }

    #[test]
    fn test_blank_principal_is_ignored() {
        let prefs = MemoryPreferences::new();
        if std::env::var("STOCKBOOK_USER").is_err() {
            assert_eq!(resolve_principal(Some("  "), &prefs), None);
        }
    }
}
