//! Command implementations.

pub mod backup;
pub mod completions;
pub mod init;
pub mod remote;
pub mod session;
pub mod status;
pub mod version;

use std::path::{Path, PathBuf};

use crate::config::{asset_dirs, preferences_path, resolve_db_path, resolve_principal};
use crate::error::{Error, Result};
use crate::storage::{FilePreferences, SqliteStorage};
use crate::sync::AssetDirs;

/// Opened database, preferences and image directories for one command.
pub(crate) struct Workspace {
    pub db_path: PathBuf,
    pub storage: SqliteStorage,
    pub prefs: FilePreferences,
    pub dirs: AssetDirs,
    pub principal: Option<String>,
}

impl Workspace {
    /// Open the initialized workspace.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInitialized`] if the database does not exist.
    pub fn open(db_path: Option<&PathBuf>, user: Option<&str>) -> Result<Self> {
        let db_path = resolve_db_path(db_path.map(PathBuf::as_path))
            .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;

        if !db_path.exists() {
            return Err(Error::NotInitialized { path: db_path });
        }

        let storage = SqliteStorage::open(&db_path)?;
        let prefs = FilePreferences::open(&preferences_path(&db_path))?;
        let dirs = asset_dirs()
            .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;
        let principal = resolve_principal(user, &prefs);

        Ok(Self {
            db_path,
            storage,
            prefs,
            dirs,
            principal,
        })
    }

    /// The current user, or [`Error::NotAuthenticated`].
    pub fn require_principal(&self) -> Result<String> {
        self.principal.clone().ok_or(Error::NotAuthenticated)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

/// Progress printer for long-running commands. Silent in JSON mode.
pub(crate) fn progress_printer(json: bool) -> impl FnMut(u8, &str) {
    let mut last_stage = String::new();
    move |percent: u8, stage: &str| {
        if json || stage == last_stage {
            return;
        }
        eprintln!("[{percent:>3}%] {stage}");
        last_stage = stage.to_string();
    }
}
