//! Initialize the Stockbook data directory.
//!
//! Creates the database (schema is applied on open) and the image
//! directories under the data root.

use crate::config::{asset_dirs, preferences_path, resolve_db_path};
use crate::error::{Error, Result};
use crate::storage::SqliteStorage;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

#[derive(Serialize)]
struct InitOutput {
    database: PathBuf,
    preferences: PathBuf,
    files: PathBuf,
    created: bool,
}

/// Execute the init command.
///
/// An existing database is kept unless `force` is set, in which case it is
/// replaced with an empty one.
///
/// # Errors
///
/// Returns an error if the directories or database cannot be created.
pub fn execute(db_path: Option<&PathBuf>, force: bool, json: bool) -> Result<()> {
    let db_path = resolve_db_path(db_path.map(PathBuf::as_path))
        .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;
    let dirs = asset_dirs()
        .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;

    let existed = db_path.exists();
    if existed && force {
        fs::remove_file(&db_path)?;
    }

    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::create_dir_all(&dirs.cache)?;
    fs::create_dir_all(&dirs.external)?;

    SqliteStorage::open(&db_path)?;
    let created = !existed || force;

    if json {
        let output = InitOutput {
            preferences: preferences_path(&db_path),
            database: db_path,
            files: dirs.external,
            created,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        if created {
            println!("Initialized Stockbook database");
        } else {
            println!("Stockbook database already initialized");
        }
        println!("  Database: {}", db_path.display());
        println!("  Images:   {}", dirs.external.display());
    }

    Ok(())
}
