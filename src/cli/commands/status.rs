//! Status command implementation.

use crate::error::Result;
use crate::remote::{ResolvedRemote, config::load_config};
use crate::sync::{AssetResolver, get_backup_status, print_status};
use serde::Serialize;
use std::path::PathBuf;

use super::Workspace;

#[derive(Serialize)]
struct StatusOutput {
    database: PathBuf,
    #[serde(flatten)]
    status: crate::sync::BackupStatus,
}

/// Execute status command.
///
/// Works without a signed-in user; owner-scoped lists then count as empty.
///
/// # Errors
///
/// Returns an error if the workspace is not initialized or a query fails.
pub fn execute(db_path: Option<&PathBuf>, user: Option<&str>, json: bool) -> Result<()> {
    let workspace = Workspace::open(db_path, user)?;
    let remote = ResolvedRemote::resolve(&load_config()?);
    let resolver = AssetResolver::new(workspace.dirs.clone());

    let status = get_backup_status(
        &workspace.storage,
        &workspace.prefs,
        workspace.principal.as_deref(),
        &resolver,
        remote.is_configured(),
    )?;

    if json {
        let output = StatusOutput {
            database: workspace.db_path().to_path_buf(),
            status,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("Database: {}", workspace.db_path().display());
        println!();
        print_status(&status);
    }

    Ok(())
}
