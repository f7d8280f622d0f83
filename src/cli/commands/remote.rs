//! Remote backup command implementations.
//!
//! Push and pull run on a tokio runtime created per command; everything
//! else about the workspace stays synchronous.

use crate::cli::RemoteCommands;
use crate::config::staging_parent;
use crate::error::{Error, Result};
use crate::remote::config::{load_config, save_remote_settings};
use crate::remote::{HttpObjectStorage, ObjectStoreBackupProvider, RemoteSettings, ResolvedRemote};
use crate::storage::{PreferenceStore, keys};
use crate::sync::{AssetResolver, CancelToken, ExportMeta, StaticPrincipal, SyncOrchestrator};
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

use super::{Workspace, progress_printer};

#[derive(Serialize)]
struct PushOutput {
    principal: String,
    backup_id: String,
    last_backup_at: Option<i64>,
}

#[derive(Serialize)]
struct ShowOutput<'a> {
    configured: bool,
    storage_base_url: Option<&'a str>,
    storage_domain: &'a str,
    has_token: bool,
}

/// Execute remote commands.
///
/// # Errors
///
/// Returns an error if remote storage is not configured, no user is signed
/// in, or the transfer fails.
pub fn execute(
    command: &RemoteCommands,
    db_path: Option<&PathBuf>,
    user: Option<&str>,
    json: bool,
) -> Result<()> {
    match command {
        RemoteCommands::Configure { url, domain, token } => configure(
            RemoteSettings {
                storage_base_url: url.clone(),
                storage_domain: domain.clone(),
                auth_token: token.clone(),
            },
            json,
        ),
        RemoteCommands::Show => show(json),
        RemoteCommands::Push | RemoteCommands::Pull => {
            let rt = tokio::runtime::Runtime::new()
                .map_err(|e| Error::Other(format!("Failed to create async runtime: {e}")))?;
            rt.block_on(async {
                if matches!(command, RemoteCommands::Push) {
                    push(db_path, user, json).await
                } else {
                    pull(db_path, user, json).await
                }
            })
        }
    }
}

fn build_provider(
    workspace: &Workspace,
) -> Result<ObjectStoreBackupProvider<HttpObjectStorage>> {
    let remote = ResolvedRemote::resolve(&load_config()?);
    let base_url = remote.storage_base_url.ok_or_else(|| {
        Error::Config(
            "Remote storage is not configured. Run 'stockbook remote configure --url <URL>'."
                .to_string(),
        )
    })?;

    let meta = ExportMeta {
        user_email: workspace.prefs.get_string(keys::SESSION_USER_EMAIL),
        ..ExportMeta::current()
    };

    Ok(ObjectStoreBackupProvider::new(
        HttpObjectStorage::new(base_url, remote.auth_token),
        AssetResolver::new(workspace.dirs.clone()),
        remote.storage_domain,
        staging_parent(&workspace.dirs),
    )
    .with_meta(meta))
}

async fn push(db_path: Option<&PathBuf>, user: Option<&str>, json: bool) -> Result<()> {
    let mut workspace = Workspace::open(db_path, user)?;
    let provider = build_provider(&workspace)?;
    let principals = StaticPrincipal::new(workspace.principal.clone());
    let mut progress = progress_printer(json);

    let mut orchestrator = SyncOrchestrator::new(
        &mut workspace.storage,
        &mut workspace.prefs,
        provider,
        principals,
    );
    let backup_id = orchestrator.create_backup(&mut progress).await?;
    let last_backup_at = orchestrator.last_backup_at();

    if json {
        let output = PushOutput {
            principal: workspace.principal.unwrap_or_default(),
            backup_id,
            last_backup_at,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("{} {backup_id}", "Backup uploaded:".green());
    }

    Ok(())
}

async fn pull(db_path: Option<&PathBuf>, user: Option<&str>, json: bool) -> Result<()> {
    let mut workspace = Workspace::open(db_path, user)?;
    let provider = build_provider(&workspace)?;
    let principals = StaticPrincipal::new(workspace.principal.clone());
    let mut progress = progress_printer(json);

    let mut orchestrator = SyncOrchestrator::new(
        &mut workspace.storage,
        &mut workspace.prefs,
        provider,
        principals,
    );
    let status = orchestrator
        .restore_latest(&mut progress, &CancelToken::never())
        .await?;

    if json {
        println!("{}", serde_json::to_string(&status)?);
        return Ok(());
    }

    let report = &status.report;
    println!("{} {}", "Restored".green().bold(), status.backup_id);
    println!("  Records restored: {}", report.restored.total());
    if let Some(relink) = &report.relink {
        println!("  Photos relinked:  {}", relink.products);
    }
    for step in &report.failed_steps {
        println!("  {}", format!("Step failed: {step}").red());
    }

    Ok(())
}

fn configure(settings: RemoteSettings, json: bool) -> Result<()> {
    if settings == RemoteSettings::default() {
        return Err(Error::InvalidArgument(
            "Nothing to configure. Pass --url, --domain or --token.".to_string(),
        ));
    }
    save_remote_settings(&settings)?;

    if !json {
        println!("Remote settings saved.");
    }
    show(json)
}

fn show(json: bool) -> Result<()> {
    let remote = ResolvedRemote::resolve(&load_config()?);

    if json {
        let output = ShowOutput {
            configured: remote.is_configured(),
            storage_base_url: remote.storage_base_url.as_deref(),
            storage_domain: &remote.storage_domain,
            has_token: remote.auth_token.is_some(),
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    match &remote.storage_base_url {
        Some(url) => println!("Storage URL:    {}", url.cyan()),
        None => println!("Storage URL:    {}", "not configured".yellow()),
    }
    if remote.storage_domain.is_empty() {
        println!("Photo domain:   {}", "any".dimmed());
    } else {
        println!("Photo domain:   {}", remote.storage_domain);
    }
    println!(
        "Auth token:     {}",
        if remote.auth_token.is_some() { "set" } else { "none" }
    );

    Ok(())
}
