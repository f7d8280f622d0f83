//! Backup command implementations (local archives and documents).

use crate::cli::BackupCommands;
use crate::config::staging_parent;
use crate::error::Result;
use crate::storage::{PreferenceStore, keys};
use crate::sync::{
    AssetResolver, CancelToken, Decoded, EntityCounts, ExportMeta, RestoreReport, content_hash,
    create_archive, export_document, import_document, inspect, restore_archive,
};
use colored::Colorize;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use super::{Workspace, progress_printer};

#[derive(Serialize)]
struct CreateOutput<'a> {
    path: &'a Path,
    images: usize,
    skipped_assets: usize,
    bytes: u64,
    records: EntityCounts,
}

#[derive(Serialize)]
struct ExportOutput<'a> {
    path: &'a Path,
    records: usize,
}

#[derive(Serialize)]
struct InspectOutput<'a> {
    path: &'a Path,
    sha256: String,
    version: u32,
    created_at: i64,
    app_version: &'a str,
    user_email: &'a str,
    records: EntityCounts,
    product_photos: usize,
    skipped: Vec<String>,
}

/// Execute backup commands.
///
/// # Errors
///
/// Returns an error if the workspace is not initialized or the operation
/// fails.
pub fn execute(
    command: &BackupCommands,
    db_path: Option<&PathBuf>,
    user: Option<&str>,
    json: bool,
) -> Result<()> {
    match command {
        BackupCommands::Create { output } => create(output, db_path, user, json),
        BackupCommands::Restore { archive } => restore(archive, db_path, user, json),
        BackupCommands::Export { output } => export(output, db_path, user, json),
        BackupCommands::Import { input } => import(input, db_path, user, json),
        BackupCommands::Inspect { path } => execute_inspect(path, json),
    }
}

fn export_meta(prefs: &dyn PreferenceStore) -> ExportMeta {
    ExportMeta {
        user_email: prefs.get_string(keys::SESSION_USER_EMAIL),
        ..ExportMeta::current()
    }
}

fn create(output: &Path, db_path: Option<&PathBuf>, user: Option<&str>, json: bool) -> Result<()> {
    let workspace = Workspace::open(db_path, user)?;
    let owner = workspace.require_principal()?;
    let resolver = AssetResolver::new(workspace.dirs.clone());

    let summary = create_archive(
        &workspace.storage,
        &workspace.prefs,
        &owner,
        &export_meta(&workspace.prefs),
        &resolver,
        &[],
        output,
    )?;

    if json {
        let out = CreateOutput {
            path: &summary.path,
            images: summary.images,
            skipped_assets: summary.skipped_assets,
            bytes: summary.bytes,
            records: summary.records,
        };
        println!("{}", serde_json::to_string(&out)?);
    } else {
        println!("{} {}", "Backup written:".green(), summary.path.display());
        println!("  Records: {}", summary.records.total());
        println!("  Images:  {}", summary.images);
        if summary.skipped_assets > 0 {
            println!(
                "  {}",
                format!("{} image(s) left out", summary.skipped_assets).yellow()
            );
        }
    }

    Ok(())
}

fn restore(archive: &Path, db_path: Option<&PathBuf>, user: Option<&str>, json: bool) -> Result<()> {
    let mut workspace = Workspace::open(db_path, user)?;
    let owner = workspace.require_principal()?;
    let staging = staging_parent(&workspace.dirs);
    let mut progress = progress_printer(json);

    let report = restore_archive(
        &mut workspace.storage,
        &mut workspace.prefs,
        &owner,
        archive,
        &workspace.dirs,
        &staging,
        &mut progress,
        &CancelToken::never(),
    )?;

    print_report(&report, json)
}

fn export(output: &Path, db_path: Option<&PathBuf>, user: Option<&str>, json: bool) -> Result<()> {
    let workspace = Workspace::open(db_path, user)?;
    let owner = workspace.require_principal()?;

    let records = export_document(
        &workspace.storage,
        &workspace.prefs,
        &owner,
        &export_meta(&workspace.prefs),
        output,
    )?;

    if json {
        let out = ExportOutput {
            path: output,
            records,
        };
        println!("{}", serde_json::to_string(&out)?);
    } else {
        println!("Exported {records} records to {}", output.display());
    }

    Ok(())
}

fn import(input: &Path, db_path: Option<&PathBuf>, user: Option<&str>, json: bool) -> Result<()> {
    let mut workspace = Workspace::open(db_path, user)?;
    let owner = workspace.require_principal()?;
    let mut progress = progress_printer(json);

    let report = import_document(
        &mut workspace.storage,
        &mut workspace.prefs,
        &owner,
        input,
        &mut progress,
        &CancelToken::never(),
    )?;

    print_report(&report, json)
}

fn execute_inspect(path: &Path, json: bool) -> Result<()> {
    let decoded = inspect(path)?;
    let sha256 = content_hash(&fs::read(path)?);
    print_inspection(path, sha256, &decoded, json)
}

fn print_inspection(path: &Path, sha256: String, decoded: &Decoded, json: bool) -> Result<()> {
    let snapshot = &decoded.snapshot;
    let skipped: Vec<String> = decoded.errors.iter().map(ToString::to_string).collect();

    if json {
        let out = InspectOutput {
            path,
            sha256,
            version: snapshot.version,
            created_at: snapshot.created_at,
            app_version: &snapshot.metadata.app_version,
            user_email: &snapshot.metadata.user_email,
            records: snapshot.counts(),
            product_photos: snapshot.product_photos.len(),
            skipped,
        };
        println!("{}", serde_json::to_string(&out)?);
        return Ok(());
    }

    let counts = snapshot.counts();
    println!("{}", path.display().to_string().bold());
    println!("  SHA-256:  {sha256}");
    println!("  Format:   v{}", snapshot.version);
    if !snapshot.metadata.app_version.is_empty() {
        println!("  App:      {}", snapshot.metadata.app_version);
    }
    if !snapshot.metadata.user_email.is_empty() {
        println!("  Account:  {}", snapshot.metadata.user_email);
    }
    println!();
    println!("  Products:     {}", counts.products);
    println!("  Customers:    {}", counts.customers);
    println!("  Sales:        {}", counts.sales);
    println!("  Expenses:     {}", counts.expenses);
    println!("  Invoices:     {}", counts.invoices);
    println!("  Stock moves:  {}", counts.stock_movements);
    println!("  Collections:  {}", counts.collections);
    println!("  Coll. items:  {}", counts.collection_items);
    println!("  Categories:   {}", counts.custom_categories);
    println!("  Photos:       {}", snapshot.product_photos.len());

    if !skipped.is_empty() {
        println!();
        println!("{}", format!("Skipped {} record(s):", skipped.len()).yellow());
        for line in &skipped {
            println!("  {line}");
        }
    }

    Ok(())
}

fn print_report(report: &RestoreReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(report)?);
        return Ok(());
    }

    println!("{}", "Restore complete".green().bold());
    println!("  Records restored: {}", report.restored.total());
    if let Some(relink) = &report.relink {
        println!("  Photos relinked:  {}", relink.products);
        if relink.missing > 0 {
            println!("  Photos missing:   {}", relink.missing);
        }
    }
    if report.is_clean() {
        return Ok(());
    }

    let skipped = report.skipped_records
        + report.skipped_collections
        + report.skipped_collection_items;
    if skipped > 0 {
        println!("  {}", format!("Skipped records:  {skipped}").yellow());
    }
    if report.categories_failed > 0 {
        println!(
            "  {}",
            format!("Categories failed: {}", report.categories_failed).yellow()
        );
    }
    for step in &report.failed_steps {
        println!("  {}", format!("Step failed: {step}").red());
    }

    Ok(())
}
