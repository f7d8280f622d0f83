//! Backup status display.
//!
//! Summarizes what a backup would contain right now: record counts, local
//! image candidates, and when the last remote backup succeeded.

use chrono::{TimeZone, Utc};
use colored::Colorize;
use serde::Serialize;

use crate::error::Result;
use crate::storage::preferences::{PreferenceStore, keys};
use crate::storage::sqlite::{RecordCounts, SqliteStorage};
use crate::sync::assets::AssetResolver;
use crate::sync::file::file_size;

/// Current backup state for one user.
#[derive(Debug, Clone, Serialize)]
pub struct BackupStatus {
    pub principal: Option<String>,
    pub counts: RecordCounts,
    /// Epoch millis of the last successful remote backup.
    pub last_backup_at: Option<i64>,
    pub local_images: usize,
    pub local_image_bytes: u64,
    pub remote_configured: bool,
}

/// Gather backup status.
///
/// Without a principal, owner-scoped lists (collections, categories) count
/// as empty.
///
/// # Errors
///
/// Returns an error if database queries fail.
pub fn get_backup_status<P: PreferenceStore + ?Sized>(
    storage: &SqliteStorage,
    prefs: &P,
    principal: Option<&str>,
    resolver: &AssetResolver,
    remote_configured: bool,
) -> Result<BackupStatus> {
    let counts = storage.counts(principal.unwrap_or_default())?;
    let candidates = resolver.list_local_candidates();
    let local_image_bytes = candidates.iter().map(|asset| file_size(&asset.path)).sum();

    Ok(BackupStatus {
        principal: principal.map(str::to_string),
        counts,
        last_backup_at: prefs.get_i64(keys::LAST_BACKUP_AT),
        local_images: candidates.len(),
        local_image_bytes,
        remote_configured,
    })
}

/// Print backup status to stdout in a human-readable format.
pub fn print_status(status: &BackupStatus) {
    println!("{}", "Backup Status".bold().underline());
    println!();

    match &status.principal {
        Some(user) => println!("User: {}", user.cyan()),
        None => println!("User: {}", "not signed in".yellow()),
    }
    println!();

    let counts = &status.counts;
    if counts.total() > 0 {
        println!("{}", "Records:".blue().bold());
        let rows = [
            ("Products", counts.products),
            ("Customers", counts.customers),
            ("Sales", counts.sales),
            ("Expenses", counts.expenses),
            ("Invoices", counts.invoices),
            ("Stock moves", counts.stock_movements),
            ("Collections", counts.collections),
            ("Coll. items", counts.collection_items),
            ("Categories", counts.custom_categories),
        ];
        for (label, count) in rows.iter().filter(|(_, count)| *count > 0) {
            println!("  {label:<13}{count}");
        }
        println!("  {}: {}", "Total".bold(), counts.total());
    } else {
        println!("{}", "No records yet.".dimmed());
    }
    println!();

    println!("{}", "Images:".blue().bold());
    println!(
        "  {} local files ({})",
        status.local_images,
        format_size(status.local_image_bytes)
    );
    println!();

    match status.last_backup_at.and_then(|ms| Utc.timestamp_millis_opt(ms).single()) {
        Some(when) => println!(
            "Last remote backup: {}",
            when.format("%Y-%m-%d %H:%M UTC").to_string().green()
        ),
        None => println!("Last remote backup: {}", "never".yellow()),
    }
    if !status.remote_configured {
        println!(
            "{}",
            "Remote storage is not configured. Run 'stockbook remote configure --url <URL>'."
                .dimmed()
        );
    }
}

/// Format a byte size as a human-readable string.
#[allow(clippy::cast_precision_loss)]
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;

    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}
