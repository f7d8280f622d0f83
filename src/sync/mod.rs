//! Backup, restore and remote sync.
//!
//! This module turns the dataset into a portable backup and back:
//!
//! - **Codec**: dataset ↔ JSON document, tolerant per-record decoding
//! - **Assets**: find, download and gather the images a backup carries
//! - **Archive**: document plus images in one zip, digest-checked
//! - **Restore**: atomic apply with isolated post-transaction steps
//! - **Orchestrator**: remote backup/restore for the signed-in user
//!
//! # Architecture
//!
//! ```text
//! backup:  encode ─▶ gather assets ─▶ pack ─▶ (upload)
//! restore: (download) ─▶ unpack ─▶ decode ─▶ apply ─▶ promote images ─▶ relink
//! ```
//!
//! # Example
//!
//! ```ignore
//! use stockbook::sync::{create_archive, restore_archive, AssetResolver, CancelToken, ExportMeta, NoProgress};
//!
//! let summary = create_archive(&storage, &prefs, "u1", &ExportMeta::current(), &resolver, &[], &dest)?;
//! let report = restore_archive(&mut storage, &mut prefs, "u1", &dest, &dirs, &staging, &mut NoProgress, &CancelToken::never())?;
//! ```

pub mod archive;
pub mod assets;
pub mod codec;
pub mod file;
mod hash;
pub mod orchestrator;
pub mod pipeline;
pub mod progress;
pub mod restore;
mod status;
pub mod types;

// Re-export main types and functions
pub use archive::{DOCUMENT_ENTRY, Unpacked, pack, read_document, unpack};
pub use assets::{
    AssetDirs, AssetResolver, AssetRole, DownloadedAsset, ImageDirs, LocalAsset, PackAsset,
    object_path_from_url,
};
pub use codec::{ExportMeta, decode, encode, to_document};
pub use file::{atomic_write, file_size};
pub use hash::{content_hash, file_hash, has_changed};
pub use orchestrator::{
    PrincipalResolver, RemoteBackupProvider, RestoreStatus, StaticPrincipal, SyncOrchestrator,
};
pub use pipeline::{create_archive, export_document, import_document, inspect, restore_archive};
pub use progress::{CancelToken, NoProgress, Progress, RestoreStage};
pub use restore::Restorer;
pub use status::{BackupStatus, get_backup_status, print_status};
pub use types::{
    AssetCategory, Decoded, EntityCounts, PackSummary, RecordError, RelinkStats, RestoreReport,
    SNAPSHOT_VERSION, SkipReason, Snapshot, SnapshotMetadata,
};
