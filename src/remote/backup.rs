//! Backup provider on top of object storage.
//!
//! Each user has one rolling backup object, `backups/<user>/latest.zip`,
//! holding a complete archive. Pushing downloads any remote product photos
//! first so the archive is self-contained.

use std::fs;
use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::storage::{PreferenceStore, RecordStore};
use crate::sync::orchestrator::{RemoteBackupProvider, RestoreStatus};
use crate::sync::{
    AssetResolver, CancelToken, ExportMeta, Progress, create_archive, restore_archive,
};

use super::provider::ObjectStorage;

const ARCHIVE_CONTENT_TYPE: &str = "application/zip";

/// Object path of the rolling backup for `principal`.
#[must_use]
pub fn backup_object_path(principal: &str) -> String {
    format!("backups/{principal}/latest.zip")
}

/// Pushes and restores archives through an [`ObjectStorage`].
pub struct ObjectStoreBackupProvider<O> {
    storage: O,
    resolver: AssetResolver,
    storage_domain: String,
    work_dir: PathBuf,
    meta: ExportMeta,
}

impl<O: ObjectStorage> ObjectStoreBackupProvider<O> {
    /// `work_dir` holds temporary archives and restore staging directories.
    pub fn new(
        storage: O,
        resolver: AssetResolver,
        storage_domain: impl Into<String>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            storage,
            resolver,
            storage_domain: storage_domain.into(),
            work_dir: work_dir.into(),
            meta: ExportMeta::current(),
        }
    }

    #[must_use]
    pub fn with_meta(mut self, meta: ExportMeta) -> Self {
        self.meta = meta;
        self
    }

    #[must_use]
    pub fn storage(&self) -> &O {
        &self.storage
    }

    fn temp_archive(&self, label: &str) -> PathBuf {
        self.work_dir
            .join(format!("{label}-{}.zip", uuid::Uuid::new_v4()))
    }
}

impl<O: ObjectStorage> RemoteBackupProvider for ObjectStoreBackupProvider<O> {
    fn name(&self) -> &'static str {
        self.storage.name()
    }

    async fn push(
        &mut self,
        store: &dyn RecordStore,
        prefs: &dyn PreferenceStore,
        principal: &str,
        progress: &mut dyn Progress,
    ) -> Result<String> {
        progress.report(0, "Collecting photos");
        let products = store.products()?;
        let downloaded = self
            .resolver
            .download_remote_assets(&self.storage, &self.storage_domain, &products, |done, total| {
                let percent = 50 * done / total.max(1);
                progress.report(u8::try_from(percent).unwrap_or(50), "Downloading photos");
            })
            .await;
        debug!(downloaded = downloaded.len(), "Remote photos fetched");

        progress.report(50, "Packing backup");
        let archive = self.temp_archive("upload");
        let summary = create_archive(
            store,
            prefs,
            principal,
            &self.meta,
            &self.resolver,
            &downloaded,
            &archive,
        )?;
        let bytes = fs::read(&archive);
        if let Err(e) = fs::remove_file(&archive) {
            debug!(path = %archive.display(), error = %e, "Temp archive cleanup failed");
        }
        let bytes = bytes?;

        progress.report(75, "Uploading backup");
        let object = backup_object_path(principal);
        self.storage
            .put_object(&object, bytes, ARCHIVE_CONTENT_TYPE)
            .await?;

        progress.report(100, "Backup uploaded");
        info!(%object, images = summary.images, bytes = summary.bytes, "Backup pushed");
        Ok(object)
    }

    async fn restore(
        &mut self,
        store: &mut dyn RecordStore,
        prefs: &mut dyn PreferenceStore,
        principal: &str,
        progress: &mut dyn Progress,
        cancel: &CancelToken,
    ) -> Result<RestoreStatus> {
        let object = backup_object_path(principal);
        let bytes = self.storage.fetch_object(&object).await?;
        cancel.check("download")?;

        let archive = self.temp_archive("download");
        if let Some(parent) = archive.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&archive, &bytes)?;

        let result = restore_archive(
            store,
            prefs,
            principal,
            &archive,
            self.resolver.dirs(),
            &self.work_dir,
            progress,
            cancel,
        );
        if let Err(e) = fs::remove_file(&archive) {
            warn!(path = %archive.display(), error = %e, "Downloaded archive cleanup failed");
        }

        Ok(RestoreStatus {
            principal: principal.to_string(),
            backup_id: object,
            report: result?,
        })
    }
}
