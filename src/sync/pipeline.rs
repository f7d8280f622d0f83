//! End-to-end backup and restore flows over local files.
//!
//! These glue the codec, asset resolver, packager and restorer together:
//!
//! - [`create_archive`]: encode, gather images, pack
//! - [`restore_archive`]: unpack into staging, decode, apply, promote
//!   images, relink, clean up
//! - [`export_document`] / [`import_document`]: the bare JSON document
//! - [`inspect`]: decode without touching storage

use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::storage::preferences::PreferenceStore;
use crate::storage::store::{DatasetReader, RecordStore};
use crate::sync::archive::{self, new_staging_dir};
use crate::sync::assets::{AssetDirs, AssetResolver, DownloadedAsset};
use crate::sync::codec::{self, ExportMeta};
use crate::sync::file::atomic_write;
use crate::sync::progress::{CancelToken, Progress, Tracker};
use crate::sync::restore::Restorer;
use crate::sync::types::{Decoded, PackSummary, RestoreReport};

/// Write a complete backup archive for `owner` to `dest`.
///
/// `downloaded` holds remote product photos already fetched into the cache;
/// pass an empty slice for an offline backup.
///
/// # Errors
///
/// Returns an error if reading the dataset or writing the archive fails.
pub fn create_archive<R, P>(
    reader: &R,
    prefs: &P,
    owner: &str,
    meta: &ExportMeta,
    resolver: &AssetResolver,
    downloaded: &[DownloadedAsset],
    dest: &Path,
) -> Result<PackSummary>
where
    R: DatasetReader + ?Sized,
    P: PreferenceStore + ?Sized,
{
    let snapshot = codec::encode(reader, prefs, owner, meta)?;
    let assets = resolver.gather_for_backup(&snapshot, downloaded);
    debug!(records = snapshot.counts().total(), assets = assets.len(), "Packing backup");
    archive::pack(snapshot, &assets, dest)
}

/// Restore a backup archive for `owner`.
///
/// Images are extracted into a fresh directory under `staging_parent` and
/// only moved into the image directories once the records are committed.
/// The staging directory is removed whether or not the restore succeeds.
///
/// # Errors
///
/// Returns an error if the archive cannot be read, the document is not a
/// JSON object, the atomic block fails, or the restore is cancelled.
#[allow(clippy::too_many_arguments)]
pub fn restore_archive<S, P>(
    store: &mut S,
    prefs: &mut P,
    owner: &str,
    archive_path: &Path,
    dirs: &AssetDirs,
    staging_parent: &Path,
    progress: &mut dyn Progress,
    cancel: &CancelToken,
) -> Result<RestoreReport>
where
    S: RecordStore + ?Sized,
    P: PreferenceStore + ?Sized,
{
    let staging = new_staging_dir(staging_parent);
    let unpacked = match archive::unpack(archive_path, &staging) {
        Ok(unpacked) => unpacked,
        Err(e) => {
            if let Err(cleanup) = fs::remove_dir_all(&staging) {
                debug!(path = %staging.display(), error = %cleanup, "Staging cleanup failed");
            }
            Tracker::new(progress).fail(&e);
            return Err(e);
        }
    };

    let decoded = match codec::decode(&unpacked.document) {
        Ok(decoded) => decoded,
        Err(e) => {
            unpacked.cleanup();
            Tracker::new(progress).fail(&e);
            return Err(e);
        }
    };

    let mut restorer = Restorer::new(store, prefs, owner);
    let mut report = match restorer.apply(&decoded, progress, cancel) {
        Ok(report) => report,
        Err(e) => {
            unpacked.cleanup();
            return Err(e);
        }
    };

    let promoted = unpacked.promote(&dirs.image_dirs());
    report.relink = Some(restorer.relink(&decoded.snapshot, &promoted));
    unpacked.cleanup();

    info!(archive = %archive_path.display(), "Archive restored");
    Ok(report)
}

/// Write the bare backup document for `owner` to `dest`.
///
/// # Errors
///
/// Returns an error if reading the dataset or writing the file fails.
pub fn export_document<R, P>(
    reader: &R,
    prefs: &P,
    owner: &str,
    meta: &ExportMeta,
    dest: &Path,
) -> Result<usize>
where
    R: DatasetReader + ?Sized,
    P: PreferenceStore + ?Sized,
{
    let snapshot = codec::encode(reader, prefs, owner, meta)?;
    let records = snapshot.counts().total();
    atomic_write(dest, &codec::to_document(&snapshot)?)?;
    info!(path = %dest.display(), records, "Document exported");
    Ok(records)
}

/// Restore a bare backup document. Image references are left as they are.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not a JSON object, or
/// the restore fails.
pub fn import_document<S, P>(
    store: &mut S,
    prefs: &mut P,
    owner: &str,
    source: &Path,
    progress: &mut dyn Progress,
    cancel: &CancelToken,
) -> Result<RestoreReport>
where
    S: RecordStore + ?Sized,
    P: PreferenceStore + ?Sized,
{
    let bytes = read_file(source)?;
    Restorer::new(store, prefs, owner).restore_document(&bytes, progress, cancel)
}

/// Decode an archive or a bare document without applying it.
///
/// Zip archives are recognized by content, not by extension.
///
/// # Errors
///
/// Returns an error if the file cannot be read or decoded.
pub fn inspect(path: &Path) -> Result<Decoded> {
    let bytes = read_file(path)?;
    let document = if bytes.starts_with(b"PK\x03\x04") {
        archive::read_document(path)?
    } else {
        bytes
    };
    codec::decode(&document)
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    if !path.is_file() {
        return Err(Error::ArchiveNotFound {
            path: path.to_path_buf(),
        });
    }
    Ok(fs::read(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Product, Sale};
    use crate::storage::preferences::{MemoryPreferences, keys};
    use crate::storage::sqlite::SqliteStorage;
    use crate::storage::store::Batch;
    use crate::sync::progress::NoProgress;
    use tempfile::TempDir;

    fn seeded(photo: &Path) -> SqliteStorage {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let products = vec![Product {
            id: "p1".into(),
            name: "Rice".into(),
            photo_uri: Some(photo.to_string_lossy().into_owned()),
            ..Product::default()
        }];
        let sales = vec![Sale {
            id: "s1".into(),
            product_id: "p1".into(),
            ..Sale::default()
        }];
        storage
            .atomically("seed", &mut |tx| {
                tx.insert(Batch::Products(&products))?;
                tx.insert(Batch::Sales(&sales))
            })
            .unwrap();
        storage
    }

    #[test]
    fn test_archive_round_trip_relinks_photo() {
        let temp = TempDir::new().unwrap();
        let photo = temp.path().join("old/img1.jpg");
        fs::create_dir_all(photo.parent().unwrap()).unwrap();
        fs::write(&photo, b"jpeg-bytes").unwrap();

        let source = seeded(&photo);
        let prefs = MemoryPreferences::new();
        let source_dirs = AssetDirs::new(temp.path().join("src-cache"), temp.path().join("src-files"));
        let dest = temp.path().join("out/backup.zip");
        let summary = create_archive(
            &source,
            &prefs,
            "u1",
            &ExportMeta::current(),
            &AssetResolver::new(source_dirs),
            &[],
            &dest,
        )
        .unwrap();
        assert_eq!(summary.images, 1);

        let mut target = SqliteStorage::open_memory().unwrap();
        let mut target_prefs = MemoryPreferences::new();
        let dirs = AssetDirs::new(temp.path().join("cache"), temp.path().join("files"));
        let report = restore_archive(
            &mut target,
            &mut target_prefs,
            "u1",
            &dest,
            &dirs,
            &temp.path().join("staging"),
            &mut NoProgress,
            &CancelToken::never(),
        )
        .unwrap();

        assert_eq!(report.restored.products, 1);
        assert_eq!(report.relink.as_ref().unwrap().products, 1);
        let restored = dirs.image_dirs().inventory.join("img1.jpg");
        assert_eq!(fs::read(&restored).unwrap(), b"jpeg-bytes");
        assert_eq!(
            target.products().unwrap()[0].photo_uri.as_deref(),
            Some(restored.to_string_lossy().as_ref())
        );
        assert_eq!(fs::read_dir(temp.path().join("staging")).unwrap().count(), 0);
    }

    #[test]
    fn test_missing_archive_is_fatal_and_cleans_up() {
        let temp = TempDir::new().unwrap();
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut prefs = MemoryPreferences::new();
        let dirs = AssetDirs::new(temp.path().join("cache"), temp.path().join("files"));

        let result = restore_archive(
            &mut storage,
            &mut prefs,
            "u1",
            &temp.path().join("nope.zip"),
            &dirs,
            &temp.path().join("staging"),
            &mut NoProgress,
            &CancelToken::never(),
        );

        assert!(matches!(result, Err(Error::ArchiveNotFound { .. })));
        assert!(!temp.path().join("staging").exists()
            || fs::read_dir(temp.path().join("staging")).unwrap().count() == 0);
    }

    #[test]
    fn test_unreadable_archive_cleans_up_staging() {
        let temp = TempDir::new().unwrap();
        let bogus = temp.path().join("bogus.zip");
        fs::write(&bogus, b"not a zip").unwrap();
        let mut storage = SqliteStorage::open_memory().unwrap();
        let dirs = AssetDirs::new(temp.path().join("cache"), temp.path().join("files"));

        let result = restore_archive(
            &mut storage,
            &mut MemoryPreferences::new(),
            "u1",
            &bogus,
            &dirs,
            &temp.path().join("staging"),
            &mut NoProgress,
            &CancelToken::never(),
        );

        assert!(result.is_err());
        let leftovers = fs::read_dir(temp.path().join("staging")).map_or(0, Iterator::count);
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_export_import_document() {
        let temp = TempDir::new().unwrap();
        let source = seeded(Path::new("/data/app/img1.jpg"));
        let mut prefs = MemoryPreferences::new();
        prefs.put_string(keys::THEME, "dark").unwrap();
        let path = temp.path().join("backup.json");

        let records = export_document(&source, &prefs, "u1", &ExportMeta::current(), &path).unwrap();
        assert_eq!(records, 2);

        let mut target = SqliteStorage::open_memory().unwrap();
        let mut target_prefs = MemoryPreferences::new();
        let report = import_document(
            &mut target,
            &mut target_prefs,
            "u1",
            &path,
            &mut NoProgress,
            &CancelToken::never(),
        )
        .unwrap();

        assert_eq!(report.restored.sales, 1);
        assert!(report.relink.is_none());
        assert_eq!(
            target.products().unwrap()[0].photo_uri.as_deref(),
            Some("/data/app/img1.jpg")
        );
        assert_eq!(target_prefs.get_string(keys::THEME).as_deref(), Some("dark"));
    }

    #[test]
    fn test_inspect_reads_both_forms() {
        let temp = TempDir::new().unwrap();
        let source = seeded(Path::new("/data/app/img1.jpg"));
        let prefs = MemoryPreferences::new();
        let doc = temp.path().join("backup.json");
        let zip = temp.path().join("backup.zip");
        let dirs = AssetDirs::new(temp.path().join("cache"), temp.path().join("files"));

        export_document(&source, &prefs, "u1", &ExportMeta::current(), &doc).unwrap();
        create_archive(
            &source,
            &prefs,
            "u1",
            &ExportMeta::current(),
            &AssetResolver::new(dirs),
            &[],
            &zip,
        )
        .unwrap();

        assert_eq!(inspect(&doc).unwrap().snapshot.products.len(), 1);
        assert_eq!(inspect(&zip).unwrap().snapshot.sales.len(), 1);
        assert!(matches!(
            inspect(&temp.path().join("missing.json")),
            Err(Error::ArchiveNotFound { .. })
        ));
    }
}
