//! Archive packaging: a backup document plus its images in one zip file.
//!
//! Layout:
//! ```text
//! backup.json
//! images/inventory/<file>
//! images/profile/<file>
//! images/business/<file>
//! ```
//!
//! Entries may appear in any order. Unpacking extracts into a private
//! staging directory; nothing touches the shared image directories until
//! [`Unpacked::promote`] is called.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{Error, Result};
use crate::sync::assets::{AssetRole, ImageDirs, PackAsset, is_image_file};
use crate::sync::codec::to_document;
use crate::sync::file::{atomic_write_with, file_size, move_file};
use crate::sync::hash::{file_hash, has_changed};
use crate::sync::types::{AssetCategory, PackSummary, Snapshot};

/// Name of the document entry.
pub const DOCUMENT_ENTRY: &str = "backup.json";

const IMAGES_PREFIX: &str = "images";

/// Entry name for an image.
#[must_use]
pub fn image_entry_name(category: AssetCategory, file_name: &str) -> String {
    format!("{IMAGES_PREFIX}/{}/{file_name}", category.dir_name())
}

/// Category and file name of an `images/<category>/<file>` entry.
fn parse_image_entry(name: &str) -> Option<(AssetCategory, &str)> {
    let parts: Vec<&str> = name.split('/').filter(|p| !p.is_empty()).collect();
    match parts.as_slice() {
        [IMAGES_PREFIX, category, file] => Some((AssetCategory::from_dir_name(category)?, *file)),
        _ => None,
    }
}

/// A fresh, uniquely named staging directory under `parent`.
#[must_use]
pub fn new_staging_dir(parent: &Path) -> PathBuf {
    parent.join(format!("restore-{}", uuid::Uuid::new_v4()))
}

struct PlannedImage {
    entry: String,
    source: PathBuf,
}

/// Write `snapshot` and `assets` into a zip archive at `dest`.
///
/// Fills the snapshot's photo side-table, profile/business file names and
/// per-entry digests before serializing it. Only [`AssetRole::UserImage`]
/// assets name the profile photo and business logo, and the first one wins.
/// Missing source files and entry names reused for different content are
/// skipped with a warning. The archive appears
/// at `dest` only once fully written.
///
/// # Errors
///
/// Returns an error if the archive cannot be written.
pub fn pack(mut snapshot: Snapshot, assets: &[PackAsset], dest: &Path) -> Result<PackSummary> {
    snapshot.product_photos.clear();
    snapshot.metadata.profile_photo_file = None;
    snapshot.metadata.business_logo_file = None;
    snapshot.metadata.asset_digests.clear();

    let mut planned = Vec::new();
    let mut entries: HashMap<String, String> = HashMap::new();
    let mut skipped_assets = 0;

    for asset in assets {
        let Some(file_name) = asset
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
        else {
            warn!(path = %asset.path.display(), "Asset has no usable file name; skipping");
            skipped_assets += 1;
            continue;
        };

        if !asset.path.is_file() {
            warn!(path = %asset.path.display(), "Asset file missing; skipping");
            skipped_assets += 1;
            continue;
        }

        let digest = match file_hash(&asset.path) {
            Ok(digest) => digest,
            Err(e) => {
                warn!(path = %asset.path.display(), error = %e, "Asset unreadable; skipping");
                skipped_assets += 1;
                continue;
            }
        };

        // Identical content under the same entry is packed once but still
        // recorded for its owners.
        let entry = image_entry_name(asset.category, &file_name);
        match entries.get(&entry) {
            Some(existing) if *existing == digest => {}
            Some(_) => {
                warn!(entry = %entry, path = %asset.path.display(), "Duplicate archive entry; skipping");
                skipped_assets += 1;
                continue;
            }
            None => {
                entries.insert(entry.clone(), digest.clone());
                snapshot.metadata.asset_digests.insert(entry.clone(), digest);
                planned.push(PlannedImage {
                    entry,
                    source: asset.path.clone(),
                });
            }
        }

        match (&asset.role, asset.category) {
            (AssetRole::Products(owners), AssetCategory::Inventory) => {
                for owner in owners {
                    snapshot.product_photos.insert(owner.clone(), file_name.clone());
                }
            }
            (AssetRole::UserImage, AssetCategory::Profile)
                if snapshot.metadata.profile_photo_file.is_none() =>
            {
                snapshot.metadata.profile_photo_file = Some(file_name);
            }
            (AssetRole::UserImage, AssetCategory::Business)
                if snapshot.metadata.business_logo_file.is_none() =>
            {
                snapshot.metadata.business_logo_file = Some(file_name);
            }
            _ => {}
        }
    }

    let document = to_document(&snapshot)?;

    atomic_write_with(dest, |writer| {
        let mut zip = ZipWriter::new(writer);
        let doc_options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(0o644);
        zip.start_file(DOCUMENT_ENTRY, doc_options)?;
        io::Write::write_all(&mut zip, &document)?;

        // Images are already compressed.
        let image_options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Stored)
            .unix_permissions(0o644);
        for image in &planned {
            let mut input = File::open(&image.source)?;
            zip.start_file(image.entry.as_str(), image_options)?;
            io::copy(&mut input, &mut zip)?;
        }

        let _writer = zip.finish()?;
        Ok(())
    })?;

    let summary = PackSummary {
        path: dest.to_path_buf(),
        images: planned.len(),
        skipped_assets,
        bytes: file_size(dest),
        records: snapshot.counts(),
    };
    info!(
        path = %dest.display(),
        images = summary.images,
        skipped = summary.skipped_assets,
        bytes = summary.bytes,
        "Archive written"
    );
    Ok(summary)
}

/// Contents of an unpacked archive, staged on disk.
#[derive(Debug)]
pub struct Unpacked {
    /// Raw bytes of the backup document.
    pub document: Vec<u8>,
    /// Staged image paths per category.
    pub extracted: BTreeMap<AssetCategory, Vec<PathBuf>>,
    staging: PathBuf,
}

impl Unpacked {
    #[must_use]
    pub fn staging(&self) -> &Path {
        &self.staging
    }

    #[must_use]
    pub fn image_count(&self) -> usize {
        self.extracted.values().map(Vec::len).sum()
    }

    /// Move staged images into their final directories.
    ///
    /// Existing files with the same name are replaced. A file that cannot
    /// be moved is logged and left out of the result.
    #[must_use]
    pub fn promote(&self, dirs: &ImageDirs) -> BTreeMap<AssetCategory, Vec<PathBuf>> {
        let mut promoted: BTreeMap<AssetCategory, Vec<PathBuf>> = BTreeMap::new();
        for (category, paths) in &self.extracted {
            let target_dir = dirs.dir(*category);
            for path in paths {
                let Some(name) = path.file_name() else {
                    continue;
                };
                let target = target_dir.join(name);
                match move_file(path, &target) {
                    Ok(()) => promoted.entry(*category).or_default().push(target),
                    Err(e) => {
                        warn!(from = %path.display(), to = %target.display(), error = %e, "Failed to promote image");
                    }
                }
            }
        }
        promoted
    }

    /// Remove the staging directory and anything left in it.
    pub fn cleanup(self) {
        if let Err(e) = fs::remove_dir_all(&self.staging) {
            debug!(path = %self.staging.display(), error = %e, "Staging cleanup failed");
        }
    }
}

fn open_archive(archive: &Path) -> Result<ZipArchive<BufReader<File>>> {
    if !archive.is_file() {
        return Err(Error::ArchiveNotFound {
            path: archive.to_path_buf(),
        });
    }
    let file = File::open(archive)?;
    Ok(ZipArchive::new(BufReader::new(file))?)
}

/// Read only the document entry of an archive.
///
/// # Errors
///
/// Returns an error if the archive is missing, is not a zip file, or has no
/// readable document entry.
pub fn read_document(archive: &Path) -> Result<Vec<u8>> {
    let mut zip = open_archive(archive)?;
    let mut entry = zip.by_name(DOCUMENT_ENTRY).map_err(|_| Error::DocumentMissing {
        path: archive.to_path_buf(),
        entry: DOCUMENT_ENTRY.to_string(),
    })?;
    let mut document = Vec::new();
    entry
        .read_to_end(&mut document)
        .map_err(|e| Error::InvalidArchive(format!("unreadable {DOCUMENT_ENTRY}: {e}")))?;
    Ok(document)
}

/// Extract an archive into `staging`.
///
/// Entries are handled in whatever order they appear. Unsafe paths are
/// refused, unknown entries ignored, and a corrupt image entry is skipped.
/// Once every entry has been read, images are checked against the digests
/// recorded in the document and mismatches are dropped.
///
/// # Errors
///
/// Returns [`Error::ArchiveNotFound`] when `archive` does not exist,
/// [`Error::InvalidArchive`] when it is not a readable zip file or its
/// document entry is corrupt, and [`Error::DocumentMissing`] when it has no
/// document entry.
pub fn unpack(archive: &Path, staging: &Path) -> Result<Unpacked> {
    let mut zip = open_archive(archive)?;
    let mut document = None;
    let mut staged: BTreeMap<AssetCategory, Vec<(String, PathBuf)>> = BTreeMap::new();

    for index in 0..zip.len() {
        let mut entry = match zip.by_index(index) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(index, error = %e, "Unreadable archive entry; skipping");
                continue;
            }
        };
        if entry.is_dir() {
            continue;
        }
        if entry.enclosed_name().is_none() {
            warn!(entry = %entry.name(), "Refused unsafe archive entry path");
            continue;
        }
        let name = entry.name().to_string();

        if name == DOCUMENT_ENTRY {
            let mut buf = Vec::new();
            entry
                .read_to_end(&mut buf)
                .map_err(|e| Error::InvalidArchive(format!("unreadable {DOCUMENT_ENTRY}: {e}")))?;
            document = Some(buf);
            continue;
        }

        let Some((category, file_name)) = parse_image_entry(&name) else {
            debug!(entry = %name, "Ignoring unknown archive entry");
            continue;
        };
        if !is_image_file(Path::new(file_name)) {
            debug!(entry = %name, "Ignoring non-image entry");
            continue;
        }

        let target_dir = staging.join(IMAGES_PREFIX).join(category.dir_name());
        fs::create_dir_all(&target_dir)?;
        let target = target_dir.join(file_name);
        let written = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&target)
            .and_then(|mut out| io::copy(&mut entry, &mut out));

        match written {
            Ok(bytes) => {
                debug!(entry = %name, bytes, "Extracted image");
                let list = staged.entry(category).or_default();
                list.retain(|(_, path)| path != &target);
                list.push((name, target));
            }
            Err(e) => {
                warn!(entry = %name, error = %e, "Corrupt image entry; skipping");
                if let Err(e) = fs::remove_file(&target) {
                    debug!(path = %target.display(), error = %e, "Partial image cleanup failed");
                }
            }
        }
    }

    let document = document.ok_or_else(|| Error::DocumentMissing {
        path: archive.to_path_buf(),
        entry: DOCUMENT_ENTRY.to_string(),
    })?;

    let digests = recorded_digests(&document);
    let mut extracted: BTreeMap<AssetCategory, Vec<PathBuf>> = BTreeMap::new();
    for (category, files) in staged {
        for (entry, path) in files {
            let expected = digests.get(&entry).map(String::as_str);
            let verified = match file_hash(&path) {
                Ok(actual) => !has_changed(&actual, expected),
                Err(_) => false,
            };
            if verified {
                extracted.entry(category).or_default().push(path);
            } else {
                warn!(entry = %entry, "Image does not match its recorded digest; dropping");
                if let Err(e) = fs::remove_file(&path) {
                    debug!(path = %path.display(), error = %e, "Rejected image cleanup failed");
                }
            }
        }
    }

    let unpacked = Unpacked {
        document,
        extracted,
        staging: staging.to_path_buf(),
    };
    info!(
        archive = %archive.display(),
        images = unpacked.image_count(),
        "Archive unpacked"
    );
    Ok(unpacked)
}

/// `metadata.assetDigests` of a document, read leniently. A document that
/// does not parse yields no digests; decoding reports it properly later.
fn recorded_digests(document: &[u8]) -> BTreeMap<String, String> {
    serde_json::from_slice::<serde_json::Value>(document)
        .ok()
        .and_then(|doc| doc.get("metadata")?.get("assetDigests").cloned())
        .and_then(|digests| serde_json::from_value(digests).ok())
        .unwrap_or_default()
}
