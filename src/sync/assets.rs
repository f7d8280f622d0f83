//! Asset resolution: find the image files a backup should carry.
//!
//! Images come from three places:
//! - local files referenced by products and the user profile
//! - remote objects referenced by URL, downloaded into the cache first
//! - loose image files in the app's cache and external directories

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use percent_encoding::percent_decode_str;
use serde::Serialize;
use tracing::{debug, warn};

use crate::model::Product;
use crate::remote::ObjectStorage;
use crate::sync::types::{AssetCategory, Snapshot};

/// Image extensions picked up by directory scans.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "bmp"];

const INVENTORY_DIR: &str = "inventory";

/// Directories the app stores images in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetDirs {
    pub cache: PathBuf,
    pub external: PathBuf,
}

impl AssetDirs {
    #[must_use]
    pub fn new(cache: impl Into<PathBuf>, external: impl Into<PathBuf>) -> Self {
        Self {
            cache: cache.into(),
            external: external.into(),
        }
    }

    /// Where downloaded product photos are written.
    #[must_use]
    pub fn download_dir(&self) -> PathBuf {
        self.cache.join(INVENTORY_DIR)
    }

    /// Final locations for images recovered from an archive.
    #[must_use]
    pub fn image_dirs(&self) -> ImageDirs {
        ImageDirs {
            inventory: self.external.join(INVENTORY_DIR),
            profile: self.external.clone(),
            business: self.external.clone(),
        }
    }
}

/// Destination directory per asset category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDirs {
    pub inventory: PathBuf,
    pub profile: PathBuf,
    pub business: PathBuf,
}

impl ImageDirs {
    #[must_use]
    pub fn dir(&self, category: AssetCategory) -> &Path {
        match category {
            AssetCategory::Inventory => &self.inventory,
            AssetCategory::Profile => &self.profile,
            AssetCategory::Business => &self.business,
        }
    }
}

/// An image found on disk by a directory scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalAsset {
    pub category: AssetCategory,
    pub path: PathBuf,
}

/// A product photo fetched from remote storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedAsset {
    pub product_id: String,
    pub path: PathBuf,
}

/// What an image to pack is referenced by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetRole {
    /// Photo of every listed product. Products may share one file.
    Products(Vec<String>),
    /// The signed-in user's own profile photo or business logo.
    UserImage,
    /// Found by a directory scan; nothing references it.
    Loose,
}

/// An image to put in an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackAsset {
    pub category: AssetCategory,
    pub path: PathBuf,
    pub role: AssetRole,
}

/// Whether a file name has an allow-listed image extension.
#[must_use]
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|e| e.eq_ignore_ascii_case(ext)))
}

/// Category implied by a file name found in a generic directory.
#[must_use]
pub fn classify(file_name: &str) -> AssetCategory {
    let name = file_name.to_ascii_lowercase();
    if name.contains("profile") {
        AssetCategory::Profile
    } else if name.contains("company_logo") || name.contains("business") {
        AssetCategory::Business
    } else {
        AssetCategory::Inventory
    }
}

/// Local filesystem path for a reference, if it is one.
///
/// Accepts absolute paths and `file://` URIs; anything else (remote URLs,
/// content URIs, relative names) is not local.
#[must_use]
pub fn local_path(reference: &str) -> Option<PathBuf> {
    let raw = reference.strip_prefix("file://").unwrap_or(reference);
    let path = Path::new(raw);
    path.is_absolute().then(|| path.to_path_buf())
}

/// Whether a reference is an http(s) URL on the configured storage domain.
///
/// An empty domain accepts any object-storage style URL.
#[must_use]
pub fn is_remote_reference(reference: &str, storage_domain: &str) -> bool {
    let lower = reference.to_ascii_lowercase();
    (lower.starts_with("http://") || lower.starts_with("https://"))
        && reference.contains("/o/")
        && (storage_domain.is_empty() || reference.contains(storage_domain))
}

/// Object path encoded in a storage URL: the part after `/o/`, up to the
/// query string, percent-decoded.
#[must_use]
pub fn object_path_from_url(url: &str) -> Option<String> {
    let (_, rest) = url.split_once("/o/")?;
    let encoded = rest.split('?').next().unwrap_or(rest);
    if encoded.is_empty() {
        return None;
    }
    let decoded = percent_decode_str(encoded).decode_utf8().ok()?;
    Some(decoded.into_owned())
}

/// Scans, downloads and assembles the image set for a backup.
#[derive(Debug, Clone)]
pub struct AssetResolver {
    dirs: AssetDirs,
}

impl AssetResolver {
    #[must_use]
    pub fn new(dirs: AssetDirs) -> Self {
        Self { dirs }
    }

    #[must_use]
    pub fn dirs(&self) -> &AssetDirs {
        &self.dirs
    }

    /// Image files sitting in the cache and external directories.
    ///
    /// Files in the generic directories are classified by name; files in
    /// the inventory sub-directories are always inventory images. Scans are
    /// not recursive. Results are de-duplicated by canonical path and
    /// sorted.
    #[must_use]
    pub fn list_local_candidates(&self) -> Vec<LocalAsset> {
        let scans = [
            (self.dirs.cache.clone(), None),
            (self.dirs.external.clone(), None),
            (self.dirs.cache.join(INVENTORY_DIR), Some(AssetCategory::Inventory)),
            (self.dirs.external.join(INVENTORY_DIR), Some(AssetCategory::Inventory)),
        ];

        let mut seen = HashSet::new();
        let mut found = Vec::new();
        for (dir, fixed) in scans {
            let Ok(entries) = fs::read_dir(&dir) else {
                debug!(dir = %dir.display(), "Asset directory not readable; skipping");
                continue;
            };

            for entry in entries.flatten() {
                let path = entry.path();
                if !path.is_file() || !is_image_file(&path) {
                    continue;
                }
                let canonical = fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
                if !seen.insert(canonical.clone()) {
                    continue;
                }
                let category = fixed.unwrap_or_else(|| {
                    classify(&entry.file_name().to_string_lossy())
                });
                found.push(LocalAsset {
                    category,
                    path: canonical,
                });
            }
        }

        found.sort_by(|a, b| a.path.cmp(&b.path));
        found
    }

    /// Fetch product photos that live in remote storage.
    ///
    /// Runs sequentially. A failed download is logged and skipped; progress
    /// is reported after every attempt as `(done, total)`.
    pub async fn download_remote_assets<S, F>(
        &self,
        storage: &S,
        storage_domain: &str,
        products: &[Product],
        mut progress: F,
    ) -> Vec<DownloadedAsset>
    where
        S: ObjectStorage + ?Sized,
        F: FnMut(usize, usize),
    {
        let targets: Vec<(&Product, String)> = products
            .iter()
            .filter_map(|product| {
                let uri = product.photo_uri.as_deref()?;
                if !is_remote_reference(uri, storage_domain) {
                    return None;
                }
                Some((product, object_path_from_url(uri)?))
            })
            .collect();

        let total = targets.len();
        let dir = self.dirs.download_dir();
        let mut downloaded = Vec::with_capacity(total);

        for (done, (product, object_path)) in targets.into_iter().enumerate() {
            match storage.fetch_object(&object_path).await {
                Ok(bytes) => {
                    let path = dir.join(download_file_name(&product.id, &object_path));
                    match fs::create_dir_all(&dir).and_then(|()| fs::write(&path, &bytes)) {
                        Ok(()) => {
                            debug!(product = %product.id, path = %path.display(), "Downloaded photo");
                            downloaded.push(DownloadedAsset {
                                product_id: product.id.clone(),
                                path,
                            });
                        }
                        Err(e) => {
                            warn!(product = %product.id, error = %e, "Failed to save downloaded photo");
                        }
                    }
                }
                Err(e) => {
                    warn!(product = %product.id, object = %object_path, error = %e, "Failed to download photo");
                }
            }
            progress(done + 1, total);
        }

        downloaded
    }

    /// Build the list of images to pack for `snapshot`.
    ///
    /// Order: product photos (downloaded copy preferred over the local
    /// reference), profile photo, business logo, then every scanned
    /// candidate not already included. A file shared by several products
    /// appears once, owned by all of them.
    #[must_use]
    pub fn gather_for_backup(
        &self,
        snapshot: &Snapshot,
        downloaded: &[DownloadedAsset],
    ) -> Vec<PackAsset> {
        let mut seen: HashMap<PathBuf, usize> = HashMap::new();
        let mut assets: Vec<PackAsset> = Vec::new();
        let mut push = |category, path: PathBuf, role: AssetRole| {
            let key = fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
            if let Some(&index) = seen.get(&key) {
                if let (AssetRole::Products(owners), AssetRole::Products(more)) =
                    (&mut assets[index].role, role)
                {
                    owners.extend(more);
                }
                return;
            }
            seen.insert(key, assets.len());
            assets.push(PackAsset {
                category,
                path,
                role,
            });
        };

        for product in &snapshot.products {
            let source = downloaded
                .iter()
                .find(|d| d.product_id == product.id)
                .map(|d| d.path.clone())
                .or_else(|| {
                    product
                        .photo_uri
                        .as_deref()
                        .and_then(local_path)
                        .filter(|p| p.is_file())
                });
            if let Some(path) = source {
                push(
                    AssetCategory::Inventory,
                    path,
                    AssetRole::Products(vec![product.id.clone()]),
                );
            }
        }

        if let Some(user) = &snapshot.user {
            let profile = user.profile_photo.as_deref().and_then(local_path);
            if let Some(path) = profile.filter(|p| p.is_file()) {
                push(AssetCategory::Profile, path, AssetRole::UserImage);
            }
            let logo = user.business_logo.as_deref().and_then(local_path);
            if let Some(path) = logo.filter(|p| p.is_file()) {
                push(AssetCategory::Business, path, AssetRole::UserImage);
            }
        }

        for candidate in self.list_local_candidates() {
            push(candidate.category, candidate.path, AssetRole::Loose);
        }

        assets
    }
}

/// `product_<id>.<ext>`, keeping the object's extension when it is an image.
fn download_file_name(product_id: &str, object_path: &str) -> String {
    let ext = Path::new(object_path)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| IMAGE_EXTENSIONS.iter().any(|known| known.eq_ignore_ascii_case(e)))
        .map_or_else(|| "jpg".to_string(), str::to_ascii_lowercase);
    let safe_id: String = product_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("product_{safe_id}.{ext}")
}
