//! Types shared by the backup and restore pipeline.
//!
//! The [`Snapshot`] is the in-memory form of a backup document. It is built
//! fresh for each operation and moved between codec, packager and restorer.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::model::wire::{now_millis, timestamp};
use crate::model::{
    Collection, CollectionItem, Customer, CustomCategory, EntityKind, Expense, Invoice, Product,
    Sale, StockMovement, UserProfile,
};

/// Document format version written by this build.
pub const SNAPSHOT_VERSION: u32 = 2;

/// A complete, portable copy of the dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub version: u32,
    pub created_at: i64,
    pub products: Vec<Product>,
    pub customers: Vec<Customer>,
    pub sales: Vec<Sale>,
    pub expenses: Vec<Expense>,
    pub collections: Vec<Collection>,
    pub collection_items: Vec<CollectionItem>,
    pub invoices: Vec<Invoice>,
    pub stock_movements: Vec<StockMovement>,
    pub custom_categories: Vec<CustomCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserProfile>,
    pub settings: BTreeMap<String, serde_json::Value>,
    pub metadata: SnapshotMetadata,
    /// Product id to image file name inside the archive.
    pub product_photos: BTreeMap<String, String>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            created_at: now_millis(),
            products: Vec::new(),
            customers: Vec::new(),
            sales: Vec::new(),
            expenses: Vec::new(),
            collections: Vec::new(),
            collection_items: Vec::new(),
            invoices: Vec::new(),
            stock_movements: Vec::new(),
            custom_categories: Vec::new(),
            user: None,
            settings: BTreeMap::new(),
            metadata: SnapshotMetadata::default(),
            product_photos: BTreeMap::new(),
        }
    }
}

impl Snapshot {
    /// Record counts per entity list.
    #[must_use]
    pub fn counts(&self) -> EntityCounts {
        EntityCounts {
            products: self.products.len(),
            customers: self.customers.len(),
            sales: self.sales.len(),
            expenses: self.expenses.len(),
            collections: self.collections.len(),
            collection_items: self.collection_items.len(),
            invoices: self.invoices.len(),
            stock_movements: self.stock_movements.len(),
            custom_categories: self.custom_categories.len(),
        }
    }
}

/// Descriptive metadata carried with a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SnapshotMetadata {
    pub app_version: String,
    pub user_email: String,
    #[serde(deserialize_with = "timestamp")]
    pub backup_timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_photo_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_logo_file: Option<String>,
    /// Archive entry name to hex SHA-256 of its bytes.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub asset_digests: BTreeMap<String, String>,
}

impl Default for SnapshotMetadata {
    fn default() -> Self {
        Self {
            app_version: String::new(),
            user_email: String::new(),
            backup_timestamp: now_millis(),
            profile_photo_file: None,
            business_logo_file: None,
            asset_digests: BTreeMap::new(),
        }
    }
}

/// Number of records per entity list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EntityCounts {
    pub products: usize,
    pub customers: usize,
    pub sales: usize,
    pub expenses: usize,
    pub collections: usize,
    pub collection_items: usize,
    pub invoices: usize,
    pub stock_movements: usize,
    pub custom_categories: usize,
}

impl EntityCounts {
    /// Returns total number of records.
    #[must_use]
    pub fn total(&self) -> usize {
        self.products
            + self.customers
            + self.sales
            + self.expenses
            + self.collections
            + self.collection_items
            + self.invoices
            + self.stock_movements
            + self.custom_categories
    }
}

/// Why a record was left out of a decoded snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    /// The list element is not a JSON object.
    NotAnObject,
    /// No `id`, or an empty one.
    MissingId,
    /// An earlier record in the same list has this id.
    DuplicateId,
    /// A field has the wrong type or an unparsable value.
    Malformed(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAnObject => write!(f, "not an object"),
            Self::MissingId => write!(f, "missing id"),
            Self::DuplicateId => write!(f, "duplicate id"),
            Self::Malformed(detail) => write!(f, "{detail}"),
        }
    }
}

/// A record skipped while decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordError {
    pub entity: EntityKind,
    /// Position in the document's list.
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub reason: SkipReason,
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "{} #{} ({id}): {}", self.entity, self.index, self.reason),
            None => write!(f, "{} #{}: {}", self.entity, self.index, self.reason),
        }
    }
}

/// Output of decoding: the usable snapshot plus everything that was skipped.
#[derive(Debug, Clone)]
pub struct Decoded {
    pub snapshot: Snapshot,
    pub errors: Vec<RecordError>,
}

impl Decoded {
    /// Number of skipped records of one kind.
    #[must_use]
    pub fn skipped(&self, kind: EntityKind) -> usize {
        self.errors.iter().filter(|e| e.entity == kind).count()
    }
}

/// Kind of image carried in an archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetCategory {
    Inventory,
    Profile,
    Business,
}

impl AssetCategory {
    pub const ALL: [Self; 3] = [Self::Inventory, Self::Profile, Self::Business];

    /// Directory name under `images/` in the archive.
    #[must_use]
    pub const fn dir_name(&self) -> &'static str {
        match self {
            Self::Inventory => "inventory",
            Self::Profile => "profile",
            Self::Business => "business",
        }
    }

    #[must_use]
    pub fn from_dir_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.dir_name() == name)
    }
}

impl fmt::Display for AssetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Result of writing an archive.
#[derive(Debug, Clone, Serialize)]
pub struct PackSummary {
    pub path: PathBuf,
    pub images: usize,
    /// Assets left out (missing source file or duplicate entry name).
    pub skipped_assets: usize,
    pub bytes: u64,
    pub records: EntityCounts,
}

/// Result of re-pointing image references after an archive restore.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RelinkStats {
    /// Products whose photo now points at a restored file.
    pub products: usize,
    /// Side-table entries whose file was not in the archive.
    pub missing: usize,
    pub profile_photo: bool,
    pub business_logo: bool,
}

/// Result of applying a snapshot to storage.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RestoreReport {
    /// Records written inside the transaction.
    pub restored: EntityCounts,
    /// Records dropped by the decoder.
    pub skipped_records: usize,
    /// Collections or items rejected by storage during one-by-one retry.
    pub skipped_collections: usize,
    pub skipped_collection_items: usize,
    pub categories_inserted: usize,
    pub categories_updated: usize,
    pub categories_failed: usize,
    /// Post-transaction steps that failed, by name.
    pub failed_steps: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relink: Option<RelinkStats>,
}

impl RestoreReport {
    /// Whether anything was skipped or failed along the way.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.skipped_records == 0
            && self.skipped_collections == 0
            && self.skipped_collection_items == 0
            && self.categories_failed == 0
            && self.failed_steps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_counts() {
        let mut counts = EntityCounts::default();
        assert_eq!(counts.total(), 0);

        counts.products = 5;
        counts.sales = 3;
        assert_eq!(counts.total(), 8);
    }

    #[test]
    fn test_record_error_display() {
        let err = RecordError {
            entity: EntityKind::Sale,
            index: 2,
            id: Some("s9".into()),
            reason: SkipReason::Malformed("invalid type: string".into()),
        };
        assert_eq!(err.to_string(), "sale #2 (s9): invalid type: string");
    }

    #[test]
    fn test_asset_category_dir_names() {
        for category in AssetCategory::ALL {
            assert_eq!(AssetCategory::from_dir_name(category.dir_name()), Some(category));
        }
        assert_eq!(AssetCategory::from_dir_name("other"), None);
    }

    #[test]
    fn test_report_clean() {
        let mut report = RestoreReport::default();
        assert!(report.is_clean());
        report.failed_steps.push("settings".into());
        assert!(!report.is_clean());
    }
}
