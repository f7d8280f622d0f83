//! Snapshot codec: dataset to document and back.
//!
//! Encoding reads every entity list through a [`DatasetReader`] and the
//! plain settings from a [`PreferenceStore`]. Decoding is tolerant: only a
//! document that is not a JSON object is fatal. Each record is decoded on
//! its own, and a bad record is skipped and reported instead of failing the
//! whole document.

use std::collections::{BTreeMap, HashSet};

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::model::wire::{EpochOrIso, now_millis};
use crate::model::{Entity, EntityKind, UserProfile};
use crate::storage::preferences::{PreferenceStore, keys};
use crate::storage::store::DatasetReader;
use crate::sync::types::{
    Decoded, RecordError, SNAPSHOT_VERSION, SkipReason, Snapshot, SnapshotMetadata,
};

/// Descriptive values stamped into a new snapshot.
#[derive(Debug, Clone, Default)]
pub struct ExportMeta {
    pub app_version: String,
    /// Falls back to the stored user's email when absent.
    pub user_email: Option<String>,
}

impl ExportMeta {
    #[must_use]
    pub fn current() -> Self {
        Self {
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            user_email: None,
        }
    }
}

/// Build a snapshot of everything `owner` can see.
///
/// Output is deterministic for a given dataset: readers return rows ordered
/// by id and maps are ordered by key.
///
/// # Errors
///
/// Returns an error if any read fails.
pub fn encode<R, P>(reader: &R, prefs: &P, owner: &str, meta: &ExportMeta) -> Result<Snapshot>
where
    R: DatasetReader + ?Sized,
    P: PreferenceStore + ?Sized,
{
    let user = reader.user(owner)?;
    let user_email = meta
        .user_email
        .clone()
        .or_else(|| user.as_ref().map(|u| u.email.clone()))
        .or_else(|| prefs.get_string(keys::PROFILE_EMAIL))
        .unwrap_or_default();

    let settings: BTreeMap<String, Value> = prefs
        .entries()
        .into_iter()
        .filter(|(key, _)| keys::is_setting(key))
        .collect();

    let now = now_millis();
    let snapshot = Snapshot {
        version: SNAPSHOT_VERSION,
        created_at: now,
        products: reader.products()?,
        customers: reader.customers()?,
        sales: reader.sales()?,
        expenses: reader.expenses()?,
        collections: reader.collections(owner)?,
        collection_items: reader.collection_items(owner)?,
        invoices: reader.invoices()?,
        stock_movements: reader.stock_movements()?,
        custom_categories: reader.custom_categories(owner)?,
        user,
        settings,
        metadata: SnapshotMetadata {
            app_version: meta.app_version.clone(),
            user_email,
            backup_timestamp: now,
            ..SnapshotMetadata::default()
        },
        product_photos: BTreeMap::new(),
    };

    debug!(records = snapshot.counts().total(), "Encoded snapshot");
    Ok(snapshot)
}

/// Serialize a snapshot to its JSON document form.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn to_document(snapshot: &Snapshot) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(snapshot)?)
}

/// Parse a JSON document into a snapshot, skipping malformed records.
///
/// # Errors
///
/// Returns [`Error::InvalidDocument`] when the bytes are not a JSON object.
pub fn decode(bytes: &[u8]) -> Result<Decoded> {
    let root: Value =
        serde_json::from_slice(bytes).map_err(|e| Error::InvalidDocument(e.to_string()))?;
    let Value::Object(mut root) = root else {
        return Err(Error::InvalidDocument(
            "top level is not a JSON object".to_string(),
        ));
    };

    let version = document_version(root.get("version"));
    if version > SNAPSHOT_VERSION {
        warn!(
            version,
            supported = SNAPSHOT_VERSION,
            "Backup was written by a newer version; decoding what is understood"
        );
    }

    let created_at = root
        .get("createdAt")
        .and_then(|v| serde_json::from_value::<EpochOrIso>(v.clone()).ok())
        .and_then(|t| t.to_millis().ok())
        .unwrap_or_else(now_millis);

    let mut errors = Vec::new();
    let mut take = |key: &str| root.remove(key);

    let products = decode_list(take("products"), &mut errors);
    let customers = decode_list(take("customers"), &mut errors);
    let sales = decode_list(take("sales"), &mut errors);
    let expenses = decode_list(take("expenses"), &mut errors);
    let collections = decode_list(take("collections"), &mut errors);
    let collection_items = decode_list(take("collectionItems"), &mut errors);
    let invoices = decode_list(take("invoices"), &mut errors);
    let stock_movements = decode_list(take("stockMovements"), &mut errors);
    let custom_categories = decode_list(take("customCategories"), &mut errors);
    let user = decode_user(take("user"), &mut errors);
    let settings = decode_settings(take("settings"));
    let mut metadata_raw = take("metadata");
    let top_level_photos = take("productPhotos");

    let legacy_photos = match &mut metadata_raw {
        Some(Value::Object(meta)) => meta.remove("productPhotos"),
        _ => None,
    };
    let product_photos = decode_photo_table(top_level_photos)
        .or_else(|| decode_photo_table(legacy_photos))
        .unwrap_or_default();
    let metadata = decode_metadata(metadata_raw);

    let snapshot = Snapshot {
        version,
        created_at,
        products,
        customers,
        sales,
        expenses,
        collections,
        collection_items,
        invoices,
        stock_movements,
        custom_categories,
        user,
        settings,
        metadata,
        product_photos,
    };

    debug!(
        records = snapshot.counts().total(),
        skipped = errors.len(),
        "Decoded snapshot"
    );
    Ok(Decoded { snapshot, errors })
}

/// Documents without a version predate versioning and count as 1.
fn document_version(value: Option<&Value>) -> u32 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    };
    parsed
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(1)
}

/// Drop `null` members recursively so they fall back to field defaults.
fn strip_nulls(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|_, v| !v.is_null());
            map.values_mut().for_each(strip_nulls);
        }
        Value::Array(items) => items.iter_mut().for_each(strip_nulls),
        _ => {}
    }
}

/// Id (when known) and reason of a rejected record.
type Rejection = (Option<String>, SkipReason);

/// Decode one record, or say why it cannot be used.
fn decode_record<T: Entity>(mut value: Value) -> std::result::Result<T, Rejection> {
    strip_nulls(&mut value);
    let Value::Object(map) = &value else {
        return Err((None, SkipReason::NotAnObject));
    };

    let id = match map.get("id") {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        Some(Value::String(_)) | None => return Err((None, SkipReason::MissingId)),
        Some(other) => {
            let detail = format!("id is not a string: {other}");
            return Err((None, SkipReason::Malformed(detail)));
        }
    };

    serde_json::from_value::<T>(value).map_err(|e| (id, SkipReason::Malformed(e.to_string())))
}

fn decode_list<T: Entity>(value: Option<Value>, errors: &mut Vec<RecordError>) -> Vec<T> {
    let items = match value {
        None | Some(Value::Null) => return Vec::new(),
        Some(Value::Array(items)) => items,
        Some(_) => {
            warn!(entity = %T::KIND, "Expected a list; ignoring");
            errors.push(RecordError {
                entity: T::KIND,
                index: 0,
                id: None,
                reason: SkipReason::Malformed("expected a list".to_string()),
            });
            return Vec::new();
        }
    };

    let mut seen = HashSet::new();
    let mut records = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let outcome = decode_record::<T>(item).and_then(|record| {
            if seen.insert(record.id().to_string()) {
                Ok(record)
            } else {
                Err((Some(record.id().to_string()), SkipReason::DuplicateId))
            }
        });

        match outcome {
            Ok(record) => records.push(record),
            Err((id, reason)) => {
                warn!(entity = %T::KIND, index, id = ?id, %reason, "Skipping record");
                errors.push(RecordError {
                    entity: T::KIND,
                    index,
                    id,
                    reason,
                });
            }
        }
    }
    records
}

fn decode_user(value: Option<Value>, errors: &mut Vec<RecordError>) -> Option<UserProfile> {
    let value = value.filter(|v| !v.is_null())?;
    match decode_record::<UserProfile>(value) {
        Ok(user) => Some(user),
        Err((id, reason)) => {
            warn!(id = ?id, %reason, "Skipping user profile");
            errors.push(RecordError {
                entity: EntityKind::User,
                index: 0,
                id,
                reason,
            });
            None
        }
    }
}

fn decode_settings(value: Option<Value>) -> BTreeMap<String, Value> {
    match value {
        Some(Value::Object(map)) => map
            .into_iter()
            .filter(|(key, value)| !value.is_null() && keys::is_setting(key))
            .collect(),
        None | Some(Value::Null) => BTreeMap::new(),
        Some(_) => {
            warn!("Settings is not an object; ignoring");
            BTreeMap::new()
        }
    }
}

fn decode_metadata(value: Option<Value>) -> SnapshotMetadata {
    let Some(mut value) = value.filter(|v| !v.is_null()) else {
        return SnapshotMetadata::default();
    };
    strip_nulls(&mut value);
    serde_json::from_value(value).unwrap_or_else(|e| {
        warn!(error = %e, "Unreadable backup metadata; using defaults");
        SnapshotMetadata::default()
    })
}

/// Product id to file name. Non-string values are dropped.
fn decode_photo_table(value: Option<Value>) -> Option<BTreeMap<String, String>> {
    let Some(Value::Object(map)) = value else {
        return None;
    };
    Some(string_entries(map))
}

fn string_entries(map: Map<String, Value>) -> BTreeMap<String, String> {
    map.into_iter()
        .filter_map(|(key, value)| match value {
            Value::String(s) if !s.is_empty() => Some((key, s)),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Collection, CollectionItem, Customer, CustomCategory, Expense, IdList, Invoice,
        InvoiceLineItem, Product, Sale, StockMovement,
    };
    use crate::storage::preferences::MemoryPreferences;
    use crate::storage::sqlite::SqliteStorage;
    use crate::storage::store::{Batch, RecordStore};

    fn seeded_storage() -> SqliteStorage {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let products = vec![
            Product {
                id: "p1".into(),
                name: "Rice".into(),
                price: 12.5,
                quantity: 3.0,
                photo_uri: Some("/data/app/img1.jpg".into()),
                ..Product::default()
            },
            Product {
                id: "p2".into(),
                name: "Beans".into(),
                is_active: false,
                ..Product::default()
            },
        ];
        let sales = vec![Sale {
            id: "s1".into(),
            product_id: "p1".into(),
            quantity: 2.0,
            unit_price: 12.5,
            total_amount: 25.0,
            ..Sale::default()
        }];
        let collections = vec![Collection {
            id: "c1".into(),
            user_id: "u1".into(),
            name: "March".into(),
            associated_customer_ids: crate::model::IdList::new(["a", "b"]),
            ..Collection::default()
        }];
        let invoices = vec![Invoice {
            id: "inv1".into(),
            items: vec![InvoiceLineItem {
                description: "Rice".into(),
                quantity: 2.0,
                total: 25.0,
                ..InvoiceLineItem::default()
            }],
            ..Invoice::default()
        }];
        storage
            .atomically("seed", &mut |tx| {
                tx.insert(Batch::Products(&products))?;
                tx.insert(Batch::Sales(&sales))?;
                tx.insert(Batch::Collections(&collections))?;
                tx.insert(Batch::Invoices(&invoices))
            })
            .unwrap();
        storage
    }

    /// Same record count for every entity list: the first record has every
    /// optional field set, the rest leave them all absent.
    fn snapshot_with(count: usize) -> Snapshot {
        let ids = |prefix: &'static str| (0..count).map(move |i| format!("{prefix}{i}"));

        let products = ids("p")
            .enumerate()
            .map(|(i, id)| {
                if i > 0 {
                    return Product {
                        id,
                        ..Product::default()
                    };
                }
                Product {
                    id,
                    name: "Rice 5kg".into(),
                    category: "Grains".into(),
                    sku: Some("RC-5".into()),
                    barcode: Some("0123456789".into()),
                    description: Some("Long grain".into()),
                    price: 12.5,
                    cost_price: 9.25,
                    quantity: 3.0,
                    low_stock_threshold: 2,
                    unit: "bag".into(),
                    photo_uri: Some("/data/app/img1.jpg".into()),
                    is_active: false,
                    created_at: 1_709_287_200_000,
                    updated_at: 1_709_290_800_000,
                }
            })
            .collect();
        let customers = ids("cu")
            .enumerate()
            .map(|(i, id)| {
                if i > 0 {
                    return Customer {
                        id,
                        ..Customer::default()
                    };
                }
                Customer {
                    id,
                    name: "Ama".into(),
                    phone: Some("+233 20 000 0000".into()),
                    email: Some("ama@example.com".into()),
                    address: Some("Market St".into()),
                    balance: -4.5,
                    notes: Some("Pays Fridays".into()),
                    created_at: 1_709_287_200_000,
                    updated_at: 1_709_290_800_000,
                }
            })
            .collect();
        let sales = ids("s")
            .enumerate()
            .map(|(i, id)| {
                if i > 0 {
                    return Sale {
                        id,
                        ..Sale::default()
                    };
                }
                Sale {
                    id,
                    product_id: "p0".into(),
                    customer_id: Some("cu0".into()),
                    quantity: 2.0,
                    unit_price: 12.5,
                    total_amount: 25.0,
                    payment_method: "Mobile Money".into(),
                    is_paid: false,
                    sale_date: 1_709_287_200_000,
                    notes: Some("On credit".into()),
                }
            })
            .collect();
        let expenses = ids("e")
            .enumerate()
            .map(|(i, id)| {
                if i > 0 {
                    return Expense {
                        id,
                        ..Expense::default()
                    };
                }
                Expense {
                    id,
                    category: "Transport".into(),
                    amount: 7.75,
                    description: Some("Delivery".into()),
                    payment_method: "momo".into(),
                    expense_date: 1_709_287_200_000,
                    receipt_uri: Some("/data/app/receipt.jpg".into()),
                }
            })
            .collect();
        let collections = ids("c")
            .enumerate()
            .map(|(i, id)| {
                if i > 0 {
                    return Collection {
                        id,
                        ..Collection::default()
                    };
                }
                Collection {
                    id,
                    user_id: "u1".into(),
                    name: "March".into(),
                    description: Some("Month end".into()),
                    associated_customer_ids: IdList::new(["cu0", "cu1"]),
                    target_amount: 100.0,
                    collected_amount: 40.0,
                    status: "closed".into(),
                    due_date: 1_709_287_200_000,
                    created_at: 1_709_200_800_000,
                    updated_at: 1_709_290_800_000,
                }
            })
            .collect();
        let collection_items = ids("ci")
            .enumerate()
            .map(|(i, id)| {
                if i > 0 {
                    return CollectionItem {
                        id,
                        ..CollectionItem::default()
                    };
                }
                CollectionItem {
                    id,
                    collection_id: "c0".into(),
                    customer_id: Some("cu0".into()),
                    amount: 20.0,
                    note: Some("First half".into()),
                    is_paid: true,
                    created_at: 1_709_287_200_000,
                }
            })
            .collect();
        let invoices = ids("inv")
            .enumerate()
            .map(|(i, id)| {
                if i > 0 {
                    return Invoice {
                        id,
                        ..Invoice::default()
                    };
                }
                Invoice {
                    id,
                    invoice_number: "INV-001".into(),
                    customer_id: Some("cu0".into()),
                    items: vec![
                        InvoiceLineItem {
                            product_id: Some("p0".into()),
                            description: "Rice".into(),
                            quantity: 2.0,
                            unit_price: 12.5,
                            total: 25.0,
                        },
                        InvoiceLineItem::default(),
                    ],
                    subtotal: 25.0,
                    tax: 1.5,
                    discount: 0.5,
                    total: 26.0,
                    status: "paid".into(),
                    issued_at: 1_709_287_200_000,
                    due_at: 1_709_892_000_000,
                    notes: Some("Thanks".into()),
                }
            })
            .collect();
        let stock_movements = ids("m")
            .enumerate()
            .map(|(i, id)| {
                if i > 0 {
                    return StockMovement {
                        id,
                        ..StockMovement::default()
                    };
                }
                StockMovement {
                    id,
                    product_id: "p0".into(),
                    quantity_change: -2.0,
                    movement_type: "sale".into(),
                    reason: Some("Sold".into()),
                    reference_id: Some("s0".into()),
                    created_at: 1_709_287_200_000,
                }
            })
            .collect();
        let custom_categories = ids("cat")
            .enumerate()
            .map(|(i, id)| {
                if i > 0 {
                    return CustomCategory {
                        id,
                        ..CustomCategory::default()
                    };
                }
                CustomCategory {
                    id,
                    user_id: "u1".into(),
                    name: "Snacks".into(),
                    kind: "expense".into(),
                    color: Some("#ff8800".into()),
                    created_at: 1_709_287_200_000,
                }
            })
            .collect();

        Snapshot {
            version: SNAPSHOT_VERSION,
            created_at: 1_709_287_200_000,
            products,
            customers,
            sales,
            expenses,
            collections,
            collection_items,
            invoices,
            stock_movements,
            custom_categories,
            user: None,
            settings: BTreeMap::new(),
            metadata: SnapshotMetadata {
                app_version: "2.1.0".into(),
                user_email: "me@example.com".into(),
                backup_timestamp: 1_709_287_200_000,
                ..SnapshotMetadata::default()
            },
            product_photos: BTreeMap::new(),
        }
    }

    fn round_trip(snapshot: &Snapshot) -> Snapshot {
        let decoded = decode(&to_document(snapshot).unwrap()).unwrap();
        assert!(decoded.errors.is_empty(), "{:?}", decoded.errors);
        decoded.snapshot
    }

    #[test]
    fn test_every_entity_list_round_trips() {
        for count in [0, 1, 4] {
            let snapshot = snapshot_with(count);
            assert_eq!(snapshot.counts().products, count);
            assert_eq!(round_trip(&snapshot), snapshot, "{count} record(s) per list");
        }
    }

    #[test]
    fn test_user_profile_and_side_tables_round_trip() {
        let mut full = snapshot_with(1);
        full.user = Some(UserProfile {
            id: "u1".into(),
            email: "me@example.com".into(),
            display_name: "Kofi".into(),
            business_name: Some("Kofi Stores".into()),
            phone: Some("+233 24 000 0000".into()),
            currency: "GHS".into(),
            profile_photo: Some("/data/app/me.png".into()),
            business_logo: Some("/data/app/logo.png".into()),
            last_login_at: 1_709_290_800_000,
            created_at: 1_709_200_800_000,
        });
        full.settings.insert("theme".into(), Value::from("dark"));
        full.settings.insert("interface_scale".into(), Value::from(1.25));
        full.product_photos.insert("p0".into(), "img1.jpg".into());
        full.metadata.profile_photo_file = Some("me.png".into());
        full.metadata.business_logo_file = Some("logo.png".into());
        full.metadata.asset_digests.insert(
            "images/inventory/img1.jpg".into(),
            "ab".repeat(32),
        );
        assert_eq!(round_trip(&full), full);

        let mut minimal = snapshot_with(0);
        minimal.user = Some(UserProfile {
            id: "u1".into(),
            ..UserProfile::default()
        });
        assert_eq!(round_trip(&minimal), minimal);
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let storage = seeded_storage();
        let mut prefs = MemoryPreferences::new();
        prefs.put_string(keys::THEME, "dark").unwrap();
        prefs.put_string(keys::PROFILE_EMAIL, "me@example.com").unwrap();

        let snapshot = encode(&storage, &prefs, "u1", &ExportMeta::current()).unwrap();
        let mut decoded = round_trip(&snapshot);

        // Only the encode-time stamps may differ.
        decoded.created_at = snapshot.created_at;
        decoded.metadata.backup_timestamp = snapshot.metadata.backup_timestamp;
        assert_eq!(decoded, snapshot);
        assert_eq!(decoded.settings.len(), 1);
        assert_eq!(decoded.metadata.user_email, "me@example.com");
    }

    #[test]
    fn test_encode_is_deterministic() {
        let storage = seeded_storage();
        let prefs = MemoryPreferences::new();
        let mut first = encode(&storage, &prefs, "u1", &ExportMeta::current()).unwrap();
        let mut second = encode(&storage, &prefs, "u1", &ExportMeta::current()).unwrap();

        second.created_at = first.created_at;
        second.metadata.backup_timestamp = first.metadata.backup_timestamp;
        first.metadata.user_email.clear();
        second.metadata.user_email.clear();
        assert_eq!(to_document(&first).unwrap(), to_document(&second).unwrap());
    }

    #[test]
    fn test_encode_omits_absent_optionals() {
        let storage = seeded_storage();
        let snapshot =
            encode(&storage, &MemoryPreferences::new(), "u1", &ExportMeta::current()).unwrap();
        let doc: Value = serde_json::from_slice(&to_document(&snapshot).unwrap()).unwrap();

        let rice = &doc["products"][0];
        assert_eq!(rice["id"], "p1");
        assert!(rice.get("sku").is_none());
        assert!(doc.get("user").is_none());
        assert_eq!(doc["collections"][0]["associatedCustomerIds"][1], "b");
    }

    #[test]
    fn test_decode_skips_bad_records() {
        let doc = br#"{
            "version": 2,
            "products": [
                {"id": "p1", "name": "Good"},
                {"id": "p2", "price": "twelve"},
                {"name": "No id"},
                "not an object",
                {"id": "p3", "createdAt": "garbage"},
                {"id": "p1", "name": "Again"}
            ]
        }"#;

        let decoded = decode(doc).unwrap();
        assert_eq!(decoded.snapshot.products.len(), 1);
        assert_eq!(decoded.snapshot.products[0].name, "Good");
        assert_eq!(decoded.errors.len(), 5);
        assert_eq!(decoded.errors[1].reason, SkipReason::MissingId);
        assert_eq!(decoded.errors[2].reason, SkipReason::NotAnObject);
        assert_eq!(decoded.errors[4].reason, SkipReason::DuplicateId);
        assert_eq!(decoded.errors[0].id.as_deref(), Some("p2"));
        assert_eq!(decoded.skipped(EntityKind::Product), 5);
    }

    #[test]
    fn test_decode_nulls_fall_back_to_defaults() {
        let doc = br#"{"sales": [{"id": "s1", "productId": "p1", "isPaid": null, "notes": null}]}"#;
        let decoded = decode(doc).unwrap();

        let sale = &decoded.snapshot.sales[0];
        assert!(sale.is_paid);
        assert!(sale.notes.is_none());
        assert_eq!(decoded.snapshot.version, 1);
    }

    #[test]
    fn test_decode_dual_forms_agree() {
        let array = br#"{"collections": [{"id": "c1", "associatedCustomerIds": ["a", "b"], "dueDate": 1709287200000}]}"#;
        let csv = br#"{"collections": [{"id": "c1", "associatedCustomerIds": "a, b", "dueDate": "2024-03-01T10:00:00Z"}]}"#;

        let a = decode(array).unwrap().snapshot.collections;
        let b = decode(csv).unwrap().snapshot.collections;
        assert_eq!(a[0].associated_customer_ids, b[0].associated_customer_ids);
        assert_eq!(a[0].due_date, b[0].due_date);
    }

    #[test]
    fn test_decode_newer_version_is_best_effort() {
        let doc = br#"{"version": 99, "products": [{"id": "p1"}], "futureField": true}"#;
        let decoded = decode(doc).unwrap();
        assert_eq!(decoded.snapshot.version, 99);
        assert_eq!(decoded.snapshot.products.len(), 1);
    }

    #[test]
    fn test_decode_rejects_non_object() {
        assert!(matches!(decode(b"[1, 2]"), Err(Error::InvalidDocument(_))));
        assert!(matches!(decode(b"not json"), Err(Error::InvalidDocument(_))));
    }

    #[test]
    fn test_product_photos_legacy_location() {
        let doc = br#"{"metadata": {"appVersion": "1.0", "productPhotos": {"p1": "img1.jpg"}}}"#;
        let decoded = decode(doc).unwrap();
        assert_eq!(
            decoded.snapshot.product_photos.get("p1").map(String::as_str),
            Some("img1.jpg")
        );
        assert_eq!(decoded.snapshot.metadata.app_version, "1.0");

        let both = br#"{"productPhotos": {"p1": "new.jpg"}, "metadata": {"productPhotos": {"p1": "old.jpg"}}}"#;
        let decoded = decode(both).unwrap();
        assert_eq!(decoded.snapshot.product_photos["p1"], "new.jpg");
    }

    #[test]
    fn test_reserved_settings_are_dropped() {
        let doc = br#"{"settings": {"theme": "dark", "session.user_id": "intruder"}}"#;
        let decoded = decode(doc).unwrap();
        assert_eq!(decoded.snapshot.settings.len(), 1);
        assert!(decoded.snapshot.settings.contains_key("theme"));
    }

    #[test]
    fn test_invalid_user_is_reported() {
        let doc = br#"{"user": {"email": "x@example.com"}}"#;
        let decoded = decode(doc).unwrap();
        assert!(decoded.snapshot.user.is_none());
        assert_eq!(decoded.skipped(EntityKind::User), 1);
    }
}
