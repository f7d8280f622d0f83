//! Transactional restore of a decoded snapshot.
//!
//! A restore has two halves:
//!
//! 1. **Atomic block**: every entity list is cleared and re-inserted inside
//!    one [`RecordStore::atomically`] call. Core lists (products, customers,
//!    sales, expenses, invoices, stock movements) are all-or-nothing: any
//!    failure rolls back the whole transaction. Collections and their items
//!    are tolerant: a failing bulk insert is retried row by row and the rows
//!    storage rejects are skipped.
//! 2. **Post-transaction steps**: categories, the user profile, login
//!    tracking and settings. Each step is isolated; a failure is logged and
//!    recorded in the report but never undoes the records already committed.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::model::{Collection, CustomCategory, EntityKind, UserProfile};
use crate::storage::preferences::{PreferenceStore, keys};
use crate::storage::store::{Batch, RecordStore, RecordTx, UpsertOutcome};
use crate::sync::codec;
use crate::sync::progress::{CancelToken, Progress, RestoreStage, Tracker};
use crate::sync::types::{AssetCategory, Decoded, RelinkStats, RestoreReport, Snapshot};
use crate::validate;

/// Kinds wiped before re-inserting, in order. Owner-scoped kinds only lose
/// the restoring user's rows.
const CLEAR_ORDER: [EntityKind; 9] = [
    EntityKind::CollectionItem,
    EntityKind::Collection,
    EntityKind::Sale,
    EntityKind::StockMovement,
    EntityKind::Invoice,
    EntityKind::Product,
    EntityKind::Customer,
    EntityKind::Expense,
    EntityKind::CustomCategory,
];

/// Applies snapshots to a record store and a preference store on behalf of
/// one owner.
pub struct Restorer<'a, S: RecordStore + ?Sized, P: PreferenceStore + ?Sized> {
    store: &'a mut S,
    prefs: &'a mut P,
    owner: String,
}

impl<'a, S, P> Restorer<'a, S, P>
where
    S: RecordStore + ?Sized,
    P: PreferenceStore + ?Sized,
{
    pub fn new(store: &'a mut S, prefs: &'a mut P, owner: impl Into<String>) -> Self {
        Self {
            store,
            prefs,
            owner: owner.into(),
        }
    }

    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Decode a backup document and apply it.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not a JSON object, the atomic
    /// block fails, or the operation is cancelled before commit.
    pub fn restore_document(
        &mut self,
        bytes: &[u8],
        progress: &mut dyn Progress,
        cancel: &CancelToken,
    ) -> Result<RestoreReport> {
        let mut tracker = Tracker::new(progress);
        tracker.enter(RestoreStage::Parsing);

        let decoded = match codec::decode(bytes).and_then(|decoded| {
            cancel.check("parsing")?;
            Ok(decoded)
        }) {
            Ok(decoded) => decoded,
            Err(e) => {
                tracker.fail(&e);
                return Err(e);
            }
        };
        tracker.step(1, 1, "Parsed backup");

        self.run(&decoded, &mut tracker, cancel)
    }

    /// Apply an already decoded snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the atomic block fails or the operation is
    /// cancelled before commit. Storage is unchanged in both cases.
    pub fn apply(
        &mut self,
        decoded: &Decoded,
        progress: &mut dyn Progress,
        cancel: &CancelToken,
    ) -> Result<RestoreReport> {
        let mut tracker = Tracker::new(progress);
        tracker.enter(RestoreStage::Parsing);
        tracker.step(1, 1, "Parsed backup");
        self.run(decoded, &mut tracker, cancel)
    }

    fn run(
        &mut self,
        decoded: &Decoded,
        tracker: &mut Tracker<'_>,
        cancel: &CancelToken,
    ) -> Result<RestoreReport> {
        match self.run_stages(decoded, tracker, cancel) {
            Ok(report) => {
                tracker.finish();
                info!(
                    owner = %self.owner,
                    records = report.restored.total(),
                    skipped = report.skipped_records,
                    failed_steps = report.failed_steps.len(),
                    "Restore complete"
                );
                Ok(report)
            }
            Err(e) => {
                tracker.fail(&e);
                Err(e)
            }
        }
    }

    fn run_stages(
        &mut self,
        decoded: &Decoded,
        tracker: &mut Tracker<'_>,
        cancel: &CancelToken,
    ) -> Result<RestoreReport> {
        let snapshot = &decoded.snapshot;
        let mut report = RestoreReport {
            skipped_records: decoded.errors.len(),
            ..RestoreReport::default()
        };
        for skipped in &decoded.errors {
            warn!(record = %skipped, "Skipped record");
        }

        cancel.check("parsing")?;
        tracker.enter(RestoreStage::Transacting);
        self.transact(snapshot, &mut report, tracker, cancel)?;

        tracker.enter(RestoreStage::PostTransactionRestore);
        self.post_transaction(snapshot, &mut report, tracker);

        Ok(report)
    }

    /// The atomic block. Nothing is visible to readers until it commits.
    fn transact(
        &mut self,
        snapshot: &Snapshot,
        report: &mut RestoreReport,
        tracker: &mut Tracker<'_>,
        cancel: &CancelToken,
    ) -> Result<()> {
        let owner = self.owner.as_str();
        let collections: Vec<Collection> = snapshot
            .collections
            .iter()
            .map(|collection| Collection {
                user_id: owner.to_string(),
                ..collection.clone()
            })
            .collect();

        let core = [
            Batch::Products(&snapshot.products),
            Batch::Customers(&snapshot.customers),
            Batch::Sales(&snapshot.sales),
            Batch::Expenses(&snapshot.expenses),
            Batch::Invoices(&snapshot.invoices),
            Batch::StockMovements(&snapshot.stock_movements),
        ];
        let tolerant = [
            Batch::Collections(&collections),
            Batch::CollectionItems(&snapshot.collection_items),
        ];
        let total = core.len() + tolerant.len() + 1;

        let mut skipped = (0, 0);
        self.store.atomically("restore", &mut |tx| {
            for kind in CLEAR_ORDER {
                tx.clear(kind, owner)?;
            }
            tracker.step(1, total, "Cleared existing records");

            for (i, batch) in core.iter().enumerate() {
                tx.insert(*batch)?;
                debug!(kind = %batch.kind(), rows = batch.len(), "Inserted batch");
                tracker.step(i + 2, total, &format!("Restored {}", batch.kind()));
            }

            skipped.0 = insert_tolerant(tx, tolerant[0]);
            skipped.1 = insert_tolerant(tx, tolerant[1]);
            tracker.step(total, total, "Restored collections");

            cancel.check("transacting")
        })?;

        report.skipped_collections = skipped.0;
        report.skipped_collection_items = skipped.1;
        report.restored.products = snapshot.products.len();
        report.restored.customers = snapshot.customers.len();
        report.restored.sales = snapshot.sales.len();
        report.restored.expenses = snapshot.expenses.len();
        report.restored.invoices = snapshot.invoices.len();
        report.restored.stock_movements = snapshot.stock_movements.len();
        report.restored.collections = collections.len() - skipped.0;
        report.restored.collection_items = snapshot.collection_items.len() - skipped.1;
        Ok(())
    }

    fn post_transaction(
        &mut self,
        snapshot: &Snapshot,
        report: &mut RestoreReport,
        tracker: &mut Tracker<'_>,
    ) {
        type Step<T> = fn(&mut T, &Snapshot, &mut RestoreReport) -> Result<()>;
        let steps: [(&str, Step<Self>); 4] = [
            ("categories", Self::restore_categories),
            ("profile", Self::restore_profile),
            ("login", Self::restore_login),
            ("settings", Self::restore_settings),
        ];

        for (i, &(name, step)) in steps.iter().enumerate() {
            if let Err(e) = step(self, snapshot, report) {
                error!(step = name, error = %e, "Post-restore step failed");
                report.failed_steps.push(name.to_string());
            }
            tracker.step(i + 1, steps.len(), &format!("Restored {name}"));
        }
    }

    fn restore_categories(&mut self, snapshot: &Snapshot, report: &mut RestoreReport) -> Result<()> {
        for category in &snapshot.custom_categories {
            let owned = CustomCategory {
                user_id: self.owner.clone(),
                ..category.clone()
            };
            match self.store.upsert_custom_category(&owned) {
                Ok(UpsertOutcome::Inserted) => report.categories_inserted += 1,
                Ok(UpsertOutcome::Updated) => report.categories_updated += 1,
                Err(e) => {
                    warn!(category = %owned.name, error = %e, "Failed to restore category");
                    report.categories_failed += 1;
                }
            }
        }
        report.restored.custom_categories =
            report.categories_inserted + report.categories_updated;
        Ok(())
    }

    fn restore_profile(&mut self, snapshot: &Snapshot, _report: &mut RestoreReport) -> Result<()> {
        let Some(user) = &snapshot.user else {
            debug!("No user profile in backup");
            return Ok(());
        };
        let user = UserProfile {
            id: self.owner.clone(),
            ..user.clone()
        };
        self.store.upsert_user(&user)?;

        self.prefs.put_string(keys::PROFILE_USER_ID, &user.id)?;
        self.prefs.put_string(keys::PROFILE_EMAIL, &user.email)?;
        self.prefs.put_string(keys::PROFILE_DISPLAY_NAME, &user.display_name)?;
        self.prefs.put_string(keys::PROFILE_CURRENCY, &user.currency)?;
        let optional = [
            (keys::PROFILE_BUSINESS_NAME, &user.business_name),
            (keys::PROFILE_PHONE, &user.phone),
            (keys::PROFILE_PHOTO, &user.profile_photo),
            (keys::PROFILE_BUSINESS_LOGO, &user.business_logo),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                self.prefs.put_string(key, value)?;
            }
        }
        Ok(())
    }

    fn restore_login(&mut self, snapshot: &Snapshot, _report: &mut RestoreReport) -> Result<()> {
        let email = snapshot
            .user
            .as_ref()
            .map(|u| u.email.as_str())
            .filter(|email| !email.is_empty())
            .unwrap_or(snapshot.metadata.user_email.as_str());

        if !email.is_empty() {
            self.prefs.put_string(keys::SESSION_USER_EMAIL, email)?;
        }
        if let Some(user) = &snapshot.user {
            self.prefs.put_string(keys::SESSION_USER_ID, &self.owner)?;
            self.prefs.put_i64(keys::SESSION_LAST_LOGIN_AT, user.last_login_at)?;
        }
        Ok(())
    }

    fn restore_settings(&mut self, snapshot: &Snapshot, _report: &mut RestoreReport) -> Result<()> {
        for (key, value) in &snapshot.settings {
            match key.as_str() {
                keys::THEME => self.prefs.put(key, validate::theme_setting(value))?,
                keys::INTERFACE_SCALE => {
                    self.prefs.put_f64(key, validate::interface_scale(value))?;
                }
                _ => self.prefs.put(key, value.clone())?,
            }
        }
        debug!(count = snapshot.settings.len(), "Applied settings");
        Ok(())
    }

    /// Point product photos, the profile photo and the business logo at the
    /// files extracted from an archive.
    ///
    /// Only entries whose file was actually extracted are touched; anything
    /// else keeps its old reference.
    pub fn relink(
        &mut self,
        snapshot: &Snapshot,
        extracted: &BTreeMap<AssetCategory, Vec<PathBuf>>,
    ) -> RelinkStats {
        let by_name = |category: AssetCategory| -> HashMap<String, &Path> {
            extracted
                .get(&category)
                .into_iter()
                .flatten()
                .filter_map(|path| {
                    let name = path.file_name()?.to_string_lossy().into_owned();
                    Some((name, path.as_path()))
                })
                .collect()
        };

        let mut stats = RelinkStats::default();

        let inventory = by_name(AssetCategory::Inventory);
        for (product_id, file_name) in &snapshot.product_photos {
            let Some(path) = inventory.get(file_name) else {
                warn!(product = %product_id, file = %file_name, "Photo missing from archive");
                stats.missing += 1;
                continue;
            };
            match self.store.set_product_photo(product_id, &path.to_string_lossy()) {
                Ok(true) => stats.products += 1,
                Ok(false) => warn!(product = %product_id, "Photo for unknown product"),
                Err(e) => warn!(product = %product_id, error = %e, "Failed to relink photo"),
            }
        }

        let profile = self.relink_user_image(
            snapshot.metadata.profile_photo_file.as_deref(),
            &by_name(AssetCategory::Profile),
            keys::PROFILE_PHOTO,
        );
        let logo = self.relink_user_image(
            snapshot.metadata.business_logo_file.as_deref(),
            &by_name(AssetCategory::Business),
            keys::PROFILE_BUSINESS_LOGO,
        );
        stats.profile_photo = profile;
        stats.business_logo = logo;

        info!(
            products = stats.products,
            missing = stats.missing,
            profile_photo = stats.profile_photo,
            business_logo = stats.business_logo,
            "Relinked images"
        );
        stats
    }

    fn relink_user_image(
        &mut self,
        file_name: Option<&str>,
        extracted: &HashMap<String, &Path>,
        key: &str,
    ) -> bool {
        let Some(path) = file_name.and_then(|name| extracted.get(name)) else {
            return false;
        };
        let path = path.to_string_lossy();
        let (photo, logo) = if key == keys::PROFILE_PHOTO {
            (Some(path.as_ref()), None)
        } else {
            (None, Some(path.as_ref()))
        };

        if let Err(e) = self.store.set_user_images(&self.owner, photo, logo) {
            warn!(key, error = %e, "Failed to relink user image");
            return false;
        }
        if let Err(e) = self.prefs.put_string(key, &path) {
            warn!(key, error = %e, "Failed to store relinked image path");
        }
        true
    }
}

/// Insert a batch, falling back to one row at a time when the bulk insert
/// fails. Returns how many rows were skipped.
fn insert_tolerant(tx: &mut dyn RecordTx, batch: Batch<'_>) -> usize {
    if batch.is_empty() {
        return 0;
    }
    let Err(e) = tx.insert(batch) else {
        return 0;
    };
    warn!(kind = %batch.kind(), error = %e, "Bulk insert failed, retrying one by one");

    let mut skipped = 0;
    for index in 0..batch.len() {
        let Some((single, id)) = batch.single(index) else {
            continue;
        };
        if let Err(e) = tx.insert(single) {
            warn!(kind = %batch.kind(), id, error = %e, "Skipping record rejected by storage");
            skipped += 1;
        }
    }
    skipped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::model::{CollectionItem, Expense, Product, Sale};
    use crate::storage::preferences::MemoryPreferences;
    use crate::storage::sqlite::SqliteStorage;
    use crate::storage::store::DatasetReader;
    use crate::sync::progress::NoProgress;
    use serde_json::{Value, json};

    fn product(id: &str) -> Product {
        Product {
            id: id.to_string(),
            name: format!("Product {id}"),
            ..Product::default()
        }
    }

    fn decoded(snapshot: Snapshot) -> Decoded {
        Decoded {
            snapshot,
            errors: Vec::new(),
        }
    }

    fn sample() -> Snapshot {
        Snapshot {
            products: vec![product("p1"), product("p2")],
            sales: vec![Sale {
                id: "s1".into(),
                product_id: "p1".into(),
                payment_method: "Bank Transfer".into(),
                ..Sale::default()
            }],
            collections: vec![Collection {
                id: "c1".into(),
                user_id: "someone-else".into(),
                name: "March".into(),
                ..Collection::default()
            }],
            collection_items: vec![CollectionItem {
                id: "ci1".into(),
                collection_id: "c1".into(),
                amount: 10.0,
                ..CollectionItem::default()
            }],
            custom_categories: vec![CustomCategory {
                id: "cat1".into(),
                user_id: "someone-else".into(),
                name: "Grains".into(),
                kind: "product".into(),
                ..CustomCategory::default()
            }],
            user: Some(UserProfile {
                id: "old-id".into(),
                email: "ada@example.com".into(),
                display_name: "Ada".into(),
                last_login_at: 1_700_000_000_000,
                ..UserProfile::default()
            }),
            settings: BTreeMap::from([
                (keys::THEME.to_string(), json!("night")),
                (keys::INTERFACE_SCALE.to_string(), json!("7")),
                ("currency_symbol".to_string(), json!("$")),
            ]),
            ..Snapshot::default()
        }
    }

    #[test]
    fn test_apply_restores_everything() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut prefs = MemoryPreferences::new();

        let report = Restorer::new(&mut storage, &mut prefs, "u1")
            .apply(&decoded(sample()), &mut NoProgress, &CancelToken::never())
            .unwrap();

        assert!(report.is_clean());
        assert_eq!(report.restored.products, 2);
        assert_eq!(report.categories_inserted, 1);

        let sales = storage.sales().unwrap();
        assert_eq!(sales[0].payment_method, "Bank Transfer");
        let collections = storage.collections("u1").unwrap();
        assert_eq!(collections.len(), 1);
        assert_eq!(storage.collection_items("u1").unwrap().len(), 1);
        assert_eq!(storage.custom_categories("u1").unwrap()[0].name, "Grains");
        assert_eq!(storage.user("u1").unwrap().unwrap().email, "ada@example.com");

        assert_eq!(prefs.get(keys::THEME), Some(json!("dark")));
        assert_eq!(prefs.get_f64(keys::INTERFACE_SCALE), Some(2.0));
        assert_eq!(prefs.get_string("currency_symbol").as_deref(), Some("$"));
        assert_eq!(prefs.get_string(keys::PROFILE_DISPLAY_NAME).as_deref(), Some("Ada"));
        assert_eq!(prefs.get_string(keys::SESSION_USER_ID).as_deref(), Some("u1"));
        assert_eq!(prefs.get_i64(keys::SESSION_LAST_LOGIN_AT), Some(1_700_000_000_000));
    }

    #[test]
    fn test_records_are_restored_verbatim() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut prefs = MemoryPreferences::new();
        let snapshot = Snapshot {
            products: vec![product("p1")],
            sales: vec![Sale {
                id: "s1".into(),
                product_id: "p1".into(),
                payment_method: "debit".into(),
                ..Sale::default()
            }],
            expenses: vec![Expense {
                id: "e1".into(),
                payment_method: "momo".into(),
                ..Expense::default()
            }],
            ..Snapshot::default()
        };

        Restorer::new(&mut storage, &mut prefs, "u1")
            .apply(&decoded(snapshot.clone()), &mut NoProgress, &CancelToken::never())
            .unwrap();

        assert_eq!(storage.sales().unwrap(), snapshot.sales);
        assert_eq!(storage.expenses().unwrap(), snapshot.expenses);
    }

    #[test]
    fn test_dangling_collection_item_is_replaced_on_restore() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut prefs = MemoryPreferences::new();
        let snapshot = Snapshot {
            collection_items: vec![CollectionItem {
                id: "orphan".into(),
                collection_id: "ghost".into(),
                ..CollectionItem::default()
            }],
            ..Snapshot::default()
        };

        for _ in 0..2 {
            let report = Restorer::new(&mut storage, &mut prefs, "u1")
                .apply(&decoded(snapshot.clone()), &mut NoProgress, &CancelToken::never())
                .unwrap();
            assert!(report.is_clean());
            assert_eq!(report.restored.collection_items, 1);
        }
        assert_eq!(storage.collection_items("u1").unwrap().len(), 1);

        Restorer::new(&mut storage, &mut prefs, "u1")
            .apply(&decoded(Snapshot::default()), &mut NoProgress, &CancelToken::never())
            .unwrap();
        assert_eq!(storage.counts("u1").unwrap().collection_items, 0);
    }

    #[test]
    fn test_apply_replaces_existing_records() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let stale = vec![product("stale")];
        storage
            .atomically("seed", &mut |tx| tx.insert(Batch::Products(&stale)))
            .unwrap();
        let mut prefs = MemoryPreferences::new();

        Restorer::new(&mut storage, &mut prefs, "u1")
            .apply(&decoded(sample()), &mut NoProgress, &CancelToken::never())
            .unwrap();

        let ids: Vec<String> = storage.products().unwrap().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["p1", "p2"]);
    }

    #[test]
    fn test_restore_is_idempotent() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut prefs = MemoryPreferences::new();
        let doc = codec::to_document(&sample()).unwrap();

        let first = Restorer::new(&mut storage, &mut prefs, "u1")
            .restore_document(&doc, &mut NoProgress, &CancelToken::never())
            .unwrap();
        let counts_after_first = storage.counts("u1").unwrap();
        let second = Restorer::new(&mut storage, &mut prefs, "u1")
            .restore_document(&doc, &mut NoProgress, &CancelToken::never())
            .unwrap();

        assert_eq!(first.restored, second.restored);
        assert_eq!(second.categories_inserted, 1);
        assert_eq!(storage.counts("u1").unwrap().total(), counts_after_first.total());
    }

    #[test]
    fn test_core_failure_rolls_back() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let existing = vec![product("keep")];
        storage
            .atomically("seed", &mut |tx| tx.insert(Batch::Products(&existing)))
            .unwrap();
        let mut prefs = MemoryPreferences::new();

        // Two sales with one id bypass the decoder's duplicate check and
        // violate the primary key on insert.
        let mut snapshot = sample();
        snapshot.sales.push(snapshot.sales[0].clone());

        let mut seen = Vec::new();
        let mut sink = |percent: u8, stage: &str| seen.push((percent, stage.to_string()));
        let result = Restorer::new(&mut storage, &mut prefs, "u1").apply(
            &decoded(snapshot),
            &mut sink,
            &CancelToken::never(),
        );

        assert!(matches!(result, Err(Error::Database(_))));
        let ids: Vec<String> = storage.products().unwrap().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["keep"]);
        assert!(prefs.get(keys::THEME).is_none());

        let (percent, stage) = seen.last().unwrap();
        assert_eq!(*percent, 0);
        assert!(stage.starts_with("Failed: "));
    }

    #[test]
    fn test_bad_collection_item_is_skipped() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut prefs = MemoryPreferences::new();
        let mut snapshot = sample();
        snapshot.collection_items.push(CollectionItem {
            id: "ci2".into(),
            collection_id: String::new(),
            ..CollectionItem::default()
        });
        snapshot.collection_items.push(CollectionItem {
            id: "ci3".into(),
            collection_id: "c1".into(),
            ..CollectionItem::default()
        });

        let report = Restorer::new(&mut storage, &mut prefs, "u1")
            .apply(&decoded(snapshot), &mut NoProgress, &CancelToken::never())
            .unwrap();

        assert_eq!(report.skipped_collection_items, 1);
        assert_eq!(report.restored.collection_items, 2);
        let ids: Vec<String> = storage
            .collection_items("u1")
            .unwrap()
            .into_iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(ids, vec!["ci1", "ci3"]);
        assert_eq!(storage.products().unwrap().len(), 2);
    }

    #[test]
    fn test_cancel_before_commit_leaves_storage_untouched() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let existing = vec![product("keep")];
        storage
            .atomically("seed", &mut |tx| tx.insert(Batch::Products(&existing)))
            .unwrap();
        let mut prefs = MemoryPreferences::new();

        let cancel = CancelToken::new();
        let handle = cancel.clone();
        let mut sink = |percent: u8, _stage: &str| {
            if percent >= 60 {
                handle.cancel();
            }
        };

        let result = Restorer::new(&mut storage, &mut prefs, "u1").apply(
            &decoded(sample()),
            &mut sink,
            &cancel,
        );

        assert!(matches!(result, Err(Error::Cancelled { .. })));
        assert_eq!(storage.products().unwrap().len(), 1);
    }

    /// Preferences that refuse writes under one prefix.
    struct FailingPrefs {
        inner: MemoryPreferences,
        prefix: &'static str,
    }

    impl PreferenceStore for FailingPrefs {
        fn get(&self, key: &str) -> Option<Value> {
            self.inner.get(key)
        }

        fn put(&mut self, key: &str, value: Value) -> Result<()> {
            if key.starts_with(self.prefix) {
                return Err(Error::Other(format!("read-only key {key}")));
            }
            self.inner.put(key, value)
        }

        fn remove(&mut self, key: &str) -> Result<()> {
            self.inner.remove(key)
        }

        fn entries(&self) -> BTreeMap<String, Value> {
            self.inner.entries()
        }
    }

    #[test]
    fn test_post_steps_are_isolated() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut prefs = FailingPrefs {
            inner: MemoryPreferences::new(),
            prefix: "profile.",
        };

        let report = Restorer::new(&mut storage, &mut prefs, "u1")
            .apply(&decoded(sample()), &mut NoProgress, &CancelToken::never())
            .unwrap();

        assert_eq!(report.failed_steps, vec!["profile".to_string()]);
        assert!(!report.is_clean());
        assert_eq!(storage.products().unwrap().len(), 2);
        assert_eq!(report.categories_inserted, 1);
        assert_eq!(prefs.get(keys::THEME), Some(json!("dark")));
        assert_eq!(
            prefs.get_string(keys::SESSION_USER_EMAIL).as_deref(),
            Some("ada@example.com")
        );
    }

    #[test]
    fn test_progress_is_monotonic_and_completes() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut prefs = MemoryPreferences::new();
        let doc = codec::to_document(&sample()).unwrap();

        let mut seen = Vec::new();
        let mut sink = |percent: u8, _stage: &str| seen.push(percent);
        Restorer::new(&mut storage, &mut prefs, "u1")
            .restore_document(&doc, &mut sink, &CancelToken::never())
            .unwrap();

        assert_eq!(seen.first(), Some(&0));
        assert_eq!(seen.last(), Some(&100));
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_invalid_document_reports_failure() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut prefs = MemoryPreferences::new();
        let mut last = (100, String::new());
        let mut sink = |percent: u8, stage: &str| last = (percent, stage.to_string());

        let result = Restorer::new(&mut storage, &mut prefs, "u1").restore_document(
            b"[1, 2]",
            &mut sink,
            &CancelToken::never(),
        );

        assert!(matches!(result, Err(Error::InvalidDocument(_))));
        assert_eq!(last.0, 0);
    }

    #[test]
    fn test_relink_points_at_extracted_files() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut prefs = MemoryPreferences::new();
        let mut snapshot = sample();
        snapshot.products[0].photo_uri = Some("/data/app/img1.jpg".into());
        snapshot.product_photos = BTreeMap::from([
            ("p1".to_string(), "img1.jpg".to_string()),
            ("p2".to_string(), "gone.jpg".to_string()),
        ]);
        snapshot.metadata.profile_photo_file = Some("profile_me.png".into());

        let mut restorer = Restorer::new(&mut storage, &mut prefs, "u1");
        restorer
            .apply(&decoded(snapshot.clone()), &mut NoProgress, &CancelToken::never())
            .unwrap();
        let extracted = BTreeMap::from([
            (AssetCategory::Inventory, vec![PathBuf::from("/files/inventory/img1.jpg")]),
            (AssetCategory::Profile, vec![PathBuf::from("/files/profile_me.png")]),
        ]);
        let stats = restorer.relink(&snapshot, &extracted);

        assert_eq!(stats.products, 1);
        assert_eq!(stats.missing, 1);
        assert!(stats.profile_photo);
        assert!(!stats.business_logo);

        let products = storage.products().unwrap();
        assert_eq!(products[0].photo_uri.as_deref(), Some("/files/inventory/img1.jpg"));
        let user = storage.user("u1").unwrap().unwrap();
        assert_eq!(user.profile_photo.as_deref(), Some("/files/profile_me.png"));
        assert_eq!(
            prefs.get_string(keys::PROFILE_PHOTO).as_deref(),
            Some("/files/profile_me.png")
        );
    }

    #[test]
    fn test_relink_without_side_table_changes_nothing() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut prefs = MemoryPreferences::new();
        let mut snapshot = sample();
        snapshot.products[0].photo_uri = Some("/data/app/img1.jpg".into());

        let mut restorer = Restorer::new(&mut storage, &mut prefs, "u1");
        restorer
            .apply(&decoded(snapshot.clone()), &mut NoProgress, &CancelToken::never())
            .unwrap();
        let extracted = BTreeMap::from([(
            AssetCategory::Inventory,
            vec![PathBuf::from("/files/inventory/img1.jpg")],
        )]);
        let stats = restorer.relink(&snapshot, &extracted);

        assert_eq!(stats, RelinkStats::default());
        assert_eq!(
            storage.products().unwrap()[0].photo_uri.as_deref(),
            Some("/data/app/img1.jpg")
        );
    }
}
