//! SQLite storage implementation.
//!
//! This module provides the record store backing Stockbook. Every write
//! that must be all-or-nothing goes through [`RecordStore::atomically`],
//! which wraps the work in an IMMEDIATE transaction; each bulk insert runs
//! inside its own savepoint so a failed batch can be retried row by row
//! without poisoning the outer transaction.

use crate::error::Result;
use crate::model::{
    Collection, CollectionItem, Customer, CustomCategory, EntityKind, Expense, Invoice, Product,
    Sale, StockMovement, UserProfile,
};
use crate::storage::schema::apply_schema;
use crate::storage::store::{Batch, DatasetReader, RecordStore, RecordTx, UpsertOutcome};
use crate::storage::tables::Table;
use rusqlite::{Connection, OptionalExtension, Transaction};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::debug;

/// SQLite-based storage backend.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
}

/// Row counts per entity, used by status output.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct RecordCounts {
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

impl RecordCounts {
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

impl SqliteStorage {
    /// Open a database at the given path.
    ///
    /// Creates the database and applies schema if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, None)
    }

    /// Open a database with an optional busy timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open_with_timeout(path: &Path, timeout_ms: Option<u64>) -> Result<Self> {
        let conn = Connection::open(path)?;

        if let Some(timeout) = timeout_ms {
            conn.busy_timeout(Duration::from_millis(timeout))?;
        } else {
            // Default 5 second timeout
            conn.busy_timeout(Duration::from_secs(5))?;
        }

        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Get a reference to the underlying connection (for read operations).
    #[must_use]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Count rows per entity. Owner-scoped kinds are counted for `owner`.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails.
    pub fn counts(&self, owner: &str) -> Result<RecordCounts> {
        let count = |sql: &str, params: &[&dyn rusqlite::ToSql]| -> Result<usize> {
            let n: i64 = self.conn.query_row(sql, params, |row| row.get(0))?;
            Ok(usize::try_from(n).unwrap_or(0))
        };

        Ok(RecordCounts {
            products: count("SELECT COUNT(*) FROM products", &[])?,
            customers: count("SELECT COUNT(*) FROM customers", &[])?,
            sales: count("SELECT COUNT(*) FROM sales", &[])?,
            expenses: count("SELECT COUNT(*) FROM expenses", &[])?,
            collections: count(
                "SELECT COUNT(*) FROM collections WHERE user_id = ?1",
                &[&owner],
            )?,
            collection_items: count(
                &format!("SELECT COUNT(*) FROM collection_items WHERE {OWNED_ITEMS}"),
                &[&owner],
            )?,
            invoices: count("SELECT COUNT(*) FROM invoices", &[])?,
            stock_movements: count("SELECT COUNT(*) FROM stock_movements", &[])?,
            custom_categories: count(
                "SELECT COUNT(*) FROM custom_categories WHERE user_id = ?1",
                &[&owner],
            )?,
        })
    }

    fn select<T: Table, P: rusqlite::Params>(&self, clause: &str, params: P) -> Result<Vec<T>> {
        let sql = format!("{} {clause}", T::select_sql());
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params, |row| T::from_row(row))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

/// Collection items that belong to `?1`: every item not attached to another
/// user's collection. Items whose collection is missing count as the owner's,
/// so a restore can replace and export them.
const OWNED_ITEMS: &str =
    "collection_id NOT IN (SELECT id FROM collections WHERE user_id <> ?1)";

impl DatasetReader for SqliteStorage {
    fn products(&self) -> Result<Vec<Product>> {
        self.select("ORDER BY id", [])
    }

    fn customers(&self) -> Result<Vec<Customer>> {
        self.select("ORDER BY id", [])
    }

    fn sales(&self) -> Result<Vec<Sale>> {
        self.select("ORDER BY id", [])
    }

    fn expenses(&self) -> Result<Vec<Expense>> {
        self.select("ORDER BY id", [])
    }

    fn collections(&self, owner: &str) -> Result<Vec<Collection>> {
        self.select("WHERE user_id = ?1 ORDER BY id", [owner])
    }

    fn collection_items(&self, owner: &str) -> Result<Vec<CollectionItem>> {
        self.select(&format!("WHERE {OWNED_ITEMS} ORDER BY id"), [owner])
    }

    fn invoices(&self) -> Result<Vec<Invoice>> {
        self.select("ORDER BY id", [])
    }

    fn stock_movements(&self) -> Result<Vec<StockMovement>> {
        self.select("ORDER BY id", [])
    }

    fn custom_categories(&self, owner: &str) -> Result<Vec<CustomCategory>> {
        self.select("WHERE user_id = ?1 ORDER BY id", [owner])
    }

    fn user(&self, id: &str) -> Result<Option<UserProfile>> {
        Ok(self.select("WHERE id = ?1", [id])?.into_iter().next())
    }
}

/// [`RecordTx`] over an open SQLite transaction.
struct SqliteTx<'a, 'c> {
    tx: &'a mut Transaction<'c>,
}

impl SqliteTx<'_, '_> {
    fn insert_rows<T: Table>(&mut self, rows: &[T]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let sp = self.tx.savepoint()?;
        {
            let mut stmt = sp.prepare_cached(&T::insert_sql())?;
            for row in rows {
                stmt.execute(rusqlite::params_from_iter(row.bind()?))?;
            }
        }
        sp.commit()?;
        Ok(())
    }
}

impl RecordTx for SqliteTx<'_, '_> {
    fn clear(&mut self, kind: EntityKind, owner: &str) -> Result<usize> {
        let removed = match kind {
            EntityKind::Product => self.tx.execute("DELETE FROM products", [])?,
            EntityKind::Customer => self.tx.execute("DELETE FROM customers", [])?,
            EntityKind::Sale => self.tx.execute("DELETE FROM sales", [])?,
            EntityKind::Expense => self.tx.execute("DELETE FROM expenses", [])?,
            EntityKind::Invoice => self.tx.execute("DELETE FROM invoices", [])?,
            EntityKind::StockMovement => self.tx.execute("DELETE FROM stock_movements", [])?,
            EntityKind::Collection => self
                .tx
                .execute("DELETE FROM collections WHERE user_id = ?1", [owner])?,
            EntityKind::CollectionItem => self.tx.execute(
                &format!("DELETE FROM collection_items WHERE {OWNED_ITEMS}"),
                [owner],
            )?,
            EntityKind::CustomCategory => self
                .tx
                .execute("DELETE FROM custom_categories WHERE user_id = ?1", [owner])?,
            EntityKind::User => self.tx.execute("DELETE FROM users WHERE id = ?1", [owner])?,
        };
        debug!(%kind, removed, "Cleared records");
        Ok(removed)
    }

    fn insert(&mut self, batch: Batch<'_>) -> Result<()> {
        match batch {
            Batch::Products(rows) => self.insert_rows(rows),
            Batch::Customers(rows) => self.insert_rows(rows),
            Batch::Sales(rows) => self.insert_rows(rows),
            Batch::Expenses(rows) => self.insert_rows(rows),
            Batch::Collections(rows) => self.insert_rows(rows),
            Batch::CollectionItems(rows) => self.insert_rows(rows),
            Batch::Invoices(rows) => self.insert_rows(rows),
            Batch::StockMovements(rows) => self.insert_rows(rows),
        }
    }
}

impl RecordStore for SqliteStorage {
    /// Begins an IMMEDIATE transaction so the write lock is taken up front,
    /// runs `f`, and commits. Dropping the transaction on error rolls back.
    fn atomically(
        &mut self,
        op: &str,
        f: &mut dyn FnMut(&mut dyn RecordTx) -> Result<()>,
    ) -> Result<()> {
        let started = Instant::now();
        let mut tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let mut handle = SqliteTx { tx: &mut tx };
        f(&mut handle)?;

        tx.commit()?;
        debug!(
            op,
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Transaction committed"
        );
        Ok(())
    }

    fn upsert_custom_category(&mut self, category: &CustomCategory) -> Result<UpsertOutcome> {
        let existing: Option<String> = self
            .conn
            .query_row(
                "SELECT id FROM custom_categories WHERE user_id = ?1 AND name = ?2 LIMIT 1",
                [&category.user_id, &category.name],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(id) = existing {
            self.conn.execute(
                "UPDATE custom_categories SET kind = ?1, color = ?2 WHERE id = ?3",
                rusqlite::params![category.kind, category.color, id],
            )?;
            return Ok(UpsertOutcome::Updated);
        }

        let sql = CustomCategory::insert_sql().replacen("INSERT", "INSERT OR REPLACE", 1);
        self.conn
            .execute(&sql, rusqlite::params_from_iter(category.bind()?))?;
        Ok(UpsertOutcome::Inserted)
    }

    fn upsert_user(&mut self, user: &UserProfile) -> Result<()> {
        let sql = UserProfile::insert_sql().replacen("INSERT", "INSERT OR REPLACE", 1);
        self.conn
            .execute(&sql, rusqlite::params_from_iter(user.bind()?))?;
        Ok(())
    }

    fn set_product_photo(&mut self, product_id: &str, photo_uri: &str) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE products SET photo_uri = ?2 WHERE id = ?1",
            [product_id, photo_uri],
        )?;
        Ok(changed > 0)
    }

    fn set_user_images(
        &mut self,
        user_id: &str,
        profile_photo: Option<&str>,
        business_logo: Option<&str>,
    ) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE users
             SET profile_photo = COALESCE(?2, profile_photo),
                 business_logo = COALESCE(?3, business_logo)
             WHERE id = ?1",
            rusqlite::params![user_id, profile_photo, business_logo],
        )?;
        Ok(changed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn product(id: &str) -> Product {
        Product {
            id: id.to_string(),
            name: format!("Product {id}"),
            ..Product::default()
        }
    }

    fn sale(id: &str) -> Sale {
        Sale {
            id: id.to_string(),
            product_id: "p1".to_string(),
            ..Sale::default()
        }
    }

    #[test]
    fn test_open_memory() {
        let storage = SqliteStorage::open_memory();
        assert!(storage.is_ok());
    }

    #[test]
    fn test_insert_and_read_back_ordered() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let rows = vec![product("p2"), product("p1")];

        storage
            .atomically("seed", &mut |tx| tx.insert(Batch::Products(&rows)))
            .unwrap();

        let read = storage.products().unwrap();
        assert_eq!(read.len(), 2);
        assert_eq!(read[0].id, "p1");
        assert_eq!(read[1], rows[0]);
    }

    #[test]
    fn test_failed_closure_rolls_back_everything() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let seed = vec![product("old")];
        storage
            .atomically("seed", &mut |tx| tx.insert(Batch::Products(&seed)))
            .unwrap();

        let replacement = vec![product("new")];
        let duplicate_sales = vec![sale("s1"), sale("s1")];
        let result = storage.atomically("replace", &mut |tx| {
            tx.clear(EntityKind::Product, "u1")?;
            tx.insert(Batch::Products(&replacement))?;
            tx.insert(Batch::Sales(&duplicate_sales))
        });

        assert!(matches!(result, Err(Error::Database(_))));
        let products = storage.products().unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].id, "old");
        assert!(storage.sales().unwrap().is_empty());
    }

    #[test]
    fn test_failed_batch_leaves_transaction_usable() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let duplicate_sales = vec![sale("s1"), sale("s1")];
        let one_sale = vec![sale("s2")];

        storage
            .atomically("partial", &mut |tx| {
                assert!(tx.insert(Batch::Sales(&duplicate_sales)).is_err());
                tx.insert(Batch::Sales(&one_sale))
            })
            .unwrap();

        let sales = storage.sales().unwrap();
        assert_eq!(sales.len(), 1);
        assert_eq!(sales[0].id, "s2");
    }

    #[test]
    fn test_clear_is_owner_scoped() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let collections = vec![
            Collection {
                id: "c1".into(),
                user_id: "alice".into(),
                ..Collection::default()
            },
            Collection {
                id: "c2".into(),
                user_id: "bob".into(),
                ..Collection::default()
            },
        ];
        let items = vec![
            CollectionItem {
                id: "i1".into(),
                collection_id: "c1".into(),
                ..CollectionItem::default()
            },
            CollectionItem {
                id: "i2".into(),
                collection_id: "c2".into(),
                ..CollectionItem::default()
            },
        ];
        storage
            .atomically("seed", &mut |tx| {
                tx.insert(Batch::Collections(&collections))?;
                tx.insert(Batch::CollectionItems(&items))
            })
            .unwrap();

        storage
            .atomically("clear", &mut |tx| {
                assert_eq!(tx.clear(EntityKind::CollectionItem, "alice")?, 1);
                assert_eq!(tx.clear(EntityKind::Collection, "alice")?, 1);
                Ok(())
            })
            .unwrap();

        assert!(storage.collections("alice").unwrap().is_empty());
        assert_eq!(storage.collections("bob").unwrap().len(), 1);
        assert_eq!(storage.collection_items("bob").unwrap()[0].id, "i2");
    }

    #[test]
    fn test_dangling_collection_item_belongs_to_owner() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let collections = vec![Collection {
            id: "c2".into(),
            user_id: "bob".into(),
            ..Collection::default()
        }];
        let items = vec![
            CollectionItem {
                id: "orphan".into(),
                collection_id: "ghost".into(),
                ..CollectionItem::default()
            },
            CollectionItem {
                id: "i2".into(),
                collection_id: "c2".into(),
                ..CollectionItem::default()
            },
        ];
        storage
            .atomically("seed", &mut |tx| {
                tx.insert(Batch::Collections(&collections))?;
                tx.insert(Batch::CollectionItems(&items))
            })
            .unwrap();

        let owned = storage.collection_items("alice").unwrap();
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].id, "orphan");
        assert_eq!(storage.counts("alice").unwrap().collection_items, 1);

        storage
            .atomically("clear", &mut |tx| {
                assert_eq!(tx.clear(EntityKind::CollectionItem, "alice")?, 1);
                Ok(())
            })
            .unwrap();

        assert!(storage.collection_items("alice").unwrap().is_empty());
        assert_eq!(storage.collection_items("bob").unwrap()[0].id, "i2");
    }

    #[test]
    fn test_empty_collection_id_is_rejected() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let items = vec![CollectionItem {
            id: "i1".into(),
            ..CollectionItem::default()
        }];
        let result = storage.atomically("seed", &mut |tx| tx.insert(Batch::CollectionItems(&items)));
        assert!(result.is_err());
    }

    #[test]
    fn test_upsert_custom_category_by_name() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut category = CustomCategory {
            id: "cat1".into(),
            user_id: "u1".into(),
            name: "Drinks".into(),
            ..CustomCategory::default()
        };

        assert_eq!(
            storage.upsert_custom_category(&category).unwrap(),
            UpsertOutcome::Inserted
        );

        category.id = "cat2".into();
        category.color = Some("#ff0000".into());
        assert_eq!(
            storage.upsert_custom_category(&category).unwrap(),
            UpsertOutcome::Updated
        );

        let stored = storage.custom_categories("u1").unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, "cat1");
        assert_eq!(stored[0].color.as_deref(), Some("#ff0000"));
    }

    #[test]
    fn test_set_product_photo() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let rows = vec![product("p1")];
        storage
            .atomically("seed", &mut |tx| tx.insert(Batch::Products(&rows)))
            .unwrap();

        assert!(storage.set_product_photo("p1", "/new/photo.jpg").unwrap());
        assert!(!storage.set_product_photo("missing", "/x.jpg").unwrap());
        assert_eq!(
            storage.products().unwrap()[0].photo_uri.as_deref(),
            Some("/new/photo.jpg")
        );
    }

    #[test]
    fn test_user_round_trip_and_images() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let user = UserProfile {
            id: "u1".into(),
            email: "owner@example.com".into(),
            profile_photo: Some("/old/profile.png".into()),
            ..UserProfile::default()
        };
        storage.upsert_user(&user).unwrap();
        assert!(storage.set_user_images("u1", None, Some("/logo.png")).unwrap());

        let stored = storage.user("u1").unwrap().unwrap();
        assert_eq!(stored.profile_photo.as_deref(), Some("/old/profile.png"));
        assert_eq!(stored.business_logo.as_deref(), Some("/logo.png"));
        assert!(storage.user("nobody").unwrap().is_none());
    }

    #[test]
    fn test_counts() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let rows = vec![product("p1"), product("p2")];
        storage
            .atomically("seed", &mut |tx| tx.insert(Batch::Products(&rows)))
            .unwrap();

        let counts = storage.counts("u1").unwrap();
        assert_eq!(counts.products, 2);
        assert_eq!(counts.total(), 2);
    }
}
