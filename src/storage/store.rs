//! Storage collaborator interfaces.
//!
//! Backup and restore never talk to SQLite directly. They go through these
//! traits so any transactional store (or an in-memory fake) can stand in:
//!
//! - [`DatasetReader`] - read every entity list for encoding
//! - [`RecordStore`] - run a closure inside one atomic transaction, plus the
//!   best-effort single-row writes used after the transaction
//! - [`RecordTx`] - the operations available inside that transaction

use crate::error::Result;
use crate::model::{
    Collection, CollectionItem, Customer, CustomCategory, EntityKind, Expense, Invoice, Product,
    Sale, StockMovement, UserProfile,
};

/// Read access to the full dataset, ordered by primary key.
pub trait DatasetReader {
    fn products(&self) -> Result<Vec<Product>>;
    fn customers(&self) -> Result<Vec<Customer>>;
    fn sales(&self) -> Result<Vec<Sale>>;
    fn expenses(&self) -> Result<Vec<Expense>>;
    /// Collections owned by `owner`.
    fn collections(&self, owner: &str) -> Result<Vec<Collection>>;
    /// Items of collections owned by `owner`.
    fn collection_items(&self, owner: &str) -> Result<Vec<CollectionItem>>;
    fn invoices(&self) -> Result<Vec<Invoice>>;
    fn stock_movements(&self) -> Result<Vec<StockMovement>>;
    /// Custom categories owned by `owner`.
    fn custom_categories(&self, owner: &str) -> Result<Vec<CustomCategory>>;
    fn user(&self, id: &str) -> Result<Option<UserProfile>>;
}

/// A homogeneous batch of records to insert.
#[derive(Debug, Clone, Copy)]
pub enum Batch<'a> {
    Products(&'a [Product]),
    Customers(&'a [Customer]),
    Sales(&'a [Sale]),
    Expenses(&'a [Expense]),
    Collections(&'a [Collection]),
    CollectionItems(&'a [CollectionItem]),
    Invoices(&'a [Invoice]),
    StockMovements(&'a [StockMovement]),
}

impl<'a> Batch<'a> {
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Products(_) => EntityKind::Product,
            Self::Customers(_) => EntityKind::Customer,
            Self::Sales(_) => EntityKind::Sale,
            Self::Expenses(_) => EntityKind::Expense,
            Self::Collections(_) => EntityKind::Collection,
            Self::CollectionItems(_) => EntityKind::CollectionItem,
            Self::Invoices(_) => EntityKind::Invoice,
            Self::StockMovements(_) => EntityKind::StockMovement,
        }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        match self {
            Self::Products(rows) => rows.len(),
            Self::Customers(rows) => rows.len(),
            Self::Sales(rows) => rows.len(),
            Self::Expenses(rows) => rows.len(),
            Self::Collections(rows) => rows.len(),
            Self::CollectionItems(rows) => rows.len(),
            Self::Invoices(rows) => rows.len(),
            Self::StockMovements(rows) => rows.len(),
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The single-record batch at `index`, with that record's id.
    ///
    /// Used to retry a failed bulk insert one record at a time.
    #[must_use]
    pub fn single(&self, index: usize) -> Option<(Batch<'a>, &'a str)> {
        fn one<T>(rows: &[T], index: usize) -> Option<&[T]> {
            rows.get(index).map(std::slice::from_ref)
        }

        Some(match *self {
            Self::Products(rows) => {
                let row = one(rows, index)?;
                (Self::Products(row), row[0].id.as_str())
            }
            Self::Customers(rows) => {
                let row = one(rows, index)?;
                (Self::Customers(row), row[0].id.as_str())
            }
            Self::Sales(rows) => {
                let row = one(rows, index)?;
                (Self::Sales(row), row[0].id.as_str())
            }
            Self::Expenses(rows) => {
                let row = one(rows, index)?;
                (Self::Expenses(row), row[0].id.as_str())
            }
            Self::Collections(rows) => {
                let row = one(rows, index)?;
                (Self::Collections(row), row[0].id.as_str())
            }
            Self::CollectionItems(rows) => {
                let row = one(rows, index)?;
                (Self::CollectionItems(row), row[0].id.as_str())
            }
            Self::Invoices(rows) => {
                let row = one(rows, index)?;
                (Self::Invoices(row), row[0].id.as_str())
            }
            Self::StockMovements(rows) => {
                let row = one(rows, index)?;
                (Self::StockMovements(row), row[0].id.as_str())
            }
        })
    }
}

/// Operations available inside an atomic transaction.
pub trait RecordTx {
    /// Delete every row of `kind`.
    ///
    /// Collections, collection items and custom categories are scoped: only
    /// rows belonging to `owner` are removed. Other kinds ignore `owner`.
    fn clear(&mut self, kind: EntityKind, owner: &str) -> Result<usize>;

    /// Insert a batch. Either every row is inserted or none is; a failed
    /// batch leaves the surrounding transaction usable.
    fn insert(&mut self, batch: Batch<'_>) -> Result<()>;
}

/// Outcome of an upsert keyed by a natural key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// A transactional record store.
pub trait RecordStore: DatasetReader {
    /// Run `f` inside one atomic transaction.
    ///
    /// Commits when `f` returns `Ok`; rolls back every change made through
    /// the [`RecordTx`] when it returns `Err`. Concurrent readers observe
    /// either the state before or after, never a mix.
    ///
    /// # Errors
    ///
    /// Returns the closure's error, or a store error if the transaction
    /// cannot begin or commit.
    fn atomically(
        &mut self,
        op: &str,
        f: &mut dyn FnMut(&mut dyn RecordTx) -> Result<()>,
    ) -> Result<()>;

    /// Update the category with the same name for the same owner, or
    /// insert it.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn upsert_custom_category(&mut self, category: &CustomCategory) -> Result<UpsertOutcome>;

    /// Insert or replace the user row.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn upsert_user(&mut self, user: &UserProfile) -> Result<()>;

    /// Point a product's photo at a new location. Returns whether the
    /// product exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn set_product_photo(&mut self, product_id: &str, photo_uri: &str) -> Result<bool>;

    /// Point the user's profile photo and/or business logo at new
    /// locations. `None` leaves a field unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn set_user_images(
        &mut self,
        user_id: &str,
        profile_photo: Option<&str>,
        business_logo: Option<&str>,
    ) -> Result<bool>;
}
