//! Data models for Stockbook.
//!
//! This module contains every record type that takes part in a backup:
//! - Product, StockMovement, CustomCategory (catalog)
//! - Customer, Sale, Expense (ledger)
//! - Collection, CollectionItem
//! - Invoice with nested line items
//! - UserProfile
//!
//! Field names serialize as camelCase to stay compatible with documents
//! produced by the mobile app. Timestamps are epoch milliseconds.

pub mod catalog;
pub mod collection;
pub mod invoice;
pub mod ledger;
pub mod user;
pub mod wire;

pub use catalog::{CustomCategory, Product, StockMovement};
pub use collection::{Collection, CollectionItem};
pub use invoice::{Invoice, InvoiceLineItem};
pub use ledger::{Customer, Expense, Sale};
pub use user::UserProfile;
pub use wire::{EpochOrIso, IdList, ListOrCsv};

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Kinds of records carried in a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Product,
    Customer,
    Sale,
    Expense,
    Collection,
    CollectionItem,
    Invoice,
    StockMovement,
    CustomCategory,
    User,
}

impl EntityKind {
    /// Top-level key of this kind's list in the backup document.
    #[must_use]
    pub const fn document_key(&self) -> &'static str {
        match self {
            Self::Product => "products",
            Self::Customer => "customers",
            Self::Sale => "sales",
            Self::Expense => "expenses",
            Self::Collection => "collections",
            Self::CollectionItem => "collectionItems",
            Self::Invoice => "invoices",
            Self::StockMovement => "stockMovements",
            Self::CustomCategory => "customCategories",
            Self::User => "user",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Product => write!(f, "product"),
            Self::Customer => write!(f, "customer"),
            Self::Sale => write!(f, "sale"),
            Self::Expense => write!(f, "expense"),
            Self::Collection => write!(f, "collection"),
            Self::CollectionItem => write!(f, "collection_item"),
            Self::Invoice => write!(f, "invoice"),
            Self::StockMovement => write!(f, "stock_movement"),
            Self::CustomCategory => write!(f, "custom_category"),
            Self::User => write!(f, "user"),
        }
    }
}

/// A record with a caller-supplied string primary key.
pub trait Entity: Serialize + DeserializeOwned {
    /// Which list this record belongs to.
    const KIND: EntityKind;

    /// Primary key. Empty means the record is unusable.
    fn id(&self) -> &str;
}

macro_rules! impl_entity {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl Entity for $ty {
                const KIND: EntityKind = EntityKind::$kind;

                fn id(&self) -> &str {
                    &self.id
                }
            }
        )*
    };
}

impl_entity! {
    Product => Product,
    Customer => Customer,
    Sale => Sale,
    Expense => Expense,
    Collection => Collection,
    CollectionItem => CollectionItem,
    Invoice => Invoice,
    StockMovement => StockMovement,
    CustomCategory => CustomCategory,
    UserProfile => User,
}
