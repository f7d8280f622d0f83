//! Row mapping between entity structs and their SQLite tables.

use rusqlite::Row;
use rusqlite::types::{Type, Value};
use serde::de::DeserializeOwned;

use crate::error::Result;
use crate::model::{
    Collection, CollectionItem, Customer, CustomCategory, Expense, Invoice, Product, Sale,
    StockMovement, UserProfile,
};

/// An entity stored one row per record in a single table.
pub trait Table: Sized {
    const TABLE: &'static str;
    /// Column order shared by [`Table::bind`] and [`Table::from_row`].
    const COLUMNS: &'static [&'static str];

    /// Column values in [`Table::COLUMNS`] order.
    fn bind(&self) -> Result<Vec<Value>>;

    /// Build a record from a row selected with [`Table::COLUMNS`].
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    #[must_use]
    fn insert_sql() -> String {
        let placeholders: Vec<String> = (1..=Self::COLUMNS.len()).map(|i| format!("?{i}")).collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            Self::TABLE,
            Self::COLUMNS.join(", "),
            placeholders.join(", ")
        )
    }

    #[must_use]
    fn select_sql() -> String {
        format!("SELECT {} FROM {}", Self::COLUMNS.join(", "), Self::TABLE)
    }
}

fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}

fn opt_text(value: Option<&String>) -> Value {
    value.map_or(Value::Null, |s| Value::Text(s.clone()))
}

fn flag(value: bool) -> Value {
    Value::Integer(i64::from(value))
}

fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

impl Table for Product {
    const TABLE: &'static str = "products";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "name",
        "category",
        "sku",
        "barcode",
        "description",
        "price",
        "cost_price",
        "quantity",
        "low_stock_threshold",
        "unit",
        "photo_uri",
        "is_active",
        "created_at",
        "updated_at",
    ];

    fn bind(&self) -> Result<Vec<Value>> {
        Ok(vec![
            text(&self.id),
            text(&self.name),
            text(&self.category),
            opt_text(self.sku.as_ref()),
            opt_text(self.barcode.as_ref()),
            opt_text(self.description.as_ref()),
            Value::Real(self.price),
            Value::Real(self.cost_price),
            Value::Real(self.quantity),
            Value::Integer(self.low_stock_threshold),
            text(&self.unit),
            opt_text(self.photo_uri.as_ref()),
            flag(self.is_active),
            Value::Integer(self.created_at),
            Value::Integer(self.updated_at),
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            category: row.get(2)?,
            sku: row.get(3)?,
            barcode: row.get(4)?,
            description: row.get(5)?,
            price: row.get(6)?,
            cost_price: row.get(7)?,
            quantity: row.get(8)?,
            low_stock_threshold: row.get(9)?,
            unit: row.get(10)?,
            photo_uri: row.get(11)?,
            is_active: row.get(12)?,
            created_at: row.get(13)?,
            updated_at: row.get(14)?,
        })
    }
}

impl Table for StockMovement {
    const TABLE: &'static str = "stock_movements";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "product_id",
        "quantity_change",
        "movement_type",
        "reason",
        "reference_id",
        "created_at",
    ];

    fn bind(&self) -> Result<Vec<Value>> {
        Ok(vec![
            text(&self.id),
            text(&self.product_id),
            Value::Real(self.quantity_change),
            text(&self.movement_type),
            opt_text(self.reason.as_ref()),
            opt_text(self.reference_id.as_ref()),
            Value::Integer(self.created_at),
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            product_id: row.get(1)?,
            quantity_change: row.get(2)?,
            movement_type: row.get(3)?,
            reason: row.get(4)?,
            reference_id: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}

impl Table for CustomCategory {
    const TABLE: &'static str = "custom_categories";
    const COLUMNS: &'static [&'static str] =
        &["id", "user_id", "name", "kind", "color", "created_at"];

    fn bind(&self) -> Result<Vec<Value>> {
        Ok(vec![
            text(&self.id),
            text(&self.user_id),
            text(&self.name),
            text(&self.kind),
            opt_text(self.color.as_ref()),
            Value::Integer(self.created_at),
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            name: row.get(2)?,
            kind: row.get(3)?,
            color: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}

impl Table for Customer {
    const TABLE: &'static str = "customers";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "name",
        "phone",
        "email",
        "address",
        "balance",
        "notes",
        "created_at",
        "updated_at",
    ];

    fn bind(&self) -> Result<Vec<Value>> {
        Ok(vec![
            text(&self.id),
            text(&self.name),
            opt_text(self.phone.as_ref()),
            opt_text(self.email.as_ref()),
            opt_text(self.address.as_ref()),
            Value::Real(self.balance),
            opt_text(self.notes.as_ref()),
            Value::Integer(self.created_at),
            Value::Integer(self.updated_at),
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            phone: row.get(2)?,
            email: row.get(3)?,
            address: row.get(4)?,
            balance: row.get(5)?,
            notes: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }
}

impl Table for Sale {
    const TABLE: &'static str = "sales";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "product_id",
        "customer_id",
        "quantity",
        "unit_price",
        "total_amount",
        "payment_method",
        "is_paid",
        "sale_date",
        "notes",
    ];

    fn bind(&self) -> Result<Vec<Value>> {
        Ok(vec![
            text(&self.id),
            text(&self.product_id),
            opt_text(self.customer_id.as_ref()),
            Value::Real(self.quantity),
            Value::Real(self.unit_price),
            Value::Real(self.total_amount),
            text(&self.payment_method),
            flag(self.is_paid),
            Value::Integer(self.sale_date),
            opt_text(self.notes.as_ref()),
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            product_id: row.get(1)?,
            customer_id: row.get(2)?,
            quantity: row.get(3)?,
            unit_price: row.get(4)?,
            total_amount: row.get(5)?,
            payment_method: row.get(6)?,
            is_paid: row.get(7)?,
            sale_date: row.get(8)?,
            notes: row.get(9)?,
        })
    }
}

impl Table for Expense {
    const TABLE: &'static str = "expenses";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "category",
        "amount",
        "description",
        "payment_method",
        "expense_date",
        "receipt_uri",
    ];

    fn bind(&self) -> Result<Vec<Value>> {
        Ok(vec![
            text(&self.id),
            text(&self.category),
            Value::Real(self.amount),
            opt_text(self.description.as_ref()),
            text(&self.payment_method),
            Value::Integer(self.expense_date),
            opt_text(self.receipt_uri.as_ref()),
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            category: row.get(1)?,
            amount: row.get(2)?,
            description: row.get(3)?,
            payment_method: row.get(4)?,
            expense_date: row.get(5)?,
            receipt_uri: row.get(6)?,
        })
    }
}

impl Table for Collection {
    const TABLE: &'static str = "collections";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "user_id",
        "name",
        "description",
        "associated_customer_ids",
        "target_amount",
        "collected_amount",
        "status",
        "due_date",
        "created_at",
        "updated_at",
    ];

    fn bind(&self) -> Result<Vec<Value>> {
        Ok(vec![
            text(&self.id),
            text(&self.user_id),
            text(&self.name),
            opt_text(self.description.as_ref()),
            Value::Text(serde_json::to_string(&self.associated_customer_ids)?),
            Value::Real(self.target_amount),
            Value::Real(self.collected_amount),
            text(&self.status),
            Value::Integer(self.due_date),
            Value::Integer(self.created_at),
            Value::Integer(self.updated_at),
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            name: row.get(2)?,
            description: row.get(3)?,
            associated_customer_ids: json_column(row, 4)?,
            target_amount: row.get(5)?,
            collected_amount: row.get(6)?,
            status: row.get(7)?,
            due_date: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }
}

impl Table for CollectionItem {
    const TABLE: &'static str = "collection_items";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "collection_id",
        "customer_id",
        "amount",
        "note",
        "is_paid",
        "created_at",
    ];

    fn bind(&self) -> Result<Vec<Value>> {
        Ok(vec![
            text(&self.id),
            text(&self.collection_id),
            opt_text(self.customer_id.as_ref()),
            Value::Real(self.amount),
            opt_text(self.note.as_ref()),
            flag(self.is_paid),
            Value::Integer(self.created_at),
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            collection_id: row.get(1)?,
            customer_id: row.get(2)?,
            amount: row.get(3)?,
            note: row.get(4)?,
            is_paid: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}

impl Table for Invoice {
    const TABLE: &'static str = "invoices";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "invoice_number",
        "customer_id",
        "items",
        "subtotal",
        "tax",
        "discount",
        "total",
        "status",
        "issued_at",
        "due_at",
        "notes",
    ];

    fn bind(&self) -> Result<Vec<Value>> {
        Ok(vec![
            text(&self.id),
            text(&self.invoice_number),
            opt_text(self.customer_id.as_ref()),
            Value::Text(serde_json::to_string(&self.items)?),
            Value::Real(self.subtotal),
            Value::Real(self.tax),
            Value::Real(self.discount),
            Value::Real(self.total),
            text(&self.status),
            Value::Integer(self.issued_at),
            Value::Integer(self.due_at),
            opt_text(self.notes.as_ref()),
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            invoice_number: row.get(1)?,
            customer_id: row.get(2)?,
            items: json_column(row, 3)?,
            subtotal: row.get(4)?,
            tax: row.get(5)?,
            discount: row.get(6)?,
            total: row.get(7)?,
            status: row.get(8)?,
            issued_at: row.get(9)?,
            due_at: row.get(10)?,
            notes: row.get(11)?,
        })
    }
}

impl Table for UserProfile {
    const TABLE: &'static str = "users";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "email",
        "display_name",
        "business_name",
        "phone",
        "currency",
        "profile_photo",
        "business_logo",
        "last_login_at",
        "created_at",
    ];

    fn bind(&self) -> Result<Vec<Value>> {
        Ok(vec![
            text(&self.id),
            text(&self.email),
            text(&self.display_name),
            opt_text(self.business_name.as_ref()),
            opt_text(self.phone.as_ref()),
            text(&self.currency),
            opt_text(self.profile_photo.as_ref()),
            opt_text(self.business_logo.as_ref()),
            Value::Integer(self.last_login_at),
            Value::Integer(self.created_at),
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            email: row.get(1)?,
            display_name: row.get(2)?,
            business_name: row.get(3)?,
            phone: row.get(4)?,
            currency: row.get(5)?,
            profile_photo: row.get(6)?,
            business_logo: row.get(7)?,
            last_login_at: row.get(8)?,
            created_at: row.get(9)?,
        })
    }
}
