//! Ledger records: customers, sales and expenses.

use serde::{Deserialize, Serialize};

use super::wire::{default_true, now_millis, timestamp};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Customer {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Outstanding amount owed by the customer.
    pub balance: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default = "now_millis", deserialize_with = "timestamp")]
    pub created_at: i64,
    #[serde(default = "now_millis", deserialize_with = "timestamp")]
    pub updated_at: i64,
}

/// A single sale. `product_id` and `customer_id` are not checked against
/// the product and customer lists.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Sale {
    pub id: String,
    pub product_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    pub quantity: f64,
    pub unit_price: f64,
    pub total_amount: f64,
    #[serde(default = "default_payment_method")]
    pub payment_method: String,
    #[serde(default = "default_true")]
    pub is_paid: bool,
    #[serde(default = "now_millis", deserialize_with = "timestamp")]
    pub sale_date: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Expense {
    pub id: String,
    pub category: String,
    pub amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_payment_method")]
    pub payment_method: String,
    #[serde(default = "now_millis", deserialize_with = "timestamp")]
    pub expense_date: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_uri: Option<String>,
}

fn default_payment_method() -> String {
    "cash".to_string()
}
