//! Collections: grouped receivables tracked against a set of customers.

use serde::{Deserialize, Serialize};

use super::wire::{IdList, now_millis, timestamp};

/// A collection drive, owned by one user.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Collection {
    pub id: String,
    pub user_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Accepted as an array or a comma-joined string, always written as an array.
    pub associated_customer_ids: IdList,
    pub target_amount: f64,
    pub collected_amount: f64,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default = "now_millis", deserialize_with = "timestamp")]
    pub due_date: i64,
    #[serde(default = "now_millis", deserialize_with = "timestamp")]
    pub created_at: i64,
    #[serde(default = "now_millis", deserialize_with = "timestamp")]
    pub updated_at: i64,
}

fn default_status() -> String {
    "active".to_string()
}

/// One expected or received payment within a collection.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CollectionItem {
    pub id: String,
    pub collection_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    pub amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub is_paid: bool,
    #[serde(default = "now_millis", deserialize_with = "timestamp")]
    pub created_at: i64,
}
