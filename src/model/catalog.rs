//! Catalog records: products, stock movements and user-defined categories.

use serde::{Deserialize, Serialize};

use super::wire::{default_true, now_millis, timestamp};

/// A product in the inventory.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub price: f64,
    pub cost_price: f64,
    pub quantity: f64,
    pub low_stock_threshold: i64,
    #[serde(default = "default_unit")]
    pub unit: String,
    /// Local absolute path or remote object-storage URL of the photo.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_uri: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default = "now_millis", deserialize_with = "timestamp")]
    pub created_at: i64,
    #[serde(default = "now_millis", deserialize_with = "timestamp")]
    pub updated_at: i64,
}

fn default_unit() -> String {
    "pcs".to_string()
}

/// A change to a product's stock level.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StockMovement {
    pub id: String,
    pub product_id: String,
    /// Signed delta: positive for restocks, negative for sales and losses.
    pub quantity_change: f64,
    #[serde(default = "default_movement_type")]
    pub movement_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Sale or invoice that caused the movement, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    #[serde(default = "now_millis", deserialize_with = "timestamp")]
    pub created_at: i64,
}

fn default_movement_type() -> String {
    "adjustment".to_string()
}

/// A category created by the user, scoped to that user.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CustomCategory {
    pub id: String,
    pub user_id: String,
    pub name: String,
    /// What the category classifies: `product` or `expense`.
    #[serde(default = "default_category_kind")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default = "now_millis", deserialize_with = "timestamp")]
    pub created_at: i64,
}

fn default_category_kind() -> String {
    "product".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_domain_defaults() {
        let product: Product = serde_json::from_str(r#"{"id":"p1"}"#).unwrap();
        assert_eq!(product.unit, "pcs");
        assert!(product.is_active);
        assert_eq!(product.name, "");
        assert!(product.photo_uri.is_none());
        assert!(product.created_at > 0);
    }

    #[test]
    fn test_absent_optionals_are_not_serialized() {
        let product = Product {
            id: "p1".into(),
            ..Product::default()
        };
        let json = serde_json::to_value(&product).unwrap();
        assert!(json.get("sku").is_none());
        assert!(json.get("photoUri").is_none());
        assert_eq!(json["costPrice"], 0.0);
    }

    #[test]
    fn test_unparsable_number_rejected() {
        let result: Result<Product, _> =
            serde_json::from_str(r#"{"id":"p1","price":"twelve"}"#);
        assert!(result.is_err());
    }
}
