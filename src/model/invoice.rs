//! Invoices and their line items.

use serde::{Deserialize, Serialize};

use super::wire::{now_millis, timestamp};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Invoice {
    pub id: String,
    pub invoice_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    /// Ordered line items, stored with the invoice.
    pub items: Vec<InvoiceLineItem>,
    pub subtotal: f64,
    pub tax: f64,
    pub discount: f64,
    pub total: f64,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default = "now_millis", deserialize_with = "timestamp")]
    pub issued_at: i64,
    #[serde(default = "now_millis", deserialize_with = "timestamp")]
    pub due_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

fn default_status() -> String {
    "draft".to_string()
}

/// A line on an invoice. Line items have no identity of their own.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InvoiceLineItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub total: f64,
}

impl Invoice {
    /// Sum of line totals.
    #[must_use]
    pub fn line_total(&self) -> f64 {
        self.items.iter().map(|item| item.total).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_items_preserve_order() {
        let invoice: Invoice = serde_json::from_str(
            r#"{"id":"inv1","items":[{"description":"b","total":2.0},{"description":"a","total":3.5}]}"#,
        )
        .unwrap();
        assert_eq!(invoice.items[0].description, "b");
        assert_eq!(invoice.items[1].description, "a");
        assert!((invoice.line_total() - 5.5).abs() < f64::EPSILON);
        assert_eq!(invoice.status, "draft");
    }
}
