//! Normalization for values restored from backup documents.
//!
//! Settings come from documents written by many app versions. Each helper
//! accepts the shapes seen in the wild and falls back to a safe default
//! instead of failing the restore:
//!
//! - Theme: `"dark"`, `"night"`, `{"mode": "dark"}` or that object as a
//!   JSON string
//! - Interface scale: a number or a numeric string, clamped

use std::collections::HashMap;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Theme ─────────────────────────────────────────────────────

/// Color scheme preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    Light,
    Dark,
    #[default]
    System,
}

impl ThemeMode {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
            Self::System => "system",
        }
    }

    /// Parse a mode name or synonym. Case-insensitive.
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        let lower = input.trim().to_lowercase();
        let canonical = THEME_SYNONYMS.get(lower.as_str()).copied().unwrap_or(lower.as_str());
        match canonical {
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

static THEME_SYNONYMS: LazyLock<HashMap<&str, &str>> = LazyLock::new(|| {
    HashMap::from([
        ("night", "dark"),
        ("black", "dark"),
        ("day", "light"),
        ("white", "light"),
        ("auto", "system"),
        ("default", "system"),
        ("device", "system"),
    ])
});

/// Normalize a stored theme setting.
///
/// A plain string becomes the canonical mode name. An object (or an object
/// serialized into a string) keeps its other fields and gets a canonical
/// `mode`. Anything unrecognized becomes `"system"`.
#[must_use]
pub fn theme_setting(value: &Value) -> Value {
    match value {
        Value::String(s) => {
            if let Ok(Value::Object(doc)) = serde_json::from_str::<Value>(s) {
                return theme_document(doc);
            }
            Value::from(ThemeMode::parse(s).unwrap_or_default().as_str())
        }
        Value::Object(doc) => theme_document(doc.clone()),
        _ => Value::from(ThemeMode::System.as_str()),
    }
}

fn theme_document(mut doc: serde_json::Map<String, Value>) -> Value {
    let mode = doc
        .get("mode")
        .and_then(Value::as_str)
        .and_then(ThemeMode::parse)
        .unwrap_or_default();
    doc.insert("mode".to_string(), Value::from(mode.as_str()));
    Value::Object(doc)
}

// ── Interface scale ──────────────────────────────────────────

pub const MIN_INTERFACE_SCALE: f64 = 0.5;
pub const MAX_INTERFACE_SCALE: f64 = 2.0;
pub const DEFAULT_INTERFACE_SCALE: f64 = 1.0;

/// Parse an interface scale factor, clamped to the supported range.
///
/// Non-numeric and non-finite values fall back to the default.
#[must_use]
pub fn interface_scale(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match parsed {
        Some(scale) if scale.is_finite() => scale.clamp(MIN_INTERFACE_SCALE, MAX_INTERFACE_SCALE),
        _ => DEFAULT_INTERFACE_SCALE,
    }
}
