//! Wire-format normalization shared by all entity records.
//!
//! Backup documents written by older app versions disagree on how some
//! fields are encoded. The helpers here accept every observed form and
//! normalize to one internal representation:
//!
//! - timestamps: integer epoch milliseconds or ISO-like strings ([`EpochOrIso`])
//! - id collections: JSON arrays or comma-joined strings ([`ListOrCsv`])
//!
//! Encoding always emits the canonical form (integer millis, JSON array).

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Current time in epoch milliseconds.
#[must_use]
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// A timestamp as it may appear on the wire.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum EpochOrIso {
    /// Integer epoch milliseconds.
    Epoch(i64),
    /// Float epoch milliseconds (some exporters wrote `1700000000000.0`).
    EpochFloat(f64),
    /// An ISO-like date-time string.
    Iso(String),
}

impl EpochOrIso {
    /// Normalize to epoch milliseconds.
    ///
    /// # Errors
    ///
    /// Returns a message when the string form cannot be parsed.
    pub fn to_millis(&self) -> Result<i64, String> {
        match self {
            Self::Epoch(ms) => Ok(*ms),
            #[allow(clippy::cast_possible_truncation)]
            Self::EpochFloat(ms) if ms.is_finite() => Ok(ms.round() as i64),
            Self::EpochFloat(ms) => Err(format!("non-finite timestamp {ms}")),
            Self::Iso(s) => parse_iso_millis(s),
        }
    }
}

/// Layouts accepted for timestamps without an explicit offset.
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Parse an ISO-like string into epoch milliseconds.
///
/// Strings carrying an offset (`Z`, `+02:00`) are honored as-is. Strings
/// without one are interpreted in the process's local time zone. Purely
/// numeric strings are treated as epoch milliseconds.
///
/// # Errors
///
/// Returns a message when no accepted layout matches.
pub fn parse_iso_millis(raw: &str) -> Result<i64, String> {
    let s = raw.trim();
    if s.is_empty() {
        return Err("empty timestamp".to_string());
    }

    if let Ok(ms) = s.parse::<i64>() {
        return Ok(ms);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.timestamp_millis());
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return local_millis(&naive, raw);
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return local_millis(&naive, raw);
        }
    }

    Err(format!("unrecognized timestamp '{raw}'"))
}

fn local_millis(naive: &NaiveDateTime, raw: &str) -> Result<i64, String> {
    Local
        .from_local_datetime(naive)
        .earliest()
        .map(|dt| dt.timestamp_millis())
        .ok_or_else(|| format!("timestamp '{raw}' does not exist in the local time zone"))
}

/// Deserialize a timestamp field from any accepted wire form.
///
/// Used together with `#[serde(default = "now_millis")]` so an absent field
/// becomes "now" instead of staying unset.
///
/// # Errors
///
/// Fails when the value is neither a number nor a parsable string.
pub fn timestamp<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = EpochOrIso::deserialize(deserializer)?;
    raw.to_millis().map_err(D::Error::custom)
}

/// An id collection as it may appear on the wire.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ListOrCsv {
    /// `["a", "b"]`
    List(Vec<String>),
    /// `"a,b"`
    Csv(String),
}

/// Ordered set of string ids.
///
/// Insertion order is preserved, duplicates and blank entries are dropped
/// and surrounding whitespace is trimmed. Always serialized as an array.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdList(Vec<String>);

impl IdList {
    /// Build from any sequence of ids, normalizing as described above.
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<String> = Vec::new();
        for id in ids {
            let id = id.as_ref().trim();
            if !id.is_empty() && !out.iter().any(|existing| existing == id) {
                out.push(id.to_string());
            }
        }
        Self(out)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.0.iter().any(|existing| existing == id)
    }
}

impl From<ListOrCsv> for IdList {
    fn from(raw: ListOrCsv) -> Self {
        match raw {
            ListOrCsv::List(items) => Self::new(items),
            ListOrCsv::Csv(joined) => Self::new(joined.split(',')),
        }
    }
}

impl Serialize for IdList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for IdList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        ListOrCsv::deserialize(deserializer).map(Self::from)
    }
}

/// Serde default for booleans whose domain default is `true`.
#[must_use]
pub const fn default_true() -> bool {
    true
}
