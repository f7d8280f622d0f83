//! The signed-in user's profile.

use serde::{Deserialize, Serialize};

use super::wire::{now_millis, timestamp};

/// Profile of the user who owns the dataset.
///
/// `profile_photo` and `business_logo` hold a local absolute path or a
/// remote URL, like [`super::Product::photo_uri`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_photo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_logo: Option<String>,
    #[serde(default = "now_millis", deserialize_with = "timestamp")]
    pub last_login_at: i64,
    #[serde(default = "now_millis", deserialize_with = "timestamp")]
    pub created_at: i64,
}

fn default_currency() -> String {
    "USD".to_string()
}
