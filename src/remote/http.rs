//! HTTP object storage client.
//!
//! Talks to a bucket-style REST API:
//! - download: `GET {base}/o/{path}?alt=media`
//! - upload: `POST {base}/o?uploadType=media&name={path}`
//!
//! Object paths are percent-encoded as a single segment, so `/` becomes
//! `%2F`.

use std::time::Duration;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use tracing::debug;

use crate::error::{Error, Result};

use super::provider::ObjectStorage;

/// Characters escaped in an object path. Everything but unreserved ones.
const OBJECT_PATH: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Object storage reached over HTTP.
pub struct HttpObjectStorage {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpObjectStorage {
    /// Create a client for the bucket at `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Download URL for an object.
    #[must_use]
    pub fn object_url(&self, path: &str) -> String {
        format!("{}/o/{}?alt=media", self.base_url, encode_path(path))
    }

    /// Upload URL for an object.
    #[must_use]
    pub fn upload_url(&self, path: &str) -> String {
        format!("{}/o?uploadType=media&name={}", self.base_url, encode_path(path))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

/// Percent-encode an object path as one URL segment.
#[must_use]
pub fn encode_path(path: &str) -> String {
    utf8_percent_encode(path, OBJECT_PATH).to_string()
}

async fn check(response: reqwest::Response, action: &str, path: &str) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::Remote(format!("{action} {path} failed ({status}): {body}")))
}

impl ObjectStorage for HttpObjectStorage {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn fetch_object(&self, path: &str) -> Result<Vec<u8>> {
        let url = self.object_url(path);
        debug!(%url, "Fetching object");

        let request = self.authorize(self.client.get(&url).timeout(REQUEST_TIMEOUT));
        let response = check(request.send().await?, "download", path).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn put_object(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        let url = self.upload_url(path);
        debug!(%url, bytes = bytes.len(), "Uploading object");

        let request = self.authorize(
            self.client
                .post(&url)
                .timeout(REQUEST_TIMEOUT)
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .body(bytes),
        );
        check(request.send().await?, "upload", path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::object_path_from_url;

    #[test]
    fn test_encode_path_escapes_slashes() {
        assert_eq!(encode_path("users/u1/inventory/p 1.jpg"), "users%2Fu1%2Finventory%2Fp%201.jpg");
        assert_eq!(encode_path("a-b_c.d~e"), "a-b_c.d~e");
    }

    #[test]
    fn test_urls() {
        let storage = HttpObjectStorage::new("https://storage.example.com/v0/b/shop/", None);
        assert_eq!(
            storage.object_url("backups/u1/latest.zip"),
            "https://storage.example.com/v0/b/shop/o/backups%2Fu1%2Flatest.zip?alt=media"
        );
        assert_eq!(
            storage.upload_url("backups/u1/latest.zip"),
            "https://storage.example.com/v0/b/shop/o?uploadType=media&name=backups%2Fu1%2Flatest.zip"
        );
    }

    #[test]
    fn test_object_url_round_trips_through_resolver() {
        let storage = HttpObjectStorage::new("https://storage.example.com/v0/b/shop", None);
        let url = storage.object_url("users/u1/inventory/p1.jpg");
        assert_eq!(object_path_from_url(&url).as_deref(), Some("users/u1/inventory/p1.jpg"));
    }
}
