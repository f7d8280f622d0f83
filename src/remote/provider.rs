//! Object storage trait.
//!
//! Defines the interface every remote object store must implement. Paths
//! are plain object names such as `users/u1/inventory/p1.jpg`; URL encoding
//! is the implementation's concern.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Mutex;

use crate::error::{Error, Result};

/// Trait for remote object stores.
pub trait ObjectStorage: Send + Sync {
    /// Short name for logs and status output.
    fn name(&self) -> &'static str;

    /// Download an object's bytes.
    fn fetch_object(&self, path: &str) -> impl Future<Output = Result<Vec<u8>>> + Send;

    /// Upload an object, replacing any existing one at `path`.
    fn put_object(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// In-process object store, used for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryObjectStorage {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryObjectStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object synchronously.
    pub fn insert(&self, path: &str, bytes: impl Into<Vec<u8>>) {
        if let Ok(mut objects) = self.objects.lock() {
            objects.insert(path.to_string(), bytes.into());
        }
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.objects
            .lock()
            .map(|objects| objects.contains_key(path))
            .unwrap_or(false)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.lock().map(|objects| objects.len()).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ObjectStorage for MemoryObjectStorage {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn fetch_object(&self, path: &str) -> Result<Vec<u8>> {
        let objects = self
            .objects
            .lock()
            .map_err(|_| Error::Remote("object store lock poisoned".into()))?;
        objects
            .get(path)
            .cloned()
            .ok_or_else(|| Error::Remote(format!("object not found: {path}")))
    }

    async fn put_object(&self, path: &str, bytes: Vec<u8>, _content_type: &str) -> Result<()> {
        let mut objects = self
            .objects
            .lock()
            .map_err(|_| Error::Remote("object store lock poisoned".into()))?;
        objects.insert(path.to_string(), bytes);
        Ok(())
    }
}
