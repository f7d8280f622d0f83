//! Remote object storage and the backup provider built on it.
//!
//! - [`ObjectStorage`] - fetch/put objects by path
//! - [`HttpObjectStorage`] - REST implementation over `reqwest`
//! - [`MemoryObjectStorage`] - in-process store used by tests
//! - [`ObjectStoreBackupProvider`] - rolling `latest.zip` per user
//!
//! # Configuration
//!
//! Settings are read from `~/.stockbook/config.json`:
//!
//! ```json
//! { "remote": { "storageBaseUrl": "...", "storageDomain": "...", "authToken": "..." } }
//! ```
//!
//! Environment variables take precedence:
//! - `STOCKBOOK_STORAGE_URL` - storage base URL
//! - `STOCKBOOK_STORAGE_TOKEN` - bearer token

pub mod backup;
pub mod config;
pub mod http;
pub mod provider;

pub use backup::{ObjectStoreBackupProvider, backup_object_path};
pub use config::{RemoteSettings, ResolvedRemote, StockbookConfig};
pub use http::HttpObjectStorage;
pub use provider::{MemoryObjectStorage, ObjectStorage};
