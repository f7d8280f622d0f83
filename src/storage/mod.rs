//! SQLite storage layer for Stockbook.
//!
//! This module provides the persistence layer using SQLite with:
//! - WAL mode for concurrent reads
//! - Transaction discipline for atomic restores
//! - Savepoint-isolated bulk inserts
//!
//! # Submodules
//!
//! - [`preferences`] - Key-value settings, profile and login state
//! - [`schema`] - Database schema definitions
//! - [`sqlite`] - Main SQLite storage implementation
//! - [`store`] - Storage traits consumed by backup and restore
//! - [`tables`] - Entity to row mapping

pub mod preferences;
pub mod schema;
pub mod sqlite;
pub mod store;
pub mod tables;

pub use preferences::{FilePreferences, MemoryPreferences, PreferenceStore, keys};
pub use sqlite::{RecordCounts, SqliteStorage};
pub use store::{Batch, DatasetReader, RecordStore, RecordTx, UpsertOutcome};
