//! Stockbook sync - backup, restore and asset reconciliation
//!
//! This crate provides the core functionality for the `stockbook` CLI tool.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`model`] - Ledger records (products, sales, invoices, collections, ...)
//! - [`storage`] - SQLite record store and preference stores
//! - [`sync`] - Snapshot codec, archives, restore and orchestration
//! - [`remote`] - Object storage clients and the remote backup provider
//! - [`config`] - Data paths and principal resolution
//! - [`validate`] - Setting and payment method normalization
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod remote;
pub mod storage;
pub mod sync;
pub mod validate;

pub use error::{Error, Result};
