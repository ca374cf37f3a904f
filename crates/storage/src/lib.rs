//! Persistence for Lineage component histories.
//!
//! This crate provides a trait-based storage interface with a JSON-file
//! implementation. Storage lives outside the core: trackers and blueprint
//! stores are captured into a [`ComponentRecord`] and restored from one.

#![warn(missing_docs)]

pub mod trait_;
pub mod json_storage;
pub mod record;

pub use trait_::{Storage, StorageError, Result};
pub use json_storage::JsonStorage;
pub use record::ComponentRecord;
