//! Storage abstraction and implementations for Academia.
//!
//! This crate provides the trait-based data-access interface the progression
//! engine reads through, with a JSON file backend and an in-memory backend.

#![warn(missing_docs)]

pub mod trait_;
pub mod json_storage;
pub mod memory_storage;

pub use trait_::{Storage, StorageError, Result};
pub use json_storage::JsonStorage;
pub use memory_storage::MemoryStorage;
