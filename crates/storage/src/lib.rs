//! Snapshot storage for cycle state.
//!
//! This crate provides a trait-based interface for saving and restoring a
//! `CycleState`, with a JSON-file and an in-memory implementation.

#![warn(missing_docs)]

pub mod trait_;
pub mod json_storage;
pub mod memory;

pub use trait_::{StateStore, StorageError, Result};
pub use json_storage::{JsonStateStore, SnapshotMeta};
pub use memory::MemoryStateStore;
