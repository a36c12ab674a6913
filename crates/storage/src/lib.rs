//! Goal storage for Haddaf.
//!
//! This crate provides the [`GoalRepository`] contract, snapshot
//! subscriptions, and in-memory, JSON-file and (behind the `sqlite` feature)
//! SQLite implementations.

#![warn(missing_docs)]

pub mod trait_;
pub mod subscription;
pub mod memory;
pub mod json_storage;
#[cfg(feature = "sqlite")]
pub mod sqlite_storage;

pub use trait_::{GoalRepository, StorageError, Result};
pub use subscription::{GoalSubscription, SnapshotHub};
pub use memory::InMemoryGoalRepository;
pub use json_storage::JsonGoalRepository;
#[cfg(feature = "sqlite")]
pub use sqlite_storage::SqliteGoalRepository;
