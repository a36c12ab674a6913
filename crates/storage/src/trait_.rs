//! Goal repository abstraction.

use async_trait::async_trait;
use chrono::Utc;
use haddaf_core::{GoalId, PlayerGoal, PlayerId};

use crate::subscription::GoalSubscription;

/// Error type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Item not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Database backend error
    #[error("Database error: {0}")]
    Database(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Persistence and live subscription for player goals.
///
/// Implementations stamp `created_at`/`updated_at` on write and push a full
/// snapshot of the owner's goals to every open subscription after each change.
#[async_trait]
pub trait GoalRepository: Send + Sync {
    /// Upsert a goal by ID. Saving the same value twice is harmless.
    async fn save(&self, goal: &PlayerGoal) -> Result<()>;

    /// Load a goal by ID.
    async fn load(&self, id: GoalId) -> Result<Option<PlayerGoal>>;

    /// List a player's goals, oldest first.
    async fn list(&self, owner: &PlayerId) -> Result<Vec<PlayerGoal>>;

    /// Delete a goal. Deleting a missing goal succeeds.
    async fn delete(&self, id: GoalId) -> Result<()>;

    /// Subscribe to full snapshots of a player's goals.
    async fn subscribe(&self, owner: &PlayerId) -> Result<GoalSubscription>;
}

/// Apply write bookkeeping: keep the original `created_at`, bump `updated_at`.
pub(crate) fn stamp_for_write(goal: &PlayerGoal, previous: Option<&PlayerGoal>) -> PlayerGoal {
    let mut stamped = goal.clone();
    if let Some(previous) = previous {
        stamped.created_at = previous.created_at;
    }
    stamped.updated_at = Utc::now();
    stamped
}

/// Stable ordering for snapshots.
pub(crate) fn sort_goals(goals: &mut [PlayerGoal]) {
    goals.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
}
