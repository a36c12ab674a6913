//! In-memory goal repository.
//!
//! Used by tests and by embedders that keep goals in process.

use std::collections::HashMap;
use async_trait::async_trait;
use haddaf_core::{GoalId, PlayerGoal, PlayerId};
use tokio::sync::RwLock;
use tracing::debug;

use crate::subscription::{GoalSubscription, SnapshotHub};
use crate::trait_::{sort_goals, stamp_for_write, GoalRepository, Result};

/// Goal repository backed by a `HashMap`.
#[derive(Default)]
pub struct InMemoryGoalRepository {
    goals: RwLock<HashMap<GoalId, PlayerGoal>>,
    hub: SnapshotHub,
}

impl InMemoryGoalRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored goals across all players.
    pub async fn len(&self) -> usize {
        self.goals.read().await.len()
    }

    /// Whether no goals are stored.
    pub async fn is_empty(&self) -> bool {
        self.goals.read().await.is_empty()
    }
}

fn owner_snapshot(goals: &HashMap<GoalId, PlayerGoal>, owner: &PlayerId) -> Vec<PlayerGoal> {
    let mut owned: Vec<PlayerGoal> = goals
        .values()
        .filter(|g| &g.owner_id == owner)
        .cloned()
        .collect();
    sort_goals(&mut owned);
    owned
}

#[async_trait]
impl GoalRepository for InMemoryGoalRepository {
    async fn save(&self, goal: &PlayerGoal) -> Result<()> {
        let mut goals = self.goals.write().await;
        let stamped = stamp_for_write(goal, goals.get(&goal.id));
        let previous = goals.insert(goal.id, stamped);

        // An owner change would orphan the old owner's snapshot.
        if let Some(previous) = previous.filter(|p| p.owner_id != goal.owner_id) {
            self.hub
                .publish(&previous.owner_id, owner_snapshot(&goals, &previous.owner_id))
                .await;
        }
        self.hub
            .publish(&goal.owner_id, owner_snapshot(&goals, &goal.owner_id))
            .await;

        debug!(goal = %goal.id, "Saved goal");
        Ok(())
    }

    async fn load(&self, id: GoalId) -> Result<Option<PlayerGoal>> {
        Ok(self.goals.read().await.get(&id).cloned())
    }

    async fn list(&self, owner: &PlayerId) -> Result<Vec<PlayerGoal>> {
        Ok(owner_snapshot(&*self.goals.read().await, owner))
    }

    async fn delete(&self, id: GoalId) -> Result<()> {
        let mut goals = self.goals.write().await;
        if let Some(removed) = goals.remove(&id) {
            self.hub
                .publish(&removed.owner_id, owner_snapshot(&goals, &removed.owner_id))
                .await;
            debug!(goal = %id, "Deleted goal");
        }
        Ok(())
    }

    async fn subscribe(&self, owner: &PlayerId) -> Result<GoalSubscription> {
        // The read guard excludes writers until the subscription is open.
        let goals = self.goals.read().await;
        let current = owner_snapshot(&goals, owner);
        Ok(self.hub.subscribe(owner, current).await)
    }
}
