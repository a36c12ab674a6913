//! Goal board - one player's live view of their goals.
//!
//! A board owns at most one subscription. Each delivered snapshot replaces
//! the previous one wholesale and every projection is re-derived from it.

use std::sync::Arc;
use haddaf_core::{GoalEvaluator, MetricType, PlayerGoal, PlayerId};
use haddaf_storage::{GoalRepository, GoalSubscription, StorageError};
use tracing::debug;

/// Live projection of a player's goals.
pub struct GoalBoard {
    owner: PlayerId,
    repository: Arc<dyn GoalRepository>,
    subscription: Option<GoalSubscription>,
    goals: Vec<PlayerGoal>,
    evaluator: GoalEvaluator,
}

impl GoalBoard {
    /// Create a detached board.
    pub fn new(repository: Arc<dyn GoalRepository>, owner: PlayerId) -> Self {
        Self {
            owner,
            repository,
            subscription: None,
            goals: Vec::new(),
            evaluator: GoalEvaluator::new(),
        }
    }

    /// Player this board follows.
    pub fn owner(&self) -> &PlayerId {
        &self.owner
    }

    /// Start following the player, replacing any previous subscription.
    ///
    /// Loads the current snapshot before returning.
    pub async fn attach(&mut self) -> Result<(), StorageError> {
        self.detach();
        let mut subscription = self.repository.subscribe(&self.owner).await?;
        if let Some(snapshot) = subscription.next().await {
            self.goals = snapshot;
        }
        self.subscription = Some(subscription);
        debug!(player = %self.owner, goals = self.goals.len(), "Attached goal board");
        Ok(())
    }

    /// Stop following. The last snapshot stays readable.
    pub fn detach(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.cancel();
        }
    }

    /// Whether a subscription is open.
    pub fn is_attached(&self) -> bool {
        self.subscription.is_some()
    }

    /// Wait for the next snapshot and replace the board's state with it.
    ///
    /// Returns `false` when detached or the subscription has ended.
    pub async fn refresh(&mut self) -> bool {
        let next = match self.subscription.as_mut() {
            Some(subscription) => subscription.next().await,
            None => return false,
        };
        match next {
            Some(snapshot) => {
                self.goals = snapshot;
                true
            }
            None => {
                self.subscription = None;
                false
            }
        }
    }

    /// Every goal in the latest snapshot.
    pub fn goals(&self) -> &[PlayerGoal] {
        &self.goals
    }

    /// Goals still being worked on.
    pub fn active_goals(&self) -> Vec<&PlayerGoal> {
        self.goals.iter().filter(|g| g.is_active()).collect()
    }

    /// Achieved goals waiting for the player to dismiss or reset them.
    pub fn achieved_goals(&self) -> Vec<&PlayerGoal> {
        self.goals.iter().filter(|g| g.is_achieved()).collect()
    }

    /// The goal shown for a metric, preferring the active one.
    pub fn goal_for(&self, metric: MetricType) -> Option<&PlayerGoal> {
        self.goals
            .iter()
            .find(|g| g.metric == metric && g.is_active())
            .or_else(|| self.goals.iter().find(|g| g.metric == metric))
    }

    /// Metrics offered in the set-goal flow.
    pub fn selectable_metrics(&self) -> Vec<MetricType> {
        self.evaluator.selectable_metrics(&self.goals)
    }

    /// Whether the set-goal flow has anything to offer.
    pub fn can_set_new_goal(&self) -> bool {
        !self.selectable_metrics().is_empty()
    }
}

impl Drop for GoalBoard {
    fn drop(&mut self) {
        self.detach();
    }
}
