//! Goal tracking service.
//!
//! Wires the pure [`GoalEvaluator`] to a repository and a notifier. All
//! persistence and notification side effects happen here, never in the
//! evaluator.

use std::sync::Arc;
use chrono::Utc;
use haddaf_core::{
    EvaluationResult, GoalEvaluator, GoalId, GoalStatus, MetricType, PerformanceFeedback,
    PlayerGoal, PlayerId, Time, ValidationError,
};
use haddaf_storage::{GoalRepository, StorageError};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::board::GoalBoard;
use crate::notify::{NotificationDispatch, NotificationKind};

/// Errors surfaced by [`GoalTracker`].
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// The request broke a goal rule
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The repository failed
    #[error("couldn't save your goal: {0}")]
    Storage(#[from] StorageError),

    /// No goal with this ID
    #[error("goal not found: {0}")]
    GoalNotFound(GoalId),
}

/// Configuration for the goal tracker.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Notify the player when they dismiss a goal
    pub notify_on_delete: bool,
    /// Send notifications from a spawned task instead of awaiting them
    pub background_notifications: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            notify_on_delete: true,
            background_notifications: true,
        }
    }
}

/// Goals that changed while processing one piece of feedback.
#[derive(Debug, Clone, Default)]
pub struct FeedbackReport {
    /// Goals that became achieved, as persisted
    pub achieved: Vec<PlayerGoal>,
    /// Goals evaluated without a state change
    pub unchanged: Vec<PlayerGoal>,
}

/// Goal tracking service.
#[derive(Clone)]
pub struct GoalTracker {
    repository: Arc<dyn GoalRepository>,
    notifier: Arc<dyn NotificationDispatch>,
    evaluator: GoalEvaluator,
    config: TrackerConfig,
    /// Held from the active-goal check until the new goal is written.
    /// Shared by clones.
    creates: Arc<Mutex<()>>,
}

impl GoalTracker {
    /// Create a tracker over a repository and notifier.
    pub fn new(
        repository: Arc<dyn GoalRepository>,
        notifier: Arc<dyn NotificationDispatch>,
    ) -> Self {
        Self {
            repository,
            notifier,
            evaluator: GoalEvaluator::new(),
            config: TrackerConfig::default(),
            creates: Arc::new(Mutex::new(())),
        }
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: TrackerConfig) -> Self {
        self.config = config;
        self
    }

    /// Current configuration.
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// The repository this tracker writes to.
    pub fn repository(&self) -> &Arc<dyn GoalRepository> {
        &self.repository
    }

    /// A board following this player's goals. Call [`GoalBoard::attach`] to start it.
    pub fn board(&self, owner: PlayerId) -> GoalBoard {
        GoalBoard::new(self.repository.clone(), owner)
    }

    /// All of a player's goals.
    pub async fn goals(&self, owner: &PlayerId) -> Result<Vec<PlayerGoal>, TrackerError> {
        Ok(self.repository.list(owner).await?)
    }

    /// Metrics the player can still set a goal for.
    pub async fn selectable_metrics(&self, owner: &PlayerId) -> Result<Vec<MetricType>, TrackerError> {
        let goals = self.repository.list(owner).await?;
        Ok(self.evaluator.selectable_metrics(&goals))
    }

    /// Create a new active goal.
    pub async fn set_goal(
        &self,
        owner: &PlayerId,
        metric: MetricType,
        target: i64,
    ) -> Result<PlayerGoal, TrackerError> {
        let goal = PlayerGoal::new(owner.clone(), metric, target, Utc::now())?;

        let _guard = self.creates.lock().await;
        let existing = self.repository.list(owner).await?;
        self.evaluator.ensure_can_create(&existing, metric)?;
        self.repository.save(&goal).await?;
        info!(player = %owner, %metric, target = goal.target_count, goal = %goal.id, "Set goal");
        Ok(goal)
    }

    /// Change the target of an active goal.
    pub async fn edit_target(&self, goal_id: GoalId, new_target: i64) -> Result<PlayerGoal, TrackerError> {
        let goal = self.load(goal_id).await?;
        let updated = self.evaluator.set_target(&goal, new_target)?;

        self.repository.save(&updated).await?;
        info!(goal = %goal_id, from = goal.target_count, to = updated.target_count, "Edited goal target");
        Ok(updated)
    }

    /// Evaluate one goal against a single observed count.
    pub async fn record_observation(
        &self,
        goal_id: GoalId,
        observed_count: u32,
        observed_at: Time,
    ) -> Result<EvaluationResult, TrackerError> {
        let goal = self.load(goal_id).await?;
        let result = self.evaluator.evaluate(&goal, observed_count, observed_at);
        if let EvaluationResult::Achieved(achieved) = &result {
            self.persist_achievement(achieved).await?;
        }
        Ok(result)
    }

    /// Evaluate all of a player's goals against the counts from one video.
    pub async fn record_feedback(
        &self,
        feedback: &PerformanceFeedback,
    ) -> Result<FeedbackReport, TrackerError> {
        let goals = self.repository.list(&feedback.player_id).await?;
        debug!(
            player = %feedback.player_id,
            video = ?feedback.video_id,
            goals = goals.len(),
            "Evaluating feedback"
        );

        let mut report = FeedbackReport::default();
        for result in self.evaluator.evaluate_feedback(&goals, feedback) {
            match result {
                EvaluationResult::Achieved(goal) => {
                    self.persist_achievement(&goal).await?;
                    report.achieved.push(goal);
                }
                EvaluationResult::Unchanged(goal) => report.unchanged.push(goal),
            }
        }
        Ok(report)
    }

    /// Remove a goal, active or achieved.
    pub async fn dismiss_goal(&self, goal_id: GoalId) -> Result<PlayerGoal, TrackerError> {
        let goal = self.load(goal_id).await?;
        self.repository.delete(goal_id).await?;
        info!(player = %goal.owner_id, metric = %goal.metric, goal = %goal_id, "Dismissed goal");

        if self.config.notify_on_delete {
            self.dispatch(NotificationKind::GoalDeleted, &goal.owner_id, goal.metric).await;
        }
        Ok(goal)
    }

    /// Replace an achieved goal with a fresh active goal for the same metric.
    ///
    /// Fails with `DuplicateActiveGoal` if the player already set a new goal
    /// for the metric. The fresh goal is written before the old one is
    /// removed, so a failed write leaves the achieved goal in place.
    pub async fn reset_goal(&self, goal_id: GoalId, new_target: i64) -> Result<PlayerGoal, TrackerError> {
        let _guard = self.creates.lock().await;
        let goal = self.load(goal_id).await?;
        if goal.status != GoalStatus::Achieved {
            return Err(ValidationError::InvalidTransition {
                status: goal.status,
                operation: "reset",
            }
            .into());
        }
        let fresh = PlayerGoal::new(goal.owner_id.clone(), goal.metric, new_target, Utc::now())?;
        let existing = self.repository.list(&goal.owner_id).await?;
        self.evaluator.ensure_can_create(&existing, goal.metric)?;

        self.repository.save(&fresh).await?;
        self.repository.delete(goal_id).await?;
        info!(player = %goal.owner_id, metric = %goal.metric, old = %goal_id, new = %fresh.id, "Reset goal");
        Ok(fresh)
    }

    async fn load(&self, goal_id: GoalId) -> Result<PlayerGoal, TrackerError> {
        self.repository
            .load(goal_id)
            .await?
            .ok_or(TrackerError::GoalNotFound(goal_id))
    }

    async fn persist_achievement(&self, goal: &PlayerGoal) -> Result<(), TrackerError> {
        self.repository.save(goal).await?;
        info!(player = %goal.owner_id, metric = %goal.metric, goal = %goal.id, "Goal achieved");
        self.dispatch(NotificationKind::GoalAchieved, &goal.owner_id, goal.metric).await;
        Ok(())
    }

    /// Send a notification. Failures are logged and dropped.
    async fn dispatch(&self, kind: NotificationKind, owner: &PlayerId, metric: MetricType) {
        let notifier = self.notifier.clone();
        let owner = owner.clone();
        let send = async move {
            let result = match kind {
                NotificationKind::GoalAchieved => notifier.notify_goal_achieved(&owner, metric).await,
                NotificationKind::GoalDeleted => notifier.notify_goal_deleted(&owner, metric).await,
            };
            if let Err(e) = result {
                warn!(player = %owner, %metric, kind = kind.as_str(), "Notification failed: {}", e);
            }
        };

        if self.config.background_notifications {
            tokio::spawn(send);
        } else {
            send.await;
        }
    }
}
