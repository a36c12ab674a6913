//! Goal evaluation - the active -> achieved state machine.
//!
//! Everything here is pure: inputs are borrowed, outputs are new values, and
//! nothing is persisted or notified. Callers act on the returned
//! [`EvaluationResult`] tag at the boundary.

use crate::error::ValidationError;
use crate::feedback::PerformanceFeedback;
use crate::goal::{validate_target, GoalStatus, PlayerGoal};
use crate::metric::MetricType;
use crate::Time;

/// Outcome of evaluating one goal against one observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvaluationResult {
    /// Nothing changed; the goal is returned as given.
    Unchanged(PlayerGoal),
    /// The goal transitioned to achieved and must be persisted.
    Achieved(PlayerGoal),
}

impl EvaluationResult {
    /// The resulting goal value.
    pub fn goal(&self) -> &PlayerGoal {
        match self {
            EvaluationResult::Unchanged(goal) | EvaluationResult::Achieved(goal) => goal,
        }
    }

    /// Consume the result, keeping the goal.
    pub fn into_goal(self) -> PlayerGoal {
        match self {
            EvaluationResult::Unchanged(goal) | EvaluationResult::Achieved(goal) => goal,
        }
    }

    /// Whether this evaluation caused the achievement transition.
    pub fn is_achieved(&self) -> bool {
        matches!(self, EvaluationResult::Achieved(_))
    }
}

/// Applies the goal rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct GoalEvaluator;

impl GoalEvaluator {
    /// Create an evaluator.
    pub fn new() -> Self {
        Self
    }

    /// Evaluate a goal against the count observed in one video.
    ///
    /// An active goal whose target is met becomes achieved with
    /// `achieved_at = observed_at`. Achieved goals come back unchanged, so
    /// re-evaluation never moves `achieved_at` or re-triggers side effects.
    pub fn evaluate(
        &self,
        goal: &PlayerGoal,
        observed_count: u32,
        observed_at: Time,
    ) -> EvaluationResult {
        match goal.status {
            GoalStatus::Achieved => EvaluationResult::Unchanged(goal.clone()),
            GoalStatus::Active => {
                if observed_count >= u32::from(goal.target_count) {
                    let mut achieved = goal.clone();
                    achieved.status = GoalStatus::Achieved;
                    achieved.achieved_at = Some(observed_at);
                    EvaluationResult::Achieved(achieved)
                } else {
                    EvaluationResult::Unchanged(goal.clone())
                }
            }
        }
    }

    /// Evaluate every goal owned by the feedback's player.
    ///
    /// Goals of other players are skipped. A goal whose metric has no count in
    /// the feedback is reported unchanged.
    pub fn evaluate_feedback(
        &self,
        goals: &[PlayerGoal],
        feedback: &PerformanceFeedback,
    ) -> Vec<EvaluationResult> {
        goals
            .iter()
            .filter(|g| g.owner_id == feedback.player_id)
            .map(|g| match feedback.count(g.metric) {
                Some(count) => self.evaluate(g, count, feedback.observed_at),
                None => EvaluationResult::Unchanged(g.clone()),
            })
            .collect()
    }

    /// Change the target of an active goal.
    ///
    /// Achieved goals are never edited; they are dismissed and recreated.
    pub fn set_target(
        &self,
        goal: &PlayerGoal,
        new_target: i64,
    ) -> Result<PlayerGoal, ValidationError> {
        if goal.status != GoalStatus::Active {
            return Err(ValidationError::InvalidTransition {
                status: goal.status,
                operation: "edit the target of",
            });
        }
        let target_count = validate_target(new_target)?;

        let mut updated = goal.clone();
        updated.target_count = target_count;
        Ok(updated)
    }

    /// Metrics the player may still set a goal for.
    ///
    /// Only active goals block a metric; achieved goals awaiting dismissal do not.
    pub fn selectable_metrics(&self, existing: &[PlayerGoal]) -> Vec<MetricType> {
        MetricType::ALL
            .into_iter()
            .filter(|metric| !existing.iter().any(|g| g.is_active() && g.metric == *metric))
            .collect()
    }

    /// Reject creating a second active goal for the same metric.
    pub fn ensure_can_create(
        &self,
        existing: &[PlayerGoal],
        metric: MetricType,
    ) -> Result<(), ValidationError> {
        if existing.iter().any(|g| g.is_active() && g.metric == metric) {
            return Err(ValidationError::DuplicateActiveGoal(metric));
        }
        Ok(())
    }
}
