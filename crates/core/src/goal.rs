//! Goal model - a player's per-video target for one metric.

use serde::{Deserialize, Serialize};
use crate::error::ValidationError;
use crate::id::{GoalId, PlayerId};
use crate::metric::MetricType;
use crate::Time;

/// Smallest allowed target count.
pub const MIN_TARGET: u8 = 0;

/// Largest allowed target count.
pub const MAX_TARGET: u8 = 5;

/// A player's target number of qualifying actions in a single video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerGoal {
    /// Unique identifier
    pub id: GoalId,

    /// Player who owns the goal
    pub owner_id: PlayerId,

    /// Tracked skill
    pub metric: MetricType,

    /// Required actions per video, within `[MIN_TARGET, MAX_TARGET]`
    pub target_count: u8,

    /// Goal status
    pub status: GoalStatus,

    /// Set once, when the goal becomes achieved
    pub achieved_at: Option<Time>,

    /// When created
    pub created_at: Time,

    /// Last written
    pub updated_at: Time,
}

/// Goal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalStatus {
    /// Target not yet met
    Active,
    /// Target met by an observation; terminal
    Achieved,
}

impl GoalStatus {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalStatus::Active => "active",
            GoalStatus::Achieved => "achieved",
        }
    }
}

impl std::fmt::Display for GoalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PlayerGoal {
    /// Create a new active goal. Rejects targets outside the allowed range.
    pub fn new(
        owner_id: PlayerId,
        metric: MetricType,
        target_count: i64,
        now: Time,
    ) -> Result<Self, ValidationError> {
        let target_count = validate_target(target_count)?;
        Ok(Self {
            id: GoalId::new(),
            owner_id,
            metric,
            target_count,
            status: GoalStatus::Active,
            achieved_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Whether the goal still counts towards the one-active-per-metric rule.
    pub fn is_active(&self) -> bool {
        self.status == GoalStatus::Active
    }

    /// Whether the goal has been achieved.
    pub fn is_achieved(&self) -> bool {
        self.status == GoalStatus::Achieved
    }
}

/// Check a requested target against `[MIN_TARGET, MAX_TARGET]`.
pub fn validate_target(value: i64) -> Result<u8, ValidationError> {
    if value < i64::from(MIN_TARGET) || value > i64::from(MAX_TARGET) {
        return Err(ValidationError::OutOfRange {
            value,
            min: MIN_TARGET,
            max: MAX_TARGET,
        });
    }
    // In range, so the narrowing cannot truncate.
    Ok(value as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_new_goal_is_active() {
        let now = Utc::now();
        let goal = PlayerGoal::new(PlayerId::new("p1"), MetricType::Pass, 2, now).unwrap();

        assert_eq!(goal.status, GoalStatus::Active);
        assert_eq!(goal.target_count, 2);
        assert!(goal.achieved_at.is_none());
        assert_eq!(goal.created_at, now);
        assert_eq!(goal.updated_at, now);
    }

    #[test]
    fn test_new_goal_rejects_out_of_range_target() {
        let now = Utc::now();
        for bad in [-1, 6, 100] {
            let err = PlayerGoal::new(PlayerId::new("p1"), MetricType::Shoot, bad, now).unwrap_err();
            assert_eq!(err, ValidationError::OutOfRange { value: bad, min: 0, max: 5 });
        }
    }

    #[test]
    fn test_validate_target_bounds_inclusive() {
        assert_eq!(validate_target(0), Ok(0));
        assert_eq!(validate_target(5), Ok(5));
        assert!(validate_target(-1).is_err());
        assert!(validate_target(6).is_err());
    }

    #[test]
    fn test_goal_json_shape() {
        let goal = PlayerGoal::new(PlayerId::new("p1"), MetricType::Dribble, 3, Utc::now()).unwrap();
        let value = serde_json::to_value(&goal).unwrap();

        assert_eq!(value["owner_id"], "p1");
        assert_eq!(value["metric"], "dribble");
        assert_eq!(value["status"], "active");
        assert!(value["achieved_at"].is_null());

        let back: PlayerGoal = serde_json::from_value(value).unwrap();
        assert_eq!(back, goal);
    }
}
