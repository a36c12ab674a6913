//! Validation errors raised by the goal rules.

use crate::goal::GoalStatus;
use crate::metric::MetricType;

/// A rejected goal operation. Never fatal: the caller keeps the prior value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Target outside the allowed inclusive range
    #[error("target {value} is out of range [{min}, {max}]")]
    OutOfRange {
        /// Rejected value
        value: i64,
        /// Inclusive lower bound
        min: u8,
        /// Inclusive upper bound
        max: u8,
    },

    /// Operation not allowed in the goal's current state
    #[error("cannot {operation} a goal that is {status}")]
    InvalidTransition {
        /// Status the goal was in
        status: GoalStatus,
        /// Operation attempted
        operation: &'static str,
    },

    /// The player already holds an active goal for this metric
    #[error("an active {0} goal already exists")]
    DuplicateActiveGoal(MetricType),
}
