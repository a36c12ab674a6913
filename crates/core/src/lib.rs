//! Haddaf goal-tracking core.
//!
//! This crate defines the goal model and the pure rules that move a goal
//! from active to achieved as performance feedback arrives.

#![warn(missing_docs)]

// Core identities
mod id;

// Goal model
mod metric;
mod goal;
mod feedback;
mod error;

// Rules
mod evaluator;

// Re-exports
pub use id::{GoalId, PlayerId};

pub use metric::{MetricType, UnknownMetric};
pub use goal::{PlayerGoal, GoalStatus, validate_target, MIN_TARGET, MAX_TARGET};
pub use feedback::PerformanceFeedback;
pub use error::ValidationError;
pub use evaluator::{GoalEvaluator, EvaluationResult};

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
