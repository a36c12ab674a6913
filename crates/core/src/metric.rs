//! Metric model - the fixed set of trackable football skills.

use serde::{Deserialize, Serialize};

/// A trackable skill a player can set a goal for.
///
/// The set is closed: every `match` over it is exhaustive, so a new variant
/// fails to compile until the evaluator, storage and CLI handle it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    /// Dribbling past an opponent
    Dribble,
    /// Completed passes
    Pass,
    /// Shots
    Shoot,
}

impl MetricType {
    /// Every metric, in display order.
    pub const ALL: [MetricType; 3] = [MetricType::Dribble, MetricType::Pass, MetricType::Shoot];

    /// Stable machine name.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Dribble => "dribble",
            MetricType::Pass => "pass",
            MetricType::Shoot => "shoot",
        }
    }

    /// Human readable label shown on goal cards.
    pub fn label(&self) -> &'static str {
        match self {
            MetricType::Dribble => "Dribble",
            MetricType::Pass => "Pass",
            MetricType::Shoot => "Shoot",
        }
    }

    /// Icon identifier for the goal card.
    pub fn icon(&self) -> &'static str {
        match self {
            MetricType::Dribble => "figure.run",
            MetricType::Pass => "arrow.left.arrow.right",
            MetricType::Shoot => "soccerball",
        }
    }
}

impl std::fmt::Display for MetricType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown metric name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown metric: {0}")]
pub struct UnknownMetric(pub String);

impl std::str::FromStr for MetricType {
    type Err = UnknownMetric;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dribble" => Ok(MetricType::Dribble),
            "pass" => Ok(MetricType::Pass),
            "shoot" => Ok(MetricType::Shoot),
            other => Err(UnknownMetric(other.to_string())),
        }
    }
}
