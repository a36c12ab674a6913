//! Performance feedback - per-metric counts extracted from one video.

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use crate::id::PlayerId;
use crate::metric::MetricType;
use crate::Time;

/// The result of analysing one uploaded video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceFeedback {
    /// Player the video belongs to
    pub player_id: PlayerId,

    /// Video the counts were extracted from, if known
    pub video_id: Option<String>,

    /// When the observation was produced. Used as `achieved_at`.
    pub observed_at: Time,

    /// Qualifying actions per metric
    pub counts: BTreeMap<MetricType, u32>,
}

impl PerformanceFeedback {
    /// Create empty feedback for a player.
    pub fn new(player_id: PlayerId, observed_at: Time) -> Self {
        Self {
            player_id,
            video_id: None,
            observed_at,
            counts: BTreeMap::new(),
        }
    }

    /// Attach the source video.
    pub fn with_video(mut self, video_id: impl Into<String>) -> Self {
        self.video_id = Some(video_id.into());
        self
    }

    /// Record the count for a metric, replacing any previous value.
    pub fn with_count(mut self, metric: MetricType, count: u32) -> Self {
        self.counts.insert(metric, count);
        self
    }

    /// Count observed for a metric, `None` if the analysis produced none.
    pub fn count(&self, metric: MetricType) -> Option<u32> {
        self.counts.get(&metric).copied()
    }
}
