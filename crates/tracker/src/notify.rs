//! Notification dispatch for goal lifecycle events.
//!
//! Notifications are a side channel: a failed send is logged by the caller
//! and never undoes the goal change that triggered it.

use std::time::Duration;
use async_trait::async_trait;
use chrono::Utc;
use haddaf_core::{MetricType, PlayerId, Time};
use serde::Serialize;
use tracing::{debug, info};

/// Errors from a notification channel.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// Transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The receiver answered with a non-success status
    #[error("notification rejected with status {0}")]
    Rejected(u16),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Kind of goal event being announced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A goal reached its target
    GoalAchieved,
    /// A goal was dismissed
    GoalDeleted,
}

impl NotificationKind {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::GoalAchieved => "goal_achieved",
            NotificationKind::GoalDeleted => "goal_deleted",
        }
    }
}

/// Body sent to notification receivers.
#[derive(Debug, Clone, Serialize)]
pub struct GoalNotification {
    /// Event kind
    pub kind: NotificationKind,
    /// Player to notify
    pub player_id: PlayerId,
    /// Metric the goal tracked
    pub metric: MetricType,
    /// Human readable message
    pub message: String,
    /// When the notification was built
    pub sent_at: Time,
}

impl GoalNotification {
    /// Build the notification for an event.
    pub fn new(kind: NotificationKind, player_id: &PlayerId, metric: MetricType) -> Self {
        let message = match kind {
            NotificationKind::GoalAchieved => format!("Goal achieved: {}", metric.label()),
            NotificationKind::GoalDeleted => format!("Goal removed: {}", metric.label()),
        };
        Self {
            kind,
            player_id: player_id.clone(),
            metric,
            message,
            sent_at: Utc::now(),
        }
    }
}

/// Side channel told about goal lifecycle events.
#[async_trait]
pub trait NotificationDispatch: Send + Sync {
    /// A goal transitioned to achieved. Called once per transition.
    async fn notify_goal_achieved(
        &self,
        owner: &PlayerId,
        metric: MetricType,
    ) -> Result<(), NotifyError>;

    /// A goal was dismissed by its player.
    async fn notify_goal_deleted(
        &self,
        owner: &PlayerId,
        metric: MetricType,
    ) -> Result<(), NotifyError>;
}

/// Discards every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl NotificationDispatch for NoopNotifier {
    async fn notify_goal_achieved(&self, _owner: &PlayerId, _metric: MetricType) -> Result<(), NotifyError> {
        Ok(())
    }

    async fn notify_goal_deleted(&self, _owner: &PlayerId, _metric: MetricType) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl NotificationDispatch for TracingNotifier {
    async fn notify_goal_achieved(&self, owner: &PlayerId, metric: MetricType) -> Result<(), NotifyError> {
        info!(player = %owner, %metric, "Goal achieved");
        Ok(())
    }

    async fn notify_goal_deleted(&self, owner: &PlayerId, metric: MetricType) -> Result<(), NotifyError> {
        info!(player = %owner, %metric, "Goal deleted");
        Ok(())
    }
}

/// Configuration for [`WebhookNotifier`].
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Endpoint receiving JSON `POST`s
    pub url: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl WebhookConfig {
    /// Config for a URL with the default timeout.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout: Duration::from_secs(5),
        }
    }
}

/// Posts each notification as JSON to an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    config: WebhookConfig,
}

impl WebhookNotifier {
    /// Create a notifier for the configured endpoint.
    pub fn new(config: WebhookConfig) -> Result<Self, NotifyError> {
        if config.url.trim().is_empty() {
            return Err(NotifyError::Other("webhook URL is empty".to_string()));
        }
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    async fn send(&self, notification: GoalNotification) -> Result<(), NotifyError> {
        debug!(url = %self.config.url, kind = notification.kind.as_str(), "Posting notification");
        let response = self
            .client
            .post(&self.config.url)
            .json(&notification)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected(status.as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationDispatch for WebhookNotifier {
    async fn notify_goal_achieved(&self, owner: &PlayerId, metric: MetricType) -> Result<(), NotifyError> {
        self.send(GoalNotification::new(NotificationKind::GoalAchieved, owner, metric)).await
    }

    async fn notify_goal_deleted(&self, owner: &PlayerId, metric: MetricType) -> Result<(), NotifyError> {
        self.send(GoalNotification::new(NotificationKind::GoalDeleted, owner, metric)).await
    }
}
