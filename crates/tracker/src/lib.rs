//! Goal Tracking
//!
//! Applies performance feedback to player goals, persists the results,
//! notifies players, and keeps live per-player goal boards.

#![warn(missing_docs)]

pub mod service;
pub mod board;
pub mod notify;

pub use service::{GoalTracker, TrackerConfig, TrackerError, FeedbackReport};
pub use board::GoalBoard;
pub use notify::{
    NotificationDispatch, NotifyError, NotificationKind, GoalNotification,
    NoopNotifier, TracingNotifier, WebhookNotifier, WebhookConfig,
};
