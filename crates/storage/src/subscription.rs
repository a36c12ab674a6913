//! Snapshot subscriptions.
//!
//! Each player with an open subscription gets a `watch` channel holding the
//! latest full goal list. Writers replace the value; readers only ever see the
//! newest snapshot, never a delta.

use std::collections::HashMap;
use haddaf_core::{PlayerGoal, PlayerId};
use tokio::sync::{watch, Mutex};
use tracing::debug;

/// Fan-out point shared by repository implementations.
#[derive(Default)]
pub struct SnapshotHub {
    channels: Mutex<HashMap<PlayerId, watch::Sender<Vec<PlayerGoal>>>>,
}

impl SnapshotHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a subscription. `current` seeds the channel when no one is listening yet.
    ///
    /// Callers must hold a lock that excludes writers while loading `current`
    /// and calling this, otherwise a concurrent write could be lost.
    pub async fn subscribe(&self, owner: &PlayerId, current: Vec<PlayerGoal>) -> GoalSubscription {
        let mut channels = self.channels.lock().await;
        let rx = match channels.get(owner) {
            Some(tx) => {
                tx.send_if_modified(|value| {
                    if *value == current {
                        return false;
                    }
                    *value = current;
                    true
                });
                tx.subscribe()
            }
            None => {
                let (tx, rx) = watch::channel(current);
                channels.insert(owner.clone(), tx);
                rx
            }
        };
        debug!(player = %owner, "Opened goal subscription");
        GoalSubscription::new(owner.clone(), rx)
    }

    /// Whether anyone is listening for this player.
    pub async fn has_subscribers(&self, owner: &PlayerId) -> bool {
        let channels = self.channels.lock().await;
        channels.get(owner).is_some_and(|tx| tx.receiver_count() > 0)
    }

    /// Players with at least one open subscription. Drops idle channels.
    pub async fn subscribed_owners(&self) -> Vec<PlayerId> {
        let mut channels = self.channels.lock().await;
        channels.retain(|_, tx| tx.receiver_count() > 0);
        channels.keys().cloned().collect()
    }

    /// Push a new snapshot to a player's subscribers.
    ///
    /// Subscribers are only woken when it differs from the last one.
    pub async fn publish(&self, owner: &PlayerId, snapshot: Vec<PlayerGoal>) {
        let mut channels = self.channels.lock().await;
        let Some(tx) = channels.get(owner) else {
            return;
        };
        if tx.receiver_count() == 0 {
            channels.remove(owner);
            return;
        }
        tx.send_if_modified(|value| {
            if *value == snapshot {
                return false;
            }
            *value = snapshot;
            true
        });
    }
}

/// A live sequence of a player's goal snapshots.
///
/// The first [`next`](Self::next) returns the current snapshot immediately;
/// each later call waits for the next change. Dropping the subscription
/// unsubscribes.
pub struct GoalSubscription {
    owner: PlayerId,
    rx: Option<watch::Receiver<Vec<PlayerGoal>>>,
    primed: bool,
}

impl GoalSubscription {
    fn new(owner: PlayerId, rx: watch::Receiver<Vec<PlayerGoal>>) -> Self {
        Self {
            owner,
            rx: Some(rx),
            primed: false,
        }
    }

    /// Player this subscription follows.
    pub fn owner(&self) -> &PlayerId {
        &self.owner
    }

    /// Wait for the next snapshot. `None` once cancelled or the store is gone.
    pub async fn next(&mut self) -> Option<Vec<PlayerGoal>> {
        let rx = self.rx.as_mut()?;
        if !self.primed {
            self.primed = true;
            return Some(rx.borrow_and_update().clone());
        }
        rx.changed().await.ok()?;
        Some(rx.borrow_and_update().clone())
    }

    /// Latest snapshot without waiting.
    pub fn latest(&self) -> Option<Vec<PlayerGoal>> {
        self.rx.as_ref().map(|rx| rx.borrow().clone())
    }

    /// Stop receiving snapshots.
    pub fn cancel(&mut self) {
        if self.rx.take().is_some() {
            debug!(player = %self.owner, "Cancelled goal subscription");
        }
    }

    /// Whether [`cancel`](Self::cancel) was called.
    pub fn is_cancelled(&self) -> bool {
        self.rx.is_none()
    }
}

impl std::fmt::Debug for GoalSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoalSubscription")
            .field("owner", &self.owner)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use haddaf_core::MetricType;

    fn goal(owner: &str) -> PlayerGoal {
        PlayerGoal::new(PlayerId::new(owner), MetricType::Pass, 1, Utc::now()).unwrap()
    }

    #[tokio::test]
    async fn test_first_next_yields_current_snapshot() {
        let hub = SnapshotHub::new();
        let owner = PlayerId::new("p1");
        let g = goal("p1");

        let mut sub = hub.subscribe(&owner, vec![g.clone()]).await;
        assert_eq!(sub.next().await, Some(vec![g]));
    }

    #[tokio::test]
    async fn test_slow_reader_sees_only_latest() {
        let hub = SnapshotHub::new();
        let owner = PlayerId::new("p1");
        let mut sub = hub.subscribe(&owner, vec![]).await;
        assert_eq!(sub.next().await, Some(vec![]));

        let a = goal("p1");
        let b = goal("p1");
        hub.publish(&owner, vec![a.clone()]).await;
        hub.publish(&owner, vec![a.clone(), b.clone()]).await;

        assert_eq!(sub.next().await, Some(vec![a, b]));
    }

    #[tokio::test]
    async fn test_cancel_ends_sequence() {
        let hub = SnapshotHub::new();
        let owner = PlayerId::new("p1");
        let mut sub = hub.subscribe(&owner, vec![]).await;

        sub.cancel();
        assert!(sub.is_cancelled());
        assert_eq!(sub.next().await, None);
        assert!(!hub.has_subscribers(&owner).await);
    }

    #[tokio::test]
    async fn test_publish_without_listeners_drops_channel() {
        let hub = SnapshotHub::new();
        let owner = PlayerId::new("p1");
        drop(hub.subscribe(&owner, vec![]).await);

        hub.publish(&owner, vec![goal("p1")]).await;
        assert!(hub.channels.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_subscriptions_are_per_player() {
        let hub = SnapshotHub::new();
        let p1 = PlayerId::new("p1");
        let p2 = PlayerId::new("p2");
        let mut sub1 = hub.subscribe(&p1, vec![]).await;
        let _sub2 = hub.subscribe(&p2, vec![]).await;
        sub1.next().await;

        hub.publish(&p2, vec![goal("p2")]).await;
        assert_eq!(sub1.latest(), Some(vec![]));
    }

    #[tokio::test]
    async fn test_identical_snapshot_does_not_wake() {
        let hub = SnapshotHub::new();
        let owner = PlayerId::new("p1");
        let g = goal("p1");
        let mut sub = hub.subscribe(&owner, vec![g.clone()]).await;
        sub.next().await;

        hub.publish(&owner, vec![g]).await;
        let waited = tokio::time::timeout(std::time::Duration::from_millis(50), sub.next()).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn test_subscribed_owners_skips_idle_channels() {
        let hub = SnapshotHub::new();
        let _sub = hub.subscribe(&PlayerId::new("p1"), vec![]).await;
        drop(hub.subscribe(&PlayerId::new("p2"), vec![]).await);

        assert_eq!(hub.subscribed_owners().await, vec![PlayerId::new("p1")]);
        assert_eq!(hub.channels.lock().await.len(), 1);
    }
}
