//! JSON file storage implementation.
//!
//! Stores each goal as `goals/<id>.json` under a root directory and keeps a
//! small per-goal meta marker (version + updated_at) under `meta/goals/`.
//!
//! Other processes may write the same directory. Their changes reach
//! subscribers through [`JsonGoalRepository::sync_from_disk`], which
//! [`JsonGoalRepository::watch_disk`] runs on an interval.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use haddaf_core::{GoalId, PlayerGoal, PlayerId};
use tokio::fs;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::subscription::{GoalSubscription, SnapshotHub};
use crate::trait_::{sort_goals, stamp_for_write, GoalRepository, Result};

/// File-based JSON goal repository.
pub struct JsonGoalRepository {
    root: std::path::PathBuf,
    // Serializes writes with the snapshot they publish.
    writes: Mutex<()>,
    hub: SnapshotHub,
}

impl JsonGoalRepository {
    /// Open storage rooted at `root`, creating the directories it needs.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        fs::create_dir_all(root.join("goals")).await?;
        fs::create_dir_all(root.join("meta").join("goals")).await?;

        info!("Opened goal storage at {}", root.display());
        Ok(Self {
            root,
            writes: Mutex::new(()),
            hub: SnapshotHub::new(),
        })
    }

    fn goal_path(&self, id: GoalId) -> std::path::PathBuf {
        self.root.join("goals").join(format!("{}.json", id))
    }

    fn meta_path(&self, id: GoalId) -> std::path::PathBuf {
        self.root.join("meta").join("goals").join(format!("{}.meta.json", id))
    }

    /// Read and increment the per-goal version, return the new version.
    async fn bump_version(&self, id: GoalId) -> Result<u64> {
        let path = self.meta_path(id);
        let mut version = 0u64;
        if let Ok(s) = fs::read_to_string(&path).await {
            if let Ok(json) = serde_json::from_str::<serde_json::Value>(&s) {
                if let Some(v) = json.get("version").and_then(|v| v.as_u64()) {
                    version = v;
                }
            }
        }
        version += 1;
        let meta = serde_json::json!({"version": version, "updated_at": chrono::Utc::now()});
        fs::write(&path, serde_json::to_string_pretty(&meta)?.as_bytes()).await?;
        Ok(version)
    }

    /// Current stored version of a goal, 0 if it was never written.
    pub async fn version(&self, id: GoalId) -> Result<u64> {
        let meta: Option<serde_json::Value> = read_json(&self.meta_path(id)).await?;
        Ok(meta
            .and_then(|m| m.get("version").and_then(|v| v.as_u64()))
            .unwrap_or(0))
    }

    async fn owner_snapshot(&self, owner: &PlayerId) -> Result<Vec<PlayerGoal>> {
        let all: Vec<PlayerGoal> = list_dir(&self.root.join("goals")).await?;
        let mut owned: Vec<PlayerGoal> = all.into_iter().filter(|g| &g.owner_id == owner).collect();
        sort_goals(&mut owned);
        Ok(owned)
    }

    /// Re-read the directory and publish to every subscribed player.
    ///
    /// Picks up goals written by other processes. Subscribers whose snapshot
    /// did not change are not woken.
    pub async fn sync_from_disk(&self) -> Result<()> {
        let _guard = self.writes.lock().await;
        for owner in self.hub.subscribed_owners().await {
            let snapshot = self.owner_snapshot(&owner).await?;
            self.hub.publish(&owner, snapshot).await;
        }
        Ok(())
    }

    /// Run [`sync_from_disk`](Self::sync_from_disk) every `period` until the
    /// repository is dropped or the task is aborted.
    pub fn watch_disk(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let repo = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let Some(repo) = repo.upgrade() else {
                    break;
                };
                if let Err(e) = repo.sync_from_disk().await {
                    warn!("Failed to reload goals from {}: {}", repo.root.display(), e);
                }
            }
            debug!("Goal directory watcher stopped");
        })
    }

    async fn publish(&self, owner: &PlayerId) -> Result<()> {
        if self.hub.has_subscribers(owner).await {
            let snapshot = self.owner_snapshot(owner).await?;
            self.hub.publish(owner, snapshot).await;
        }
        Ok(())
    }
}

#[async_trait]
impl GoalRepository for JsonGoalRepository {
    async fn save(&self, goal: &PlayerGoal) -> Result<()> {
        let _guard = self.writes.lock().await;

        let path = self.goal_path(goal.id);
        let previous: Option<PlayerGoal> = read_json(&path).await?;
        let stamped = stamp_for_write(goal, previous.as_ref());

        let json = serde_json::to_string_pretty(&stamped)?;
        // Readers in other processes never see a half-written goal.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json.as_bytes()).await?;
        fs::rename(&tmp, &path).await?;
        let version = self.bump_version(goal.id).await?;
        debug!(goal = %goal.id, version, "Saved goal");

        if let Some(previous) = previous.filter(|p| p.owner_id != goal.owner_id) {
            self.publish(&previous.owner_id).await?;
        }
        self.publish(&goal.owner_id).await
    }

    async fn load(&self, id: GoalId) -> Result<Option<PlayerGoal>> {
        read_json(&self.goal_path(id)).await
    }

    async fn list(&self, owner: &PlayerId) -> Result<Vec<PlayerGoal>> {
        self.owner_snapshot(owner).await
    }

    async fn delete(&self, id: GoalId) -> Result<()> {
        let _guard = self.writes.lock().await;

        let Some(existing) = read_json::<PlayerGoal>(&self.goal_path(id)).await? else {
            return Ok(());
        };
        remove_if_exists(&self.goal_path(id)).await?;
        remove_if_exists(&self.meta_path(id)).await?;
        debug!(goal = %id, "Deleted goal");

        self.publish(&existing.owner_id).await
    }

    async fn subscribe(&self, owner: &PlayerId) -> Result<GoalSubscription> {
        let _guard = self.writes.lock().await;
        let current = self.owner_snapshot(owner).await?;
        Ok(self.hub.subscribe(owner, current).await)
    }
}

async fn remove_if_exists(path: &Path) -> Result<()> {
    fs::remove_file(path).await.or_else(|e| {
        if e.kind() == std::io::ErrorKind::NotFound { Ok(()) } else { Err(e) }
    })?;
    Ok(())
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read_to_string(path).await {
        Ok(json) => {
            let value = serde_json::from_str(&json)?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn list_dir<T: serde::de::DeserializeOwned>(dir: &Path) -> Result<Vec<T>> {
    let mut items = Vec::new();
    let mut rd = fs::read_dir(dir).await?;
    while let Some(entry) = rd.next_entry().await? {
        if entry.path().extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }
        // A file removed since read_dir is skipped; a corrupt one is an error.
        if let Some(item) = read_json(&entry.path()).await? {
            items.push(item);
        }
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trait_::StorageError;
    use chrono::Utc;
    use haddaf_core::{GoalEvaluator, GoalStatus, MetricType};

    fn goal(owner: &str, metric: MetricType) -> PlayerGoal {
        PlayerGoal::new(PlayerId::new(owner), metric, 3, Utc::now()).unwrap()
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonGoalRepository::new(dir.path()).await.unwrap();
        let g = goal("p1", MetricType::Shoot);

        repo.save(&g).await.unwrap();
        let loaded = repo.load(g.id).await.unwrap().unwrap();

        assert_eq!(loaded.id, g.id);
        assert_eq!(loaded.status, GoalStatus::Active);
        assert!(dir.path().join("goals").join(format!("{}.json", g.id)).exists());
    }

    #[tokio::test]
    async fn test_versions_increment_per_write() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonGoalRepository::new(dir.path()).await.unwrap();
        let g = goal("p1", MetricType::Pass);

        assert_eq!(repo.version(g.id).await.unwrap(), 0);
        repo.save(&g).await.unwrap();
        let achieved = GoalEvaluator::new().evaluate(&g, 3, Utc::now()).into_goal();
        repo.save(&achieved).await.unwrap();

        assert_eq!(repo.version(g.id).await.unwrap(), 2);
        let loaded = repo.load(g.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, GoalStatus::Achieved);
        assert_eq!(loaded.created_at, g.created_at);
    }

    #[tokio::test]
    async fn test_delete_removes_goal_and_meta() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonGoalRepository::new(dir.path()).await.unwrap();
        let g = goal("p1", MetricType::Dribble);
        repo.save(&g).await.unwrap();

        repo.delete(g.id).await.unwrap();
        repo.delete(g.id).await.unwrap();

        assert!(repo.load(g.id).await.unwrap().is_none());
        assert_eq!(repo.version(g.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_skips_foreign_and_non_json_files() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonGoalRepository::new(dir.path()).await.unwrap();
        repo.save(&goal("p1", MetricType::Pass)).await.unwrap();
        repo.save(&goal("p2", MetricType::Pass)).await.unwrap();
        std::fs::write(dir.path().join("goals").join("notes.txt"), "hi").unwrap();

        let goals = repo.list(&PlayerId::new("p1")).await.unwrap();
        assert_eq!(goals.len(), 1);
    }

    #[tokio::test]
    async fn test_reopen_sees_persisted_goals() {
        let dir = tempfile::tempdir().unwrap();
        let g = goal("p1", MetricType::Shoot);
        {
            let repo = JsonGoalRepository::new(dir.path()).await.unwrap();
            repo.save(&g).await.unwrap();
        }
        let repo = JsonGoalRepository::new(dir.path()).await.unwrap();
        assert_eq!(repo.list(&PlayerId::new("p1")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_subscription_tracks_writes() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonGoalRepository::new(dir.path()).await.unwrap();
        let owner = PlayerId::new("p1");

        let mut sub = repo.subscribe(&owner).await.unwrap();
        assert_eq!(sub.next().await, Some(vec![]));

        let g = goal("p1", MetricType::Pass);
        repo.save(&g).await.unwrap();
        let snapshot = sub.next().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, g.id);

        repo.delete(g.id).await.unwrap();
        assert_eq!(sub.next().await, Some(vec![]));
    }

    #[tokio::test]
    async fn test_corrupt_goal_file_fails_list() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonGoalRepository::new(dir.path()).await.unwrap();
        repo.save(&goal("p1", MetricType::Pass)).await.unwrap();
        std::fs::write(dir.path().join("goals").join("broken.json"), "{ not json").unwrap();

        let err = repo.list(&PlayerId::new("p1")).await.unwrap_err();
        assert!(matches!(err, StorageError::Json(_)));
    }

    #[tokio::test]
    async fn test_sync_from_disk_sees_other_writer() {
        let dir = tempfile::tempdir().unwrap();
        let watcher = JsonGoalRepository::new(dir.path()).await.unwrap();
        let writer = JsonGoalRepository::new(dir.path()).await.unwrap();
        let owner = PlayerId::new("p1");

        let mut sub = watcher.subscribe(&owner).await.unwrap();
        assert_eq!(sub.next().await, Some(vec![]));

        let g = goal("p1", MetricType::Shoot);
        writer.save(&g).await.unwrap();
        watcher.sync_from_disk().await.unwrap();
        let snapshot = sub.next().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, g.id);

        // Nothing changed on disk: no new snapshot.
        watcher.sync_from_disk().await.unwrap();
        let waited = tokio::time::timeout(std::time::Duration::from_millis(50), sub.next()).await;
        assert!(waited.is_err());

        writer.delete(g.id).await.unwrap();
        watcher.sync_from_disk().await.unwrap();
        assert_eq!(sub.next().await, Some(vec![]));
    }

    #[tokio::test]
    async fn test_watch_disk_publishes_on_interval() {
        let dir = tempfile::tempdir().unwrap();
        let watcher = Arc::new(JsonGoalRepository::new(dir.path()).await.unwrap());
        let writer = JsonGoalRepository::new(dir.path()).await.unwrap();
        let owner = PlayerId::new("p1");
        let mut sub = watcher.subscribe(&owner).await.unwrap();
        sub.next().await;

        let task = watcher.watch_disk(Duration::from_millis(10));
        writer.save(&goal("p1", MetricType::Dribble)).await.unwrap();

        let snapshot = tokio::time::timeout(Duration::from_secs(2), sub.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.len(), 1);
        task.abort();
    }
}
