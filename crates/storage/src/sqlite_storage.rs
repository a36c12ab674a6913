//! SQLite goal repository.
//!
//! Each goal is a row keyed by ID with its owner and metric split out for
//! lookups and the full record kept as JSON.

use async_trait::async_trait;
use haddaf_core::{GoalId, PlayerGoal, PlayerId};
use sqlx::Row;
use tokio::sync::Mutex;
use tracing::debug;

use crate::subscription::{GoalSubscription, SnapshotHub};
use crate::trait_::{sort_goals, stamp_for_write, GoalRepository, Result, StorageError};

/// SQLite goal repository.
pub struct SqliteGoalRepository {
    /// Database connection pool
    pool: sqlx::SqlitePool,
    writes: Mutex<()>,
    hub: SnapshotHub,
}

fn db_err(e: sqlx::Error) -> StorageError {
    StorageError::Database(e.to_string())
}

impl SqliteGoalRepository {
    /// Connect to a database URL such as `sqlite://goals.db?mode=rwc`.
    pub async fn new(db_url: &str) -> Result<Self> {
        let pool = sqlx::SqlitePool::connect(db_url).await.map_err(db_err)?;
        Self::with_pool(pool).await
    }

    /// Create an in-memory database for testing.
    pub async fn in_memory() -> Result<Self> {
        // A single connection, since each in-memory connection is its own database.
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .map_err(db_err)?;
        Self::with_pool(pool).await
    }

    async fn with_pool(pool: sqlx::SqlitePool) -> Result<Self> {
        let repo = Self {
            pool,
            writes: Mutex::new(()),
            hub: SnapshotHub::new(),
        };
        repo.init_schema().await?;
        Ok(repo)
    }

    /// Initialize the database schema.
    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS goals (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                metric TEXT NOT NULL,
                status TEXT NOT NULL,
                data TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_goals_owner ON goals(owner_id)")
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(())
    }

    fn decode(row: &sqlx::sqlite::SqliteRow) -> Result<PlayerGoal> {
        let data: String = row.try_get("data").map_err(db_err)?;
        Ok(serde_json::from_str(&data)?)
    }

    async fn owner_snapshot(&self, owner: &PlayerId) -> Result<Vec<PlayerGoal>> {
        let rows = sqlx::query("SELECT data FROM goals WHERE owner_id = ?")
            .bind(owner.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        let mut goals = rows
            .iter()
            .map(Self::decode)
            .collect::<Result<Vec<_>>>()?;
        sort_goals(&mut goals);
        Ok(goals)
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
impl GoalRepository for SqliteGoalRepository {
    async fn save(&self, goal: &PlayerGoal) -> Result<()> {
        let _guard = self.writes.lock().await;

        let previous = self.load(goal.id).await?;
        let stamped = stamp_for_write(goal, previous.as_ref());
        let data = serde_json::to_string(&stamped)?;

        sqlx::query(
            "INSERT OR REPLACE INTO goals (id, owner_id, metric, status, data, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(stamped.id.to_string())
        .bind(stamped.owner_id.as_str())
        .bind(stamped.metric.as_str())
        .bind(stamped.status.as_str())
        .bind(data)
        .bind(stamped.created_at.to_rfc3339())
        .bind(stamped.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        debug!(goal = %goal.id, "Saved goal");

        if let Some(previous) = previous.filter(|p| p.owner_id != goal.owner_id) {
            self.publish(&previous.owner_id).await?;
        }
        self.publish(&goal.owner_id).await
    }

    async fn load(&self, id: GoalId) -> Result<Option<PlayerGoal>> {
        let row = sqlx::query("SELECT data FROM goals WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.as_ref().map(Self::decode).transpose()
    }

    async fn list(&self, owner: &PlayerId) -> Result<Vec<PlayerGoal>> {
        self.owner_snapshot(owner).await
    }

    async fn delete(&self, id: GoalId) -> Result<()> {
        let _guard = self.writes.lock().await;

        let Some(existing) = self.load(id).await? else {
            return Ok(());
        };
        sqlx::query("DELETE FROM goals WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        debug!(goal = %id, "Deleted goal");

        self.publish(&existing.owner_id).await
    }

    async fn subscribe(&self, owner: &PlayerId) -> Result<GoalSubscription> {
        let _guard = self.writes.lock().await;
        let current = self.owner_snapshot(owner).await?;
        Ok(self.hub.subscribe(owner, current).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use haddaf_core::{GoalStatus, MetricType};

    fn goal(owner: &str, metric: MetricType) -> PlayerGoal {
        PlayerGoal::new(PlayerId::new(owner), metric, 1, Utc::now()).unwrap()
    }

    #[tokio::test]
    async fn test_in_memory_storage() {
        let repo = SqliteGoalRepository::in_memory().await.unwrap();
        let g = goal("p1", MetricType::Pass);

        repo.save(&g).await.unwrap();
        let loaded = repo.load(g.id).await.unwrap().unwrap();

        assert_eq!(loaded.id, g.id);
        assert_eq!(loaded.status, GoalStatus::Active);
    }

    #[tokio::test]
    async fn test_upsert_and_delete() {
        let repo = SqliteGoalRepository::in_memory().await.unwrap();
        let g = goal("p1", MetricType::Shoot);
        repo.save(&g).await.unwrap();

        let mut edited = g.clone();
        edited.target_count = 4;
        repo.save(&edited).await.unwrap();

        let goals = repo.list(&PlayerId::new("p1")).await.unwrap();
        assert_eq!(goals.len(), 1);
        assert_eq!(goals[0].target_count, 4);

        repo.delete(g.id).await.unwrap();
        assert!(repo.load(g.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_subscription() {
        let repo = SqliteGoalRepository::in_memory().await.unwrap();
        let owner = PlayerId::new("p1");
        let mut sub = repo.subscribe(&owner).await.unwrap();
        assert_eq!(sub.next().await, Some(vec![]));

        repo.save(&goal("p1", MetricType::Dribble)).await.unwrap();
        assert_eq!(sub.next().await.unwrap().len(), 1);
    }
}
