// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the session and vector store traits.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::OnceCell;
use tracing::debug;

use parley_config::model::StorageConfig;
use parley_core::types::{MemoryRecord, OwnerId, ScoredMemory, SessionState};
use parley_core::vector::cosine_similarity;
use parley_core::{
    AdapterType, HealthStatus, ParleyError, PluginAdapter, SessionStore, VectorStore,
};

use crate::database::{Database, map_tr_err};
use crate::queries;

/// SQLite-backed storage for sessions and memories.
///
/// One [`Database`] handle serves both traits. The database is opened on
/// [`SqliteStorage::initialize`]; every other call fails until then.
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// The connection is not opened until [`initialize`](Self::initialize) is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Wrap an already opened database (used with in-memory databases).
    pub fn from_database(db: Database) -> Self {
        Self {
            config: StorageConfig {
                database_path: ":memory:".to_string(),
                wal_mode: false,
            },
            db: OnceCell::new_with(Some(db)),
        }
    }

    pub async fn initialize(&self) -> Result<(), ParleyError> {
        let db = Database::open(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| ParleyError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    fn db(&self) -> Result<&Database, ParleyError> {
        self.db.get().ok_or_else(|| ParleyError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        self.db()?
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ParleyError> {
        if let Some(db) = self.db.get() {
            db.checkpoint().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for SqliteStorage {
    async fn load(&self, session_id: &str) -> Result<Option<SessionState>, ParleyError> {
        queries::sessions::load_session(self.db()?, session_id).await
    }

    async fn save(&self, session: &SessionState) -> Result<(), ParleyError> {
        queries::sessions::save_session(self.db()?, session).await
    }
}

#[async_trait]
impl VectorStore for SqliteStorage {
    async fn upsert(
        &self,
        owner: &OwnerId,
        embedding: Vec<f32>,
        fact: &str,
    ) -> Result<MemoryRecord, ParleyError> {
        if fact.trim().is_empty() {
            return Err(ParleyError::Validation("memory fact must not be empty".into()));
        }
        if embedding.is_empty() {
            return Err(ParleyError::Validation("memory embedding must not be empty".into()));
        }
        let record = MemoryRecord {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner.clone(),
            fact: fact.to_string(),
            embedding,
            created_at: Utc::now(),
        };
        queries::memories::insert_memory(self.db()?, &record).await?;
        Ok(record)
    }

    async fn search(
        &self,
        owner: &OwnerId,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredMemory>, ParleyError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        // Newest-first rows plus a stable sort keep the most recent record first on ties.
        let rows = queries::memories::memories_for_owner(self.db()?, owner).await?;
        Ok(rank(rows, embedding, k))
    }
}

/// Score `rows` against `query` and keep the best `k`.
///
/// `rows` must be ordered newest first; the sort is stable, so equal scores
/// keep that order.
pub fn rank(rows: Vec<MemoryRecord>, query: &[f32], k: usize) -> Vec<ScoredMemory> {
    let mut scored: Vec<ScoredMemory> = rows
        .into_iter()
        .map(|record| {
            let score = cosine_similarity(&record.embedding, query);
            ScoredMemory { record, score }
        })
        .collect();
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::types::Message;

    async fn storage() -> SqliteStorage {
        SqliteStorage::from_database(Database::open_in_memory().await.unwrap())
    }

    fn owner(id: &str) -> OwnerId {
        OwnerId::new(id).unwrap()
    }

    #[tokio::test]
    async fn uninitialized_storage_errors() {
        let storage = SqliteStorage::new(StorageConfig {
            database_path: "/tmp/never-opened.db".into(),
            wal_mode: true,
        });
        assert!(storage.load("s").await.is_err());
        assert!(storage.health_check().await.is_err());
    }

    #[tokio::test]
    async fn initialize_opens_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("init.db");
        let storage = SqliteStorage::new(StorageConfig {
            database_path: path.to_str().unwrap().into(),
            wal_mode: true,
        });
        storage.initialize().await.unwrap();
        assert!(path.exists());
        assert_eq!(storage.health_check().await.unwrap(), HealthStatus::Healthy);
        assert!(storage.initialize().await.is_err());
        storage.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn session_store_round_trip() {
        let storage = storage().await;
        let mut session = SessionState::new("s1", owner("u1"));
        session.append(Message::user("hi"));
        storage.save(&session).await.unwrap();
        let loaded = storage.load("s1").await.unwrap().unwrap();
        assert_eq!(loaded.messages.len(), 1);
    }

    #[tokio::test]
    async fn search_never_crosses_owners() {
        let storage = storage().await;
        storage
            .upsert(&owner("u1"), vec![1.0, 0.0], "likes tea")
            .await
            .unwrap();
        storage
            .upsert(&owner("u2"), vec![0.0, 1.0], "likes coffee")
            .await
            .unwrap();

        // The query is identical to u2's vector, yet u1 only sees its own record.
        let hits = storage.search(&owner("u1"), &[0.0, 1.0], 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.fact, "likes tea");
        assert_eq!(hits[0].record.owner_id, owner("u1"));
    }

    #[tokio::test]
    async fn upsert_rejects_empty_fact() {
        let storage = storage().await;
        assert!(storage.upsert(&owner("u1"), vec![1.0], "  ").await.is_err());
    }

    #[test]
    fn rank_orders_by_score_then_recency() {
        let now = Utc::now();
        let make = |id: &str, emb: Vec<f32>, age: i64| MemoryRecord {
            id: id.into(),
            owner_id: owner("u1"),
            fact: id.into(),
            embedding: emb,
            created_at: now - chrono::Duration::seconds(age),
        };
        // Newest first, as the query returns them.
        let rows = vec![
            make("new-tie", vec![1.0, 0.0], 0),
            make("close", vec![1.0, 0.1], 5),
            make("old-tie", vec![2.0, 0.0], 10),
            make("far", vec![0.0, 1.0], 20),
        ];
        let ranked = rank(rows, &[1.0, 0.0], 3);
        let ids: Vec<_> = ranked.iter().map(|s| s.record.id.as_str()).collect();
        assert_eq!(ids, vec!["new-tie", "old-tie", "close"]);
    }
}
