// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory vector and session stores with the same contracts as SQLite.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};

use parley_core::traits::adapter::PluginAdapter;
use parley_core::traits::storage::{SessionStore, VectorStore};
use parley_core::types::{AdapterType, HealthStatus, MemoryRecord, OwnerId, ScoredMemory, SessionState};
use parley_core::vector::cosine_similarity;
use parley_core::ParleyError;

use crate::mock_media::mock_plugin;

/// Vector store backed by a `Vec`, filtered by owner before scoring.
#[derive(Clone, Default)]
pub struct InMemoryVectorStore {
    records: Arc<RwLock<Vec<MemoryRecord>>>,
    failing_searches: Arc<AtomicUsize>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` searches with a transient error.
    pub fn failing_searches(self, n: usize) -> Self {
        self.failing_searches.store(n, Ordering::SeqCst);
        self
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    pub async fn records_for(&self, owner: &OwnerId) -> Vec<MemoryRecord> {
        self.records
            .read()
            .await
            .iter()
            .filter(|r| &r.owner_id == owner)
            .cloned()
            .collect()
    }
}

mock_plugin!(InMemoryVectorStore, "memory-vector-store", AdapterType::Storage);

#[async_trait]
impl VectorStore for InMemoryVectorStore {
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
        self.records.write().await.push(record.clone());
        Ok(record)
    }

    async fn search(
        &self,
        owner: &OwnerId,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredMemory>, ParleyError> {
        let failing = self
            .failing_searches
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ParleyError::Transient {
                message: "mock vector store unavailable".into(),
            });
        }

        let records = self.records.read().await;
        // Newest first so the stable sort breaks score ties by recency.
        let mut scored: Vec<ScoredMemory> = records
            .iter()
            .rev()
            .filter(|r| &r.owner_id == owner)
            .map(|r| ScoredMemory {
                score: cosine_similarity(embedding, &r.embedding),
                record: r.clone(),
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        Ok(scored)
    }
}

/// Session store backed by a map. Saving never drops stored messages.
#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    sessions: Arc<Mutex<HashMap<String, SessionState>>>,
    saves: Arc<AtomicUsize>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

mock_plugin!(InMemorySessionStore, "memory-session-store", AdapterType::Storage);

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, session_id: &str) -> Result<Option<SessionState>, ParleyError> {
        Ok(self.sessions.lock().await.get(session_id).cloned())
    }

    async fn save(&self, session: &SessionState) -> Result<(), ParleyError> {
        let mut sessions = self.sessions.lock().await;
        let mut next = session.clone();
        if let Some(stored) = sessions.get(&session.session_id) {
            // Mirror the SQLite store: stored rows stay, only the new tail is appended.
            let mut messages = stored.messages.clone();
            messages.extend(session.messages.iter().skip(stored.messages.len()).cloned());
            next.messages = messages;
            next.summarized_count = stored.summarized_count.max(session.summarized_count);
        }
        sessions.insert(next.session_id.clone(), next);
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
