// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence traits for sessions and semantic memory.

use async_trait::async_trait;

use crate::error::ParleyError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{MemoryRecord, OwnerId, ScoredMemory, SessionState};

/// Owner-scoped vector store for memory records.
///
/// Implementations must never return a record whose owner differs from the
/// query owner.
#[async_trait]
pub trait VectorStore: PluginAdapter {
    /// Stores a new fact for `owner` and returns the persisted record.
    async fn upsert(
        &self,
        owner: &OwnerId,
        embedding: Vec<f32>,
        fact: &str,
    ) -> Result<MemoryRecord, ParleyError>;

    /// Returns up to `k` of the owner's records ordered by descending similarity.
    async fn search(
        &self,
        owner: &OwnerId,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredMemory>, ParleyError>;
}

/// Durable key/value store of [`SessionState`] keyed by session id.
#[async_trait]
pub trait SessionStore: PluginAdapter {
    async fn load(&self, session_id: &str) -> Result<Option<SessionState>, ParleyError>;

    /// Persists the full state. Messages already stored are never removed.
    async fn save(&self, session: &SessionState) -> Result<(), ParleyError>;
}
