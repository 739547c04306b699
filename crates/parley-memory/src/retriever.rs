// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Owner-scoped retrieval of relevant facts.

use parley_core::types::{OwnerId, ScoredMemory};
use parley_core::ParleyError;
use tracing::warn;

use crate::manager::MemoryManager;

impl MemoryManager {
    /// Retrieve up to `k` of `owner`'s facts most relevant to `context`.
    ///
    /// Retrieval degrades instead of failing: any error after the single
    /// transient retry yields an empty list.
    pub async fn retrieve(&self, context: &str, owner: &OwnerId, k: usize) -> Vec<ScoredMemory> {
        if !self.config.enabled || k == 0 || context.trim().is_empty() {
            return Vec::new();
        }

        match self.try_retrieve(context, owner, k).await {
            Ok(memories) => memories,
            Err(e) => {
                warn!(owner_id = %owner, error = %e, "memory retrieval failed, continuing without facts");
                Vec::new()
            }
        }
    }

    async fn try_retrieve(
        &self,
        context: &str,
        owner: &OwnerId,
        k: usize,
    ) -> Result<Vec<ScoredMemory>, ParleyError> {
        let embedding = self.embed_one(context).await?;
        let mut memories = self
            .retry_once("search", || self.store.search(owner, &embedding, k))
            .await?;

        // A store must never hand back another owner's rows; drop them if it does.
        memories.retain(|m| &m.record.owner_id == owner);
        sort_by_relevance(&mut memories);
        memories.truncate(k);
        Ok(memories)
    }
}

/// Score descending, ties broken by the most recent record first.
fn sort_by_relevance(memories: &mut [ScoredMemory]) {
    memories.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| b.record.created_at.cmp(&a.record.created_at))
    });
}

/// Render facts as a bullet list for prompts.
pub fn format_facts(memories: &[ScoredMemory]) -> String {
    memories
        .iter()
        .map(|m| format!("- {}", m.record.fact))
        .collect::<Vec<_>>()
        .join("\n")
}
