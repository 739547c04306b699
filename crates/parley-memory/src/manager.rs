// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Memory manager wiring and the shared retry policy.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parley_config::model::MemoryConfig;
use parley_core::types::EmbeddingInput;
use parley_core::{CompletionAdapter, EmbeddingAdapter, ParleyError, VectorStore};
use tracing::warn;

/// Extracts, deduplicates, and retrieves owner-scoped facts.
pub struct MemoryManager {
    pub(crate) completion: Arc<dyn CompletionAdapter>,
    pub(crate) embedder: Arc<dyn EmbeddingAdapter>,
    pub(crate) store: Arc<dyn VectorStore>,
    pub(crate) config: MemoryConfig,
}

impl MemoryManager {
    pub fn new(
        completion: Arc<dyn CompletionAdapter>,
        embedder: Arc<dyn EmbeddingAdapter>,
        store: Arc<dyn VectorStore>,
        config: MemoryConfig,
    ) -> Self {
        Self {
            completion,
            embedder,
            store,
            config,
        }
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Embed a single text, retrying once on a transient failure.
    pub(crate) async fn embed_one(&self, text: &str) -> Result<Vec<f32>, ParleyError> {
        let output = self
            .retry_once("embed", || {
                self.embedder.embed(EmbeddingInput {
                    texts: vec![text.to_string()],
                })
            })
            .await?;
        output
            .embeddings
            .into_iter()
            .next()
            .filter(|e| !e.is_empty())
            .ok_or_else(|| ParleyError::provider("embedding returned no vector"))
    }

    /// Run `op`, and run it once more if the first error is transient.
    pub(crate) async fn retry_once<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, ParleyError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ParleyError>>,
    {
        match op().await {
            Err(e) if e.is_transient() => {
                warn!(operation = what, error = %e, "transient memory error, retrying once");
                tokio::time::sleep(Duration::from_millis(self.config.retry_delay_ms)).await;
                op().await
            }
            other => other,
        }
    }
}
