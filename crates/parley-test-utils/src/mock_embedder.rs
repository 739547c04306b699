// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic bag-of-words embedder.
//!
//! Each lowercase alphanumeric token is hashed into one of [`DIMENSIONS`]
//! buckets and the counts are L2-normalized, so texts sharing words score
//! high under cosine similarity and identical texts score 1.0.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use parley_core::traits::adapter::PluginAdapter;
use parley_core::traits::embedding::EmbeddingAdapter;
use parley_core::types::{AdapterType, EmbeddingInput, EmbeddingOutput, HealthStatus};
use parley_core::ParleyError;

pub const DIMENSIONS: usize = 256;

#[derive(Clone, Default)]
pub struct MockEmbedder {
    failures_left: Arc<AtomicUsize>,
    calls: Arc<AtomicUsize>,
}

impl MockEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` calls with a transient error.
    pub fn failing_times(self, n: usize) -> Self {
        self.failures_left.store(n, Ordering::SeqCst);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The vector this embedder produces for `text`.
    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; DIMENSIONS];
        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            v[(hasher.finish() % DIMENSIONS as u64) as usize] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        v
    }
}

#[async_trait]
impl PluginAdapter for MockEmbedder {
    fn name(&self) -> &str {
        "mock-embedder"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Embedding
    }

    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ParleyError> {
        Ok(())
    }
}

#[async_trait]
impl EmbeddingAdapter for MockEmbedder {
    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, ParleyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ParleyError::Transient {
                message: "mock embedder unavailable".to_string(),
            });
        }

        Ok(EmbeddingOutput {
            embeddings: input.texts.iter().map(|t| self.vector_for(t)).collect(),
            dimensions: DIMENSIONS,
        })
    }
}

#[cfg(test)]
mod tests {
    use parley_core::vector::cosine_similarity;

    use super::*;

    #[test]
    fn identical_text_scores_one() {
        let e = MockEmbedder::new();
        let a = e.vector_for("User likes green tea");
        let b = e.vector_for("user LIKES green tea!");
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn shared_words_score_higher() {
        let e = MockEmbedder::new();
        let q = e.vector_for("favorite color");
        let near = e.vector_for("User's favorite color is blue");
        let far = e.vector_for("User works night shifts");
        assert!(cosine_similarity(&q, &near) > cosine_similarity(&q, &far));
    }

    #[tokio::test]
    async fn fails_requested_number_of_times() {
        let e = MockEmbedder::new().failing_times(1);
        let input = || EmbeddingInput {
            texts: vec!["x".into()],
        };
        assert!(e.embed(input()).await.unwrap_err().is_transient());
        assert_eq!(e.embed(input()).await.unwrap().embeddings.len(), 1);
        assert_eq!(e.call_count(), 2);
    }
}
