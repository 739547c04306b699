// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock completion adapter for deterministic testing.
//!
//! Replies are scripted per [`CompletionTask`], so the memory analysis and
//! the classification of one turn can run concurrently without racing for
//! a shared queue.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use parley_core::traits::adapter::PluginAdapter;
use parley_core::traits::completion::CompletionAdapter;
use parley_core::types::{
    AdapterType, CompletionRequest, CompletionResponse, CompletionTask, HealthStatus,
};
use parley_core::ParleyError;

/// Computes a reply from the request, used when no scripted reply is queued.
pub type Responder =
    Arc<dyn Fn(&CompletionRequest) -> Result<String, ParleyError> + Send + Sync>;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct Inner {
    queues: Mutex<HashMap<CompletionTask, VecDeque<Result<String, ParleyError>>>>,
    responders: Mutex<HashMap<CompletionTask, Responder>>,
    requests: Mutex<Vec<CompletionRequest>>,
    delay: Mutex<Option<Duration>>,
}

/// A completion provider that answers from per-task scripts.
///
/// Lookup order: the task's FIFO queue, then its responder, then a fixed
/// default that keeps every engine step on its quiet path (conversation
/// routing, nothing worth remembering). Clones share state.
#[derive(Clone, Default)]
pub struct MockCompletion {
    inner: Arc<Inner>,
}

impl MockCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for `task`.
    pub fn with_response(self, task: CompletionTask, text: impl Into<String>) -> Self {
        self.push_response(task, text);
        self
    }

    /// Queue an error for `task`.
    pub fn with_error(self, task: CompletionTask, error: ParleyError) -> Self {
        lock(&self.inner.queues)
            .entry(task)
            .or_default()
            .push_back(Err(error));
        self
    }

    /// Compute replies for `task` from the request.
    pub fn with_responder<F>(self, task: CompletionTask, responder: F) -> Self
    where
        F: Fn(&CompletionRequest) -> Result<String, ParleyError> + Send + Sync + 'static,
    {
        lock(&self.inner.responders).insert(task, Arc::new(responder));
        self
    }

    /// Sleep before every reply.
    pub fn with_delay(self, delay: Duration) -> Self {
        *lock(&self.inner.delay) = Some(delay);
        self
    }

    pub fn push_response(&self, task: CompletionTask, text: impl Into<String>) {
        lock(&self.inner.queues)
            .entry(task)
            .or_default()
            .push_back(Ok(text.into()));
    }

    /// Every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        lock(&self.inner.requests).clone()
    }

    pub fn requests_for(&self, task: CompletionTask) -> Vec<CompletionRequest> {
        lock(&self.inner.requests)
            .iter()
            .filter(|r| r.task == task)
            .cloned()
            .collect()
    }

    pub fn call_count(&self, task: CompletionTask) -> usize {
        lock(&self.inner.requests)
            .iter()
            .filter(|r| r.task == task)
            .count()
    }

    fn reply_for(&self, request: &CompletionRequest) -> Result<String, ParleyError> {
        let scripted = lock(&self.inner.queues)
            .get_mut(&request.task)
            .and_then(VecDeque::pop_front);
        if let Some(reply) = scripted {
            return reply;
        }

        let responder = lock(&self.inner.responders).get(&request.task).cloned();
        if let Some(responder) = responder {
            return responder(request);
        }

        Ok(default_reply(request.task).to_string())
    }
}

/// Fallback reply per task when nothing is scripted.
pub fn default_reply(task: CompletionTask) -> &'static str {
    match task {
        CompletionTask::Classification => r#"{"response_type": "conversation"}"#,
        CompletionTask::MemoryAnalysis => r#"{"is_important": false, "formatted_memory": null}"#,
        CompletionTask::Response => "mock response",
        CompletionTask::Scene => {
            r#"{"narrative": "A quiet street at dusk", "image_prompt": "a quiet street at dusk, warm light"}"#
        }
        CompletionTask::Summary => "mock summary",
        CompletionTask::CallSummary => "mock call summary",
    }
}

#[async_trait]
impl PluginAdapter for MockCompletion {
    fn name(&self) -> &str {
        "mock-completion"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Completion
    }

    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ParleyError> {
        Ok(())
    }
}

#[async_trait]
impl CompletionAdapter for MockCompletion {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ParleyError> {
        lock(&self.inner.requests).push(request.clone());

        let delay = *lock(&self.inner.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let content = self.reply_for(&request)?;
        Ok(CompletionResponse {
            content,
            model: "mock-model".to_string(),
        })
    }
}
