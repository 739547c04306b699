// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Completion adapter trait for chat-style language model APIs.

use async_trait::async_trait;

use crate::error::ParleyError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{CompletionRequest, CompletionResponse};

/// Adapter for single-shot chat completions.
///
/// Every engine step that needs generated text (classification, memory
/// analysis, replies, summaries) goes through this trait. The request's
/// [`CompletionTask`](crate::types::CompletionTask) lets an adapter pick a
/// model per step.
#[async_trait]
pub trait CompletionAdapter: PluginAdapter {
    /// Sends a completion request and returns the full response.
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ParleyError>;
}
