// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! LLM-backed response-modality classifier.

use std::sync::Arc;

use parley_config::model::RoutingConfig;
use parley_core::types::{CompletionRequest, CompletionTask, Role};
use parley_core::{CompletionAdapter, Message, RoutingDecision};
use tracing::{debug, warn};

use crate::classifier::parse_decision;

const CLASSIFIER_PROMPT: &str = r#"You pick how the assistant should answer the latest message in a chat.

Options:
- "conversation": a normal text reply. This is the answer for almost every message.
- "image": only when the user explicitly asks to see a picture or photo.
- "audio": only when the user explicitly asks for a voice note or to hear the assistant.
- "voice_call": only when the user explicitly asks to be called or phoned back.

Rules:
1. Be conservative. Mentions of pictures, voices, or phones without a request are "conversation".
2. Judge the latest user message; earlier messages are context only.
3. For "voice_call", add a short reason taken from the user's words.

Reply with JSON only:
{"response_type": "conversation" | "image" | "audio" | "voice_call", "reason": "..." or null}"#;

/// Classifies each turn into exactly one [`RoutingDecision`].
pub struct RouterClassifier {
    completion: Arc<dyn CompletionAdapter>,
    config: RoutingConfig,
}

impl RouterClassifier {
    pub fn new(completion: Arc<dyn CompletionAdapter>, config: RoutingConfig) -> Self {
        Self { completion, config }
    }

    /// Number of trailing messages the classifier wants to see.
    pub fn window(&self) -> usize {
        self.config.messages_to_analyze
    }

    /// Classify the turn from the most recent messages.
    ///
    /// Never fails: empty input, provider errors, and unparseable replies
    /// all become [`RoutingDecision::Text`].
    pub async fn classify(&self, recent: &[Message]) -> RoutingDecision {
        let start = recent.len().saturating_sub(self.config.messages_to_analyze);
        let window = &recent[start..];
        if window.iter().all(|m| m.content.trim().is_empty()) {
            return RoutingDecision::Text;
        }

        let last_user_text = window
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default();

        let request = CompletionRequest::new(CompletionTask::Classification)
            .with_system(CLASSIFIER_PROMPT)
            .with_messages(window)
            .with_temperature(self.config.temperature)
            .json();

        let reply = match self.completion.complete(request).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "classification failed, defaulting to text");
                return RoutingDecision::Text;
            }
        };

        match parse_decision(&reply.content, last_user_text) {
            Some(decision) => {
                debug!(modality = %decision.modality(), "classified turn");
                decision
            }
            None => {
                warn!(reply = %reply.content, "unrecognized classification, defaulting to text");
                RoutingDecision::Text
            }
        }
    }
}
