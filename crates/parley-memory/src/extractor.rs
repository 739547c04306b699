// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! LLM-based fact extraction with near-duplicate suppression.
//!
//! Each user message is shown to the memory model, which decides whether it
//! carries a durable fact about the user. Important facts are embedded and
//! compared against the owner's existing records before being written.

use parley_core::types::{CompletionRequest, CompletionTask, MemoryRecord, Message, OwnerId, Role};
use parley_core::ParleyError;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::manager::MemoryManager;

const ANALYSIS_PROMPT: &str = r#"You decide whether a chat message contains a durable fact about the user that is worth remembering in future conversations.

Worth remembering: personal details, preferences, relationships, plans, work, health, places, and significant experiences.
Not worth remembering: greetings, small talk, thanks, requests for the assistant to do something, and questions about the assistant.

When the message is important, rewrite the fact in the third person, in the present tense, as one short sentence that starts with "User".
Examples:
- "my name is Andrés" -> "User's name is Andrés"
- "I just moved to Berlin for a new job" -> "User lives in Berlin and started a new job"
- "how are you today?" -> not important

Reply with JSON only, no prose:
{"is_important": true or false, "formatted_memory": "the rewritten fact" or null}"#;

/// The memory model's verdict on one message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MemoryAnalysis {
    pub is_important: bool,
    #[serde(default)]
    pub formatted_memory: Option<String>,
}

impl MemoryAnalysis {
    /// The fact to store, if the message was important and the fact is non-blank.
    pub fn fact(&self) -> Option<&str> {
        if !self.is_important {
            return None;
        }
        self.formatted_memory
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
    }
}

/// What happened to a message offered for extraction.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractOutcome {
    /// Not a user message, empty, or judged unimportant.
    Skipped,
    /// A new record was written.
    Stored(MemoryRecord),
    /// A near-identical record already existed; nothing was written.
    Duplicate(MemoryRecord),
}

impl ExtractOutcome {
    pub fn into_record(self) -> Option<MemoryRecord> {
        match self {
            Self::Skipped => None,
            Self::Stored(record) | Self::Duplicate(record) => Some(record),
        }
    }

    /// Label used for the memory-write metric, `None` when nothing was evaluated.
    pub fn label(&self) -> Option<&'static str> {
        match self {
            Self::Skipped => None,
            Self::Stored(_) => Some("stored"),
            Self::Duplicate(_) => Some("duplicate"),
        }
    }
}

/// Parse the analysis reply, tolerating code fences and surrounding prose.
///
/// Looks for the outermost `{ ... }` span and deserializes that.
pub fn parse_analysis_response(raw: &str) -> Option<MemoryAnalysis> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&raw[start..=end]).ok()
}

impl MemoryManager {
    /// Analyze `message` and store a fact for `owner` when it carries one.
    ///
    /// Returns the stored record, or the existing record when the write was
    /// suppressed as a duplicate.
    pub async fn extract(
        &self,
        message: &Message,
        owner: &OwnerId,
    ) -> Result<Option<MemoryRecord>, ParleyError> {
        Ok(self.extract_outcome(message, owner).await?.into_record())
    }

    /// Like [`extract`](Self::extract), but reports whether the write happened.
    pub async fn extract_outcome(
        &self,
        message: &Message,
        owner: &OwnerId,
    ) -> Result<ExtractOutcome, ParleyError> {
        if !self.config.enabled || message.role != Role::User {
            return Ok(ExtractOutcome::Skipped);
        }
        let content = message.content.trim();
        if content.is_empty() {
            return Ok(ExtractOutcome::Skipped);
        }

        let request = CompletionRequest::new(CompletionTask::MemoryAnalysis)
            .with_system(ANALYSIS_PROMPT)
            .with_user(content)
            .with_temperature(0.1)
            .json();
        let response = self.completion.complete(request).await?;

        let Some(analysis) = parse_analysis_response(&response.content) else {
            warn!(
                owner_id = %owner,
                reply_len = response.content.len(),
                "could not parse memory analysis, treating message as unimportant"
            );
            return Ok(ExtractOutcome::Skipped);
        };
        let Some(fact) = analysis.fact() else {
            return Ok(ExtractOutcome::Skipped);
        };

        let embedding = self.embed_one(fact).await?;
        let nearest = self
            .retry_once("search", || self.store.search(owner, &embedding, 1))
            .await?;

        if let Some(top) = nearest.into_iter().next()
            && top.score >= self.config.dedup_threshold
        {
            debug!(
                owner_id = %owner,
                existing_id = %top.record.id,
                score = top.score,
                "suppressed duplicate memory"
            );
            return Ok(ExtractOutcome::Duplicate(top.record));
        }

        let record = self.store.upsert(owner, embedding, fact).await?;
        debug!(owner_id = %owner, memory_id = %record.id, "stored memory");
        Ok(ExtractOutcome::Stored(record))
    }
}
