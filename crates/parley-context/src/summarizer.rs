// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Summarization: folds older messages into a running summary via an LLM
//! call to keep the prompt window bounded.
//!
//! The log itself is never touched. Only `summary` and `summarized_count`
//! move, and `summarized_count` only advances.

use std::sync::Arc;

use parley_config::model::ContextConfig;
use parley_core::types::{CompletionRequest, CompletionTask};
use parley_core::{CompletionAdapter, ParleyError, SessionState};
use tracing::info;

pub struct Summarizer {
    completion: Arc<dyn CompletionAdapter>,
    config: ContextConfig,
    persona_name: String,
}

impl Summarizer {
    pub fn new(
        completion: Arc<dyn CompletionAdapter>,
        config: ContextConfig,
        persona_name: impl Into<String>,
    ) -> Self {
        Self {
            completion,
            config,
            persona_name: persona_name.into(),
        }
    }

    /// Whether the unsummarized window has grown past the trigger.
    pub fn needs_summary(&self, session: &SessionState) -> bool {
        let pending = session
            .messages
            .len()
            .saturating_sub(session.summarized_count);
        pending > self.config.summary_trigger
    }

    /// Summarize when the window is over the trigger. Returns `true` when
    /// the summary advanced.
    ///
    /// On error `session` is left exactly as it was.
    pub async fn maybe_summarize(&self, session: &mut SessionState) -> Result<bool, ParleyError> {
        if !self.needs_summary(session) {
            return Ok(false);
        }

        let start = session.summarized_count;
        let end = session
            .messages
            .len()
            .saturating_sub(self.config.keep_after_summary);
        if end <= start {
            return Ok(false);
        }

        let request = CompletionRequest::new(CompletionTask::Summary)
            .with_messages(&session.messages[start..end])
            .with_user(self.instruction(&session.summary))
            .with_temperature(0.3);
        let response = self.completion.complete(request).await?;

        let summary = response.content.trim();
        if summary.is_empty() {
            return Err(ParleyError::provider("summary model returned an empty reply"));
        }

        session.summary = summary.to_string();
        session.summarized_count = end;
        info!(
            session_id = %session.session_id,
            folded = end - start,
            summarized_count = end,
            "conversation summary updated"
        );
        Ok(true)
    }

    fn instruction(&self, existing: &str) -> String {
        let name = &self.persona_name;
        if existing.trim().is_empty() {
            format!(
                "Create a summary of the conversation above between {name} and the user. \
                 Keep it short, but capture every relevant detail the two of them shared."
            )
        } else {
            format!(
                "This is a summary of the conversation to date between {name} and the user: {existing}\n\n\
                 Extend the summary by taking into account the new messages above."
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use parley_core::types::Message;
    use parley_core::OwnerId;
    use parley_test_utils::MockCompletion;

    use super::*;

    fn session(n: usize) -> SessionState {
        let mut session = SessionState::new("s1", OwnerId::new("u1").unwrap());
        for i in 0..n {
            if i % 2 == 0 {
                session.append(Message::user(format!("u{i}")));
            } else {
                session.append(Message::assistant(format!("a{i}")));
            }
        }
        session
    }

    fn summarizer(mock: &MockCompletion) -> Summarizer {
        Summarizer::new(Arc::new(mock.clone()), ContextConfig::default(), "Ava")
    }

    #[tokio::test]
    async fn twenty_one_messages_trigger_summary() {
        let mock = MockCompletion::new().with_response(CompletionTask::Summary, "They chatted.");
        let mut s = session(21);

        assert!(summarizer(&mock).maybe_summarize(&mut s).await.unwrap());

        assert_eq!(s.summary, "They chatted.");
        assert_eq!(s.messages.len(), 21);
        assert_eq!(s.summarized_count, 16);
        assert_eq!(s.recent_window().len(), 5);

        let req = &mock.requests_for(CompletionTask::Summary)[0];
        // 16 folded messages plus the instruction.
        assert_eq!(req.messages.len(), 17);
        assert!(req.messages[16].content.starts_with("Create a summary"));
    }

    #[tokio::test]
    async fn nineteen_and_twenty_messages_are_unchanged() {
        let mock = MockCompletion::new();
        for n in [19, 20] {
            let mut s = session(n);
            let before = s.clone();
            assert!(!summarizer(&mock).maybe_summarize(&mut s).await.unwrap());
            assert_eq!(s, before);
        }
        assert_eq!(mock.call_count(CompletionTask::Summary), 0);
    }

    #[tokio::test]
    async fn second_call_without_new_messages_is_noop() {
        let mock = MockCompletion::new();
        let mut s = session(21);
        let summarizer = summarizer(&mock);
        assert!(summarizer.maybe_summarize(&mut s).await.unwrap());
        let after_first = s.clone();
        assert!(!summarizer.maybe_summarize(&mut s).await.unwrap());
        assert_eq!(s, after_first);
    }

    #[tokio::test]
    async fn existing_summary_is_extended() {
        let mock = MockCompletion::new().with_response(CompletionTask::Summary, "Longer summary.");
        let mut s = session(40);
        s.summary = "Earlier they met.".into();
        s.summarized_count = 10;

        assert!(summarizer(&mock).maybe_summarize(&mut s).await.unwrap());
        assert_eq!(s.summarized_count, 35);

        let req = &mock.requests_for(CompletionTask::Summary)[0];
        let instruction = &req.messages.last().unwrap().content;
        assert!(instruction.contains("Earlier they met."));
        assert!(instruction.contains("Extend the summary"));
        assert_eq!(req.messages[0].content, "u10");
    }

    #[tokio::test]
    async fn failure_leaves_session_unchanged() {
        let mock = MockCompletion::new()
            .with_error(CompletionTask::Summary, ParleyError::provider("down"));
        let mut s = session(25);
        let before = s.clone();
        assert!(summarizer(&mock).maybe_summarize(&mut s).await.is_err());
        assert_eq!(s, before);
    }

    #[tokio::test]
    async fn empty_reply_is_an_error() {
        let mock = MockCompletion::new().with_response(CompletionTask::Summary, "  ");
        let mut s = session(25);
        assert!(summarizer(&mock).maybe_summarize(&mut s).await.is_err());
        assert_eq!(s.summarized_count, 0);
    }
}
