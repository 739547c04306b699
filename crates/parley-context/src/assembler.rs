// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Context bundle assembly for one turn.

use std::sync::Arc;

use parley_core::{ContextBundle, OwnerId, SessionState};
use parley_memory::MemoryManager;
use tracing::debug;

use crate::persona::Persona;

/// Gathers persona, activity, facts, summary, and the recent window.
pub struct ContextAssembler {
    persona: Persona,
    memory: Arc<MemoryManager>,
}

impl ContextAssembler {
    pub fn new(persona: Persona, memory: Arc<MemoryManager>) -> Self {
        Self { persona, memory }
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    /// Build the bundle for `session` as it stands after the user message
    /// was appended.
    pub async fn build(
        &self,
        session: &SessionState,
        current_activity: &str,
        owner: &OwnerId,
    ) -> ContextBundle {
        let config = self.memory.config();
        let query = retrieval_query(session, config.context_messages);
        let facts = self.memory.retrieve(&query, owner, config.top_k).await;

        debug!(
            session_id = %session.session_id,
            facts = facts.len(),
            window = session.recent_window().len(),
            "assembled context"
        );

        ContextBundle {
            persona: self.persona.prompt().to_string(),
            current_activity: current_activity.to_string(),
            facts,
            summary: Some(session.summary.clone()).filter(|s| !s.trim().is_empty()),
            recent: session.recent_window().to_vec(),
            call_variables: None,
        }
    }
}

/// The last `n` message contents joined by a space.
fn retrieval_query(session: &SessionState, n: usize) -> String {
    session
        .tail(n)
        .iter()
        .map(|m| m.content.trim())
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
