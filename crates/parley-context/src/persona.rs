// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persona prompt loading.

use parley_config::model::AgentConfig;
use tracing::{info, warn};

/// The character prompt every response is generated under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    name: String,
    prompt: String,
}

impl Persona {
    /// Load the persona following config priority.
    ///
    /// # Priority
    /// 1. `agent.persona_file`, read from disk (an unreadable or empty file falls through)
    /// 2. `agent.persona`, inline
    /// 3. A default template built from `agent.name`
    pub async fn load(config: &AgentConfig) -> Self {
        if let Some(path) = &config.persona_file {
            match tokio::fs::read_to_string(path).await {
                Ok(content) if !content.trim().is_empty() => {
                    info!(path = path.as_str(), "loaded persona from file");
                    return Self::new(&config.name, content.trim());
                }
                Ok(_) => warn!(path = path.as_str(), "persona file is empty, falling back"),
                Err(e) => warn!(
                    path = path.as_str(),
                    error = %e,
                    "failed to read persona file, falling back"
                ),
            }
        }

        if let Some(prompt) = &config.persona
            && !prompt.trim().is_empty()
        {
            return Self::new(&config.name, prompt.trim());
        }

        Self::new(&config.name, &default_prompt(&config.name))
    }

    pub fn new(name: &str, prompt: &str) -> Self {
        Self {
            name: name.to_string(),
            prompt: prompt.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }
}

fn default_prompt(name: &str) -> String {
    format!(
        "You are {name}, chatting with a friend over a messaging app. \
         You are warm, curious, and have a life of your own with work, hobbies, and opinions. \
         Write the way people text: short, casual, no lists or headings. \
         Never say you are an AI or a language model, and never describe your actions between asterisks. \
         Use what you remember about the person naturally and do not make up facts about them."
    )
}
