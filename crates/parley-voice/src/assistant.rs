// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-call assistant definitions.

use parley_config::model::VoiceConfig;
use parley_core::types::{CallVariables, TransientAssistantConfig};

/// Webhook event types every assistant subscribes to.
pub const SERVER_MESSAGES: [&str; 2] = ["status-update", "end-of-call-report"];

const NO_CONTEXT: &str = "No previous conversation context available";

/// Public URLs the platform calls back on during a call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallEndpoints {
    /// Lifecycle webhook.
    pub server_url: Option<String>,
    /// In-call completion endpoint. `None` leaves the platform's model in charge.
    pub llm_url: Option<String>,
}

/// Build the transient assistant for one outbound call.
///
/// The persona is kept as-is and followed by the call context and a short
/// set of phone-manner rules.
pub fn build_assistant_config(
    persona_prompt: &str,
    persona_name: &str,
    vars: &CallVariables,
    voice: &VoiceConfig,
    endpoints: &CallEndpoints,
) -> TransientAssistantConfig {
    TransientAssistantConfig {
        name: format!("{persona_name} (call)"),
        first_message: first_message(persona_name, vars),
        system_prompt: system_prompt(persona_prompt, vars),
        voice_id: voice.voice_id.clone(),
        model: voice.assistant_model.clone(),
        max_duration_secs: voice.max_duration_secs,
        silence_timeout_secs: voice.silence_timeout_secs,
        server_url: endpoints.server_url.clone(),
        llm_url: endpoints.llm_url.clone(),
        server_messages: SERVER_MESSAGES.iter().map(|s| s.to_string()).collect(),
    }
}

fn first_message(persona_name: &str, vars: &CallVariables) -> String {
    let opener = format!("Hi {}! This is {persona_name} calling you back.", vars.user_name);
    let middle = if vars.recent_context != NO_CONTEXT && vars.conversation_topic != "General conversation" {
        format!(
            "I wanted to pick up where we left off about {}.",
            vars.conversation_topic.to_lowercase()
        )
    } else {
        format!("{}.", vars.calling_reason.trim_end_matches('.'))
    };
    format!("{opener} {middle} How can I help you today?")
}

fn system_prompt(persona_prompt: &str, vars: &CallVariables) -> String {
    format!(
        "{persona}\n\n\
         ## You're on a phone call with {user}\n\
         You called them back from a text chat. Reason: {reason}.\n\
         Recent chat: {recent}\n\
         Topic: {topic}\n\
         Their last message: {last}\n\n\
         ## Phone guidelines\n\
         - Speak naturally and conversationally, as on a real call.\n\
         - Keep answers short; long monologues are hard to follow by ear.\n\
         - Offer to send longer details in the chat afterwards.\n\
         - End your turns with a question to keep the conversation going.",
        persona = persona_prompt.trim(),
        user = vars.user_name,
        reason = vars.calling_reason.trim_end_matches('.'),
        recent = vars.recent_context,
        topic = vars.conversation_topic,
        last = vars.last_message,
    )
}
