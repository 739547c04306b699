// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-call completion requests.
//!
//! While a call is live the platform forwards every caller utterance as an
//! OpenAI-style chat completion request and speaks whatever comes back.

use chrono::Utc;
use parley_core::types::{Modality, Role};
use parley_core::{Message, ParleyError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::event::{CallRef, str_at};

/// Messages the in-call context keeps, newest last.
pub const CALL_CHAT_WINDOW: usize = 20;

/// One parsed in-call completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CallChatRequest {
    /// System lines the platform sent, joined. Carries the assistant prompt.
    pub system: Option<String>,
    /// Spoken turns, oldest first. The last one is from the caller.
    pub dialogue: Vec<Message>,
    pub call: CallRef,
}

impl CallChatRequest {
    /// The utterance being answered.
    pub fn utterance(&self) -> Option<&Message> {
        self.dialogue.last()
    }

    /// The most recent turns, capped at [`CALL_CHAT_WINDOW`].
    pub fn window(&self) -> &[Message] {
        let start = self.dialogue.len().saturating_sub(CALL_CHAT_WINDOW);
        &self.dialogue[start..]
    }
}

/// Parse a raw in-call completion body.
///
/// The last non-system message must come from the caller. Tool and function
/// messages are skipped. The call is named by `call.metadata.call_id`,
/// `metadata.call_id`, or the platform's `call.id`.
pub fn parse_call_chat(raw: &[u8]) -> Result<CallChatRequest, ParleyError> {
    let root: Value = serde_json::from_slice(raw)
        .map_err(|e| ParleyError::Validation(format!("completion body is not JSON: {e}")))?;
    let messages = root
        .get("messages")
        .and_then(Value::as_array)
        .filter(|m| !m.is_empty())
        .ok_or_else(|| ParleyError::Validation("completion request has no messages".to_string()))?;

    let mut system = Vec::new();
    let mut dialogue = Vec::new();
    for message in messages {
        let role = str_at(message, &["role"]).and_then(|r| r.parse::<Role>().ok());
        let Some(content) = str_at(message, &["content"]) else {
            continue;
        };
        match role {
            Some(Role::System) => system.push(content),
            Some(role) => dialogue.push(Message::new(role, content, Modality::Audio)),
            None => {}
        }
    }

    if dialogue.last().is_none_or(|m| m.role != Role::User) {
        return Err(ParleyError::Validation(
            "last completion message must come from the user".to_string(),
        ));
    }

    let call = CallRef {
        call_id: str_at(&root, &["call", "metadata", "call_id"])
            .or_else(|| str_at(&root, &["metadata", "call_id"])),
        provider_call_id: str_at(&root, &["call", "id"]),
    };

    Ok(CallChatRequest {
        system: (!system.is_empty()).then(|| system.join("\n\n")),
        dialogue,
        call,
    })
}

/// Non-streaming chat completion response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletion {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatChoice {
    pub index: u32,
    pub message: ChatChoiceMessage,
    pub finish_reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatChoiceMessage {
    pub role: Role,
    pub content: String,
}

impl ChatCompletion {
    /// A single finished assistant choice.
    pub fn reply(model: impl Into<String>, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: format!("chatcmpl-{}", now.timestamp_millis()),
            object: "chat.completion".to_string(),
            created: now.timestamp(),
            model: model.into(),
            choices: vec![ChatChoice {
                index: 0,
                message: ChatChoiceMessage {
                    role: Role::Assistant,
                    content: content.into(),
                },
                finish_reason: "stop".to_string(),
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn parse(value: Value) -> Result<CallChatRequest, ParleyError> {
        parse_call_chat(value.to_string().as_bytes())
    }

    #[test]
    fn splits_system_from_dialogue() {
        let request = parse(json!({
            "model": "gpt-4o-mini",
            "messages": [
                {"role": "system", "content": "You are Ava on the phone."},
                {"role": "assistant", "content": "Hi Sam!"},
                {"role": "tool", "content": "ignored"},
                {"role": "assistant", "content": null},
                {"role": "user", "content": "how was your day?"}
            ],
            "call": {"id": "vapi-1", "metadata": {"call_id": "c-1"}}
        }))
        .unwrap();

        assert_eq!(request.system.as_deref(), Some("You are Ava on the phone."));
        assert_eq!(request.dialogue.len(), 2);
        assert_eq!(request.dialogue[0].role, Role::Assistant);
        assert_eq!(request.utterance().unwrap().content, "how was your day?");
        assert_eq!(request.utterance().unwrap().modality, Modality::Audio);
        assert_eq!(request.call.call_id.as_deref(), Some("c-1"));
        assert_eq!(request.call.provider_call_id.as_deref(), Some("vapi-1"));
    }

    #[test]
    fn top_level_metadata_names_the_call() {
        let request = parse(json!({
            "messages": [{"role": "user", "content": "hello"}],
            "metadata": {"call_id": "c-7"}
        }))
        .unwrap();
        assert_eq!(request.call.call_id.as_deref(), Some("c-7"));
        assert_eq!(request.system, None);
    }

    #[test]
    fn rejects_missing_or_misplaced_user_turn() {
        assert!(parse(json!({"messages": []})).is_err());
        assert!(parse(json!({"model": "x"})).is_err());
        assert!(parse(json!({"messages": [{"role": "assistant", "content": "hi"}]})).is_err());
        assert!(matches!(
            parse_call_chat(b"not json"),
            Err(ParleyError::Validation(_))
        ));
    }

    #[test]
    fn window_keeps_the_latest_turns() {
        let messages: Vec<Value> = (0..30)
            .map(|i| {
                let role = if i % 2 == 0 { "assistant" } else { "user" };
                json!({"role": role, "content": format!("m{i}")})
            })
            .collect();
        let request = parse(json!({"messages": messages})).unwrap();
        let window = request.window();
        assert_eq!(window.len(), CALL_CHAT_WINDOW);
        assert_eq!(window[0].content, "m10");
        assert_eq!(window.last().unwrap().content, "m29");
    }

    #[test]
    fn completion_shape() {
        let completion = ChatCompletion::reply("gpt-4o-mini", "Doing great!");
        let value = serde_json::to_value(&completion).unwrap();
        assert_eq!(value["object"], "chat.completion");
        assert_eq!(value["model"], "gpt-4o-mini");
        assert_eq!(value["choices"][0]["index"], 0);
        assert_eq!(value["choices"][0]["message"]["role"], "assistant");
        assert_eq!(value["choices"][0]["message"]["content"], "Doing great!");
        assert_eq!(value["choices"][0]["finish_reason"], "stop");
        assert!(completion.id.starts_with("chatcmpl-"));
    }
}
