// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telephony platform request/response bodies.

use parley_core::types::{PlaceCallRequest, TransientAssistantConfig};
use serde::{Deserialize, Serialize};

/// `POST /assistant` body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantRequest {
    pub name: String,
    pub first_message: String,
    pub model: AssistantModel,
    pub voice: AssistantVoice,
    pub max_duration_seconds: u32,
    pub silence_timeout_seconds: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerSpec>,
    pub server_messages: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssistantModel {
    pub provider: String,
    pub model: String,
    /// Completion endpoint for the `custom-llm` provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub messages: Vec<ModelMessage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantVoice {
    pub provider: String,
    pub voice_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerSpec {
    pub url: String,
}

impl From<&TransientAssistantConfig> for AssistantRequest {
    fn from(config: &TransientAssistantConfig) -> Self {
        Self {
            name: config.name.clone(),
            first_message: config.first_message.clone(),
            model: AssistantModel {
                provider: if config.llm_url.is_some() { "custom-llm" } else { "openai" }.to_string(),
                model: config.model.clone(),
                url: config.llm_url.clone(),
                messages: vec![ModelMessage {
                    role: "system".to_string(),
                    content: config.system_prompt.clone(),
                }],
            },
            voice: AssistantVoice {
                provider: "openai".to_string(),
                voice_id: config.voice_id.clone(),
            },
            max_duration_seconds: config.max_duration_secs,
            silence_timeout_seconds: config.silence_timeout_secs,
            server: config.server_url.clone().map(|url| ServerSpec { url }),
            server_messages: config.server_messages.clone(),
        }
    }
}

/// `POST /call` body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRequest {
    pub phone_number_id: String,
    pub customer: Customer,
    pub assistant_id: String,
    pub assistant_overrides: AssistantOverrides,
    pub metadata: CallMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct Customer {
    pub number: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantOverrides {
    pub variable_values: serde_json::Value,
}

/// Echoed back on every webhook for this call.
#[derive(Debug, Clone, Serialize)]
pub struct CallMetadata {
    pub call_id: String,
}

impl CallRequest {
    pub fn new(phone_number_id: &str, request: &PlaceCallRequest) -> Self {
        Self {
            phone_number_id: phone_number_id.to_string(),
            customer: Customer {
                number: request.destination.clone(),
            },
            assistant_id: request.assistant_ref.clone(),
            assistant_overrides: AssistantOverrides {
                variable_values: request.variables.to_variable_values(),
            },
            metadata: CallMetadata {
                call_id: request.call_id.clone(),
            },
        }
    }
}

/// The slice of a created resource Parley reads back.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedResource {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
}
