// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across adapter traits and the Parley engine.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::ParleyError;

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the type of adapter behind a trait object.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Completion,
    Embedding,
    Speech,
    Image,
    Vision,
    Telephony,
    Storage,
    Observability,
}

// --- Identity ---

/// The end user a session and its memories belong to.
///
/// Construction rejects empty or whitespace-only ids, so a record that
/// carries an `OwnerId` always has an owner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Result<Self, ParleyError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ParleyError::Validation(
                "owner id must not be empty".to_string(),
            ));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for OwnerId {
    type Error = ParleyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<OwnerId> for String {
    fn from(value: OwnerId) -> Self {
        value.0
    }
}

// --- Messages ---

/// Author of a message in a session log.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// Medium a message was carried in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Audio,
    Image,
}

/// Opaque reference to a generated media asset, e.g. `image/<uuid>.png`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetRef(pub String);

impl AssetRef {
    /// Allocate a fresh reference under `kind` with the given file extension.
    pub fn generate(kind: &str, extension: &str) -> Self {
        Self(format!("{kind}/{}.{extension}", uuid::Uuid::new_v4()))
    }
}

impl fmt::Display for AssetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "asset://{}", self.0)
    }
}

/// One entry in a session's append-only log. Never mutated after append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub modality: Modality,
    pub asset: Option<AssetRef>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>, modality: Modality) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            modality,
            asset: None,
            created_at: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content, Modality::Text)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content, Modality::Text)
    }

    pub fn with_asset(mut self, asset: AssetRef) -> Self {
        self.asset = Some(asset);
        self
    }
}

/// Durable per-session state.
///
/// `messages` only grows. `summary` caches a digest of
/// `messages[..summarized_count]` and can always be rebuilt from the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: String,
    pub owner_id: OwnerId,
    pub messages: Vec<Message>,
    pub summary: String,
    pub summarized_count: usize,
    /// Local call id of an outbound call that has not resolved yet.
    pub pending_call: Option<String>,
    /// Destination for outbound calls, supplied by the channel or the user.
    pub phone_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

impl SessionState {
    pub fn new(session_id: impl Into<String>, owner_id: OwnerId) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            owner_id,
            messages: Vec::new(),
            summary: String::new(),
            summarized_count: 0,
            pending_call: None,
            phone_number: None,
            created_at: now,
            last_activity_at: now,
        }
    }

    pub fn append(&mut self, message: Message) {
        self.last_activity_at = message.created_at;
        self.messages.push(message);
    }

    /// Messages not yet folded into the summary.
    pub fn recent_window(&self) -> &[Message] {
        let start = self.summarized_count.min(self.messages.len());
        &self.messages[start..]
    }

    /// The last `n` messages of the log regardless of summarization.
    pub fn tail(&self, n: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    pub fn last_user_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::User)
    }
}

// --- Channel input / output ---

/// Payload of an inbound channel message.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageContent {
    Text(String),
    Audio {
        data: Vec<u8>,
        mime_type: String,
    },
    Image {
        data: Vec<u8>,
        mime_type: String,
        caption: Option<String>,
    },
}

/// A message delivered by the channel transport.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub content: MessageContent,
    /// Sender number when the channel knows it (E.164).
    pub phone_number: Option<String>,
}

impl InboundMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: MessageContent::Text(text.into()),
            phone_number: None,
        }
    }

    pub fn with_phone_number(mut self, number: impl Into<String>) -> Self {
        self.phone_number = Some(number.into());
        self
    }
}

/// Generated media that accompanies a reply.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaPayload {
    pub mime_type: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutboundReply {
    pub message: Message,
    pub media: Option<MediaPayload>,
}

/// What the engine hands back to the channel for one inbound turn.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    Reply(OutboundReply),
    CallInitiated { call_id: String, message: Message },
}

impl TurnOutcome {
    pub fn message(&self) -> &Message {
        match self {
            Self::Reply(reply) => &reply.message,
            Self::CallInitiated { message, .. } => message,
        }
    }

    pub fn text(&self) -> &str {
        &self.message().content
    }
}

// --- Memory ---

/// A durable third-person fact about one owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: String,
    pub owner_id: OwnerId,
    pub fact: String,
    #[serde(skip)]
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

/// A memory record with its similarity to a query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMemory {
    pub record: MemoryRecord,
    pub score: f32,
}

// --- Routing ---

/// Key of the response dispatch table.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ResponseModality {
    Text,
    Image,
    Audio,
    VoiceCall,
}

/// The single classification produced for every inbound turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingDecision {
    Text,
    Image,
    Audio,
    VoiceCall { reason: String },
}

impl RoutingDecision {
    pub fn modality(&self) -> ResponseModality {
        match self {
            Self::Text => ResponseModality::Text,
            Self::Image => ResponseModality::Image,
            Self::Audio => ResponseModality::Audio,
            Self::VoiceCall { .. } => ResponseModality::VoiceCall,
        }
    }
}

// --- Context ---

/// Conversation context handed to the telephony assistant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallVariables {
    pub user_name: String,
    pub user_id: String,
    pub recent_context: String,
    pub conversation_topic: String,
    pub last_message: String,
    pub message_count: usize,
    pub relationship_stage: String,
    pub calling_reason: String,
    pub call_initiated_at: DateTime<Utc>,
    pub interface: String,
}

impl CallVariables {
    /// The JSON object sent as telephony variable values.
    pub fn to_variable_values(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({}))
    }
}

/// Everything a response generator needs for one turn.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextBundle {
    pub persona: String,
    pub current_activity: String,
    pub facts: Vec<ScoredMemory>,
    pub summary: Option<String>,
    pub recent: Vec<Message>,
    pub call_variables: Option<CallVariables>,
}

impl ContextBundle {
    /// Render the system prompt for a response generator.
    pub fn system_prompt(&self) -> String {
        let mut prompt = self.persona.trim().to_string();

        if !self.facts.is_empty() {
            prompt.push_str("\n\n## What you remember about this person\n");
            for fact in &self.facts {
                prompt.push_str("- ");
                prompt.push_str(&fact.record.fact);
                prompt.push('\n');
            }
        }

        if !self.current_activity.is_empty() {
            prompt.push_str(
                "\n\n## What you are doing right now\nOnly mention this if asked: ",
            );
            prompt.push_str(&self.current_activity);
        }

        if let Some(summary) = &self.summary {
            prompt.push_str("\n\n## Summary of the conversation so far\n");
            prompt.push_str(summary);
        }

        if let Some(vars) = &self.call_variables {
            prompt.push_str(&format!(
                "\n\n## Call context\nTopic: {}\nReason for calling: {}\nRecent messages: {}",
                vars.conversation_topic, vars.calling_reason, vars.recent_context
            ));
        }

        prompt
    }
}

// --- Completion ---

/// Which engine step a completion serves. Adapters use it to pick a model.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
pub enum CompletionTask {
    Classification,
    MemoryAnalysis,
    Response,
    Scene,
    Summary,
    CallSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl From<&Message> for ChatMessage {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

/// A request to a completion provider.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub task: CompletionTask,
    pub system: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub response_format: ResponseFormat,
}

impl CompletionRequest {
    pub fn new(task: CompletionTask) -> Self {
        Self {
            task,
            system: None,
            messages: Vec::new(),
            temperature: None,
            max_tokens: None,
            response_format: ResponseFormat::Text,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_user(mut self, content: impl Into<String>) -> Self {
        self.messages.push(ChatMessage {
            role: Role::User,
            content: content.into(),
        });
        self
    }

    pub fn with_messages<'a>(mut self, messages: impl IntoIterator<Item = &'a Message>) -> Self {
        self.messages.extend(messages.into_iter().map(ChatMessage::from));
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn json(mut self) -> Self {
        self.response_format = ResponseFormat::Json;
        self
    }

    /// Concatenated text of all chat messages, used by mocks and logs.
    pub fn transcript(&self) -> String {
        self.messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResponse {
    pub content: String,
    pub model: String,
}

// --- Embedding ---

/// Input for an embedding adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingInput {
    pub texts: Vec<String>,
}

/// Output from an embedding adapter, one vector per input text.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingOutput {
    pub embeddings: Vec<Vec<f32>>,
    pub dimensions: usize,
}

// --- Telephony ---

/// Per-call assistant definition created before dialing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransientAssistantConfig {
    pub name: String,
    pub first_message: String,
    pub system_prompt: String,
    pub voice_id: String,
    pub model: String,
    pub max_duration_secs: u32,
    pub silence_timeout_secs: u32,
    pub server_url: Option<String>,
    /// In-call completion endpoint; the platform's own model answers when unset.
    pub llm_url: Option<String>,
    pub server_messages: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaceCallRequest {
    /// Local correlation id, echoed back in webhook metadata.
    pub call_id: String,
    pub destination: String,
    pub assistant_ref: String,
    pub variables: CallVariables,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedCall {
    pub provider_call_id: String,
    pub status: String,
}
