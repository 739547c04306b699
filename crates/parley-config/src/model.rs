// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Parley dialogue engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Top-level Parley configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ParleyConfig {
    /// Persona identity and turn behavior.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Response-modality classification.
    #[serde(default)]
    pub routing: RoutingConfig,

    /// Long-term semantic memory.
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Short-term window and summarization.
    #[serde(default)]
    pub context: ContextConfig,

    /// Weekly activity schedule of the persona.
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Outbound voice calls.
    #[serde(default)]
    pub voice: VoiceConfig,

    /// OpenAI-compatible generation backend.
    #[serde(default)]
    pub openai: OpenAiConfig,

    /// Telephony platform.
    #[serde(default)]
    pub vapi: VapiConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// HTTP gateway.
    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Persona identity and turn behavior configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Display name of the persona.
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Inline persona prompt. Overridden by `persona_file` if both set.
    #[serde(default)]
    pub persona: Option<String>,

    /// Path to a markdown file containing the persona prompt.
    #[serde(default)]
    pub persona_file: Option<String>,

    /// Wall-clock budget for one inbound turn.
    #[serde(default = "default_turn_timeout_secs")]
    pub turn_timeout_secs: u64,

    /// Maximum wait for the per-session lock.
    #[serde(default = "default_lock_timeout_secs")]
    pub lock_timeout_secs: u64,

    /// Reply sent when a turn cannot complete.
    #[serde(default = "default_fallback_message")]
    pub fallback_message: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            log_level: default_log_level(),
            persona: None,
            persona_file: None,
            turn_timeout_secs: default_turn_timeout_secs(),
            lock_timeout_secs: default_lock_timeout_secs(),
            fallback_message: default_fallback_message(),
        }
    }
}

fn default_agent_name() -> String {
    "Ava".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_turn_timeout_secs() -> u64 {
    60
}

fn default_lock_timeout_secs() -> u64 {
    30
}

fn default_fallback_message() -> String {
    "Sorry, I got a bit lost there. Could you say that again?".to_string()
}

/// Response-modality classification configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RoutingConfig {
    /// How many trailing messages the classifier sees.
    #[serde(default = "default_messages_to_analyze")]
    pub messages_to_analyze: usize,

    /// Sampling temperature for the classification call.
    #[serde(default = "default_routing_temperature")]
    pub temperature: f32,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            messages_to_analyze: default_messages_to_analyze(),
            temperature: default_routing_temperature(),
        }
    }
}

fn default_messages_to_analyze() -> usize {
    3
}

fn default_routing_temperature() -> f32 {
    0.3
}

/// Long-term memory configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryConfig {
    /// Enable fact extraction and retrieval.
    #[serde(default = "default_memory_enabled")]
    pub enabled: bool,

    /// Facts retrieved per turn.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Cosine similarity at or above which a new fact is a duplicate.
    #[serde(default = "default_dedup_threshold")]
    pub dedup_threshold: f32,

    /// Trailing messages joined into the retrieval query.
    #[serde(default = "default_context_messages")]
    pub context_messages: usize,

    /// Delay before the single retry of a transient embedding or store error.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: default_memory_enabled(),
            top_k: default_top_k(),
            dedup_threshold: default_dedup_threshold(),
            context_messages: default_context_messages(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

fn default_memory_enabled() -> bool {
    true
}

fn default_top_k() -> usize {
    3
}

fn default_dedup_threshold() -> f32 {
    0.9
}

fn default_context_messages() -> usize {
    3
}

fn default_retry_delay_ms() -> u64 {
    200
}

/// Short-term window and summarization configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ContextConfig {
    /// Unsummarized messages that trigger summarization when exceeded.
    #[serde(default = "default_summary_trigger")]
    pub summary_trigger: usize,

    /// Messages left in the recent window after summarizing.
    #[serde(default = "default_keep_after_summary")]
    pub keep_after_summary: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            summary_trigger: default_summary_trigger(),
            keep_after_summary: default_keep_after_summary(),
        }
    }
}

fn default_summary_trigger() -> usize {
    20
}

fn default_keep_after_summary() -> usize {
    5
}

/// Weekly schedule. Each day maps `"HH:MM-HH:MM"` ranges to an activity.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduleConfig {
    /// Activity reported when no range matches.
    #[serde(default = "default_fallback_activity")]
    pub fallback_activity: String,

    #[serde(default)]
    pub monday: BTreeMap<String, String>,
    #[serde(default)]
    pub tuesday: BTreeMap<String, String>,
    #[serde(default)]
    pub wednesday: BTreeMap<String, String>,
    #[serde(default)]
    pub thursday: BTreeMap<String, String>,
    #[serde(default)]
    pub friday: BTreeMap<String, String>,
    #[serde(default)]
    pub saturday: BTreeMap<String, String>,
    #[serde(default)]
    pub sunday: BTreeMap<String, String>,
}

impl ScheduleConfig {
    /// All days in Monday-first order, paired with their names.
    pub fn days(&self) -> [(&'static str, &BTreeMap<String, String>); 7] {
        [
            ("monday", &self.monday),
            ("tuesday", &self.tuesday),
            ("wednesday", &self.wednesday),
            ("thursday", &self.thursday),
            ("friday", &self.friday),
            ("saturday", &self.saturday),
            ("sunday", &self.sunday),
        ]
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            fallback_activity: default_fallback_activity(),
            monday: BTreeMap::new(),
            tuesday: BTreeMap::new(),
            wednesday: BTreeMap::new(),
            thursday: BTreeMap::new(),
            friday: BTreeMap::new(),
            saturday: BTreeMap::new(),
            sunday: BTreeMap::new(),
        }
    }
}

fn default_fallback_activity() -> String {
    "Relaxing at home and catching up on messages.".to_string()
}

/// Outbound voice-call configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VoiceConfig {
    /// Allow the engine to place calls. When false the voice branch explains it cannot call.
    #[serde(default = "default_voice_enabled")]
    pub enabled: bool,

    /// TTS voice for both audio replies and calls.
    #[serde(default = "default_voice_id")]
    pub voice_id: String,

    /// Model the telephony assistant talks with.
    #[serde(default = "default_assistant_model")]
    pub assistant_model: String,

    #[serde(default = "default_max_duration_secs")]
    pub max_duration_secs: u32,

    #[serde(default = "default_silence_timeout_secs")]
    pub silence_timeout_secs: u32,

    /// Age after which an unresolved call correlation is abandoned.
    #[serde(default = "default_correlation_ttl_secs")]
    pub correlation_ttl_secs: u64,

    /// Interval of the abandoned-correlation sweep.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Delay before the single retry of a webhook correlation lookup.
    #[serde(default = "default_webhook_retry_delay_ms")]
    pub webhook_retry_delay_ms: u64,

    /// Budget for creating the assistant and dialing. Must stay below the turn budget.
    #[serde(default = "default_placement_timeout_secs")]
    pub placement_timeout_secs: u64,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: default_voice_enabled(),
            voice_id: default_voice_id(),
            assistant_model: default_assistant_model(),
            max_duration_secs: default_max_duration_secs(),
            silence_timeout_secs: default_silence_timeout_secs(),
            correlation_ttl_secs: default_correlation_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            webhook_retry_delay_ms: default_webhook_retry_delay_ms(),
            placement_timeout_secs: default_placement_timeout_secs(),
        }
    }
}

fn default_voice_enabled() -> bool {
    true
}

fn default_voice_id() -> String {
    "alloy".to_string()
}

fn default_assistant_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_max_duration_secs() -> u32 {
    600
}

fn default_silence_timeout_secs() -> u32 {
    30
}

fn default_correlation_ttl_secs() -> u64 {
    900
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_webhook_retry_delay_ms() -> u64 {
    500
}

fn default_placement_timeout_secs() -> u64 {
    20
}

/// OpenAI-compatible API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OpenAiConfig {
    /// API key. `None` requires the `OPENAI_API_KEY` environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    /// Model for persona replies, captions, and scene generation.
    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    /// Model for response-modality classification.
    #[serde(default = "default_small_model")]
    pub router_model: String,

    /// Model for memory analysis.
    #[serde(default = "default_small_model")]
    pub memory_model: String,

    /// Model for conversation and call summaries.
    #[serde(default = "default_small_model")]
    pub summary_model: String,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    #[serde(default = "default_tts_model")]
    pub tts_model: String,

    #[serde(default = "default_stt_model")]
    pub stt_model: String,

    #[serde(default = "default_image_model")]
    pub image_model: String,

    #[serde(default = "default_vision_model")]
    pub vision_model: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_openai_base_url(),
            chat_model: default_chat_model(),
            router_model: default_small_model(),
            memory_model: default_small_model(),
            summary_model: default_small_model(),
            embedding_model: default_embedding_model(),
            tts_model: default_tts_model(),
            stt_model: default_stt_model(),
            image_model: default_image_model(),
            vision_model: default_vision_model(),
        }
    }
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_chat_model() -> String {
    "gpt-4o".to_string()
}

fn default_small_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_tts_model() -> String {
    "tts-1".to_string()
}

fn default_stt_model() -> String {
    "whisper-1".to_string()
}

fn default_image_model() -> String {
    "dall-e-3".to_string()
}

fn default_vision_model() -> String {
    "gpt-4o-mini".to_string()
}

/// Telephony platform configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VapiConfig {
    /// API key. `None` requires the `VAPI_API_KEY` environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_vapi_base_url")]
    pub base_url: String,

    /// Platform id of the number calls are placed from.
    #[serde(default)]
    pub phone_number_id: Option<String>,

    /// Public URL of this gateway's webhook, registered on each assistant.
    #[serde(default)]
    pub server_url: Option<String>,

    /// Public URL of this gateway's in-call completion endpoint. When set,
    /// calls are answered by the persona instead of the platform's model.
    #[serde(default)]
    pub llm_url: Option<String>,
}

impl Default for VapiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_vapi_base_url(),
            phone_number_id: None,
            server_url: None,
            llm_url: None,
        }
    }
}

fn default_vapi_base_url() -> String {
    "https://api.vapi.ai".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("parley").join("parley.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("parley.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// HTTP gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_host")]
    pub host: String,

    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bearer token for `/v1/messages`. `None` leaves the endpoint open.
    #[serde(default)]
    pub bearer_token: Option<String>,

    /// Shared secret expected in the webhook's `x-vapi-secret` header.
    #[serde(default)]
    pub webhook_secret: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
            bearer_token: None,
            webhook_secret: None,
        }
    }
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    3000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = ParleyConfig::default();
        assert_eq!(config.routing.messages_to_analyze, 3);
        assert!((config.routing.temperature - 0.3).abs() < f32::EPSILON);
        assert_eq!(config.memory.top_k, 3);
        assert!((config.memory.dedup_threshold - 0.9).abs() < f32::EPSILON);
        assert_eq!(config.context.summary_trigger, 20);
        assert_eq!(config.context.keep_after_summary, 5);
        assert_eq!(config.voice.correlation_ttl_secs, 900);
        assert_eq!(config.voice.max_duration_secs, 600);
        assert_eq!(config.gateway.port, 3000);
    }

    #[test]
    fn schedule_days_are_monday_first() {
        let mut schedule = ScheduleConfig::default();
        schedule
            .sunday
            .insert("10:00-11:00".into(), "brunch".into());
        let days = schedule.days();
        assert_eq!(days[0].0, "monday");
        assert_eq!(days[6].0, "sunday");
        assert_eq!(days[6].1.len(), 1);
    }
}
