// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI-compatible provider adapters for the Parley engine.
//!
//! One [`OpenAiProvider`] serves every generation seam: chat completions
//! (with a model per [`CompletionTask`]), embeddings, text-to-speech,
//! transcription, image generation, and vision through chat with an inline
//! data URI. Any server speaking the same REST surface works via
//! `openai.base_url`.

pub mod client;
pub mod types;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use parley_config::model::OpenAiConfig;
use parley_core::traits::{
    CompletionAdapter, EmbeddingAdapter, ImageGenerationAdapter, PluginAdapter,
    SpeechToTextAdapter, TextToSpeechAdapter, VisionAdapter,
};
use parley_core::types::{
    AdapterType, CompletionRequest, CompletionResponse, CompletionTask, EmbeddingInput,
    EmbeddingOutput, HealthStatus, ResponseFormat, Role,
};
use parley_core::ParleyError;
use tracing::{debug, info};

use crate::client::OpenAiClient;
use crate::types::{
    ApiContent, ApiMessage, ChatRequest, ChatResponse, ContentPart, EmbeddingRequest,
    EmbeddingResponse, ImageRequest, ImageResponse, ImageUrl, ResponseFormatSpec, SpeechRequest,
    TranscriptionResponse,
};

const IMAGE_SIZE: &str = "1024x1024";

/// OpenAI provider implementing every generation adapter trait.
///
/// API key resolution order: config -> `OPENAI_API_KEY` env var -> error.
pub struct OpenAiProvider {
    client: OpenAiClient,
    config: OpenAiConfig,
}

impl OpenAiProvider {
    pub fn new(config: &OpenAiConfig) -> Result<Self, ParleyError> {
        let api_key = resolve_api_key(&config.api_key)?;
        let client = OpenAiClient::new(&api_key, &config.base_url)?;
        info!(
            base_url = %config.base_url,
            chat_model = %config.chat_model,
            "OpenAI provider initialized"
        );
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// The model a completion step runs on.
    pub fn model_for(&self, task: CompletionTask) -> &str {
        match task {
            CompletionTask::Classification => &self.config.router_model,
            CompletionTask::MemoryAnalysis => &self.config.memory_model,
            CompletionTask::Response | CompletionTask::Scene => &self.config.chat_model,
            CompletionTask::Summary | CompletionTask::CallSummary => &self.config.summary_model,
        }
    }

    fn to_chat_request(&self, request: &CompletionRequest) -> ChatRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = &request.system {
            messages.push(ApiMessage::text("system", system.as_str()));
        }
        messages.extend(
            request
                .messages
                .iter()
                .map(|m| ApiMessage::text(role_name(m.role), m.content.as_str())),
        );

        ChatRequest {
            model: self.model_for(request.task).to_string(),
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: (request.response_format == ResponseFormat::Json)
                .then(ResponseFormatSpec::json_object),
        }
    }

    async fn chat(&self, request: &ChatRequest) -> Result<CompletionResponse, ParleyError> {
        let response: ChatResponse = self.client.post_json("chat/completions", request).await?;
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ParleyError::provider("chat completion returned no content"))?;
        Ok(CompletionResponse {
            content,
            model: response.model,
        })
    }
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::System => "system",
    }
}

/// Resolves the API key from config or the environment.
fn resolve_api_key(config_key: &Option<String>) -> Result<String, ParleyError> {
    if let Some(key) = config_key
        && !key.is_empty()
    {
        return Ok(key.clone());
    }

    std::env::var("OPENAI_API_KEY").map_err(|_| {
        ParleyError::Config(
            "OpenAI API key not found. Set openai.api_key in config or OPENAI_API_KEY environment variable.".into(),
        )
    })
}

#[async_trait]
impl PluginAdapter for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Completion
    }

    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        // No API call: health checks must not spend tokens.
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ParleyError> {
        debug!("OpenAI provider shutting down");
        Ok(())
    }
}

#[async_trait]
impl CompletionAdapter for OpenAiProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ParleyError> {
        let api_request = self.to_chat_request(&request);
        debug!(task = ?request.task, model = %api_request.model, "chat completion");
        self.chat(&api_request).await
    }
}

#[async_trait]
impl EmbeddingAdapter for OpenAiProvider {
    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, ParleyError> {
        let expected = input.texts.len();
        let request = EmbeddingRequest {
            model: self.config.embedding_model.clone(),
            input: input.texts,
        };
        let mut response: EmbeddingResponse = self.client.post_json("embeddings", &request).await?;
        if response.data.len() != expected {
            return Err(ParleyError::provider(format!(
                "expected {expected} embeddings, got {}",
                response.data.len()
            )));
        }
        response.data.sort_by_key(|d| d.index);
        let embeddings: Vec<Vec<f32>> = response.data.into_iter().map(|d| d.embedding).collect();
        let dimensions = embeddings.first().map(Vec::len).unwrap_or_default();
        Ok(EmbeddingOutput {
            embeddings,
            dimensions,
        })
    }
}

#[async_trait]
impl TextToSpeechAdapter for OpenAiProvider {
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>, ParleyError> {
        let request = SpeechRequest {
            model: self.config.tts_model.clone(),
            input: text.to_string(),
            voice: voice_id.to_string(),
            response_format: "mp3".to_string(),
        };
        self.client.post_json_for_bytes("audio/speech", &request).await
    }
}

#[async_trait]
impl SpeechToTextAdapter for OpenAiProvider {
    async fn transcribe(&self, audio: &[u8], mime_type: &str) -> Result<String, ParleyError> {
        let response: TranscriptionResponse = self
            .client
            .post_file(
                "audio/transcriptions",
                &[("model", self.config.stt_model.as_str())],
                audio.to_vec(),
                mime_type,
            )
            .await?;
        Ok(response.text)
    }
}

#[async_trait]
impl ImageGenerationAdapter for OpenAiProvider {
    async fn generate(&self, prompt: &str) -> Result<Vec<u8>, ParleyError> {
        let request = ImageRequest {
            model: self.config.image_model.clone(),
            prompt: prompt.to_string(),
            n: 1,
            size: IMAGE_SIZE.to_string(),
            response_format: "b64_json".to_string(),
        };
        let response: ImageResponse = self.client.post_json("images/generations", &request).await?;
        let encoded = response
            .data
            .into_iter()
            .find_map(|d| d.b64_json)
            .ok_or_else(|| ParleyError::provider("image generation returned no image"))?;
        STANDARD.decode(encoded.as_bytes()).map_err(|e| ParleyError::Provider {
            message: format!("image payload is not valid base64: {e}"),
            source: Some(Box::new(e)),
        })
    }
}

#[async_trait]
impl VisionAdapter for OpenAiProvider {
    async fn describe(&self, image: &[u8], mime_type: &str, prompt: &str) -> Result<String, ParleyError> {
        let data_uri = format!("data:{mime_type};base64,{}", STANDARD.encode(image));
        let request = ChatRequest {
            model: self.config.vision_model.clone(),
            messages: vec![ApiMessage {
                role: "user".to_string(),
                content: ApiContent::Parts(vec![
                    ContentPart::Text {
                        text: prompt.to_string(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl { url: data_uri },
                    },
                ]),
            }],
            temperature: None,
            max_tokens: Some(300),
            response_format: None,
        };
        Ok(self.chat(&request).await?.content)
    }
}
