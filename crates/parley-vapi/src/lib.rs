// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telephony adapter for a Vapi-style voice platform.
//!
//! A call is two requests: `POST /assistant` registers a per-call assistant
//! carrying the conversation context, then `POST /call` dials the user with
//! the local call id in `metadata` so webhooks can be correlated. Neither
//! request is retried here; the engine never retries call placement.

pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use parley_config::model::VapiConfig;
use parley_core::ParleyError;
use parley_core::traits::{PluginAdapter, TelephonyAdapter};
use parley_core::types::{
    AdapterType, HealthStatus, PlaceCallRequest, PlacedCall, TransientAssistantConfig,
};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Serialize;
use tracing::{debug, info};

use crate::types::{AssistantRequest, CallRequest, CreatedResource};

/// Telephony adapter implementing [`TelephonyAdapter`].
///
/// API key resolution order: config -> `VAPI_API_KEY` env var -> error.
pub struct VapiTelephony {
    client: reqwest::Client,
    base_url: String,
    phone_number_id: Option<String>,
}

impl VapiTelephony {
    pub fn new(config: &VapiConfig) -> Result<Self, ParleyError> {
        let api_key = resolve_api_key(&config.api_key)?;
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|e| {
                ParleyError::Config(format!("invalid API key header value: {e}"))
            })?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ParleyError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        info!(base_url = %config.base_url, "telephony adapter initialized");
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            phone_number_id: config.phone_number_id.clone().filter(|id| !id.is_empty()),
        })
    }

    async fn create<B: Serialize>(&self, path: &str, body: &B) -> Result<CreatedResource, ParleyError> {
        let response = self
            .client
            .post(format!("{}/{path}", self.base_url))
            .json(body)
            .send()
            .await
            .map_err(|e| ParleyError::Provider {
                message: format!("telephony request to /{path} failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        debug!(path, status = %status, "telephony response received");
        if !status.is_success() {
            let message = format!("telephony platform returned {status} for /{path}: {text}");
            return Err(if status.as_u16() == 429 || status.is_server_error() {
                ParleyError::Transient { message }
            } else {
                ParleyError::provider(message)
            });
        }

        serde_json::from_str(&text).map_err(|e| ParleyError::Provider {
            message: format!("failed to parse /{path} response: {e}"),
            source: Some(Box::new(e)),
        })
    }
}

/// Resolves the API key from config or the environment.
fn resolve_api_key(config_key: &Option<String>) -> Result<String, ParleyError> {
    if let Some(key) = config_key
        && !key.is_empty()
    {
        return Ok(key.clone());
    }

    std::env::var("VAPI_API_KEY").map_err(|_| {
        ParleyError::Config(
            "Telephony API key not found. Set vapi.api_key in config or VAPI_API_KEY environment variable.".into(),
        )
    })
}

#[async_trait]
impl PluginAdapter for VapiTelephony {
    fn name(&self) -> &str {
        "vapi"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Telephony
    }

    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        Ok(match &self.phone_number_id {
            Some(_) => HealthStatus::Healthy,
            None => HealthStatus::Degraded("vapi.phone_number_id is not set".to_string()),
        })
    }

    async fn shutdown(&self) -> Result<(), ParleyError> {
        debug!("telephony adapter shutting down");
        Ok(())
    }
}

#[async_trait]
impl TelephonyAdapter for VapiTelephony {
    async fn create_transient_assistant(
        &self,
        config: &TransientAssistantConfig,
    ) -> Result<String, ParleyError> {
        let created = self.create("assistant", &AssistantRequest::from(config)).await?;
        debug!(assistant_id = %created.id, "transient assistant created");
        Ok(created.id)
    }

    async fn place_call(&self, request: &PlaceCallRequest) -> Result<PlacedCall, ParleyError> {
        let phone_number_id = self.phone_number_id.as_deref().ok_or_else(|| {
            ParleyError::Config("vapi.phone_number_id is required to place calls".to_string())
        })?;
        let created = self
            .create("call", &CallRequest::new(phone_number_id, request))
            .await?;
        info!(
            call_id = %request.call_id,
            provider_call_id = %created.id,
            "outbound call placed"
        );
        Ok(PlacedCall {
            provider_call_id: created.id,
            status: created.status.unwrap_or_else(|| "queued".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use parley_core::types::CallVariables;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn adapter(server: &MockServer, phone_number_id: Option<&str>) -> VapiTelephony {
        VapiTelephony::new(&VapiConfig {
            api_key: Some("vapi-key".into()),
            base_url: server.uri(),
            phone_number_id: phone_number_id.map(str::to_string),
            server_url: None,
            llm_url: None,
        })
        .unwrap()
    }

    fn assistant_config() -> TransientAssistantConfig {
        TransientAssistantConfig {
            name: "Ava (call)".into(),
            first_message: "Hi Sam!".into(),
            system_prompt: "You are Ava.".into(),
            voice_id: "alloy".into(),
            model: "gpt-4o-mini".into(),
            max_duration_secs: 600,
            silence_timeout_secs: 30,
            server_url: Some("https://parley.example/v1/calls/webhook".into()),
            llm_url: None,
            server_messages: vec!["status-update".into(), "end-of-call-report".into()],
        }
    }

    fn call_request() -> PlaceCallRequest {
        PlaceCallRequest {
            call_id: "c-1".into(),
            destination: "+14155550123".into(),
            assistant_ref: "asst-9".into(),
            variables: CallVariables {
                user_name: "Sam".into(),
                user_id: "u1".into(),
                recent_context: "User: call me".into(),
                conversation_topic: "General conversation".into(),
                last_message: "call me".into(),
                message_count: 1,
                relationship_stage: "new".into(),
                calling_reason: "User requested a call".into(),
                call_initiated_at: Utc::now(),
                interface: "voice_from_chat".into(),
            },
        }
    }

    #[tokio::test]
    async fn creates_assistant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/assistant"))
            .and(header("authorization", "Bearer vapi-key"))
            .and(body_partial_json(serde_json::json!({
                "name": "Ava (call)",
                "firstMessage": "Hi Sam!",
                "model": {"model": "gpt-4o-mini", "messages": [{"role": "system", "content": "You are Ava."}]},
                "voice": {"voiceId": "alloy"},
                "maxDurationSeconds": 600,
                "server": {"url": "https://parley.example/v1/calls/webhook"},
                "serverMessages": ["status-update", "end-of-call-report"]
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": "asst-9"})))
            .expect(1)
            .mount(&server)
            .await;

        let id = adapter(&server, Some("pn-1"))
            .create_transient_assistant(&assistant_config())
            .await
            .unwrap();
        assert_eq!(id, "asst-9");
    }

    #[tokio::test]
    async fn completion_endpoint_makes_a_custom_llm_assistant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/assistant"))
            .and(body_partial_json(serde_json::json!({
                "model": {
                    "provider": "custom-llm",
                    "model": "gpt-4o-mini",
                    "url": "https://parley.example/v1/calls/chat/completions"
                }
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": "asst-10"})))
            .expect(1)
            .mount(&server)
            .await;

        let config = TransientAssistantConfig {
            llm_url: Some("https://parley.example/v1/calls/chat/completions".into()),
            ..assistant_config()
        };
        let id = adapter(&server, Some("pn-1"))
            .create_transient_assistant(&config)
            .await
            .unwrap();
        assert_eq!(id, "asst-10");
    }

    #[tokio::test]
    async fn places_call_with_metadata_and_variables() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/call"))
            .and(body_partial_json(serde_json::json!({
                "phoneNumberId": "pn-1",
                "customer": {"number": "+14155550123"},
                "assistantId": "asst-9",
                "assistantOverrides": {"variableValues": {"userName": "Sam", "interface": "voice_from_chat"}},
                "metadata": {"call_id": "c-1"}
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": "prov-77",
                "status": "queued"
            })))
            .mount(&server)
            .await;

        let placed = adapter(&server, Some("pn-1"))
            .place_call(&call_request())
            .await
            .unwrap();
        assert_eq!(placed.provider_call_id, "prov-77");
        assert_eq!(placed.status, "queued");
    }

    #[tokio::test]
    async fn missing_phone_number_id_fails_without_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let err = adapter(&server, None).place_call(&call_request()).await.unwrap_err();
        assert!(matches!(err, ParleyError::Config(_)));
    }

    #[tokio::test]
    async fn rejected_call_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/call"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid number"))
            .expect(1)
            .mount(&server)
            .await;

        let err = adapter(&server, Some("pn-1"))
            .place_call(&call_request())
            .await
            .unwrap_err();
        assert!(!err.is_transient());
        assert!(err.to_string().contains("invalid number"), "got: {err}");
    }

    #[tokio::test]
    async fn health_reports_missing_number() {
        let server = MockServer::start().await;
        assert_eq!(
            adapter(&server, None).health_check().await.unwrap(),
            HealthStatus::Degraded("vapi.phone_number_id is not set".into())
        );
        assert_eq!(
            adapter(&server, Some("pn-1")).health_check().await.unwrap(),
            HealthStatus::Healthy
        );
    }
}
