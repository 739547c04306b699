// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway.
//!
//! Handles GET /health, GET /metrics, POST /v1/messages,
//! POST /v1/calls/webhook and POST /v1/calls/chat/completions.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use parley_core::types::{InboundMessage, MessageContent, OwnerId, TurnOutcome};
use parley_voice::{ChatCompletion, WebhookAck, parse_call_chat};
use serde::{Deserialize, Serialize};

use crate::auth::webhook_authorized;
use crate::server::GatewayState;

const DEFAULT_AUDIO_MIME: &str = "audio/ogg";
const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

/// Request body for POST /v1/messages.
///
/// Exactly one of `text`, `audio_base64`, or `image_base64` must be set.
#[derive(Debug, Default, Deserialize)]
pub struct MessageRequest {
    pub session_id: String,
    pub owner_id: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub audio_base64: Option<String>,
    #[serde(default)]
    pub image_base64: Option<String>,
    /// Mime type of the audio or image payload.
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Caption sent with an image.
    #[serde(default)]
    pub caption: Option<String>,
    /// Number the channel knows the user by, used for callbacks.
    #[serde(default)]
    pub phone_number: Option<String>,
}

/// Response body for POST /v1/messages.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageResponse {
    /// `reply` or `call_initiated`.
    pub kind: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_base64: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
}

impl From<TurnOutcome> for MessageResponse {
    fn from(outcome: TurnOutcome) -> Self {
        match outcome {
            TurnOutcome::Reply(reply) => {
                let (media_base64, media_mime_type) = match reply.media {
                    Some(media) => (Some(STANDARD.encode(&media.data)), Some(media.mime_type)),
                    None => (None, None),
                };
                Self {
                    kind: "reply".to_string(),
                    message: reply.message.content,
                    media_base64,
                    media_mime_type,
                    call_id: None,
                }
            }
            TurnOutcome::CallInitiated { call_id, message } => Self {
                kind: "call_initiated".to_string(),
                message: message.content,
                media_base64: None,
                media_mime_type: None,
                call_id: Some(call_id),
            },
        }
    }
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn bad_request(error: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

/// Turns the request body into the engine's inbound message.
fn to_inbound(body: &MessageRequest) -> Result<InboundMessage, String> {
    let content = match (&body.text, &body.audio_base64, &body.image_base64) {
        (Some(text), None, None) => {
            if text.trim().is_empty() {
                return Err("text must not be empty".to_string());
            }
            MessageContent::Text(text.clone())
        }
        (None, Some(audio), None) => MessageContent::Audio {
            data: decode(audio, "audio_base64")?,
            mime_type: body
                .mime_type
                .clone()
                .unwrap_or_else(|| DEFAULT_AUDIO_MIME.to_string()),
        },
        (None, None, Some(image)) => MessageContent::Image {
            data: decode(image, "image_base64")?,
            mime_type: body
                .mime_type
                .clone()
                .unwrap_or_else(|| DEFAULT_IMAGE_MIME.to_string()),
            caption: body.caption.clone(),
        },
        _ => {
            return Err(
                "exactly one of text, audio_base64, or image_base64 is required".to_string(),
            );
        }
    };

    Ok(InboundMessage {
        content,
        phone_number: body.phone_number.clone().filter(|n| !n.trim().is_empty()),
    })
}

fn decode(encoded: &str, field: &str) -> Result<Vec<u8>, String> {
    STANDARD
        .decode(encoded.trim())
        .map_err(|e| format!("{field} is not valid base64: {e}"))
}

/// POST /v1/messages
///
/// Runs one turn through the engine. Engine failures surface as the
/// apology reply, so every well-formed request gets a 200.
pub async fn post_messages(
    State(state): State<GatewayState>,
    Json(body): Json<MessageRequest>,
) -> Response {
    if body.session_id.trim().is_empty() {
        return bad_request("session_id must not be empty");
    }
    let owner = match OwnerId::new(body.owner_id.as_str()) {
        Ok(owner) => owner,
        Err(e) => return bad_request(e.to_string()),
    };
    let inbound = match to_inbound(&body) {
        Ok(inbound) => inbound,
        Err(e) => return bad_request(e),
    };

    let outcome = state
        .engine
        .handle_inbound_message(&body.session_id, &owner, inbound)
        .await;
    (StatusCode::OK, Json(MessageResponse::from(outcome))).into_response()
}

/// POST /v1/calls/webhook
///
/// Acknowledges immediately; reconciliation runs in the background.
pub async fn post_call_webhook(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !webhook_authorized(&state.auth, &headers) {
        tracing::warn!("rejected call webhook with missing or wrong secret");
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let ack: WebhookAck = state.engine.handle_call_webhook(&body);
    (StatusCode::OK, Json(ack)).into_response()
}

/// POST /v1/calls/chat/completions
///
/// OpenAI-compatible endpoint the telephony platform calls for every caller
/// utterance while a call is live.
pub async fn post_call_chat(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !webhook_authorized(&state.auth, &headers) {
        tracing::warn!("rejected in-call completion with missing or wrong secret");
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let request = match parse_call_chat(&body) {
        Ok(request) => request,
        Err(e) => return bad_request(e.to_string()),
    };

    let reply = state.engine.handle_call_chat(&request).await;
    let model = state.engine.config().voice.assistant_model.clone();
    (StatusCode::OK, Json(ChatCompletion::reply(model, reply))).into_response()
}

/// GET /health
pub async fn get_public_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
    })
}

/// GET /metrics
pub async fn get_public_metrics(State(state): State<GatewayState>) -> Response {
    match &state.health.prometheus_render {
        Some(render) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics not enabled").into_response(),
    }
}
