// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telephony webhook payloads.
//!
//! Events arrive as `{"message": {"type": ..., "call": {...}, ...}}`. Only
//! the fields the engine acts on are read; everything else is ignored so
//! new platform fields never break parsing.

use parley_core::ParleyError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::state::CallState;

/// How a webhook names the call it is about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallRef {
    /// Local id echoed back from the call metadata.
    pub call_id: Option<String>,
    /// The platform's own id for the call.
    pub provider_call_id: Option<String>,
}

impl CallRef {
    pub fn is_empty(&self) -> bool {
        self.call_id.is_none() && self.provider_call_id.is_none()
    }
}

/// What a webhook tells us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallEventKind {
    /// Queued or ringing.
    Dialing,
    /// Picked up and in progress.
    Active,
    /// Finished normally.
    Ended {
        summary: Option<String>,
        transcript: Option<String>,
        reason: Option<String>,
    },
    /// Never connected or broke off with an error.
    Failed { reason: String },
    Transcript,
    SpeechUpdate,
    /// A status update with no lifecycle meaning (e.g. `ended` ahead of the report).
    Status(String),
    Unknown,
}

impl CallEventKind {
    /// Label for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Dialing => "dialing",
            Self::Active => "active",
            Self::Ended { .. } => "ended",
            Self::Failed { .. } => "failed",
            Self::Transcript => "transcript",
            Self::SpeechUpdate => "speech_update",
            Self::Status(_) => "status",
            Self::Unknown => "unknown",
        }
    }

    /// Whether the event closes the call and must reach the session.
    pub fn is_resolution(&self) -> bool {
        matches!(self, Self::Ended { .. } | Self::Failed { .. })
    }

    /// The lifecycle state an informational event moves the call to.
    pub fn progress_state(&self) -> Option<CallState> {
        match self {
            Self::Dialing => Some(CallState::Dialing),
            Self::Active | Self::Transcript | Self::SpeechUpdate => Some(CallState::Active),
            _ => None,
        }
    }
}

/// A parsed webhook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallEvent {
    /// The raw `message.type`.
    pub event_type: String,
    pub kind: CallEventKind,
    pub call: CallRef,
}

/// Immediate reply to a webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookAck {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
}

impl WebhookAck {
    pub fn received(event_type: impl Into<String>) -> Self {
        Self {
            status: "received".to_string(),
            event_type: Some(event_type.into()),
        }
    }

    pub fn error() -> Self {
        Self {
            status: "error".to_string(),
            event_type: None,
        }
    }
}

/// Parse a raw webhook body.
pub fn parse_call_event(raw: &[u8]) -> Result<CallEvent, ParleyError> {
    let root: Value = serde_json::from_slice(raw)
        .map_err(|e| ParleyError::Validation(format!("webhook body is not JSON: {e}")))?;
    let message = root.get("message").unwrap_or(&root);

    let event_type = str_at(message, &["type"])
        .ok_or_else(|| ParleyError::Validation("webhook has no message.type".to_string()))?;

    let call = CallRef {
        call_id: str_at(message, &["call", "metadata", "call_id"]),
        provider_call_id: str_at(message, &["call", "id"]),
    };

    let kind = match event_type.as_str() {
        "call-started" => CallEventKind::Active,
        "call-ended" | "end-of-call-report" => ended_or_failed(message),
        "call-failed" => CallEventKind::Failed {
            reason: str_at(message, &["error"])
                .or_else(|| str_at(message, &["endedReason"]))
                .unwrap_or_else(|| "unknown error".to_string()),
        },
        "status-update" => match str_at(message, &["status"]).as_deref() {
            Some("queued" | "ringing") => CallEventKind::Dialing,
            Some("in-progress") => CallEventKind::Active,
            Some(other) => CallEventKind::Status(other.to_string()),
            None => CallEventKind::Unknown,
        },
        "transcript" => CallEventKind::Transcript,
        "speech-update" => CallEventKind::SpeechUpdate,
        _ => CallEventKind::Unknown,
    };

    Ok(CallEvent {
        event_type,
        kind,
        call,
    })
}

fn ended_or_failed(message: &Value) -> CallEventKind {
    let reason = str_at(message, &["endedReason"]);
    if let Some(reason) = &reason
        && is_failure_reason(reason)
    {
        return CallEventKind::Failed {
            reason: reason.clone(),
        };
    }

    CallEventKind::Ended {
        summary: str_at(message, &["summary"]).or_else(|| str_at(message, &["analysis", "summary"])),
        transcript: str_at(message, &["transcript"])
            .or_else(|| str_at(message, &["artifact", "transcript"])),
        reason,
    }
}

/// End reasons that mean the user was never reached.
fn is_failure_reason(reason: &str) -> bool {
    let reason = reason.to_ascii_lowercase();
    ["did-not-answer", "busy", "failed", "error", "invalid-number"]
        .iter()
        .any(|marker| reason.contains(marker))
}

/// A non-blank string at a JSON path.
pub(crate) fn str_at(value: &Value, path: &[&str]) -> Option<String> {
    path.iter()
        .try_fold(value, |v, key| v.get(*key))?
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
