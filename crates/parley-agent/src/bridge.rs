// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Voice-call bridge: hands a conversation to the telephony platform.
//!
//! The outbound half runs inside a turn. The correlation is registered
//! before dialing so webhooks that arrive ahead of the dial response still
//! find their session. Neither assistant creation nor call placement is
//! retried, and both together are bounded by `voice.placement_timeout_secs`
//! so a hung platform fails the call instead of the turn.

use std::future::Future;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use chrono::Utc;
use parley_config::model::VoiceConfig;
use parley_context::Persona;
use parley_core::types::PlaceCallRequest;
use parley_core::{ContextBundle, ParleyError, SessionState, TelephonyAdapter};
use parley_voice::{
    CallCorrelation, CallEndpoints, CallState, CorrelationRegistry, build_assistant_config,
    build_call_variables,
};
use tokio::time::Instant;
use regex::Regex;
use tracing::{info, warn};

static PHONE_NUMBER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\+[1-9]\d{7,14}").ok());

const CALL_TRANSCRIPT_CHARS: usize = 500;

/// Result of trying to start a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallAttempt {
    /// The call was placed; `message` confirms it to the user.
    Initiated { call_id: String, message: String },
    /// No destination number is known yet.
    NeedsNumber { message: String },
    /// Calls are switched off in configuration.
    Disabled { message: String },
    /// The platform refused the assistant or the call.
    Failed { message: String },
}

impl CallAttempt {
    pub fn message(&self) -> &str {
        match self {
            Self::Initiated { message, .. }
            | Self::NeedsNumber { message }
            | Self::Disabled { message }
            | Self::Failed { message } => message,
        }
    }

    pub fn call_id(&self) -> Option<&str> {
        match self {
            Self::Initiated { call_id, .. } => Some(call_id),
            _ => None,
        }
    }
}

pub struct VoiceBridge {
    telephony: Arc<dyn TelephonyAdapter>,
    registry: Arc<CorrelationRegistry>,
    persona: Persona,
    voice: VoiceConfig,
    endpoints: CallEndpoints,
}

impl VoiceBridge {
    pub fn new(
        telephony: Arc<dyn TelephonyAdapter>,
        registry: Arc<CorrelationRegistry>,
        persona: Persona,
        voice: VoiceConfig,
        endpoints: CallEndpoints,
    ) -> Self {
        Self {
            telephony,
            registry,
            persona,
            voice,
            endpoints,
        }
    }

    pub fn registry(&self) -> &Arc<CorrelationRegistry> {
        &self.registry
    }

    /// Start an outbound call for `session`.
    ///
    /// A number typed in the latest user message is remembered on the
    /// session. On success `session.pending_call` holds the new call id.
    pub async fn initiate_call(
        &self,
        session: &mut SessionState,
        bundle: &mut ContextBundle,
        reason: &str,
    ) -> CallAttempt {
        if !self.voice.enabled {
            return CallAttempt::Disabled {
                message: "I can't make phone calls right now, but I'm happy to keep chatting here."
                    .to_string(),
            };
        }

        let Some(destination) = resolve_destination(session) else {
            info!(session_id = %session.session_id, "call requested without a known number");
            return CallAttempt::NeedsNumber {
                message: "I'd love to call you! What number should I call? Please include the \
                          country code, like +14155550123."
                    .to_string(),
            };
        };

        let deadline = Instant::now() + Duration::from_secs(self.voice.placement_timeout_secs);
        let variables = build_call_variables(session, self.persona.name(), reason, Utc::now());
        bundle.call_variables = Some(variables.clone());

        let assistant = build_assistant_config(
            self.persona.prompt(),
            self.persona.name(),
            &variables,
            &self.voice,
            &self.endpoints,
        );
        let created = self.bounded(deadline, self.telephony.create_transient_assistant(&assistant));
        let assistant_ref = match created.await {
            Ok(id) => id,
            Err(e) => {
                warn!(
                    session_id = %session.session_id,
                    from = %CallState::Requested,
                    to = %CallState::Failed,
                    error = %e,
                    "transient assistant creation failed"
                );
                return CallAttempt::Failed {
                    message: call_failed_message(&destination),
                };
            }
        };

        let call_id = uuid::Uuid::new_v4().to_string();
        let correlation =
            CallCorrelation::new(&call_id, &session.session_id, session.owner_id.clone());
        if let Err(e) = self.registry.register(correlation) {
            warn!(call_id = %call_id, error = %e, "call correlation rejected");
            return CallAttempt::Failed {
                message: call_failed_message(&destination),
            };
        }

        let request = PlaceCallRequest {
            call_id: call_id.clone(),
            destination: destination.clone(),
            assistant_ref,
            variables,
        };
        if let Err(e) = self.dial(deadline, &request).await {
            self.registry.remove(&call_id);
            parley_prometheus::set_active_calls(self.registry.len());
            warn!(
                call_id = %call_id,
                session_id = %session.session_id,
                to = %CallState::Failed,
                error = %e,
                "call placement failed"
            );
            return CallAttempt::Failed {
                message: call_failed_message(&destination),
            };
        }

        session.pending_call = Some(call_id.clone());
        parley_prometheus::set_active_calls(self.registry.len());
        info!(call_id = %call_id, session_id = %session.session_id, reason, "outbound call placed");

        CallAttempt::Initiated {
            call_id,
            message: format!(
                "Calling you now at {destination}! Pick up when your phone rings."
            ),
        }
    }

    async fn dial(&self, deadline: Instant, request: &PlaceCallRequest) -> Result<(), ParleyError> {
        self.registry.transition(&request.call_id, CallState::Dialing)?;
        let placed = self
            .bounded(deadline, self.telephony.place_call(request))
            .await?;
        self.registry
            .set_provider_call_id(&request.call_id, &placed.provider_call_id)?;
        Ok(())
    }

    async fn bounded<T>(
        &self,
        deadline: Instant,
        call: impl Future<Output = Result<T, ParleyError>>,
    ) -> Result<T, ParleyError> {
        tokio::time::timeout_at(deadline, call)
            .await
            .map_err(|_| ParleyError::Timeout {
                duration: Duration::from_secs(self.voice.placement_timeout_secs),
            })?
    }
}

/// The session's number, or an E.164 number typed in the latest user message.
fn resolve_destination(session: &mut SessionState) -> Option<String> {
    if let Some(number) = &session.phone_number {
        return Some(number.clone());
    }
    let typed = session
        .last_user_message()
        .and_then(|m| find_phone_number(&m.content))?;
    session.phone_number = Some(typed.clone());
    Some(typed)
}

/// First E.164-looking number in `text`.
pub fn find_phone_number(text: &str) -> Option<String> {
    PHONE_NUMBER
        .as_ref()?
        .find(text)
        .map(|m| m.as_str().to_string())
}

fn call_failed_message(destination: &str) -> String {
    format!(
        "I tried to call you at {destination}, but the call couldn't be placed. \
         We can keep chatting here."
    )
}

/// Session text for a call that ended normally.
pub fn ended_text(summary: &str) -> String {
    format!("Call summary: {summary}")
}

/// Session text when the user could not be reached.
pub fn failed_text(reason: &str) -> String {
    format!("I couldn't reach you by phone ({reason}). We can keep chatting here.")
}

/// Fallback summary when the call-summary model is unavailable.
pub fn truncate_transcript(transcript: &str) -> String {
    let trimmed = transcript.trim();
    if trimmed.chars().count() <= CALL_TRANSCRIPT_CHARS {
        return trimmed.to_string();
    }
    let kept: String = trimmed.chars().take(CALL_TRANSCRIPT_CHARS).collect();
    format!("{kept}...")
}
