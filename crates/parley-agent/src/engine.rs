// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The engine's entry points: inbound turns, call webhooks, and in-call
//! completions.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{TimeDelta, Utc};
use parley_config::model::ParleyConfig;
use parley_context::{ActivityLookup, ContextAssembler, Persona, Summarizer};
use parley_core::types::{CompletionRequest, CompletionTask, OutboundReply};
use parley_core::{
    CompletionAdapter, ContextBundle, EmbeddingAdapter, ImageGenerationAdapter, InboundMessage,
    Message, OwnerId, ParleyError, SessionState, SessionStore, SpeechToTextAdapter,
    TelephonyAdapter, TextToSpeechAdapter, TurnOutcome, VectorStore, VisionAdapter,
};
use parley_memory::MemoryManager;
use parley_router::RouterClassifier;
use parley_storage::{SessionGateway, SessionGuard};
use parley_voice::{
    CallChatRequest, CallCorrelation, CallEndpoints, CallEvent, CallEventKind, CallState,
    CorrelationRegistry, WebhookAck, parse_call_event,
};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::bridge::{VoiceBridge, ended_text, failed_text, truncate_transcript};
use crate::dispatch::{
    AudioHandler, Dispatcher, ImageHandler, ReplyGenerator, TextHandler, Turn, VoiceCallHandler,
};
use crate::input::{InputNormalizer, placeholder};
use crate::shutdown;

const CALL_SUMMARY_PROMPT: &str = "Summarize this phone call in two or three sentences. \
Keep the facts and any plans that were made; write it so it reads well as a chat message.";

const CALL_CHAT_NOTE: &str = "You are speaking on a live phone call. Answer in one to three \
short sentences with no lists, links, or formatting.";

const CALL_CHAT_FALLBACK: &str = "Sorry, I didn't catch that. Could you say it again?";

/// Every external collaborator the engine talks to.
pub struct EngineComponents {
    pub completion: Arc<dyn CompletionAdapter>,
    pub embedder: Arc<dyn EmbeddingAdapter>,
    pub vectors: Arc<dyn VectorStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub tts: Arc<dyn TextToSpeechAdapter>,
    pub stt: Arc<dyn SpeechToTextAdapter>,
    pub images: Arc<dyn ImageGenerationAdapter>,
    pub vision: Arc<dyn VisionAdapter>,
    pub telephony: Arc<dyn TelephonyAdapter>,
    pub activity: Arc<dyn ActivityLookup>,
}

/// The dialogue orchestration engine.
pub struct Engine {
    config: ParleyConfig,
    gateway: SessionGateway,
    completion: Arc<dyn CompletionAdapter>,
    input: InputNormalizer,
    memory: Arc<MemoryManager>,
    router: RouterClassifier,
    assembler: ContextAssembler,
    activity: Arc<dyn ActivityLookup>,
    dispatcher: Dispatcher,
    replies: Arc<ReplyGenerator>,
    registry: Arc<CorrelationRegistry>,
    tasks: TaskTracker,
}

impl Engine {
    /// Build the engine, loading the persona from configuration.
    pub async fn new(config: ParleyConfig, components: EngineComponents) -> Self {
        let persona = Persona::load(&config.agent).await;
        Self::with_persona(config, components, persona)
    }

    pub fn with_persona(config: ParleyConfig, c: EngineComponents, persona: Persona) -> Self {
        let memory = Arc::new(MemoryManager::new(
            Arc::clone(&c.completion),
            c.embedder,
            c.vectors,
            config.memory.clone(),
        ));
        let router = RouterClassifier::new(Arc::clone(&c.completion), config.routing.clone());
        let summarizer = Summarizer::new(
            Arc::clone(&c.completion),
            config.context.clone(),
            persona.name(),
        );

        let registry = Arc::new(CorrelationRegistry::new());
        let bridge = Arc::new(VoiceBridge::new(
            c.telephony,
            Arc::clone(&registry),
            persona.clone(),
            config.voice.clone(),
            CallEndpoints {
                server_url: config.vapi.server_url.clone(),
                llm_url: config.vapi.llm_url.clone(),
            },
        ));

        let replies = Arc::new(ReplyGenerator::new(Arc::clone(&c.completion)));
        let mut dispatcher = Dispatcher::new(summarizer);
        dispatcher.register(Arc::new(TextHandler::new(Arc::clone(&replies))));
        dispatcher.register(Arc::new(ImageHandler::new(
            Arc::clone(&c.completion),
            c.images,
            Arc::clone(&replies),
        )));
        dispatcher.register(Arc::new(AudioHandler::new(
            c.tts,
            Arc::clone(&replies),
            config.voice.voice_id.clone(),
        )));
        dispatcher.register(Arc::new(VoiceCallHandler::new(bridge)));

        info!(agent_name = persona.name(), "engine initialized");

        Self {
            gateway: SessionGateway::new(c.sessions),
            completion: c.completion,
            input: InputNormalizer::new(c.stt, c.vision),
            assembler: ContextAssembler::new(persona, Arc::clone(&memory)),
            memory,
            router,
            activity: c.activity,
            dispatcher,
            replies,
            registry,
            tasks: TaskTracker::new(),
            config,
        }
    }

    pub fn config(&self) -> &ParleyConfig {
        &self.config
    }

    pub fn registry(&self) -> &CorrelationRegistry {
        &self.registry
    }

    pub fn sessions(&self) -> &SessionGateway {
        &self.gateway
    }

    pub fn persona(&self) -> &Persona {
        self.assembler.persona()
    }

    fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.config.agent.lock_timeout_secs)
    }

    fn turn_timeout(&self) -> Duration {
        Duration::from_secs(self.config.agent.turn_timeout_secs)
    }

    /// Read a session under its lock.
    pub async fn snapshot(&self, session_id: &str) -> Result<Option<SessionState>, ParleyError> {
        let guard = self.gateway.lock(session_id, self.lock_timeout()).await?;
        self.gateway.load(&guard).await
    }

    /// Handle one inbound channel message and produce the reply.
    ///
    /// Never fails: any unrecoverable error, an exceeded turn budget, or a
    /// lock timeout yields the configured apology.
    pub async fn handle_inbound_message(
        &self,
        session_id: &str,
        owner: &OwnerId,
        inbound: InboundMessage,
    ) -> TurnOutcome {
        let started = Instant::now();

        let guard = match self.gateway.lock(session_id, self.lock_timeout()).await {
            Ok(guard) => guard,
            Err(e) => {
                warn!(session_id, error = %e, "could not acquire session, answering with apology");
                parley_prometheus::record_turn_failure("lock");
                return self.apology();
            }
        };

        let mut loaded = match self.gateway.load_or_create(&guard, owner).await {
            Ok(session) => session,
            Err(e) => {
                warn!(session_id, owner = %owner, error = %e, "session refused, answering with apology");
                parley_prometheus::record_turn_failure("session");
                return self.apology();
            }
        };
        if let Some(number) = inbound.phone_number.clone() {
            loaded.phone_number = Some(number);
        }

        let deadline = tokio::time::Instant::now() + self.turn_timeout();
        let mut working = loaded.clone();

        let user_message =
            match tokio::time::timeout_at(deadline, self.input.normalize(&inbound.content)).await {
                Ok(Ok(message)) => Ok(message),
                Ok(Err(e)) => Err(("input", e)),
                Err(_) => Err(("timeout", timeout_error(&self.config))),
            };

        let result = match user_message {
            Ok(message) => {
                let turn = self.run_turn(&mut working, owner, message.clone());
                match tokio::time::timeout_at(deadline, turn).await {
                    Ok(Ok(outcome)) => Ok(outcome),
                    Ok(Err(e)) => Err((message, "error", e)),
                    Err(_) => Err((message, "timeout", timeout_error(&self.config))),
                }
            }
            Err((reason, e)) => Err((placeholder(&inbound.content), reason, e)),
        };

        let outcome = match result {
            Ok((outcome, modality)) => match self.gateway.save(&guard, &working).await {
                Ok(()) => {
                    parley_prometheus::record_turn(&modality);
                    info!(session_id, modality = %modality, messages = working.messages.len(), "turn complete");
                    outcome
                }
                Err(e) => {
                    error!(session_id, error = %e, "failed to save session after turn");
                    parley_prometheus::record_turn_failure("storage");
                    self.apology()
                }
            },
            Err((user_message, reason, e)) => {
                warn!(session_id, reason, error = %e, "turn failed, answering with apology");
                parley_prometheus::record_turn_failure(reason);
                self.recover(&guard, loaded, &working, user_message).await
            }
        };

        parley_prometheus::record_turn_latency(started.elapsed().as_secs_f64());
        outcome
    }

    async fn run_turn(
        &self,
        session: &mut SessionState,
        owner: &OwnerId,
        user_message: Message,
    ) -> Result<(TurnOutcome, String), ParleyError> {
        session.append(user_message.clone());

        let (extracted, decision) = {
            let window = session.tail(self.router.window());
            tokio::join!(
                self.memory.extract_outcome(&user_message, owner),
                self.router.classify(window),
            )
        };
        match extracted {
            Ok(outcome) => {
                if let Some(label) = outcome.label() {
                    parley_prometheus::record_memory_write(label);
                }
            }
            Err(e) => warn!(session_id = %session.session_id, error = %e, "memory extraction failed, continuing"),
        }

        let activity = self.activity.current_activity();
        let bundle = self.assembler.build(session, &activity, owner).await;

        let modality = decision.modality().to_string();
        debug!(session_id = %session.session_id, modality = %modality, "routing decision");
        let outcome = self
            .dispatcher
            .dispatch(Turn {
                session,
                bundle,
                decision,
            })
            .await?;
        Ok((outcome, modality))
    }

    /// Persist the user message and the apology on the state as loaded.
    ///
    /// Call placement outlives the failed turn: a call it placed stays
    /// pending, a number it learned is kept, and a correlation it registered
    /// without finishing the dial is dropped.
    async fn recover(
        &self,
        guard: &SessionGuard,
        mut session: SessionState,
        working: &SessionState,
        user_message: Message,
    ) -> TurnOutcome {
        if working.pending_call.is_some() && working.pending_call != session.pending_call {
            session.pending_call = working.pending_call.clone();
        }
        if session.phone_number.is_none() {
            session.phone_number = working.phone_number.clone();
        }
        let dropped = self
            .registry
            .take_unplaced(&session.session_id, session.pending_call.as_deref());
        for correlation in &dropped {
            warn!(
                call_id = %correlation.call_id,
                session_id = %session.session_id,
                from = %correlation.state,
                to = %CallState::Failed,
                "call placement cut off by failed turn"
            );
        }
        if !dropped.is_empty() {
            parley_prometheus::set_active_calls(self.registry.len());
        }

        let apology = Message::assistant(self.config.agent.fallback_message.as_str());
        session.append(user_message);
        session.append(apology.clone());
        if let Err(e) = self.gateway.save(guard, &session).await {
            error!(session_id = %session.session_id, error = %e, "failed to save session after apology");
        }
        TurnOutcome::Reply(OutboundReply {
            message: apology,
            media: None,
        })
    }

    fn apology(&self) -> TurnOutcome {
        TurnOutcome::Reply(OutboundReply {
            message: Message::assistant(self.config.agent.fallback_message.as_str()),
            media: None,
        })
    }

    /// Acknowledge a telephony webhook and resolve it in the background.
    pub fn handle_call_webhook(self: &Arc<Self>, raw: &[u8]) -> WebhookAck {
        let event = match parse_call_event(raw) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "rejected call webhook");
                return WebhookAck::error();
            }
        };

        parley_prometheus::record_call_event(event.kind.label());
        let ack = WebhookAck::received(event.event_type.as_str());
        let engine = Arc::clone(self);
        self.tasks.spawn(async move {
            engine.process_call_event(event).await;
        });
        ack
    }

    /// Wait until every spawned call resolution has finished.
    ///
    /// Only observes the tracker; closing it stays with [`drain`](Self::drain).
    pub async fn wait_for_call_tasks(&self) {
        while !self.tasks.is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Apply one webhook event to the correlation registry and its session.
    pub async fn process_call_event(&self, event: CallEvent) {
        if event.call.is_empty() {
            debug!(event_type = %event.event_type, "call event without a call reference");
            return;
        }

        if !event.kind.is_resolution() {
            let found = self.registry.resolve(&event.call);
            match (found, event.kind.progress_state()) {
                (Some(correlation), Some(state)) => {
                    if let Err(e) = self.registry.transition(&correlation.call_id, state) {
                        debug!(call_id = %correlation.call_id, error = %e, "ignored call progress event");
                    }
                }
                _ => debug!(event_type = %event.event_type, "call event has no lifecycle effect"),
            }
            return;
        }

        let correlation = match self.registry.resolve(&event.call) {
            Some(found) => found,
            None => {
                warn!(
                    event_type = %event.event_type,
                    call_id = ?event.call.call_id,
                    provider_call_id = ?event.call.provider_call_id,
                    "call correlation miss, retrying once"
                );
                tokio::time::sleep(Duration::from_millis(self.config.voice.webhook_retry_delay_ms))
                    .await;
                match self.registry.resolve(&event.call) {
                    Some(found) => found,
                    None => {
                        warn!(event_type = %event.event_type, "dropping call event with unknown correlation");
                        return;
                    }
                }
            }
        };

        if let Err(e) = self.resolve_call(&correlation, &event.kind).await {
            error!(call_id = %correlation.call_id, error = %e, "failed to resolve call");
        }
    }

    async fn resolve_call(
        &self,
        correlation: &CallCorrelation,
        kind: &CallEventKind,
    ) -> Result<(), ParleyError> {
        let (state, text) = match kind {
            CallEventKind::Ended {
                summary,
                transcript,
                reason,
            } => (
                CallState::Ended,
                ended_text(
                    &self
                        .call_summary(summary.as_deref(), transcript.as_deref(), reason.as_deref())
                        .await,
                ),
            ),
            CallEventKind::Failed { reason } => (CallState::Failed, failed_text(reason)),
            _ => return Ok(()),
        };

        let call_id = correlation.call_id.as_str();
        // Until the session write lands, the correlation stays registered.
        let guard = self.lock_for_resolution(&correlation.session_id).await?;

        // Claiming under the session lock makes repeated events no-ops.
        let Some(claimed) = self.registry.remove(call_id) else {
            debug!(call_id, "call already resolved");
            return Ok(());
        };
        if claimed.state != state && !claimed.state.can_transition_to(state) {
            warn!(call_id, from = %claimed.state, to = %state, "out-of-order call resolution, applying anyway");
        }

        let mut session = match self.gateway.load(&guard).await {
            Ok(Some(session)) => session,
            Ok(None) => {
                warn!(call_id, session_id = %correlation.session_id, "call resolved for a missing session");
                parley_prometheus::set_active_calls(self.registry.len());
                return Ok(());
            }
            Err(e) => return Err(self.unclaim(claimed, e)),
        };

        session.append(Message::assistant(text));
        if session.pending_call.as_deref() == Some(call_id) {
            session.pending_call = None;
        }
        if let Err(e) = self.gateway.save(&guard, &session).await {
            return Err(self.unclaim(claimed, e));
        }

        parley_prometheus::set_active_calls(self.registry.len());
        info!(call_id, session_id = %session.session_id, outcome = %state, "call resolved");
        Ok(())
    }

    /// The session lock for a call resolution.
    ///
    /// Waits out a whole turn plus a normal lock wait, then retries once.
    async fn lock_for_resolution(&self, session_id: &str) -> Result<SessionGuard, ParleyError> {
        let wait = self.turn_timeout() + self.lock_timeout();
        match self.gateway.lock(session_id, wait).await {
            Ok(guard) => Ok(guard),
            Err(e) => {
                warn!(session_id, error = %e, "session busy during call resolution, retrying once");
                tokio::time::sleep(Duration::from_millis(self.config.voice.webhook_retry_delay_ms))
                    .await;
                self.gateway.lock(session_id, wait).await
            }
        }
    }

    /// Put back a claimed correlation whose session write failed.
    fn unclaim(&self, claimed: CallCorrelation, error: ParleyError) -> ParleyError {
        let call_id = claimed.call_id.clone();
        if let Err(e) = self.registry.register(claimed) {
            warn!(call_id = %call_id, error = %e, "could not restore call correlation");
        }
        error
    }

    /// The summary text for an ended call.
    async fn call_summary(
        &self,
        summary: Option<&str>,
        transcript: Option<&str>,
        reason: Option<&str>,
    ) -> String {
        if let Some(summary) = summary {
            return summary.to_string();
        }
        let Some(transcript) = transcript else {
            return format!("The call ended ({})", reason.unwrap_or("no reason given"));
        };

        let request = CompletionRequest::new(CompletionTask::CallSummary)
            .with_system(CALL_SUMMARY_PROMPT)
            .with_user(transcript)
            .with_temperature(0.3);
        match self.completion.complete(request).await {
            Ok(response) if !response.content.trim().is_empty() => {
                response.content.trim().to_string()
            }
            Ok(_) => truncate_transcript(transcript),
            Err(e) => {
                warn!(error = %e, "call summary failed, using the transcript");
                truncate_transcript(transcript)
            }
        }
    }

    /// Answer one caller utterance during a live call.
    ///
    /// Memory is scoped to the owner of the correlated session; an unknown
    /// call is answered without it. Never fails: an error or an exceeded
    /// turn budget yields a short spoken apology. The session log is not
    /// touched; the call reaches it as a summary when it ends.
    pub async fn handle_call_chat(&self, request: &CallChatRequest) -> String {
        let started = Instant::now();
        let reply = match tokio::time::timeout(self.turn_timeout(), self.call_reply(request)).await {
            Ok(Ok(reply)) => {
                parley_prometheus::record_turn("call");
                reply
            }
            Ok(Err(e)) => {
                warn!(call_id = ?request.call.call_id, error = %e, "in-call reply failed, answering with apology");
                parley_prometheus::record_turn_failure("call");
                CALL_CHAT_FALLBACK.to_string()
            }
            Err(_) => {
                warn!(call_id = ?request.call.call_id, "in-call reply timed out, answering with apology");
                parley_prometheus::record_turn_failure("timeout");
                CALL_CHAT_FALLBACK.to_string()
            }
        };
        parley_prometheus::record_turn_latency(started.elapsed().as_secs_f64());
        reply
    }

    async fn call_reply(&self, request: &CallChatRequest) -> Result<String, ParleyError> {
        let utterance = request.utterance().ok_or_else(|| {
            ParleyError::Validation("in-call completion without an utterance".to_string())
        })?;
        let window = request.window();

        let facts = match self.registry.resolve(&request.call) {
            Some(correlation) => {
                if let Err(e) = self.registry.transition(&correlation.call_id, CallState::Active) {
                    debug!(call_id = %correlation.call_id, error = %e, "in-call completion for a call not in progress");
                }
                let config = self.memory.config();
                let start = window.len().saturating_sub(config.context_messages);
                let query = window[start..]
                    .iter()
                    .map(|m| m.content.as_str())
                    .collect::<Vec<_>>()
                    .join(" ");
                let (extracted, facts) = tokio::join!(
                    self.memory.extract_outcome(utterance, &correlation.owner_id),
                    self.memory.retrieve(&query, &correlation.owner_id, config.top_k),
                );
                match extracted {
                    Ok(outcome) => {
                        if let Some(label) = outcome.label() {
                            parley_prometheus::record_memory_write(label);
                        }
                    }
                    Err(e) => warn!(call_id = %correlation.call_id, error = %e, "memory extraction failed, continuing"),
                }
                facts
            }
            None => {
                debug!(call = ?request.call, "in-call completion for an unknown call, answering without memory");
                Vec::new()
            }
        };

        let bundle = ContextBundle {
            persona: request
                .system
                .clone()
                .unwrap_or_else(|| self.persona().prompt().to_string()),
            current_activity: self.activity.current_activity(),
            facts,
            summary: None,
            recent: window.to_vec(),
            call_variables: None,
        };
        self.replies.reply(&bundle, Some(CALL_CHAT_NOTE)).await
    }

    /// Drop correlations that never resolved. Returns how many were removed.
    pub async fn sweep_expired_calls(&self) -> usize {
        let ttl = i64::try_from(self.config.voice.correlation_ttl_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX);
        let expired = self.registry.take_expired(ttl, Utc::now());

        for correlation in &expired {
            warn!(
                call_id = %correlation.call_id,
                session_id = %correlation.session_id,
                state = %correlation.state,
                "abandoned call correlation"
            );
            if let Err(e) = self.clear_pending_call(correlation).await {
                warn!(call_id = %correlation.call_id, error = %e, "failed to clear pending call");
            }
        }

        parley_prometheus::set_active_calls(self.registry.len());
        self.gateway.prune_idle_locks();
        expired.len()
    }

    async fn clear_pending_call(&self, correlation: &CallCorrelation) -> Result<(), ParleyError> {
        let guard = self
            .gateway
            .lock(&correlation.session_id, self.lock_timeout())
            .await?;
        if let Some(mut session) = self.gateway.load(&guard).await?
            && session.pending_call.as_deref() == Some(correlation.call_id.as_str())
        {
            session.pending_call = None;
            self.gateway.save(&guard, &session).await?;
        }
        Ok(())
    }

    /// Run the correlation sweep until `cancel` fires.
    pub async fn run_sweeper(self: Arc<Self>, cancel: CancellationToken) {
        let period = Duration::from_secs(self.config.voice.sweep_interval_secs.max(1));
        let mut interval = tokio::time::interval(period);
        interval.tick().await;
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let removed = self.sweep_expired_calls().await;
                    if removed > 0 {
                        debug!(removed, "correlation sweep finished");
                    }
                }
                _ = cancel.cancelled() => {
                    debug!("correlation sweep stopped");
                    break;
                }
            }
        }
    }

    /// Let pending call resolutions finish, waiting at most `timeout`.
    pub async fn drain(&self, timeout: Duration) {
        shutdown::drain_tasks(&self.tasks, timeout).await;
    }
}

fn timeout_error(config: &ParleyConfig) -> ParleyError {
    ParleyError::Timeout {
        duration: Duration::from_secs(config.agent.turn_timeout_secs),
    }
}

#[cfg(test)]
mod tests {
    use parley_core::types::{MessageContent, Modality, Role};
    use parley_test_utils::{
        InMemorySessionStore, InMemoryVectorStore, MockCompletion, MockEmbedder, MockImage,
        MockSpeech, MockTelephony,
    };
    use parley_voice::parse_call_chat;
    use serde_json::json;

    use super::*;

    struct Reading;

    impl ActivityLookup for Reading {
        fn current_activity(&self) -> String {
            "reading a novel".to_string()
        }
    }

    struct Fixture {
        engine: Arc<Engine>,
        completion: MockCompletion,
        telephony: MockTelephony,
        sessions: Arc<InMemorySessionStore>,
    }

    fn fixture_with(completion: MockCompletion, config: ParleyConfig) -> Fixture {
        let telephony = MockTelephony::new();
        let sessions = Arc::new(InMemorySessionStore::new());
        let speech = MockSpeech::new().with_transcript("I got the job");
        let image = MockImage::new();
        let components = EngineComponents {
            completion: Arc::new(completion.clone()),
            embedder: Arc::new(MockEmbedder::new()),
            vectors: Arc::new(InMemoryVectorStore::new()),
            sessions: Arc::clone(&sessions) as Arc<dyn SessionStore>,
            tts: Arc::new(speech.clone()),
            stt: Arc::new(speech),
            images: Arc::new(image.clone()),
            vision: Arc::new(image),
            telephony: Arc::new(telephony.clone()),
            activity: Arc::new(Reading),
        };
        let engine = Engine::with_persona(config, components, Persona::new("Ava", "You are Ava."));
        Fixture {
            engine: Arc::new(engine),
            completion,
            telephony,
            sessions,
        }
    }

    fn fixture(completion: MockCompletion) -> Fixture {
        fixture_with(completion, ParleyConfig::default())
    }

    fn owner(id: &str) -> OwnerId {
        OwnerId::new(id).unwrap()
    }

    const VOICE_CALL: &str = r#"{"response_type": "voice_call", "reason": "User asked for a call"}"#;

    async fn place_call(f: &Fixture) -> String {
        f.completion
            .push_response(CompletionTask::Classification, VOICE_CALL);
        let outcome = f
            .engine
            .handle_inbound_message("s1", &owner("u1"), InboundMessage::text("call me at +14155550123"))
            .await;
        match outcome {
            TurnOutcome::CallInitiated { call_id, .. } => call_id,
            other => panic!("expected a call, got {other:?}"),
        }
    }

    fn webhook(value: serde_json::Value) -> Vec<u8> {
        value.to_string().into_bytes()
    }

    fn end_of_call(call_id: &str, summary: &str) -> Vec<u8> {
        webhook(json!({"message": {
            "type": "end-of-call-report",
            "endedReason": "customer-ended-call",
            "summary": summary,
            "call": {"id": MockTelephony::provider_id_for(call_id), "metadata": {"call_id": call_id}}
        }}))
    }

    fn summaries(session: &SessionState) -> usize {
        session
            .messages
            .iter()
            .filter(|m| m.content.starts_with("Call summary:"))
            .count()
    }

    #[tokio::test]
    async fn text_turn_appends_and_saves() {
        let f = fixture(MockCompletion::new().with_response(CompletionTask::Response, "Hi! *waves*"));
        let outcome = f
            .engine
            .handle_inbound_message("s1", &owner("u1"), InboundMessage::text("hello"))
            .await;

        assert_eq!(outcome.text(), "Hi!");
        let session = f.engine.snapshot("s1").await.unwrap().unwrap();
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[0].content, "hello");
        assert_eq!(session.messages[1].role, Role::Assistant);
        assert_eq!(f.sessions.save_count(), 1);

        // Extraction and classification both saw the turn.
        assert_eq!(f.completion.call_count(CompletionTask::MemoryAnalysis), 1);
        assert_eq!(f.completion.call_count(CompletionTask::Classification), 1);

        let system = f.completion.requests_for(CompletionTask::Response)[0]
            .system
            .clone()
            .unwrap();
        assert!(system.contains("reading a novel"));
    }

    #[tokio::test]
    async fn messages_keep_receipt_order() {
        let f = fixture(MockCompletion::new());
        for text in ["one", "two", "three"] {
            f.engine
                .handle_inbound_message("s1", &owner("u1"), InboundMessage::text(text))
                .await;
        }
        let session = f.engine.snapshot("s1").await.unwrap().unwrap();
        let users: Vec<&str> = session
            .messages
            .iter()
            .filter(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(users, vec!["one", "two", "three"]);
        assert_eq!(session.messages.len(), 6);
    }

    #[tokio::test]
    async fn other_owner_gets_apology_and_state_is_untouched() {
        let f = fixture(MockCompletion::new());
        f.engine
            .handle_inbound_message("s1", &owner("u1"), InboundMessage::text("hi"))
            .await;
        let outcome = f
            .engine
            .handle_inbound_message("s1", &owner("u2"), InboundMessage::text("intruder"))
            .await;

        assert_eq!(outcome.text(), f.engine.config().agent.fallback_message);
        let session = f.engine.snapshot("s1").await.unwrap().unwrap();
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.owner_id, owner("u1"));
    }

    #[tokio::test(start_paused = true)]
    async fn turn_timeout_records_user_message_and_apology() {
        let f = fixture(MockCompletion::new().with_delay(Duration::from_secs(120)));
        let outcome = f
            .engine
            .handle_inbound_message("s1", &owner("u1"), InboundMessage::text("are you there?"))
            .await;

        assert_eq!(outcome.text(), f.engine.config().agent.fallback_message);
        let session = f.engine.snapshot("s1").await.unwrap().unwrap();
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[0].content, "are you there?");
        assert_eq!(session.messages[1].content, f.engine.config().agent.fallback_message);
        assert_eq!(session.summarized_count, 0);
    }

    #[tokio::test]
    async fn provider_failure_yields_apology() {
        let f = fixture(
            MockCompletion::new().with_error(CompletionTask::Response, ParleyError::provider("boom")),
        );
        let outcome = f
            .engine
            .handle_inbound_message("s1", &owner("u1"), InboundMessage::text("hello"))
            .await;
        assert_eq!(outcome.text(), f.engine.config().agent.fallback_message);
        assert!(!outcome.text().contains("boom"));
        let session = f.engine.snapshot("s1").await.unwrap().unwrap();
        assert_eq!(session.messages.len(), 2);
    }

    #[tokio::test]
    async fn memory_failure_still_answers() {
        let f = fixture(
            MockCompletion::new()
                .with_error(CompletionTask::MemoryAnalysis, ParleyError::provider("down"))
                .with_response(CompletionTask::Response, "Still here for you."),
        );
        let outcome = f
            .engine
            .handle_inbound_message("s1", &owner("u1"), InboundMessage::text("rough day"))
            .await;

        assert_eq!(outcome.text(), "Still here for you.");
        let session = f.engine.snapshot("s1").await.unwrap().unwrap();
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[1].content, "Still here for you.");
    }

    #[tokio::test]
    async fn concurrent_turns_on_one_session_stay_ordered() {
        let f = fixture(MockCompletion::new());
        let u1 = owner("u1");
        let (first, second) = tokio::join!(
            f.engine
                .handle_inbound_message("s1", &u1, InboundMessage::text("first")),
            f.engine
                .handle_inbound_message("s1", &u1, InboundMessage::text("second")),
        );
        let fallback = f.engine.config().agent.fallback_message.as_str();
        assert_ne!(first.text(), fallback);
        assert_ne!(second.text(), fallback);

        let session = f.engine.snapshot("s1").await.unwrap().unwrap();
        let roles: Vec<Role> = session.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User, Role::Assistant]);
        assert_eq!(session.messages[0].content, "first");
        assert_eq!(session.messages[2].content, "second");
    }

    #[tokio::test]
    async fn voice_note_is_transcribed_before_routing() {
        let f = fixture(MockCompletion::new());
        let inbound = InboundMessage {
            content: MessageContent::Audio {
                data: vec![1, 2],
                mime_type: "audio/ogg".into(),
            },
            phone_number: None,
        };
        f.engine.handle_inbound_message("s1", &owner("u1"), inbound).await;

        let session = f.engine.snapshot("s1").await.unwrap().unwrap();
        assert_eq!(session.messages[0].content, "I got the job");
        assert_eq!(session.messages[0].modality, Modality::Audio);
        let analysis = &f.completion.requests_for(CompletionTask::MemoryAnalysis)[0];
        assert!(analysis.transcript().contains("I got the job"));
    }

    #[tokio::test]
    async fn call_without_number_asks_for_one() {
        let f = fixture(MockCompletion::new().with_response(CompletionTask::Classification, VOICE_CALL));
        let outcome = f
            .engine
            .handle_inbound_message("s1", &owner("u1"), InboundMessage::text("call me"))
            .await;

        assert!(matches!(outcome, TurnOutcome::Reply(_)));
        assert!(outcome.text().contains("What number"));
        assert!(f.engine.registry().is_empty());
        assert!(f.telephony.calls().is_empty());
    }

    #[tokio::test]
    async fn channel_number_is_used_for_calls() {
        let f = fixture(MockCompletion::new().with_response(CompletionTask::Classification, VOICE_CALL));
        let inbound = InboundMessage::text("can you ring me?").with_phone_number("+15550001111");
        let outcome = f.engine.handle_inbound_message("s1", &owner("u1"), inbound).await;

        assert!(matches!(outcome, TurnOutcome::CallInitiated { .. }));
        assert_eq!(f.telephony.calls()[0].destination, "+15550001111");
    }

    #[tokio::test(start_paused = true)]
    async fn hung_dial_fails_the_call_not_the_turn() {
        let f = fixture(MockCompletion::new());
        f.telephony.clone().with_dial_delay(Duration::from_secs(120));
        f.completion
            .push_response(CompletionTask::Classification, VOICE_CALL);

        let outcome = f
            .engine
            .handle_inbound_message("s1", &owner("u1"), InboundMessage::text("call me at +14155550123"))
            .await;

        assert!(matches!(outcome, TurnOutcome::Reply(_)));
        assert!(outcome.text().contains("couldn't be placed"), "got {:?}", outcome.text());
        assert!(f.engine.registry().is_empty());
        let session = f.engine.snapshot("s1").await.unwrap().unwrap();
        assert_eq!(session.phone_number.as_deref(), Some("+14155550123"));
        assert_eq!(session.pending_call, None);
        assert_eq!(session.messages.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn turn_timeout_mid_dial_drops_the_unplaced_call() {
        let mut config = ParleyConfig::default();
        config.agent.turn_timeout_secs = 10;
        config.voice.placement_timeout_secs = 30;
        let f = fixture_with(MockCompletion::new(), config);
        f.telephony.clone().with_dial_delay(Duration::from_secs(120));
        f.completion
            .push_response(CompletionTask::Classification, VOICE_CALL);

        let outcome = f
            .engine
            .handle_inbound_message("s1", &owner("u1"), InboundMessage::text("call me at +14155550123"))
            .await;

        assert_eq!(outcome.text(), f.engine.config().agent.fallback_message);
        assert_eq!(f.telephony.calls().len(), 1);
        assert!(f.engine.registry().is_empty());
        let session = f.engine.snapshot("s1").await.unwrap().unwrap();
        assert_eq!(session.phone_number.as_deref(), Some("+14155550123"));
        assert_eq!(session.pending_call, None);
        assert_eq!(session.messages.len(), 2);
    }

    #[tokio::test]
    async fn ended_call_is_reconciled_into_session() {
        let f = fixture(MockCompletion::new());
        let call_id = place_call(&f).await;

        let correlation = f.engine.registry().get(&call_id).unwrap();
        assert_eq!(correlation.session_id, "s1");
        let before = f.engine.snapshot("s1").await.unwrap().unwrap();
        assert_eq!(before.pending_call.as_deref(), Some(call_id.as_str()));
        assert_eq!(before.messages.len(), 2);

        let ack = f.engine.handle_call_webhook(&webhook(json!({"message": {
            "type": "end-of-call-report",
            "endedReason": "customer-ended-call",
            "summary": "We talked about the new job.",
            "call": {"id": MockTelephony::provider_id_for(&call_id), "metadata": {"call_id": call_id}}
        }})));
        assert_eq!(ack, WebhookAck::received("end-of-call-report"));
        f.engine.wait_for_call_tasks().await;

        assert!(f.engine.registry().get(&call_id).is_none());
        let after = f.engine.snapshot("s1").await.unwrap().unwrap();
        assert_eq!(after.messages.len(), 3);
        assert_eq!(after.messages[2].content, "Call summary: We talked about the new job.");
        assert_eq!(after.pending_call, None);
    }

    #[tokio::test]
    async fn provider_id_alone_resolves_the_call() {
        let f = fixture(MockCompletion::new());
        let call_id = place_call(&f).await;

        f.engine
            .process_call_event(
                parse_call_event(&webhook(json!({"message": {
                    "type": "call-failed",
                    "error": "customer-busy",
                    "call": {"id": MockTelephony::provider_id_for(&call_id)}
                }})))
                .unwrap(),
            )
            .await;

        let after = f.engine.snapshot("s1").await.unwrap().unwrap();
        assert_eq!(
            after.messages.last().unwrap().content,
            "I couldn't reach you by phone (customer-busy). We can keep chatting here."
        );
        assert!(f.engine.registry().is_empty());
    }

    #[tokio::test]
    async fn transcript_only_is_summarized() {
        let f = fixture(
            MockCompletion::new().with_response(CompletionTask::CallSummary, "They planned a trip."),
        );
        let call_id = place_call(&f).await;

        f.engine
            .process_call_event(
                parse_call_event(&webhook(json!({"message": {
                    "type": "call-ended",
                    "transcript": "AI: hi\nUser: let's plan the trip",
                    "call": {"metadata": {"call_id": call_id}}
                }})))
                .unwrap(),
            )
            .await;

        let after = f.engine.snapshot("s1").await.unwrap().unwrap();
        assert_eq!(after.messages.last().unwrap().content, "Call summary: They planned a trip.");
        let req = &f.completion.requests_for(CompletionTask::CallSummary)[0];
        assert!(req.transcript().contains("plan the trip"));
    }

    #[tokio::test]
    async fn summary_failure_falls_back_to_transcript() {
        let f = fixture(
            MockCompletion::new()
                .with_error(CompletionTask::CallSummary, ParleyError::provider("down")),
        );
        let call_id = place_call(&f).await;
        f.engine
            .process_call_event(
                parse_call_event(&webhook(json!({"message": {
                    "type": "call-ended",
                    "transcript": "User: bye",
                    "call": {"metadata": {"call_id": call_id}}
                }})))
                .unwrap(),
            )
            .await;
        let after = f.engine.snapshot("s1").await.unwrap().unwrap();
        assert_eq!(after.messages.last().unwrap().content, "Call summary: User: bye");
    }

    #[tokio::test]
    async fn duplicate_resolution_appends_once() {
        let f = fixture(MockCompletion::new());
        let call_id = place_call(&f).await;
        let ended = json!({"message": {
            "type": "end-of-call-report",
            "summary": "Done.",
            "call": {"metadata": {"call_id": call_id}}
        }});

        f.engine.handle_call_webhook(&webhook(ended.clone()));
        f.engine.handle_call_webhook(&webhook(ended));
        f.engine.wait_for_call_tasks().await;

        let after = f.engine.snapshot("s1").await.unwrap().unwrap();
        let summaries = after
            .messages
            .iter()
            .filter(|m| m.content.starts_with("Call summary:"))
            .count();
        assert_eq!(summaries, 1);
    }

    #[tokio::test]
    async fn duplicate_events_queued_behind_a_turn_append_once() {
        let f = fixture(MockCompletion::new());
        let call_id = place_call(&f).await;

        let guard = f.engine.sessions().lock("s1", Duration::from_secs(5)).await.unwrap();
        f.engine.handle_call_webhook(&end_of_call(&call_id, "Done."));
        f.engine.handle_call_webhook(&end_of_call(&call_id, "Done."));
        // Both resolutions park on the session lock.
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(guard);
        f.engine.wait_for_call_tasks().await;

        let after = f.engine.snapshot("s1").await.unwrap().unwrap();
        assert_eq!(summaries(&after), 1);
        assert_eq!(after.messages.len(), 3);
        assert_eq!(after.pending_call, None);
        assert!(f.engine.registry().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn resolution_waits_out_a_slow_turn() {
        let f = fixture(MockCompletion::new());
        let call_id = place_call(&f).await;
        f.completion.clone().with_delay(Duration::from_secs(45));

        let engine = Arc::clone(&f.engine);
        let turn = tokio::spawn(async move {
            engine
                .handle_inbound_message("s1", &owner("u1"), InboundMessage::text("still there?"))
                .await
        });
        tokio::time::sleep(Duration::from_secs(1)).await;
        f.engine
            .handle_call_webhook(&end_of_call(&call_id, "We talked about the weekend."));
        f.engine.wait_for_call_tasks().await;

        let outcome = turn.await.unwrap();
        assert_eq!(outcome.text(), f.engine.config().agent.fallback_message);
        assert!(f.engine.registry().get(&call_id).is_none());
        let after = f.engine.snapshot("s1").await.unwrap().unwrap();
        assert_eq!(summaries(&after), 1);
        assert_eq!(
            after.messages.last().unwrap().content,
            "Call summary: We talked about the weekend."
        );
        assert_eq!(after.pending_call, None);
    }

    #[tokio::test(start_paused = true)]
    #[tracing_test::traced_test]
    async fn unreachable_session_keeps_the_call_for_redelivery() {
        let f = fixture(MockCompletion::new());
        let call_id = place_call(&f).await;

        let ended = parse_call_event(&end_of_call(&call_id, "Done.")).unwrap();

        let guard = f.engine.sessions().lock("s1", Duration::from_secs(5)).await.unwrap();
        f.engine.process_call_event(ended.clone()).await;
        assert!(logs_contain("session busy during call resolution, retrying once"));
        assert!(logs_contain("failed to resolve call"));
        assert!(f.engine.registry().get(&call_id).is_some());
        drop(guard);

        f.engine.process_call_event(ended).await;
        let after = f.engine.snapshot("s1").await.unwrap().unwrap();
        assert_eq!(summaries(&after), 1);
        assert!(f.engine.registry().is_empty());
    }

    #[tokio::test]
    async fn progress_events_move_the_state() {
        let f = fixture(MockCompletion::new());
        let call_id = place_call(&f).await;
        let status = |s: &str| {
            webhook(json!({"message": {
                "type": "status-update",
                "status": s,
                "call": {"metadata": {"call_id": call_id}}
            }}))
        };

        f.engine.process_call_event(parse_call_event(&status("ringing")).unwrap()).await;
        assert_eq!(f.engine.registry().get(&call_id).unwrap().state, CallState::Dialing);
        f.engine.process_call_event(parse_call_event(&status("in-progress")).unwrap()).await;
        assert_eq!(f.engine.registry().get(&call_id).unwrap().state, CallState::Active);
        f.engine.process_call_event(parse_call_event(&status("ended")).unwrap()).await;
        assert_eq!(f.engine.registry().get(&call_id).unwrap().state, CallState::Active);

        let session = f.engine.snapshot("s1").await.unwrap().unwrap();
        assert_eq!(session.messages.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    #[tracing_test::traced_test]
    async fn unknown_call_is_dropped_after_one_retry() {
        let f = fixture(MockCompletion::new());
        f.engine.handle_inbound_message("s1", &owner("u1"), InboundMessage::text("hi")).await;

        f.engine
            .process_call_event(
                parse_call_event(&webhook(json!({"message": {
                    "type": "end-of-call-report",
                    "summary": "nobody",
                    "call": {"id": "unknown-provider-id"}
                }})))
                .unwrap(),
            )
            .await;

        assert!(logs_contain("call correlation miss, retrying once"));
        assert!(logs_contain("dropping call event with unknown correlation"));
        let session = f.engine.snapshot("s1").await.unwrap().unwrap();
        assert_eq!(session.messages.len(), 2);
    }

    #[tokio::test]
    async fn waiting_for_call_tasks_never_reopens_a_drained_tracker() {
        let f = fixture(MockCompletion::new());
        let call_id = place_call(&f).await;
        f.engine.handle_call_webhook(&end_of_call(&call_id, "Done."));
        f.engine.wait_for_call_tasks().await;
        assert!(!f.engine.tasks.is_closed());

        f.engine.drain(Duration::from_secs(1)).await;
        f.engine.wait_for_call_tasks().await;
        assert!(f.engine.tasks.is_closed());
    }

    const BLUE_FACT: &str = "User's favorite color is blue";

    fn remembering_completion() -> MockCompletion {
        MockCompletion::new()
            .with_responder(CompletionTask::MemoryAnalysis, |req| {
                if req.transcript().contains("favorite color is blue") {
                    Ok(json!({"is_important": true, "formatted_memory": BLUE_FACT}).to_string())
                } else {
                    Ok(r#"{"is_important": false, "formatted_memory": null}"#.to_string())
                }
            })
            .with_responder(CompletionTask::Response, |req| {
                if req.system.as_deref().unwrap_or_default().contains(BLUE_FACT) {
                    Ok("It's blue!".to_string())
                } else {
                    Ok("I'm not sure.".to_string())
                }
            })
    }

    fn call_chat(call_id: Option<&str>, utterance: &str) -> CallChatRequest {
        let mut body = json!({
            "model": "gpt-4o-mini",
            "messages": [
                {"role": "system", "content": "You are Ava, on the phone with Sam."},
                {"role": "assistant", "content": "Hi Sam!"},
                {"role": "user", "content": utterance}
            ]
        });
        if let Some(call_id) = call_id {
            body["call"] = json!({"metadata": {"call_id": call_id}});
        }
        parse_call_chat(body.to_string().as_bytes()).unwrap()
    }

    #[tokio::test]
    async fn call_chat_answers_from_the_owner_memory() {
        let f = fixture(remembering_completion());
        f.engine
            .handle_inbound_message("s1", &owner("u1"), InboundMessage::text("My favorite color is blue"))
            .await;
        let call_id = place_call(&f).await;
        let before = f.engine.snapshot("s1").await.unwrap().unwrap();

        let reply = f
            .engine
            .handle_call_chat(&call_chat(Some(&call_id), "what's my favorite color?"))
            .await;

        assert_eq!(reply, "It's blue!");
        assert_eq!(f.engine.registry().get(&call_id).unwrap().state, CallState::Active);
        let request = f.completion.requests_for(CompletionTask::Response).pop().unwrap();
        let system = request.system.unwrap();
        assert!(system.starts_with("You are Ava, on the phone with Sam."));
        assert!(system.contains("live phone call"));
        assert_eq!(request.messages.last().unwrap().content, "what's my favorite color?");

        let after = f.engine.snapshot("s1").await.unwrap().unwrap();
        assert_eq!(after.messages.len(), before.messages.len());
    }

    #[tokio::test]
    async fn call_chat_for_unknown_call_skips_memory() {
        let f = fixture(remembering_completion());
        let reply = f
            .engine
            .handle_call_chat(&call_chat(None, "my favorite color is blue"))
            .await;

        assert_eq!(reply, "I'm not sure.");
        assert_eq!(f.completion.call_count(CompletionTask::MemoryAnalysis), 0);
    }

    #[tokio::test]
    async fn call_chat_failure_is_a_spoken_apology() {
        let f = fixture(
            MockCompletion::new().with_error(CompletionTask::Response, ParleyError::provider("boom")),
        );
        let reply = f.engine.handle_call_chat(&call_chat(None, "hello?")).await;
        assert_eq!(reply, CALL_CHAT_FALLBACK);
    }

    #[tokio::test]
    async fn malformed_webhook_gets_error_ack() {
        let f = fixture(MockCompletion::new());
        assert_eq!(f.engine.handle_call_webhook(b"{not json"), WebhookAck::error());
    }

    #[tokio::test]
    async fn sweep_clears_abandoned_calls() {
        let f = fixture(MockCompletion::new());
        let call_id = place_call(&f).await;
        assert_eq!(f.engine.sweep_expired_calls().await, 0);

        let mut stale = f.engine.registry().remove(&call_id).unwrap();
        stale.initiated_at = Utc::now() - TimeDelta::minutes(16);
        f.engine.registry().register(stale).unwrap();

        assert_eq!(f.engine.sweep_expired_calls().await, 1);
        assert!(f.engine.registry().is_empty());
        let session = f.engine.snapshot("s1").await.unwrap().unwrap();
        assert_eq!(session.pending_call, None);
        assert_eq!(session.messages.len(), 2);
    }

    #[tokio::test]
    async fn sweeper_stops_on_cancel() {
        let f = fixture(MockCompletion::new());
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(Arc::clone(&f.engine).run_sweeper(cancel.clone()));
        cancel.cancel();
        handle.await.unwrap();
    }
}
