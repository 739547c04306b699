// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Response dispatch keyed by modality.
//!
//! Each [`ResponseModality`] maps to one [`ModalityHandler`]. A modality
//! without a handler falls back to the text handler. Whatever the branch,
//! the dispatcher appends exactly one assistant message per turn.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use parley_context::Summarizer;
use parley_core::types::{
    AssetRef, CompletionRequest, CompletionTask, MediaPayload, Modality, OutboundReply,
    ResponseModality, Role,
};
use parley_core::{
    CompletionAdapter, ContextBundle, ImageGenerationAdapter, Message, ParleyError,
    RoutingDecision, SessionState, TextToSpeechAdapter, TurnOutcome,
};
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::bridge::VoiceBridge;

static STAGE_DIRECTION: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\*.*?\*").ok());

const REPLY_TEMPERATURE: f32 = 0.8;

const SCENE_PROMPT: &str = r#"You are about to send the person you are chatting with a picture from your day.
Based on the conversation above, decide what the picture shows.

Reply with JSON only:
{"narrative": "one sentence, in first person, about what you are showing", "image_prompt": "a detailed visual description for an image generator, no text or captions in the image"}"#;

/// The state one handler works on.
pub struct Turn<'a> {
    pub session: &'a mut SessionState,
    pub bundle: ContextBundle,
    pub decision: RoutingDecision,
}

/// What a handler produced. The dispatcher appends `message`.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatched {
    pub message: Message,
    pub media: Option<MediaPayload>,
    pub call_id: Option<String>,
}

impl Dispatched {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            message: Message::assistant(content),
            media: None,
            call_id: None,
        }
    }
}

/// One branch of the dispatch table.
#[async_trait]
pub trait ModalityHandler: Send + Sync {
    fn modality(&self) -> ResponseModality;

    async fn handle(&self, turn: &mut Turn<'_>) -> Result<Dispatched, ParleyError>;
}

pub struct Dispatcher {
    handlers: HashMap<ResponseModality, Arc<dyn ModalityHandler>>,
    summarizer: Summarizer,
}

impl Dispatcher {
    pub fn new(summarizer: Summarizer) -> Self {
        Self {
            handlers: HashMap::new(),
            summarizer,
        }
    }

    /// Add or replace the handler for its modality.
    pub fn register(&mut self, handler: Arc<dyn ModalityHandler>) {
        self.handlers.insert(handler.modality(), handler);
    }

    pub fn handles(&self, modality: ResponseModality) -> bool {
        self.handlers.contains_key(&modality)
    }

    /// Run the handler for the turn's decision, append its message, then
    /// give the summarizer a chance to run.
    pub async fn dispatch(&self, mut turn: Turn<'_>) -> Result<TurnOutcome, ParleyError> {
        let modality = turn.decision.modality();
        let handler = self
            .handlers
            .get(&modality)
            .or_else(|| {
                debug!(%modality, "no handler registered, falling back to text");
                self.handlers.get(&ResponseModality::Text)
            })
            .ok_or_else(|| ParleyError::Internal("no text handler registered".to_string()))?;

        let dispatched = handler.handle(&mut turn).await?;
        turn.session.append(dispatched.message.clone());

        if let Err(e) = self.summarizer.maybe_summarize(turn.session).await {
            warn!(session_id = %turn.session.session_id, error = %e, "summarization failed, keeping full window");
        }

        Ok(match dispatched.call_id {
            Some(call_id) => TurnOutcome::CallInitiated {
                call_id,
                message: dispatched.message,
            },
            None => TurnOutcome::Reply(OutboundReply {
                message: dispatched.message,
                media: dispatched.media,
            }),
        })
    }
}

/// Persona replies shared by the text, image, and audio branches.
pub struct ReplyGenerator {
    completion: Arc<dyn CompletionAdapter>,
}

impl ReplyGenerator {
    pub fn new(completion: Arc<dyn CompletionAdapter>) -> Self {
        Self { completion }
    }

    /// Generate the persona's next message. `note` is appended to the
    /// system prompt for this call only.
    pub async fn reply(&self, bundle: &ContextBundle, note: Option<&str>) -> Result<String, ParleyError> {
        let mut system = bundle.system_prompt();
        if let Some(note) = note {
            system.push_str("\n\n");
            system.push_str(note);
        }

        let request = CompletionRequest::new(CompletionTask::Response)
            .with_system(system)
            .with_messages(&bundle.recent)
            .with_temperature(REPLY_TEMPERATURE);
        let response = self.completion.complete(request).await?;

        let text = strip_stage_directions(&response.content);
        if text.is_empty() {
            return Err(ParleyError::provider("response model returned an empty reply"));
        }
        Ok(text)
    }
}

/// Remove `*stage directions*` from a reply.
///
/// If nothing but stage directions remains, the raw reply is kept.
pub fn strip_stage_directions(text: &str) -> String {
    let stripped = match STAGE_DIRECTION.as_ref() {
        Some(re) => re.replace_all(text, ""),
        None => text.into(),
    };
    let collapsed = stripped.split(' ').filter(|w| !w.is_empty()).collect::<Vec<_>>().join(" ");
    let collapsed = collapsed.trim();
    if collapsed.is_empty() {
        text.trim().to_string()
    } else {
        collapsed.to_string()
    }
}

pub struct TextHandler {
    replies: Arc<ReplyGenerator>,
}

impl TextHandler {
    pub fn new(replies: Arc<ReplyGenerator>) -> Self {
        Self { replies }
    }
}

#[async_trait]
impl ModalityHandler for TextHandler {
    fn modality(&self) -> ResponseModality {
        ResponseModality::Text
    }

    async fn handle(&self, turn: &mut Turn<'_>) -> Result<Dispatched, ParleyError> {
        let text = self.replies.reply(&turn.bundle, None).await?;
        Ok(Dispatched::text(text))
    }
}

/// What the generated picture shows.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Scene {
    pub narrative: String,
    pub image_prompt: String,
}

/// Parse the scene reply; both fields must be present and non-blank.
pub fn parse_scene(raw: &str) -> Option<Scene> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    let scene: Scene = serde_json::from_str(&raw[start..=end]).ok()?;
    (!scene.narrative.trim().is_empty() && !scene.image_prompt.trim().is_empty()).then_some(scene)
}

pub struct ImageHandler {
    completion: Arc<dyn CompletionAdapter>,
    images: Arc<dyn ImageGenerationAdapter>,
    replies: Arc<ReplyGenerator>,
}

impl ImageHandler {
    pub fn new(
        completion: Arc<dyn CompletionAdapter>,
        images: Arc<dyn ImageGenerationAdapter>,
        replies: Arc<ReplyGenerator>,
    ) -> Self {
        Self {
            completion,
            images,
            replies,
        }
    }

    async fn scene(&self, turn: &Turn<'_>) -> Scene {
        let request = CompletionRequest::new(CompletionTask::Scene)
            .with_system(format!("{}\n\n{SCENE_PROMPT}", turn.bundle.system_prompt()))
            .with_messages(&turn.bundle.recent)
            .with_temperature(REPLY_TEMPERATURE)
            .json();

        let parsed = match self.completion.complete(request).await {
            Ok(response) => parse_scene(&response.content),
            Err(e) => {
                warn!(error = %e, "scene generation failed, using the request as prompt");
                None
            }
        };
        parsed.unwrap_or_else(|| {
            let fallback = turn
                .session
                .last_user_message()
                .map(|m| m.content.clone())
                .unwrap_or_default();
            Scene {
                narrative: fallback.clone(),
                image_prompt: fallback,
            }
        })
    }
}

#[async_trait]
impl ModalityHandler for ImageHandler {
    fn modality(&self) -> ResponseModality {
        ResponseModality::Image
    }

    async fn handle(&self, turn: &mut Turn<'_>) -> Result<Dispatched, ParleyError> {
        let scene = self.scene(turn).await;
        let data = self.images.generate(&scene.image_prompt).await?;

        let note = format!(
            "You just sent them a picture: {}. Write the short message that goes with it.",
            scene.narrative
        );
        let caption = self.replies.reply(&turn.bundle, Some(&note)).await?;

        Ok(Dispatched {
            message: Message::new(Role::Assistant, caption, Modality::Image)
                .with_asset(AssetRef::generate("image", "png")),
            media: Some(MediaPayload {
                mime_type: "image/png".to_string(),
                data,
            }),
            call_id: None,
        })
    }
}

pub struct AudioHandler {
    tts: Arc<dyn TextToSpeechAdapter>,
    replies: Arc<ReplyGenerator>,
    voice_id: String,
}

impl AudioHandler {
    pub fn new(tts: Arc<dyn TextToSpeechAdapter>, replies: Arc<ReplyGenerator>, voice_id: String) -> Self {
        Self {
            tts,
            replies,
            voice_id,
        }
    }
}

#[async_trait]
impl ModalityHandler for AudioHandler {
    fn modality(&self) -> ResponseModality {
        ResponseModality::Audio
    }

    async fn handle(&self, turn: &mut Turn<'_>) -> Result<Dispatched, ParleyError> {
        let text = self.replies.reply(&turn.bundle, None).await?;
        let data = self.tts.synthesize(&text, &self.voice_id).await?;

        Ok(Dispatched {
            message: Message::new(Role::Assistant, text, Modality::Audio)
                .with_asset(AssetRef::generate("audio", "mp3")),
            media: Some(MediaPayload {
                mime_type: "audio/mpeg".to_string(),
                data,
            }),
            call_id: None,
        })
    }
}

pub struct VoiceCallHandler {
    bridge: Arc<VoiceBridge>,
}

impl VoiceCallHandler {
    pub fn new(bridge: Arc<VoiceBridge>) -> Self {
        Self { bridge }
    }
}

#[async_trait]
impl ModalityHandler for VoiceCallHandler {
    fn modality(&self) -> ResponseModality {
        ResponseModality::VoiceCall
    }

    async fn handle(&self, turn: &mut Turn<'_>) -> Result<Dispatched, ParleyError> {
        let reason = match &turn.decision {
            RoutingDecision::VoiceCall { reason } => reason.clone(),
            _ => parley_router::infer_call_reason(
                turn.session
                    .last_user_message()
                    .map(|m| m.content.as_str())
                    .unwrap_or_default(),
            ),
        };

        let attempt = self
            .bridge
            .initiate_call(turn.session, &mut turn.bundle, &reason)
            .await;

        let mut dispatched = Dispatched::text(attempt.message());
        dispatched.call_id = attempt.call_id().map(str::to_string);
        Ok(dispatched)
    }
}
