// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turns inbound channel payloads into the user message the pipeline sees.
//!
//! Audio is transcribed and images are described before classification and
//! memory extraction, so both run on text.

use std::sync::Arc;

use parley_core::types::{MessageContent, Modality, Role};
use parley_core::{Message, ParleyError, SpeechToTextAdapter, VisionAdapter};
use tracing::debug;

const VISION_PROMPT: &str = "Describe this image in one or two sentences, \
focusing on what a friend would comment on.";

pub struct InputNormalizer {
    stt: Arc<dyn SpeechToTextAdapter>,
    vision: Arc<dyn VisionAdapter>,
}

impl InputNormalizer {
    pub fn new(stt: Arc<dyn SpeechToTextAdapter>, vision: Arc<dyn VisionAdapter>) -> Self {
        Self { stt, vision }
    }

    /// Produce the user message for `content`.
    pub async fn normalize(&self, content: &MessageContent) -> Result<Message, ParleyError> {
        match content {
            MessageContent::Text(text) => Ok(Message::user(text.as_str())),
            MessageContent::Audio { data, mime_type } => {
                let transcript = self.stt.transcribe(data, mime_type).await?;
                debug!(chars = transcript.len(), "transcribed voice note");
                Ok(Message::new(Role::User, transcript.trim(), Modality::Audio))
            }
            MessageContent::Image {
                data,
                mime_type,
                caption,
            } => {
                let description = self.vision.describe(data, mime_type, VISION_PROMPT).await?;
                Ok(Message::new(
                    Role::User,
                    image_text(description.trim(), caption.as_deref()),
                    Modality::Image,
                ))
            }
        }
    }
}

/// The user message recorded when normalization itself failed.
pub fn placeholder(content: &MessageContent) -> Message {
    match content {
        MessageContent::Text(text) => Message::user(text.as_str()),
        MessageContent::Audio { .. } => Message::new(Role::User, "[Voice message]", Modality::Audio),
        MessageContent::Image { caption, .. } => Message::new(
            Role::User,
            image_text("unavailable", caption.as_deref()),
            Modality::Image,
        ),
    }
}

fn image_text(description: &str, caption: Option<&str>) -> String {
    match caption.map(str::trim).filter(|c| !c.is_empty()) {
        Some(caption) => format!("[Image: {description}]\n{caption}"),
        None => format!("[Image: {description}]"),
    }
}
