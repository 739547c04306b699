// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Speech adapter traits (text-to-speech and speech-to-text).

use async_trait::async_trait;

use crate::error::ParleyError;
use crate::traits::adapter::PluginAdapter;

#[async_trait]
pub trait TextToSpeechAdapter: PluginAdapter {
    /// Synthesizes `text` with the given voice and returns encoded audio (mp3).
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>, ParleyError>;
}

#[async_trait]
pub trait SpeechToTextAdapter: PluginAdapter {
    /// Transcribes encoded audio into text.
    async fn transcribe(&self, audio: &[u8], mime_type: &str) -> Result<String, ParleyError>;
}
