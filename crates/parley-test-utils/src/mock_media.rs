// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock speech and image adapters that record their inputs.

use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use parley_core::traits::adapter::PluginAdapter;
use parley_core::traits::image::{ImageGenerationAdapter, VisionAdapter};
use parley_core::traits::speech::{SpeechToTextAdapter, TextToSpeechAdapter};
use parley_core::types::{AdapterType, HealthStatus};
use parley_core::ParleyError;

use crate::mock_completion::lock;

/// PNG file signature, prepended to every generated image.
pub const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

macro_rules! mock_plugin {
    ($ty:ty, $name:literal, $kind:expr) => {
        #[async_trait]
        impl PluginAdapter for $ty {
            fn name(&self) -> &str {
                $name
            }

            fn version(&self) -> semver::Version {
                semver::Version::new(0, 1, 0)
            }

            fn adapter_type(&self) -> AdapterType {
                $kind
            }

            async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
                Ok(HealthStatus::Healthy)
            }

            async fn shutdown(&self) -> Result<(), ParleyError> {
                Ok(())
            }
        }
    };
}
pub(crate) use mock_plugin;

/// Text-to-speech and speech-to-text in one mock.
///
/// Synthesis returns `b"mp3:" + text`; transcription returns a fixed
/// transcript.
#[derive(Clone)]
pub struct MockSpeech {
    transcript: Arc<Mutex<String>>,
    synthesized: Arc<Mutex<Vec<(String, String)>>>,
    transcribed: Arc<Mutex<Vec<String>>>,
    fail_synthesis: Arc<AtomicBool>,
}

impl Default for MockSpeech {
    fn default() -> Self {
        Self {
            transcript: Arc::new(Mutex::new("transcribed audio".to_string())),
            synthesized: Arc::default(),
            transcribed: Arc::default(),
            fail_synthesis: Arc::default(),
        }
    }
}

impl MockSpeech {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transcript(self, transcript: impl Into<String>) -> Self {
        *lock(&self.transcript) = transcript.into();
        self
    }

    pub fn failing_synthesis(self) -> Self {
        self.fail_synthesis.store(true, Ordering::SeqCst);
        self
    }

    /// `(text, voice_id)` pairs passed to `synthesize`.
    pub fn synthesized(&self) -> Vec<(String, String)> {
        lock(&self.synthesized).clone()
    }

    /// MIME types passed to `transcribe`.
    pub fn transcribed(&self) -> Vec<String> {
        lock(&self.transcribed).clone()
    }
}

mock_plugin!(MockSpeech, "mock-speech", AdapterType::Speech);

#[async_trait]
impl TextToSpeechAdapter for MockSpeech {
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>, ParleyError> {
        if self.fail_synthesis.load(Ordering::SeqCst) {
            return Err(ParleyError::provider("mock synthesis failed"));
        }
        lock(&self.synthesized).push((text.to_string(), voice_id.to_string()));
        let mut audio = b"mp3:".to_vec();
        audio.extend_from_slice(text.as_bytes());
        Ok(audio)
    }
}

#[async_trait]
impl SpeechToTextAdapter for MockSpeech {
    async fn transcribe(&self, _audio: &[u8], mime_type: &str) -> Result<String, ParleyError> {
        lock(&self.transcribed).push(mime_type.to_string());
        Ok(lock(&self.transcript).clone())
    }
}

/// Image generation and vision in one mock.
#[derive(Clone)]
pub struct MockImage {
    description: Arc<Mutex<String>>,
    prompts: Arc<Mutex<Vec<String>>>,
    described: Arc<Mutex<Vec<String>>>,
}

impl Default for MockImage {
    fn default() -> Self {
        Self {
            description: Arc::new(Mutex::new("a photo of a sunny beach".to_string())),
            prompts: Arc::default(),
            described: Arc::default(),
        }
    }
}

impl MockImage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_description(self, description: impl Into<String>) -> Self {
        *lock(&self.description) = description.into();
        self
    }

    /// Prompts passed to `generate`.
    pub fn prompts(&self) -> Vec<String> {
        lock(&self.prompts).clone()
    }

    /// MIME types passed to `describe`.
    pub fn described(&self) -> Vec<String> {
        lock(&self.described).clone()
    }
}

mock_plugin!(MockImage, "mock-image", AdapterType::Image);

#[async_trait]
impl ImageGenerationAdapter for MockImage {
    async fn generate(&self, prompt: &str) -> Result<Vec<u8>, ParleyError> {
        lock(&self.prompts).push(prompt.to_string());
        let mut png = PNG_MAGIC.to_vec();
        png.extend_from_slice(prompt.as_bytes());
        Ok(png)
    }
}

#[async_trait]
impl VisionAdapter for MockImage {
    async fn describe(
        &self,
        _image: &[u8],
        mime_type: &str,
        _prompt: &str,
    ) -> Result<String, ParleyError> {
        lock(&self.described).push(mime_type.to_string());
        Ok(lock(&self.description).clone())
    }
}
