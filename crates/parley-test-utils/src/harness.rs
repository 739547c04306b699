// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end engine tests.
//!
//! `TestHarness` assembles a complete engine with mock providers, a mock
//! telephony platform, and either in-memory stores or a temp SQLite
//! database. `send_text()` drives the full turn pipeline and
//! `deliver_webhook()` the call-resolution path.

use std::sync::Arc;

use chrono::NaiveDate;
use parley_agent::{Engine, EngineComponents};
use parley_config::model::{ParleyConfig, StorageConfig};
use parley_context::{Clock, FixedClock, Persona, ScheduleActivity};
use parley_core::{
    InboundMessage, OwnerId, ParleyError, SessionState, SessionStore, TurnOutcome, VectorStore,
};
use parley_storage::SqliteStorage;
use parley_voice::WebhookAck;

use crate::memory_store::{InMemorySessionStore, InMemoryVectorStore};
use crate::mock_completion::MockCompletion;
use crate::mock_embedder::MockEmbedder;
use crate::mock_media::{MockImage, MockSpeech};
use crate::mock_telephony::MockTelephony;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    completion: MockCompletion,
    config: ParleyConfig,
    clock: Arc<dyn Clock>,
    sqlite: bool,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        // A Wednesday afternoon.
        let noon = NaiveDate::from_ymd_opt(2026, 3, 4)
            .and_then(|d| d.and_hms_opt(14, 0, 0))
            .unwrap_or_default();
        Self {
            completion: MockCompletion::new(),
            config: ParleyConfig::default(),
            clock: Arc::new(FixedClock(noon)),
            sqlite: false,
        }
    }

    /// Use a pre-scripted completion provider.
    pub fn with_completion(mut self, completion: MockCompletion) -> Self {
        self.completion = completion;
        self
    }

    pub fn with_config(mut self, config: ParleyConfig) -> Self {
        self.config = config;
        self
    }

    /// Pin the schedule clock.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Back sessions and memories with a temp SQLite database instead of
    /// the in-memory stores.
    pub fn with_sqlite(mut self) -> Self {
        self.sqlite = true;
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, ParleyError> {
        let mut config = self.config;
        let embedder = MockEmbedder::new();
        let speech = MockSpeech::new();
        let image = MockImage::new();
        let telephony = MockTelephony::new();

        let (sessions, vectors, temp_dir): (Arc<dyn SessionStore>, Arc<dyn VectorStore>, _) =
            if self.sqlite {
                let temp_dir = tempfile::TempDir::new()
                    .map_err(|e| ParleyError::Storage { source: e.into() })?;
                config.storage = StorageConfig {
                    database_path: temp_dir.path().join("test.db").to_string_lossy().to_string(),
                    wal_mode: true,
                };
                let storage = SqliteStorage::new(config.storage.clone());
                storage.initialize().await?;
                let storage = Arc::new(storage);
                (
                    Arc::clone(&storage) as Arc<dyn SessionStore>,
                    storage as Arc<dyn VectorStore>,
                    Some(temp_dir),
                )
            } else {
                (
                    Arc::new(InMemorySessionStore::new()),
                    Arc::new(InMemoryVectorStore::new()),
                    None,
                )
            };

        let activity = ScheduleActivity::from_config(&config.schedule, self.clock)?;
        let components = EngineComponents {
            completion: Arc::new(self.completion.clone()),
            embedder: Arc::new(embedder.clone()),
            vectors,
            sessions,
            tts: Arc::new(speech.clone()),
            stt: Arc::new(speech.clone()),
            images: Arc::new(image.clone()),
            vision: Arc::new(image.clone()),
            telephony: Arc::new(telephony.clone()),
            activity: Arc::new(activity),
        };
        let engine = Engine::with_persona(
            config,
            components,
            Persona::new("Ava", "You are Ava, a warm and curious friend."),
        );

        Ok(TestHarness {
            engine: Arc::new(engine),
            completion: self.completion,
            embedder,
            speech,
            image,
            telephony,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete engine wired to mocks.
pub struct TestHarness {
    engine: Arc<Engine>,
    completion: MockCompletion,
    embedder: MockEmbedder,
    speech: MockSpeech,
    image: MockImage,
    telephony: MockTelephony,
    _temp_dir: Option<tempfile::TempDir>,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Send a text message as `owner` on `session_id`.
    pub async fn send_text(&self, session_id: &str, owner: &str, text: &str) -> TurnOutcome {
        self.send(session_id, owner, InboundMessage::text(text)).await
    }

    pub async fn send(&self, session_id: &str, owner: &str, inbound: InboundMessage) -> TurnOutcome {
        match OwnerId::new(owner) {
            Ok(owner) => self.engine.handle_inbound_message(session_id, &owner, inbound).await,
            Err(e) => panic!("invalid owner id {owner:?}: {e}"),
        }
    }

    /// Deliver a webhook body and wait for its processing to finish.
    pub async fn deliver_webhook(&self, body: &serde_json::Value) -> WebhookAck {
        let ack = self.engine.handle_call_webhook(body.to_string().as_bytes());
        self.engine.wait_for_call_tasks().await;
        ack
    }

    /// The persisted session, if any.
    pub async fn session(&self, session_id: &str) -> Option<SessionState> {
        match self.engine.snapshot(session_id).await {
            Ok(session) => session,
            Err(e) => panic!("failed to read session {session_id}: {e}"),
        }
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    pub fn completion(&self) -> &MockCompletion {
        &self.completion
    }

    pub fn embedder(&self) -> &MockEmbedder {
        &self.embedder
    }

    pub fn speech(&self) -> &MockSpeech {
        &self.speech
    }

    pub fn image(&self) -> &MockImage {
        &self.image
    }

    pub fn telephony(&self) -> &MockTelephony {
        &self.telephony
    }
}
