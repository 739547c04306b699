// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Parley dialogue engine.
//!
//! This crate provides the foundational trait definitions, error types, and
//! domain types used throughout the Parley workspace. Every external
//! collaborator (language models, speech, images, telephony, storage) sits
//! behind a trait defined here.

pub mod error;
pub mod traits;
pub mod types;
pub mod vector;

pub use error::ParleyError;
pub use types::{
    AdapterType, ContextBundle, HealthStatus, InboundMessage, MemoryRecord, Message, OwnerId,
    RoutingDecision, ScoredMemory, SessionState, TurnOutcome,
};

pub use traits::{
    CompletionAdapter, EmbeddingAdapter, ImageGenerationAdapter, PluginAdapter, SessionStore,
    SpeechToTextAdapter, TelephonyAdapter, TextToSpeechAdapter, VectorStore, VisionAdapter,
};
