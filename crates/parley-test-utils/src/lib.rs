// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Parley integration tests.
//!
//! Provides mock adapters and test harness infrastructure for fast,
//! deterministic, CI-runnable tests without external services.
//!
//! # Components
//!
//! - [`MockCompletion`] - per-task scripted completion provider
//! - [`MockEmbedder`] - deterministic bag-of-words embeddings
//! - [`MockSpeech`] and [`MockImage`] - media providers that echo their input
//! - [`MockTelephony`] - records assistants and placed calls
//! - [`InMemoryVectorStore`] and [`InMemorySessionStore`] - stores without SQLite
//! - [`TestHarness`] - a full engine wired to all of the above

pub mod harness;
pub mod memory_store;
pub mod mock_completion;
pub mod mock_embedder;
pub mod mock_media;
pub mod mock_telephony;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use memory_store::{InMemorySessionStore, InMemoryVectorStore};
pub use mock_completion::{MockCompletion, Responder, default_reply};
pub use mock_embedder::MockEmbedder;
pub use mock_media::{MockImage, MockSpeech, PNG_MAGIC};
pub use mock_telephony::MockTelephony;
