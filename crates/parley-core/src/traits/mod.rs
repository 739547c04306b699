// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions.
//!
//! All adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod completion;
pub mod embedding;
pub mod image;
pub mod speech;
pub mod storage;
pub mod telephony;

pub use adapter::PluginAdapter;
pub use completion::CompletionAdapter;
pub use embedding::EmbeddingAdapter;
pub use image::{ImageGenerationAdapter, VisionAdapter};
pub use speech::{SpeechToTextAdapter, TextToSpeechAdapter};
pub use storage::{SessionStore, VectorStore};
pub use telephony::TelephonyAdapter;
