// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Parley engine: one inbound message in, one reply out.
//!
//! The [`Engine`] is the central coordinator that:
//! - Serializes turns per session and persists the result
//! - Normalizes voice notes and images into text
//! - Extracts memories and classifies the reply modality concurrently
//! - Dispatches to the text, image, audio, or voice-call handler
//! - Reconciles call webhooks back into the originating session

pub mod bridge;
pub mod dispatch;
pub mod engine;
pub mod input;
pub mod shutdown;

pub use bridge::{CallAttempt, VoiceBridge};
pub use dispatch::{Dispatched, Dispatcher, ModalityHandler, Turn, strip_stage_directions};
pub use engine::{Engine, EngineComponents};
pub use input::InputNormalizer;
pub use shutdown::install_signal_handler;
