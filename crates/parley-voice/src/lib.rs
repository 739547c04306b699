// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Voice-call plumbing for the Parley engine.
//!
//! An outbound call is requested from a chat turn, placed through a
//! telephony platform, and resolved later by an asynchronous webhook. This
//! crate holds the pieces that do not need the engine:
//!
//! - [`CallState`]: the call lifecycle with validated transitions
//! - [`CorrelationRegistry`]: maps local call ids (and provider ids) to sessions
//! - [`CallEvent`]: tolerant parsing of telephony webhook payloads
//! - [`build_call_variables`]: conversation context handed to the call
//! - [`build_assistant_config`]: the per-call assistant definition
//! - [`parse_call_chat`]: in-call completion requests from the platform

pub mod assistant;
pub mod chat;
pub mod event;
pub mod registry;
pub mod state;
pub mod variables;

pub use assistant::{CallEndpoints, SERVER_MESSAGES, build_assistant_config};
pub use chat::{CALL_CHAT_WINDOW, CallChatRequest, ChatCompletion, parse_call_chat};
pub use event::{CallEvent, CallEventKind, CallRef, WebhookAck, parse_call_event};
pub use registry::{CallCorrelation, CorrelationRegistry};
pub use state::CallState;
pub use variables::{build_call_variables, detect_topic, extract_user_name, relationship_stage};
