// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Response-modality classification for the Parley engine.
//!
//! This crate provides:
//! - [`parse_decision`]: tolerant parsing of the classifier model's reply
//! - [`infer_call_reason`]: keyword heuristic for why a caller wants a callback
//! - [`RouterClassifier`]: the LLM-backed classifier that never fails
//!
//! Every inbound turn gets exactly one [`RoutingDecision`](parley_core::RoutingDecision).
//! Anything ambiguous becomes a text reply.

pub mod classifier;
pub mod router;

pub use classifier::{infer_call_reason, parse_decision};
pub use router::RouterClassifier;
