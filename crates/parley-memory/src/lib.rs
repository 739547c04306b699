// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Long-term memory for the Parley dialogue engine.
//!
//! The [`MemoryManager`] turns user messages into third-person facts,
//! suppresses near-duplicates, and retrieves the facts most relevant to the
//! current turn. Every operation is scoped to one [`OwnerId`](parley_core::OwnerId).

pub mod extractor;
pub mod manager;
pub mod retriever;

pub use extractor::{ExtractOutcome, MemoryAnalysis, parse_analysis_response};
pub use manager::MemoryManager;
pub use retriever::format_facts;
