// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Context engine for Parley turns.
//!
//! Builds the [`ContextBundle`](parley_core::ContextBundle) a response
//! generator sees:
//! - **Persona**: the character prompt (file, inline, or default)
//! - **Activity**: what the persona is doing right now, from a weekly schedule
//! - **Facts**: owner-scoped memories relevant to the last few messages
//! - **Window**: the summary plus the messages not yet folded into it
//!
//! The [`Summarizer`] keeps the window bounded by folding older messages
//! into a running summary. It never deletes anything from the log.

pub mod activity;
pub mod assembler;
pub mod persona;
pub mod summarizer;

pub use activity::{ActivityLookup, Clock, FixedClock, ScheduleActivity, SystemClock};
pub use assembler::ContextAssembler;
pub use persona::Persona;
pub use summarizer::Summarizer;
