// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound call lifecycle.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Where an outbound call stands.
///
/// `requested -> assistant_configured -> dialing -> active -> ended`, with
/// `failed` reachable from every non-terminal state.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    Requested,
    AssistantConfigured,
    Dialing,
    Active,
    Ended,
    Failed,
}

impl CallState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ended | Self::Failed)
    }

    /// Whether moving from `self` to `next` is a legal step.
    ///
    /// A call may end straight from `dialing` when the platform reports the
    /// end before it reports the pickup.
    pub fn can_transition_to(self, next: CallState) -> bool {
        use CallState::*;
        match (self, next) {
            (Ended | Failed, _) => false,
            (_, Failed) => true,
            (Requested, AssistantConfigured) => true,
            (AssistantConfigured, Dialing) => true,
            (Dialing, Active | Ended) => true,
            (Active, Ended) => true,
            _ => false,
        }
    }
}
