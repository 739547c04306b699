// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telephony adapter trait for outbound voice calls.

use async_trait::async_trait;

use crate::error::ParleyError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{PlaceCallRequest, PlacedCall, TransientAssistantConfig};

/// Adapter for an external voice-call platform.
///
/// The platform conducts the call itself and later reports the outcome
/// through a webhook. Neither operation is retried by the engine.
#[async_trait]
pub trait TelephonyAdapter: PluginAdapter {
    /// Registers a per-call assistant and returns the platform's reference to it.
    async fn create_transient_assistant(
        &self,
        config: &TransientAssistantConfig,
    ) -> Result<String, ParleyError>;

    /// Dials `request.destination`. The local `call_id` must be echoed in
    /// webhook metadata.
    async fn place_call(&self, request: &PlaceCallRequest) -> Result<PlacedCall, ParleyError>;
}
