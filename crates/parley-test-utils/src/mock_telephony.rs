// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock telephony platform.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use parley_core::traits::adapter::PluginAdapter;
use parley_core::traits::telephony::TelephonyAdapter;
use parley_core::types::{
    AdapterType, HealthStatus, PlaceCallRequest, PlacedCall, TransientAssistantConfig,
};
use parley_core::ParleyError;

use crate::mock_completion::lock;
use crate::mock_media::mock_plugin;

/// Records assistants and calls; each can be switched to fail.
#[derive(Clone, Default)]
pub struct MockTelephony {
    assistants: Arc<Mutex<Vec<TransientAssistantConfig>>>,
    calls: Arc<Mutex<Vec<PlaceCallRequest>>>,
    fail_assistant: Arc<AtomicBool>,
    fail_place_call: Arc<AtomicBool>,
    dial_delay: Arc<Mutex<Option<Duration>>>,
}

impl MockTelephony {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_assistant(self) -> Self {
        self.fail_assistant.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_place_call(self) -> Self {
        self.fail_place_call.store(true, Ordering::SeqCst);
        self
    }

    /// Hang in `place_call` for `delay` after recording the dial.
    pub fn with_dial_delay(self, delay: Duration) -> Self {
        *lock(&self.dial_delay) = Some(delay);
        self
    }

    pub fn assistants(&self) -> Vec<TransientAssistantConfig> {
        lock(&self.assistants).clone()
    }

    pub fn calls(&self) -> Vec<PlaceCallRequest> {
        lock(&self.calls).clone()
    }

    /// Provider id this mock assigns to a placed call.
    pub fn provider_id_for(call_id: &str) -> String {
        format!("prov-{call_id}")
    }
}

mock_plugin!(MockTelephony, "mock-telephony", AdapterType::Telephony);

#[async_trait]
impl TelephonyAdapter for MockTelephony {
    async fn create_transient_assistant(
        &self,
        config: &TransientAssistantConfig,
    ) -> Result<String, ParleyError> {
        if self.fail_assistant.load(Ordering::SeqCst) {
            return Err(ParleyError::provider("assistant rejected"));
        }
        let mut assistants = lock(&self.assistants);
        assistants.push(config.clone());
        Ok(format!("asst-{}", assistants.len()))
    }

    async fn place_call(&self, request: &PlaceCallRequest) -> Result<PlacedCall, ParleyError> {
        lock(&self.calls).push(request.clone());
        let delay = *lock(&self.dial_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_place_call.load(Ordering::SeqCst) {
            return Err(ParleyError::provider("number unreachable"));
        }
        Ok(PlacedCall {
            provider_call_id: Self::provider_id_for(&request.call_id),
            status: "queued".to_string(),
        })
    }
}
