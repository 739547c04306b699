// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Builds the engine from configuration with the concrete adapters.

use std::sync::Arc;

use async_trait::async_trait;
use parley_agent::{Engine, EngineComponents};
use parley_config::model::ParleyConfig;
use parley_context::{ScheduleActivity, SystemClock};
use parley_core::ParleyError;
use parley_core::traits::{PluginAdapter, TelephonyAdapter};
use parley_core::types::{
    AdapterType, HealthStatus, PlaceCallRequest, PlacedCall, TransientAssistantConfig,
};
use parley_openai::OpenAiProvider;
use parley_storage::SqliteStorage;
use parley_vapi::VapiTelephony;
use tracing::info;

/// Stand-in when `voice.enabled = false`; the bridge never reaches it.
struct DisabledTelephony;

#[async_trait]
impl PluginAdapter for DisabledTelephony {
    fn name(&self) -> &str {
        "disabled-telephony"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Telephony
    }

    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        Ok(HealthStatus::Degraded("voice calls are disabled".to_string()))
    }

    async fn shutdown(&self) -> Result<(), ParleyError> {
        Ok(())
    }
}

#[async_trait]
impl TelephonyAdapter for DisabledTelephony {
    async fn create_transient_assistant(
        &self,
        _config: &TransientAssistantConfig,
    ) -> Result<String, ParleyError> {
        Err(ParleyError::Config("voice calls are disabled".to_string()))
    }

    async fn place_call(&self, _request: &PlaceCallRequest) -> Result<PlacedCall, ParleyError> {
        Err(ParleyError::Config("voice calls are disabled".to_string()))
    }
}

/// Opens storage and constructs every adapter the engine needs.
pub async fn build_engine(
    config: &ParleyConfig,
) -> Result<(Arc<Engine>, Arc<SqliteStorage>), ParleyError> {
    let storage = SqliteStorage::new(config.storage.clone());
    storage.initialize().await?;
    let storage = Arc::new(storage);

    let openai = Arc::new(OpenAiProvider::new(&config.openai).inspect_err(|_| {
        eprintln!(
            "error: OpenAI API key required. Set via: openai.api_key in config or OPENAI_API_KEY env var"
        );
    })?);

    let telephony: Arc<dyn TelephonyAdapter> = if config.voice.enabled {
        Arc::new(VapiTelephony::new(&config.vapi)?)
    } else {
        info!("voice calls disabled by configuration");
        Arc::new(DisabledTelephony)
    };

    let activity = ScheduleActivity::from_config(&config.schedule, Arc::new(SystemClock))?;

    let components = EngineComponents {
        completion: openai.clone(),
        embedder: openai.clone(),
        vectors: storage.clone(),
        sessions: storage.clone(),
        tts: openai.clone(),
        stt: openai.clone(),
        images: openai.clone(),
        vision: openai,
        telephony,
        activity: Arc::new(activity),
    };

    let engine = Engine::new(config.clone(), components).await;
    Ok((Arc::new(engine), storage))
}
