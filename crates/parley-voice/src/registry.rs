// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Correlation of outbound calls with the sessions that requested them.
//!
//! A correlation is registered under a locally generated `call_id` before
//! the call is dialed, so a webhook that races ahead of the dial response
//! still resolves. Once the platform returns its own id, a secondary index
//! lets events that only carry the provider id resolve too.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parley_core::{OwnerId, ParleyError};
use tracing::debug;

use crate::event::CallRef;
use crate::state::CallState;

/// Links one outbound call to its session.
#[derive(Debug, Clone, PartialEq)]
pub struct CallCorrelation {
    pub call_id: String,
    pub session_id: String,
    pub owner_id: OwnerId,
    pub initiated_at: DateTime<Utc>,
    pub provider_call_id: Option<String>,
    pub state: CallState,
}

impl CallCorrelation {
    pub fn new(call_id: impl Into<String>, session_id: impl Into<String>, owner_id: OwnerId) -> Self {
        Self {
            call_id: call_id.into(),
            session_id: session_id.into(),
            owner_id,
            initiated_at: Utc::now(),
            provider_call_id: None,
            state: CallState::AssistantConfigured,
        }
    }
}

/// Concurrent map of live call correlations.
#[derive(Debug, Default)]
pub struct CorrelationRegistry {
    calls: DashMap<String, CallCorrelation>,
    by_provider: DashMap<String, String>,
}

impl CorrelationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new correlation. A duplicate `call_id` is rejected.
    pub fn register(&self, correlation: CallCorrelation) -> Result<(), ParleyError> {
        match self.calls.entry(correlation.call_id.clone()) {
            Entry::Occupied(_) => Err(ParleyError::Validation(format!(
                "call correlation already registered: {}",
                correlation.call_id
            ))),
            Entry::Vacant(slot) => {
                if let Some(provider_id) = &correlation.provider_call_id {
                    self.by_provider
                        .insert(provider_id.clone(), correlation.call_id.clone());
                }
                debug!(call_id = %correlation.call_id, session_id = %correlation.session_id, "registered call correlation");
                slot.insert(correlation);
                Ok(())
            }
        }
    }

    /// Record the platform's id for a registered call.
    pub fn set_provider_call_id(&self, call_id: &str, provider_call_id: &str) -> Result<(), ParleyError> {
        let mut entry = self.calls.get_mut(call_id).ok_or_else(|| not_found(call_id))?;
        entry.provider_call_id = Some(provider_call_id.to_string());
        self.by_provider
            .insert(provider_call_id.to_string(), call_id.to_string());
        Ok(())
    }

    pub fn get(&self, call_id: &str) -> Option<CallCorrelation> {
        self.calls.get(call_id).map(|c| c.clone())
    }

    /// Find the correlation a webhook refers to: local id first, then provider id.
    pub fn resolve(&self, call: &CallRef) -> Option<CallCorrelation> {
        if let Some(found) = call.call_id.as_deref().and_then(|id| self.get(id)) {
            return Some(found);
        }
        let provider_id = call.provider_call_id.as_deref()?;
        let call_id = self.by_provider.get(provider_id).map(|id| id.clone())?;
        self.get(&call_id)
    }

    /// Move a call to `next`.
    ///
    /// Repeating the current state is a no-op. An illegal step is rejected
    /// and leaves the state unchanged.
    pub fn transition(&self, call_id: &str, next: CallState) -> Result<CallState, ParleyError> {
        let mut entry = self.calls.get_mut(call_id).ok_or_else(|| not_found(call_id))?;
        if entry.state == next {
            return Ok(next);
        }
        if !entry.state.can_transition_to(next) {
            return Err(ParleyError::Validation(format!(
                "illegal call transition {} -> {next} for {call_id}",
                entry.state
            )));
        }
        entry.state = next;
        Ok(next)
    }

    pub fn remove(&self, call_id: &str) -> Option<CallCorrelation> {
        let (_, removed) = self.calls.remove(call_id)?;
        if let Some(provider_id) = &removed.provider_call_id {
            self.by_provider.remove(provider_id);
        }
        Some(removed)
    }

    /// Remove and return every correlation older than `ttl` at `now`.
    pub fn take_expired(&self, ttl: Duration, now: DateTime<Utc>) -> Vec<CallCorrelation> {
        let expired: Vec<String> = self
            .calls
            .iter()
            .filter(|c| now - c.initiated_at > ttl)
            .map(|c| c.call_id.clone())
            .collect();
        expired.iter().filter_map(|id| self.remove(id)).collect()
    }

    /// Remove a session's correlations that never got a provider id,
    /// except `keep`.
    pub fn take_unplaced(&self, session_id: &str, keep: Option<&str>) -> Vec<CallCorrelation> {
        let unplaced: Vec<String> = self
            .calls
            .iter()
            .filter(|c| c.session_id == session_id && c.provider_call_id.is_none())
            .filter(|c| keep != Some(c.call_id.as_str()))
            .map(|c| c.call_id.clone())
            .collect();
        unplaced.iter().filter_map(|id| self.remove(id)).collect()
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

fn not_found(call_id: &str) -> ParleyError {
    ParleyError::NotFound {
        kind: "call".to_string(),
        id: call_id.to_string(),
    }
}
