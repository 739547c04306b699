// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Serialized access to session state.
//!
//! Every read-modify-write of a session goes through [`SessionGateway`]:
//! callers first take the per-session lock, then load and save through the
//! returned [`SessionGuard`]. Different sessions proceed in parallel.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parley_core::types::{OwnerId, SessionState};
use parley_core::{ParleyError, SessionStore};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

pub struct SessionGateway {
    store: Arc<dyn SessionStore>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

/// Proof that the holder owns a session's lock. Dropping it releases the lock.
pub struct SessionGuard {
    session_id: String,
    _guard: OwnedMutexGuard<()>,
}

impl SessionGuard {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

impl SessionGateway {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            locks: DashMap::new(),
        }
    }

    /// Acquire the lock for `session_id`, waiting at most `timeout`.
    pub async fn lock(
        &self,
        session_id: &str,
        timeout: Duration,
    ) -> Result<SessionGuard, ParleyError> {
        let mutex = self
            .locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        match tokio::time::timeout(timeout, mutex.lock_owned()).await {
            Ok(guard) => Ok(SessionGuard {
                session_id: session_id.to_string(),
                _guard: guard,
            }),
            Err(_) => {
                warn!(session_id, ?timeout, "session lock acquisition timed out");
                Err(ParleyError::Timeout { duration: timeout })
            }
        }
    }

    pub async fn load(&self, guard: &SessionGuard) -> Result<Option<SessionState>, ParleyError> {
        self.store.load(guard.session_id()).await
    }

    /// Load the session, creating it for `owner` on first contact.
    ///
    /// A session belongs to the owner that created it; a different owner is
    /// rejected.
    pub async fn load_or_create(
        &self,
        guard: &SessionGuard,
        owner: &OwnerId,
    ) -> Result<SessionState, ParleyError> {
        match self.store.load(guard.session_id()).await? {
            Some(session) if session.owner_id != *owner => Err(ParleyError::Validation(format!(
                "session {} belongs to a different owner",
                guard.session_id()
            ))),
            Some(session) => Ok(session),
            None => {
                debug!(session_id = guard.session_id(), owner = %owner, "creating session");
                Ok(SessionState::new(guard.session_id(), owner.clone()))
            }
        }
    }

    pub async fn save(&self, guard: &SessionGuard, session: &SessionState) -> Result<(), ParleyError> {
        if session.session_id != guard.session_id() {
            return Err(ParleyError::Internal(format!(
                "guard for {} cannot save session {}",
                guard.session_id(),
                session.session_id
            )));
        }
        self.store.save(session).await
    }

    /// Drop lock entries nobody holds or waits on. Returns how many were removed.
    pub fn prune_idle_locks(&self) -> usize {
        let before = self.locks.len();
        self.locks.retain(|_, mutex| Arc::strong_count(mutex) > 1);
        before - self.locks.len()
    }
}
