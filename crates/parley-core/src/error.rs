// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Parley dialogue engine.

use thiserror::Error;

/// The primary error type used across all Parley adapter traits and engine operations.
#[derive(Debug, Error)]
pub enum ParleyError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Generation provider errors (API failure, malformed response, model not found).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A provider or store failure that may succeed if retried (rate limit, 5xx, reset).
    #[error("transient error: {message}")]
    Transient { message: String },

    /// Input rejected before it reached a provider or store.
    #[error("validation error: {0}")]
    Validation(String),

    /// A referenced entity does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: String, id: String },

    /// Adapter health check failed.
    #[error("health check failed for {name}: {source}")]
    HealthCheckFailed {
        name: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ParleyError {
    /// Shorthand for a provider error without an underlying source.
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
            source: None,
        }
    }

    /// Whether a single retry is worth attempting.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn transient_classification() {
        assert!(ParleyError::Transient {
            message: "429".into()
        }
        .is_transient());
        assert!(ParleyError::Timeout {
            duration: Duration::from_secs(1)
        }
        .is_transient());
        assert!(!ParleyError::provider("bad request").is_transient());
        assert!(!ParleyError::Validation("empty owner".into()).is_transient());
    }

    #[test]
    fn not_found_display() {
        let err = ParleyError::NotFound {
            kind: "session".into(),
            id: "s-1".into(),
        };
        assert_eq!(err.to_string(), "session not found: s-1");
    }
}
