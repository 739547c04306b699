// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as threshold ranges, window sizes, and schedule time ranges.

use crate::diagnostic::ConfigError;
use crate::model::ParleyConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &ParleyConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if config.agent.turn_timeout_secs == 0 {
        fail("agent.turn_timeout_secs must be greater than 0".to_string());
    }
    if config.agent.lock_timeout_secs == 0 {
        fail("agent.lock_timeout_secs must be greater than 0".to_string());
    }
    if config.agent.fallback_message.trim().is_empty() {
        fail("agent.fallback_message must not be empty".to_string());
    }

    if config.routing.messages_to_analyze == 0 {
        fail("routing.messages_to_analyze must be at least 1".to_string());
    }
    if !(0.0..=2.0).contains(&config.routing.temperature) {
        fail(format!(
            "routing.temperature must be within 0.0..=2.0, got {}",
            config.routing.temperature
        ));
    }

    let threshold = config.memory.dedup_threshold;
    if !(threshold > 0.0 && threshold <= 1.0) {
        fail(format!(
            "memory.dedup_threshold must be within (0, 1], got {threshold}"
        ));
    }
    if config.memory.top_k == 0 {
        fail("memory.top_k must be at least 1".to_string());
    }

    if config.context.keep_after_summary >= config.context.summary_trigger {
        fail(format!(
            "context.keep_after_summary ({}) must be less than context.summary_trigger ({})",
            config.context.keep_after_summary, config.context.summary_trigger
        ));
    }

    for (day, ranges) in config.schedule.days() {
        for key in ranges.keys() {
            if parse_time_range(key).is_none() {
                fail(format!(
                    "schedule.{day} key `{key}` is not a valid HH:MM-HH:MM range"
                ));
            }
        }
    }

    if config.voice.correlation_ttl_secs == 0 {
        fail("voice.correlation_ttl_secs must be greater than 0".to_string());
    }
    if config.voice.sweep_interval_secs == 0 {
        fail("voice.sweep_interval_secs must be greater than 0".to_string());
    }
    if config.voice.placement_timeout_secs == 0 {
        fail("voice.placement_timeout_secs must be greater than 0".to_string());
    } else if config.agent.turn_timeout_secs > 0
        && config.voice.placement_timeout_secs >= config.agent.turn_timeout_secs
    {
        fail(format!(
            "voice.placement_timeout_secs ({}) must be less than agent.turn_timeout_secs ({})",
            config.voice.placement_timeout_secs, config.agent.turn_timeout_secs
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    if config.gateway.host.trim().is_empty() {
        fail("gateway.host must not be empty".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Parse `"HH:MM-HH:MM"` into `(start, end)` minutes after midnight.
///
/// `end` may be smaller than `start` for ranges that cross midnight.
/// `24:00` is accepted as an end of day marker.
pub fn parse_time_range(range: &str) -> Option<(u32, u32)> {
    let (start, end) = range.split_once('-')?;
    let start = parse_clock(start.trim())?;
    let end = parse_clock(end.trim())?;
    if start == end || start >= 24 * 60 {
        return None;
    }
    Some((start, end))
}

fn parse_clock(value: &str) -> Option<u32> {
    let (hours, minutes) = value.split_once(':')?;
    if hours.len() != 2 || minutes.len() != 2 {
        return None;
    }
    let hours: u32 = hours.parse().ok()?;
    let minutes: u32 = minutes.parse().ok()?;
    if minutes >= 60 || hours > 24 || (hours == 24 && minutes != 0) {
        return None;
    }
    Some(hours * 60 + minutes)
}
