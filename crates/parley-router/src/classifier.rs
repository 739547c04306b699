// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Parsing of classifier replies into routing decisions.
//!
//! The model is asked for a JSON object, but replies arrive fenced, wrapped
//! in prose, or as a single bare label. All of these are accepted; anything
//! else yields `None` and the caller falls back to text.

use parley_core::RoutingDecision;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct RawDecision {
    response_type: String,
    #[serde(default)]
    reason: Option<String>,
}

/// Keyword rules for the calling reason, checked in order.
const CALL_REASONS: &[(&[&str], &str)] = &[
    (
        &["urgent", "emergency"],
        "Urgent matter, user asked for an immediate callback",
    ),
    (&["discuss"], "User wants to discuss something in detail"),
    (&["explain"], "User needs a detailed explanation"),
    (&["help"], "User needs help with something"),
    (&["talk"], "User prefers to talk rather than type"),
];

const DEFAULT_CALL_REASON: &str = "User requested a callback";

/// Best-effort reason for a callback request, from the user's own words.
pub fn infer_call_reason(text: &str) -> String {
    let lower = text.to_lowercase();
    CALL_REASONS
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(_, reason)| *reason)
        .unwrap_or(DEFAULT_CALL_REASON)
        .to_string()
}

/// Parse a classifier reply.
///
/// `last_user_text` feeds the call-reason heuristic when the model picks
/// `voice_call` without giving a reason.
pub fn parse_decision(raw: &str, last_user_text: &str) -> Option<RoutingDecision> {
    let trimmed = strip_fences(raw.trim());
    if trimmed.is_empty() {
        return None;
    }

    let (label, reason) = match json_object(trimmed) {
        Some(obj) => {
            let parsed: RawDecision = serde_json::from_str(obj).ok()?;
            (parsed.response_type, parsed.reason)
        }
        None => {
            let word = trimmed.trim_matches(|c: char| c == '"' || c == '\'' || c == '.');
            if word.split_whitespace().count() != 1 {
                return None;
            }
            (word.to_string(), None)
        }
    };

    decision_for(&label, reason, last_user_text)
}

fn decision_for(label: &str, reason: Option<String>, last_user_text: &str) -> Option<RoutingDecision> {
    match label.trim().to_lowercase().as_str() {
        "conversation" | "text" => Some(RoutingDecision::Text),
        "image" => Some(RoutingDecision::Image),
        "audio" => Some(RoutingDecision::Audio),
        "voice_call" => {
            let reason = reason
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| infer_call_reason(last_user_text));
            Some(RoutingDecision::VoiceCall { reason })
        }
        _ => None,
    }
}

fn strip_fences(s: &str) -> &str {
    let Some(rest) = s.strip_prefix("```") else {
        return s;
    };
    // Drop an optional language tag on the opening fence line.
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

fn json_object(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let end = s.rfind('}')?;
    (end > start).then(|| &s[start..=end])
}
