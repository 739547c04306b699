// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation context handed to the voice assistant.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use parley_core::types::{CallVariables, Role};
use parley_core::{Message, SessionState};
use regex::Regex;

const RECENT_MESSAGES: usize = 6;
const RECENT_MESSAGE_CHARS: usize = 100;
const TOPIC_MESSAGES: usize = 5;
const LAST_MESSAGE_CHARS: usize = 200;

const INTERFACE: &str = "voice_from_chat";

const TOPICS: &[(&str, &[&str])] = &[
    ("Work", &["work", "job", "office", "meeting", "project", "boss", "colleague", "deadline", "presentation"]),
    ("Health", &["health", "doctor", "medicine", "pain", "sick", "wellness", "exercise", "diet"]),
    ("Travel", &["travel", "trip", "vacation", "flight", "hotel", "destination", "visit", "journey"]),
    ("Food", &["food", "restaurant", "recipe", "cooking", "eat", "meal", "dinner", "lunch"]),
    ("Technology", &["app", "phone", "computer", "software", "ai", "tech", "website", "internet"]),
    ("Personal", &["family", "friend", "relationship", "personal", "life", "home", "kids", "children"]),
    ("Shopping", &["buy", "purchase", "order", "shopping", "store", "price", "product"]),
    ("Entertainment", &["movie", "music", "game", "show", "book", "fun", "watch", "play"]),
    ("Education", &["learn", "study", "school", "course", "education", "teaching", "university"]),
    ("Finance", &["money", "bank", "budget", "investment", "financial", "cost", "payment"]),
];

const GENERAL_TOPIC: &str = "General conversation";

static NAME_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\bmy name is (\p{L}+)",
        r"(?i)\bcall me (\p{L}+)",
        r"(?i)\bname'?s (\p{L}+)",
        r"(?i)\bi'?m called (\p{L}+)",
        r"(?i)\bthis is (\p{L}+)",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// Words that follow "call me" or "this is" without being a name.
const NOT_NAMES: &[&str] = &[
    "back", "now", "later", "please", "when", "asap", "tomorrow", "today", "tonight", "maybe",
    "the", "a", "an", "it", "that", "so", "really", "great", "fine", "not",
];

/// Build the variables for a call requested in `session`.
pub fn build_call_variables(
    session: &SessionState,
    assistant_name: &str,
    calling_reason: &str,
    now: DateTime<Utc>,
) -> CallVariables {
    let window = session.recent_window();
    let count = session.messages.len();

    CallVariables {
        user_name: extract_user_name(&session.messages).unwrap_or_else(|| "there".to_string()),
        user_id: session.owner_id.to_string(),
        recent_context: recent_context(window, assistant_name),
        conversation_topic: detect_topic(window),
        last_message: session
            .last_user_message()
            .map(|m| truncate(&m.content, LAST_MESSAGE_CHARS))
            .unwrap_or_else(|| "No recent messages".to_string()),
        message_count: count,
        relationship_stage: relationship_stage(count).to_string(),
        calling_reason: calling_reason.to_string(),
        call_initiated_at: now,
        interface: INTERFACE.to_string(),
    }
}

/// First self-introduction found in the user's messages.
pub fn extract_user_name(messages: &[Message]) -> Option<String> {
    messages
        .iter()
        .filter(|m| m.role == Role::User)
        .find_map(|m| {
            NAME_PATTERNS.iter().find_map(|re| {
                let candidate = re.captures(&m.content)?.get(1)?.as_str().to_lowercase();
                (!NOT_NAMES.contains(&candidate.as_str())).then(|| capitalize(&candidate))
            })
        })
}

/// The highest-scoring topic over the last few messages.
///
/// Keywords match whole words; ties go to the topic listed first.
pub fn detect_topic(messages: &[Message]) -> String {
    let start = messages.len().saturating_sub(TOPIC_MESSAGES);
    let text = messages[start..]
        .iter()
        .map(|m| m.content.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");
    let words: Vec<&str> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    let mut best = (GENERAL_TOPIC, 0usize);
    for (topic, keywords) in TOPICS {
        let score = keywords.iter().filter(|k| words.contains(k)).count();
        if score > best.1 {
            best = (topic, score);
        }
    }
    best.0.to_string()
}

pub fn relationship_stage(message_count: usize) -> &'static str {
    match message_count {
        0..=2 => "new_user",
        3..=10 => "getting_acquainted",
        11..=50 => "regular_user",
        _ => "long_time_user",
    }
}

fn recent_context(window: &[Message], assistant_name: &str) -> String {
    let start = window.len().saturating_sub(RECENT_MESSAGES);
    let lines: Vec<String> = window[start..]
        .iter()
        .filter_map(|m| {
            let speaker = match m.role {
                Role::User => "User",
                Role::Assistant => assistant_name,
                Role::System => return None,
            };
            Some(format!("{speaker}: {}", truncate(&m.content, RECENT_MESSAGE_CHARS)))
        })
        .collect();

    if lines.is_empty() {
        "No previous conversation context available".to_string()
    } else {
        lines.join(" | ")
    }
}

/// Cut to at most `max` characters, marking the cut with "...".
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
