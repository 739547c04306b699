// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Parley configuration system.

use std::io::Write;

use parley_config::diagnostic::ConfigError;
use parley_config::{load_and_validate_path, load_and_validate_str, load_config_from_str};

#[test]
fn full_config_deserializes() {
    let toml = r#"
[agent]
name = "Pepper"
log_level = "debug"
persona = "You are Pepper."
turn_timeout_secs = 45

[routing]
messages_to_analyze = 4
temperature = 0.2

[memory]
top_k = 5
dedup_threshold = 0.92

[context]
summary_trigger = 30
keep_after_summary = 6

[schedule]
fallback_activity = "Napping"

[schedule.monday]
"09:00-17:00" = "Working at the lab"
"23:00-06:00" = "Sleeping"

[voice]
voice_id = "nova"
max_duration_secs = 300

[openai]
api_key = "sk-test"
chat_model = "gpt-4.1"

[vapi]
phone_number_id = "pn_123"
server_url = "https://example.test/v1/calls/webhook"
llm_url = "https://example.test/v1/calls/chat/completions"

[storage]
database_path = "/tmp/parley-test.db"
wal_mode = false

[gateway]
host = "0.0.0.0"
port = 8080
bearer_token = "secret"
"#;

    let config = load_and_validate_str(toml).expect("valid config");
    assert_eq!(config.agent.name, "Pepper");
    assert_eq!(config.agent.turn_timeout_secs, 45);
    assert_eq!(config.routing.messages_to_analyze, 4);
    assert_eq!(config.memory.top_k, 5);
    assert_eq!(config.context.summary_trigger, 30);
    assert_eq!(config.schedule.fallback_activity, "Napping");
    assert_eq!(
        config.schedule.monday.get("23:00-06:00").map(String::as_str),
        Some("Sleeping")
    );
    assert_eq!(config.voice.voice_id, "nova");
    assert_eq!(config.openai.api_key.as_deref(), Some("sk-test"));
    assert_eq!(config.vapi.phone_number_id.as_deref(), Some("pn_123"));
    assert_eq!(
        config.vapi.llm_url.as_deref(),
        Some("https://example.test/v1/calls/chat/completions")
    );
    assert!(!config.storage.wal_mode);
    assert_eq!(config.gateway.port, 8080);
    // Untouched sections keep their defaults.
    assert_eq!(config.voice.correlation_ttl_secs, 900);
    assert_eq!(config.voice.placement_timeout_secs, 20);
}

#[test]
fn empty_config_uses_defaults() {
    let config = load_and_validate_str("").expect("defaults validate");
    assert_eq!(config.agent.name, "Ava");
    assert_eq!(config.context.keep_after_summary, 5);
}

#[test]
fn unknown_key_gets_suggestion() {
    let toml = r#"
[memory]
dedup_treshold = 0.8
"#;
    let errors = load_and_validate_str(toml).expect_err("unknown key must fail");
    let suggestion = errors.iter().find_map(|e| match e {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } if key == "dedup_treshold" => suggestion.clone(),
        _ => None,
    });
    assert_eq!(suggestion.as_deref(), Some("dedup_threshold"));
}

#[test]
fn unknown_section_is_rejected() {
    let err = load_config_from_str("[telegram]\nbot_token = \"x\"\n").expect_err("unknown section");
    assert!(err.to_string().contains("telegram"));
}

#[test]
fn wrong_type_is_reported() {
    let errors = load_and_validate_str("[gateway]\nport = \"eighty\"\n").expect_err("bad type");
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidType { .. } | ConfigError::Other(_)))
    );
}

#[test]
fn semantic_validation_runs_after_parse() {
    let errors = load_and_validate_str("[context]\nsummary_trigger = 3\nkeep_after_summary = 5\n")
        .expect_err("window sizes conflict");
    assert!(errors.iter().any(
        |e| matches!(e, ConfigError::Validation { message } if message.contains("keep_after_summary"))
    ));
}

#[test]
fn explicit_path_is_loaded() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(file, "[agent]\nname = \"FromFile\"").expect("write");
    let config = load_and_validate_path(file.path()).expect("path config");
    assert_eq!(config.agent.name, "FromFile");
}
