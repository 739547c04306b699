// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `parley chat` command implementation.
//!
//! A readline REPL that drives the same engine entry point as the gateway.
//! Media replies are written next to the working directory.

use colored::Colorize;
use parley_config::model::ParleyConfig;
use parley_core::types::{MediaPayload, OutboundReply};
use parley_core::{InboundMessage, OwnerId, ParleyError, PluginAdapter, TurnOutcome};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::wiring::build_engine;

/// Runs the `parley chat` REPL.
pub async fn run_chat(
    config: ParleyConfig,
    session: Option<String>,
    owner: String,
) -> Result<(), ParleyError> {
    let owner = OwnerId::new(&owner)?;
    let session_id = session.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let (engine, storage) = build_engine(&config).await?;

    let mut rl = DefaultEditor::new()
        .map_err(|e| ParleyError::Internal(format!("failed to initialize readline: {e}")))?;

    println!(
        "{} session {} (type {} to exit)",
        format!("Chatting with {}.", engine.persona().name()).bold(),
        session_id.dimmed(),
        "/quit".yellow()
    );

    let prompt = format!("{} ", "you>".bold().green());
    loop {
        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line == "/quit" {
                    break;
                }
                let _ = rl.add_history_entry(line);

                let outcome = engine
                    .handle_inbound_message(&session_id, &owner, InboundMessage::text(line))
                    .await;
                print_outcome(engine.persona().name(), &outcome);
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("{} {e}", "readline error:".red());
                break;
            }
        }
    }

    storage.shutdown().await
}

fn print_outcome(persona: &str, outcome: &TurnOutcome) {
    let label = format!("{persona}>").bold().cyan();
    match outcome {
        TurnOutcome::Reply(OutboundReply { message, media }) => {
            println!("{label} {}", message.content);
            if let Some(media) = media {
                match save_media(message.id.as_str(), media) {
                    Ok(path) => {
                        let note = format!("  [{} saved to {path}]", media.mime_type);
                        println!("{}", note.dimmed());
                    }
                    Err(e) => eprintln!("{} {e}", "failed to save media:".red()),
                }
            }
        }
        TurnOutcome::CallInitiated { message, call_id } => {
            println!("{label} {}", message.content);
            println!("{}", format!("  [calling, call id {call_id}]").dimmed());
        }
    }
}

fn save_media(id: &str, media: &MediaPayload) -> std::io::Result<String> {
    let ext = match media.mime_type.as_str() {
        "image/png" => "png",
        "audio/mpeg" => "mp3",
        _ => "bin",
    };
    let path = format!("parley-{id}.{ext}");
    std::fs::write(&path, &media.data)?;
    Ok(path)
}
