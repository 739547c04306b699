// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message log rows. Messages are only ever inserted, never updated or deleted.

use std::str::FromStr;

use parley_core::types::{AssetRef, Message, Modality, Role};
use rusqlite::{Row, Transaction, params};

use super::{conversion_err, parse_timestamp, to_timestamp};

/// Number of messages already stored for a session.
pub(crate) fn stored_count(tx: &Transaction<'_>, session_id: &str) -> rusqlite::Result<usize> {
    let count: i64 = tx.query_row(
        "SELECT COUNT(*) FROM messages WHERE session_id = ?1",
        params![session_id],
        |row| row.get(0),
    )?;
    Ok(usize::try_from(count).unwrap_or(0))
}

/// Insert `messages[from..]` with their positions as `seq`.
pub(crate) fn append_from(
    tx: &Transaction<'_>,
    session_id: &str,
    messages: &[Message],
    from: usize,
) -> rusqlite::Result<usize> {
    let mut stmt = tx.prepare_cached(
        "INSERT INTO messages (id, session_id, seq, role, content, modality, asset_ref, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )?;
    let mut inserted = 0;
    for (seq, message) in messages.iter().enumerate().skip(from) {
        stmt.execute(params![
            message.id,
            session_id,
            seq as i64,
            message.role.to_string(),
            message.content,
            message.modality.to_string(),
            message.asset.as_ref().map(|a| a.0.clone()),
            to_timestamp(&message.created_at),
        ])?;
        inserted += 1;
    }
    Ok(inserted)
}

/// Load a session's full log in append order.
pub(crate) fn load_all(
    conn: &rusqlite::Connection,
    session_id: &str,
) -> rusqlite::Result<Vec<Message>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, role, content, modality, asset_ref, created_at
         FROM messages WHERE session_id = ?1 ORDER BY seq ASC",
    )?;
    let rows = stmt.query_map(params![session_id], row_to_message)?;
    rows.collect()
}

fn row_to_message(row: &Row<'_>) -> rusqlite::Result<Message> {
    let role: String = row.get(1)?;
    let modality: String = row.get(3)?;
    let asset: Option<String> = row.get(4)?;
    let created_at: String = row.get(5)?;
    Ok(Message {
        id: row.get(0)?,
        role: Role::from_str(&role).map_err(|e| conversion_err(1, e))?,
        content: row.get(2)?,
        modality: Modality::from_str(&modality).map_err(|e| conversion_err(3, e))?,
        asset: asset.map(AssetRef),
        created_at: parse_timestamp(5, &created_at)?,
    })
}
