// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session load/save.

use parley_core::ParleyError;
use parley_core::types::{OwnerId, SessionState};
use rusqlite::{OptionalExtension, params};
use tracing::debug;

use super::{conversion_err, messages, parse_timestamp, to_timestamp};
use crate::database::{Database, map_tr_err};

/// Load a session with its full message log, or `None` if it was never saved.
pub async fn load_session(
    db: &Database,
    session_id: &str,
) -> Result<Option<SessionState>, ParleyError> {
    let session_id = session_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<SessionState>, rusqlite::Error> {
            let row = conn
                .query_row(
                    "SELECT owner_id, summary, summarized_count, pending_call, phone_number,
                            created_at, last_activity_at
                     FROM sessions WHERE session_id = ?1",
                    params![session_id],
                    |row| {
                        let owner: String = row.get(0)?;
                        let summarized: i64 = row.get(2)?;
                        let created_at: String = row.get(5)?;
                        let last_activity_at: String = row.get(6)?;
                        Ok(SessionState {
                            session_id: session_id.clone(),
                            owner_id: OwnerId::new(owner).map_err(|e| conversion_err(0, e))?,
                            messages: Vec::new(),
                            summary: row.get(1)?,
                            summarized_count: usize::try_from(summarized).unwrap_or(0),
                            pending_call: row.get(3)?,
                            phone_number: row.get(4)?,
                            created_at: parse_timestamp(5, &created_at)?,
                            last_activity_at: parse_timestamp(6, &last_activity_at)?,
                        })
                    },
                )
                .optional()?;

            let Some(mut session) = row else {
                return Ok(None);
            };
            session.messages = messages::load_all(conn, &session.session_id)?;
            Ok(Some(session))
        })
        .await
        .map_err(map_tr_err)
}

/// Upsert the session row and append any messages not yet stored.
///
/// Stored messages are never rewritten; the log on disk only grows.
pub async fn save_session(db: &Database, session: &SessionState) -> Result<(), ParleyError> {
    let session = session.clone();
    let inserted = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO sessions (session_id, owner_id, summary, summarized_count,
                                       pending_call, phone_number, created_at, last_activity_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(session_id) DO UPDATE SET
                    summary = excluded.summary,
                    summarized_count = MAX(sessions.summarized_count, excluded.summarized_count),
                    pending_call = excluded.pending_call,
                    phone_number = excluded.phone_number,
                    last_activity_at = excluded.last_activity_at",
                params![
                    session.session_id,
                    session.owner_id.as_str(),
                    session.summary,
                    session.summarized_count as i64,
                    session.pending_call,
                    session.phone_number,
                    to_timestamp(&session.created_at),
                    to_timestamp(&session.last_activity_at),
                ],
            )?;
            let already = messages::stored_count(&tx, &session.session_id)?;
            let inserted =
                messages::append_from(&tx, &session.session_id, &session.messages, already)?;
            tx.commit()?;
            Ok(inserted)
        })
        .await
        .map_err(map_tr_err)?;
    debug!(inserted, "session saved");
    Ok(())
}
