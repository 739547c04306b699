// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Memory rows. Every query is filtered by owner in SQL.

use parley_core::ParleyError;
use parley_core::types::{MemoryRecord, OwnerId};
use parley_core::vector::{blob_to_vec, vec_to_blob};
use rusqlite::params;

use super::{conversion_err, parse_timestamp, to_timestamp};
use crate::database::{Database, map_tr_err};

pub async fn insert_memory(db: &Database, record: &MemoryRecord) -> Result<(), ParleyError> {
    let id = record.id.clone();
    let owner = record.owner_id.as_str().to_string();
    let fact = record.fact.clone();
    let blob = vec_to_blob(&record.embedding);
    let created_at = to_timestamp(&record.created_at);
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO memories (id, owner_id, fact, embedding, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, owner, fact, blob, created_at],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// All records of one owner, newest first.
pub async fn memories_for_owner(
    db: &Database,
    owner: &OwnerId,
) -> Result<Vec<MemoryRecord>, ParleyError> {
    let owner_str = owner.as_str().to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<MemoryRecord>, rusqlite::Error> {
            let mut stmt = conn.prepare_cached(
                "SELECT id, owner_id, fact, embedding, created_at
                 FROM memories WHERE owner_id = ?1 ORDER BY created_at DESC",
            )?;
            let rows = stmt.query_map(params![owner_str], |row| {
                let owner: String = row.get(1)?;
                let blob: Vec<u8> = row.get(3)?;
                let created_at: String = row.get(4)?;
                Ok(MemoryRecord {
                    id: row.get(0)?,
                    owner_id: OwnerId::new(owner).map_err(|e| conversion_err(1, e))?,
                    fact: row.get(2)?,
                    embedding: blob_to_vec(&blob),
                    created_at: parse_timestamp(4, &created_at)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn count_for_owner(db: &Database, owner: &OwnerId) -> Result<usize, ParleyError> {
    let owner = owner.as_str().to_string();
    db.connection()
        .call(move |conn| -> Result<i64, rusqlite::Error> {
            conn.query_row(
                "SELECT COUNT(*) FROM memories WHERE owner_id = ?1",
                params![owner],
                |row| row.get(0),
            )
        })
        .await
        .map(|n| usize::try_from(n).unwrap_or(0))
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn record(owner: &str, fact: &str, age_secs: i64) -> MemoryRecord {
        MemoryRecord {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: OwnerId::new(owner).unwrap(),
            fact: fact.into(),
            embedding: vec![1.0, 0.5],
            created_at: Utc::now() - Duration::seconds(age_secs),
        }
    }

    #[tokio::test]
    async fn owner_filter_and_ordering() {
        let db = Database::open_in_memory().await.unwrap();
        insert_memory(&db, &record("u1", "older", 60)).await.unwrap();
        insert_memory(&db, &record("u1", "newer", 0)).await.unwrap();
        insert_memory(&db, &record("u2", "other", 0)).await.unwrap();

        let owner = OwnerId::new("u1").unwrap();
        let rows = memories_for_owner(&db, &owner).await.unwrap();
        let facts: Vec<_> = rows.iter().map(|r| r.fact.as_str()).collect();
        assert_eq!(facts, vec!["newer", "older"]);
        assert_eq!(rows[0].embedding, vec![1.0, 0.5]);
        assert_eq!(count_for_owner(&db, &owner).await.unwrap(), 2);
    }
}
