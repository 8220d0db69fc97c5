// SPDX-FileCopyrightText: 2026 Palaver Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite-backed chunk store with an FTS5 index.
//!
//! The `knowledge_chunks` table and its `knowledge_fts` shadow index come
//! from the storage migrations; triggers keep the index in sync.

use palaver_core::PalaverError;
use palaver_core::types::KnowledgeChunk;
use tokio_rusqlite::Connection;

fn storage_err(e: tokio_rusqlite::Error) -> PalaverError {
    PalaverError::Storage {
        source: Box::new(e),
    }
}

/// Turns free text into an FTS5 query: each term quoted, joined with OR.
///
/// Returns `None` when the text has no searchable terms.
pub(crate) fn fts_query(text: &str) -> Option<String> {
    let terms: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 2)
        .map(|t| format!("\"{}\"", t.to_lowercase()))
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}

/// Persistent chunk store.
#[derive(Clone)]
pub struct KnowledgeStore {
    conn: Connection,
}

impl KnowledgeStore {
    /// Wraps a connection whose database has the knowledge schema applied.
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Inserts chunks for one source in a single transaction. Returns their ids.
    pub async fn insert_chunks(
        &self,
        organization_id: &str,
        source: &str,
        chunks: Vec<String>,
    ) -> Result<Vec<String>, PalaverError> {
        let organization_id = organization_id.to_string();
        let source = source.to_string();
        let created_at = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let mut ids = Vec::with_capacity(chunks.len());
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO knowledge_chunks (id, organization_id, source, content, created_at)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                    )?;
                    for content in chunks {
                        let id = uuid::Uuid::new_v4().to_string();
                        stmt.execute(rusqlite::params![
                            id,
                            organization_id,
                            source,
                            content,
                            created_at
                        ])?;
                        ids.push(id);
                    }
                }
                tx.commit()?;
                Ok(ids)
            })
            .await
            .map_err(storage_err)
    }

    /// Removes every chunk ingested under `source`. Returns how many went.
    pub async fn delete_source(
        &self,
        organization_id: &str,
        source: &str,
    ) -> Result<usize, PalaverError> {
        let organization_id = organization_id.to_string();
        let source = source.to_string();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "DELETE FROM knowledge_chunks WHERE organization_id = ?1 AND source = ?2",
                    rusqlite::params![organization_id, source],
                )
            })
            .await
            .map_err(storage_err)
    }

    pub async fn count(&self, organization_id: &str) -> Result<i64, PalaverError> {
        let organization_id = organization_id.to_string();
        self.conn
            .call(move |conn| {
                conn.query_row(
                    "SELECT COUNT(*) FROM knowledge_chunks WHERE organization_id = ?1",
                    rusqlite::params![organization_id],
                    |row| row.get(0),
                )
            })
            .await
            .map_err(storage_err)
    }

    /// BM25 search within one organization.
    ///
    /// Returned chunks carry the raw BM25 rank in `score`: negative, and
    /// more negative is more relevant.
    pub async fn search_bm25(
        &self,
        organization_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<KnowledgeChunk>, PalaverError> {
        let Some(fts) = fts_query(query) else {
            return Ok(Vec::new());
        };
        let organization_id = organization_id.to_string();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT k.id, k.organization_id, k.source, k.content, bm25(knowledge_fts) AS rank
                     FROM knowledge_fts
                     JOIN knowledge_chunks k ON k.rowid = knowledge_fts.rowid
                     WHERE knowledge_fts MATCH ?1 AND k.organization_id = ?2
                     ORDER BY rank
                     LIMIT ?3",
                )?;
                let chunks = stmt
                    .query_map(rusqlite::params![fts, organization_id, limit], |row| {
                        let rank: f64 = row.get(4)?;
                        Ok(KnowledgeChunk {
                            id: row.get(0)?,
                            organization_id: row.get(1)?,
                            source: row.get(2)?,
                            content: row.get(3)?,
                            score: rank as f32,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(chunks)
            })
            .await
            .map_err(storage_err)
    }
}
