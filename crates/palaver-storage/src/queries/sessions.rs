// SPDX-FileCopyrightText: 2026 Palaver Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session records.

use palaver_core::PalaverError;
use palaver_core::types::{Session, SessionStatus};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};
use crate::queries::{now_timestamp, parse_column};

const SESSION_COLUMNS: &str = "id, agent_id, kind, status, qr_code, created_at, updated_at";

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get(0)?,
        agent_id: row.get(1)?,
        kind: parse_column(row, 2)?,
        status: parse_column(row, 3)?,
        qr_code: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

pub async fn create_session(db: &Database, session: &Session) -> Result<(), PalaverError> {
    let session = session.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO sessions (id, agent_id, kind, status, qr_code, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    session.id,
                    session.agent_id,
                    session.kind.to_string(),
                    session.status.to_string(),
                    session.qr_code,
                    session.created_at,
                    session.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_session(db: &Database, id: &str) -> Result<Option<Session>, PalaverError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"),
                params![id],
                row_to_session,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Writes status and pairing code together. A missing row is not an error.
pub async fn update_session_status(
    db: &Database,
    id: &str,
    status: SessionStatus,
    qr_code: Option<&str>,
) -> Result<(), PalaverError> {
    let id = id.to_string();
    let qr_code = qr_code.map(str::to_string);
    let updated_at = now_timestamp();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE sessions SET status = ?1, qr_code = ?2, updated_at = ?3 WHERE id = ?4",
                params![status.to_string(), qr_code, updated_at, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Returns `false` when the row was already gone.
pub async fn delete_session(db: &Database, id: &str) -> Result<bool, PalaverError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let deleted = conn.execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
            Ok(deleted > 0)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn list_sessions_by_status(
    db: &Database,
    status: SessionStatus,
) -> Result<Vec<Session>, PalaverError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions WHERE status = ?1 ORDER BY created_at ASC"
            ))?;
            let sessions = stmt
                .query_map(params![status.to_string()], row_to_session)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(sessions)
        })
        .await
        .map_err(map_tr_err)
}

/// Sessions owned by any of the organization's agents.
pub async fn count_sessions(db: &Database, organization_id: &str) -> Result<i64, PalaverError> {
    let organization_id = organization_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM sessions s
                 JOIN agents a ON a.id = s.agent_id
                 WHERE a.organization_id = ?1",
                params![organization_id],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::fixtures::{seeded_db, session};
    use palaver_core::types::SessionKind;

    #[tokio::test]
    async fn status_transitions_persist_pairing_code() {
        let (db, _dir) = seeded_db().await;

        update_session_status(&db, "sess-1", SessionStatus::QrReady, Some("2@abc"))
            .await
            .unwrap();
        let s = get_session(&db, "sess-1").await.unwrap().unwrap();
        assert_eq!(s.status, SessionStatus::QrReady);
        assert_eq!(s.qr_code.as_deref(), Some("2@abc"));

        update_session_status(&db, "sess-1", SessionStatus::Connected, None)
            .await
            .unwrap();
        let s = get_session(&db, "sess-1").await.unwrap().unwrap();
        assert_eq!(s.status, SessionStatus::Connected);
        assert!(s.qr_code.is_none());
    }

    #[tokio::test]
    async fn updating_missing_session_is_ok() {
        let (db, _dir) = seeded_db().await;
        update_session_status(&db, "ghost", SessionStatus::Connected, None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn delete_reports_whether_row_existed() {
        let (db, _dir) = seeded_db().await;
        assert!(delete_session(&db, "sess-1").await.unwrap());
        assert!(!delete_session(&db, "sess-1").await.unwrap());
        assert!(get_session(&db, "sess-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_by_status_and_count() {
        let (db, _dir) = seeded_db().await;
        let mut playground = session("sess-2", "agent-1");
        playground.kind = SessionKind::Playground;
        playground.status = SessionStatus::Connected;
        create_session(&db, &playground).await.unwrap();

        let connected = list_sessions_by_status(&db, SessionStatus::Connected)
            .await
            .unwrap();
        assert_eq!(connected.len(), 1);
        assert_eq!(connected[0].id, "sess-2");
        assert_eq!(connected[0].kind, SessionKind::Playground);
        assert_eq!(count_sessions(&db, "org-1").await.unwrap(), 2);
    }
}
