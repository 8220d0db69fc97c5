// SPDX-FileCopyrightText: 2026 Palaver Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only conversation log.

use palaver_core::PalaverError;
use palaver_core::types::Message;
use rusqlite::params;

use crate::database::{Database, map_tr_err};
use crate::queries::parse_column;

pub async fn insert_message(db: &Database, msg: &Message) -> Result<(), PalaverError> {
    let msg = msg.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO messages (id, session_id, contact_id, role, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    msg.id,
                    msg.session_id,
                    msg.contact_id,
                    msg.role.to_string(),
                    msg.content,
                    msg.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Newest first. Ties on `created_at` fall back to insertion order.
pub async fn recent_messages(
    db: &Database,
    session_id: &str,
    contact_id: &str,
    limit: usize,
) -> Result<Vec<Message>, PalaverError> {
    let session_id = session_id.to_string();
    let contact_id = contact_id.to_string();
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, session_id, contact_id, role, content, created_at
                 FROM messages
                 WHERE session_id = ?1 AND contact_id = ?2
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?3",
            )?;
            let messages = stmt
                .query_map(params![session_id, contact_id, limit], |row| {
                    Ok(Message {
                        id: row.get(0)?,
                        session_id: row.get(1)?,
                        contact_id: row.get(2)?,
                        role: parse_column(row, 3)?,
                        content: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(messages)
        })
        .await
        .map_err(map_tr_err)
}

/// User-role messages from the organization's contacts at or after `since`.
pub async fn count_user_messages_since(
    db: &Database,
    organization_id: &str,
    since: &str,
) -> Result<i64, PalaverError> {
    let organization_id = organization_id.to_string();
    let since = since.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM messages m
                 JOIN contacts c ON c.id = m.contact_id
                 WHERE c.organization_id = ?1 AND m.role = 'user' AND m.created_at >= ?2",
                params![organization_id, since],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::contacts::find_or_create_contact;
    use crate::queries::fixtures::seeded_db;
    use palaver_core::types::MessageRole;

    fn message(n: u32, contact_id: &str, role: MessageRole) -> Message {
        Message {
            id: format!("m{n}"),
            session_id: "sess-1".into(),
            contact_id: contact_id.into(),
            role,
            content: format!("message {n}"),
            created_at: format!("2026-03-01T10:{n:02}:00.000Z"),
        }
    }

    #[tokio::test]
    async fn recent_messages_are_newest_first_and_bounded() {
        let (db, _dir) = seeded_db().await;
        let contact = find_or_create_contact(&db, "org-1", "123", "Ana").await.unwrap();
        for n in 0..15 {
            let role = if n % 2 == 0 { MessageRole::User } else { MessageRole::Assistant };
            insert_message(&db, &message(n, &contact.id, role)).await.unwrap();
        }

        let recent = recent_messages(&db, "sess-1", &contact.id, 10).await.unwrap();
        assert_eq!(recent.len(), 10);
        assert_eq!(recent[0].content, "message 14");
        assert_eq!(recent[9].content, "message 5");
        assert_eq!(recent[0].role, MessageRole::User);
    }

    #[tokio::test]
    async fn history_is_scoped_to_contact() {
        let (db, _dir) = seeded_db().await;
        let ana = find_or_create_contact(&db, "org-1", "1", "Ana").await.unwrap();
        let bo = find_or_create_contact(&db, "org-1", "2", "Bo").await.unwrap();
        insert_message(&db, &message(1, &ana.id, MessageRole::User)).await.unwrap();
        insert_message(&db, &message(2, &bo.id, MessageRole::User)).await.unwrap();

        let recent = recent_messages(&db, "sess-1", &ana.id, 10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, "m1");
    }

    #[tokio::test]
    async fn counts_only_user_messages_since_cutoff() {
        let (db, _dir) = seeded_db().await;
        let contact = find_or_create_contact(&db, "org-1", "123", "Ana").await.unwrap();
        insert_message(&db, &message(1, &contact.id, MessageRole::User)).await.unwrap();
        insert_message(&db, &message(20, &contact.id, MessageRole::User)).await.unwrap();
        insert_message(&db, &message(21, &contact.id, MessageRole::Assistant)).await.unwrap();

        let count = count_user_messages_since(&db, "org-1", "2026-03-01T10:10:00.000Z")
            .await
            .unwrap();
        assert_eq!(count, 1);
        let other = count_user_messages_since(&db, "org-2", "2026-01-01T00:00:00.000Z")
            .await
            .unwrap();
        assert_eq!(other, 0);
    }
}
