// SPDX-FileCopyrightText: 2026 Palaver Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Contact records.
//!
//! `(phone, organization_id)` is unique; [`find_or_create_contact`] relies on
//! that constraint instead of a read-then-write check.

use palaver_core::PalaverError;
use palaver_core::types::Contact;
use rusqlite::params;

use crate::database::{Database, map_tr_err};
use crate::queries::now_timestamp;

fn row_to_contact(row: &rusqlite::Row<'_>) -> rusqlite::Result<Contact> {
    Ok(Contact {
        id: row.get(0)?,
        organization_id: row.get(1)?,
        phone: row.get(2)?,
        name: row.get(3)?,
        tag: row.get(4)?,
        created_at: row.get(5)?,
    })
}

/// Returns the existing contact or inserts a new one. An existing contact
/// keeps its stored name.
pub async fn find_or_create_contact(
    db: &Database,
    organization_id: &str,
    phone: &str,
    name: &str,
) -> Result<Contact, PalaverError> {
    let organization_id = organization_id.to_string();
    let phone = phone.to_string();
    let name = name.to_string();
    let id = uuid::Uuid::new_v4().to_string();
    let created_at = now_timestamp();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO contacts (id, organization_id, phone, name, tag, created_at)
                 VALUES (?1, ?2, ?3, ?4, '', ?5)",
                params![id, organization_id, phone, name, created_at],
            )?;
            conn.query_row(
                "SELECT id, organization_id, phone, name, tag, created_at
                 FROM contacts WHERE phone = ?1 AND organization_id = ?2",
                params![phone, organization_id],
                row_to_contact,
            )
        })
        .await
        .map_err(map_tr_err)
}

pub async fn create_contact(db: &Database, contact: &Contact) -> Result<(), PalaverError> {
    let contact = contact.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO contacts (id, organization_id, phone, name, tag, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    contact.id,
                    contact.organization_id,
                    contact.phone,
                    contact.name,
                    contact.tag,
                    contact.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn count_contacts(db: &Database, organization_id: &str) -> Result<i64, PalaverError> {
    let organization_id = organization_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM contacts WHERE organization_id = ?1",
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
    use crate::queries::fixtures::{organization, seeded_db};
    use crate::queries::organizations::create_organization;

    #[tokio::test]
    async fn repeated_lookups_return_one_contact() {
        let (db, _dir) = seeded_db().await;
        let first = find_or_create_contact(&db, "org-1", "5511999990000", "Ana")
            .await
            .unwrap();
        let second = find_or_create_contact(&db, "org-1", "5511999990000", "Unknown")
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.name, "Ana");
        assert_eq!(count_contacts(&db, "org-1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn concurrent_lookups_converge() {
        let (db, _dir) = seeded_db().await;
        let mut handles = Vec::new();
        for _ in 0..8 {
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                find_or_create_contact(&db, "org-1", "123", "Unknown")
                    .await
                    .unwrap()
                    .id
            }));
        }
        let mut ids = Vec::new();
        for h in handles {
            ids.push(h.await.unwrap());
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(count_contacts(&db, "org-1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn same_phone_in_two_organizations() {
        let (db, _dir) = seeded_db().await;
        create_organization(&db, &organization("org-2", None)).await.unwrap();
        let a = find_or_create_contact(&db, "org-1", "123", "A").await.unwrap();
        let b = find_or_create_contact(&db, "org-2", "123", "B").await.unwrap();
        assert_ne!(a.id, b.id);
    }
}
