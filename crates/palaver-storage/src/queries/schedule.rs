// SPDX-FileCopyrightText: 2026 Palaver Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scheduled items created from model output.

use palaver_core::PalaverError;
use palaver_core::types::ScheduledItem;
use rusqlite::params;

use crate::database::{Database, map_tr_err};

pub async fn create_scheduled_item(db: &Database, item: &ScheduledItem) -> Result<(), PalaverError> {
    let item = item.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO scheduled_items
                     (id, organization_id, contact_id, subject, scheduled_for, summary, client, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    item.id,
                    item.organization_id,
                    item.contact_id,
                    item.subject,
                    item.scheduled_for,
                    item.summary,
                    item.client,
                    item.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Ordered by scheduled date.
pub async fn list_scheduled_items(
    db: &Database,
    organization_id: &str,
) -> Result<Vec<ScheduledItem>, PalaverError> {
    let organization_id = organization_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, organization_id, contact_id, subject, scheduled_for, summary, client, created_at
                 FROM scheduled_items WHERE organization_id = ?1
                 ORDER BY scheduled_for ASC",
            )?;
            let items = stmt
                .query_map(params![organization_id], |row| {
                    Ok(ScheduledItem {
                        id: row.get(0)?,
                        organization_id: row.get(1)?,
                        contact_id: row.get(2)?,
                        subject: row.get(3)?,
                        scheduled_for: row.get(4)?,
                        summary: row.get(5)?,
                        client: row.get(6)?,
                        created_at: row.get(7)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(items)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::contacts::find_or_create_contact;
    use crate::queries::fixtures::seeded_db;

    #[tokio::test]
    async fn items_list_in_date_order() {
        let (db, _dir) = seeded_db().await;
        let contact = find_or_create_contact(&db, "org-1", "123", "Ana").await.unwrap();
        for (id, when) in [("late", "2026-05-02 09:00"), ("early", "2026-05-01 14:30")] {
            let item = ScheduledItem {
                id: id.into(),
                organization_id: "org-1".into(),
                contact_id: contact.id.clone(),
                subject: "Haircut".into(),
                scheduled_for: when.into(),
                summary: "Short on the sides".into(),
                client: "Ana".into(),
                created_at: "2026-04-30T12:00:00.000Z".into(),
            };
            create_scheduled_item(&db, &item).await.unwrap();
        }
        let items = list_scheduled_items(&db, "org-1").await.unwrap();
        let ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["early", "late"]);
    }
}
