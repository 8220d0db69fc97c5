// SPDX-FileCopyrightText: 2026 Palaver Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Organization and plan records.

use palaver_core::PalaverError;
use palaver_core::types::{Organization, Plan};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};

pub async fn create_plan(db: &Database, plan: &Plan) -> Result<(), PalaverError> {
    let plan = plan.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO plans (id, name, max_agents, max_sessions, max_contacts, daily_message_limit)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    plan.id,
                    plan.name,
                    plan.max_agents,
                    plan.max_sessions,
                    plan.max_contacts,
                    plan.daily_message_limit,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_plan(db: &Database, id: &str) -> Result<Option<Plan>, PalaverError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT id, name, max_agents, max_sessions, max_contacts, daily_message_limit
                 FROM plans WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Plan {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        max_agents: row.get(2)?,
                        max_sessions: row.get(3)?,
                        max_contacts: row.get(4)?,
                        daily_message_limit: row.get(5)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn create_organization(db: &Database, org: &Organization) -> Result<(), PalaverError> {
    let org = org.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO organizations
                     (id, name, plan_id, max_agents, max_sessions, max_contacts, daily_message_limit, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    org.id,
                    org.name,
                    org.plan_id,
                    org.max_agents,
                    org.max_sessions,
                    org.max_contacts,
                    org.daily_message_limit,
                    org.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_organization(
    db: &Database,
    id: &str,
) -> Result<Option<Organization>, PalaverError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT id, name, plan_id, max_agents, max_sessions, max_contacts,
                        daily_message_limit, created_at
                 FROM organizations WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Organization {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        plan_id: row.get(2)?,
                        max_agents: row.get(3)?,
                        max_sessions: row.get(4)?,
                        max_contacts: row.get(5)?,
                        daily_message_limit: row.get(6)?,
                        created_at: row.get(7)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}
