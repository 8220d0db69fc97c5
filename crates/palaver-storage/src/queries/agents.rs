// SPDX-FileCopyrightText: 2026 Palaver Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Agent records.

use palaver_core::PalaverError;
use palaver_core::types::Agent;
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};

pub async fn create_agent(db: &Database, agent: &Agent) -> Result<(), PalaverError> {
    let agent = agent.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO agents (id, organization_id, name, prompt, active, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    agent.id,
                    agent.organization_id,
                    agent.name,
                    agent.prompt,
                    agent.active,
                    agent.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_agent(db: &Database, id: &str) -> Result<Option<Agent>, PalaverError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT id, organization_id, name, prompt, active, created_at
                 FROM agents WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Agent {
                        id: row.get(0)?,
                        organization_id: row.get(1)?,
                        name: row.get(2)?,
                        prompt: row.get(3)?,
                        active: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Returns `false` when no agent has that id.
pub async fn set_agent_active(db: &Database, id: &str, active: bool) -> Result<bool, PalaverError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE agents SET active = ?1 WHERE id = ?2",
                params![active, id],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn count_agents(db: &Database, organization_id: &str) -> Result<i64, PalaverError> {
    let organization_id = organization_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM agents WHERE organization_id = ?1",
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
    use crate::queries::fixtures::{agent, seeded_db};

    #[tokio::test]
    async fn pause_and_resume() {
        let (db, _dir) = seeded_db().await;
        assert!(set_agent_active(&db, "agent-1", false).await.unwrap());
        assert!(!get_agent(&db, "agent-1").await.unwrap().unwrap().active);
        assert!(set_agent_active(&db, "agent-1", true).await.unwrap());
        assert!(get_agent(&db, "agent-1").await.unwrap().unwrap().active);
    }

    #[tokio::test]
    async fn pausing_unknown_agent_reports_false() {
        let (db, _dir) = seeded_db().await;
        assert!(!set_agent_active(&db, "ghost", false).await.unwrap());
    }

    #[tokio::test]
    async fn counts_are_per_organization() {
        let (db, _dir) = seeded_db().await;
        create_agent(&db, &agent("agent-2", "org-1")).await.unwrap();
        assert_eq!(count_agents(&db, "org-1").await.unwrap(), 2);
        assert_eq!(count_agents(&db, "org-2").await.unwrap(), 0);
    }
}
