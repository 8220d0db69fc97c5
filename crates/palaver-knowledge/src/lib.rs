// SPDX-FileCopyrightText: 2026 Palaver Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Knowledge retrieval for Palaver.
//!
//! Tenants ingest free text, which is split into word-bounded chunks and
//! indexed with SQLite FTS5. Retrieval ranks chunks by BM25 within one
//! organization and maps the raw rank onto a `0.0..=1.0` score.

pub mod chunker;
pub mod retriever;
pub mod store;

pub use chunker::chunk_text;
pub use retriever::FtsRetriever;
pub use store::KnowledgeStore;

#[cfg(test)]
pub(crate) mod testing {
    use palaver_storage::Database;
    use palaver_storage::queries::organizations::create_organization;

    use crate::store::KnowledgeStore;

    /// A migrated database with organizations `org-1` and `org-2`.
    pub async fn store() -> (KnowledgeStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("knowledge.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        for id in ["org-1", "org-2"] {
            let org = palaver_core::types::Organization {
                id: id.into(),
                name: id.into(),
                plan_id: None,
                max_agents: None,
                max_sessions: None,
                max_contacts: None,
                daily_message_limit: None,
                created_at: "2026-01-01T00:00:00.000Z".into(),
            };
            create_organization(&db, &org).await.unwrap();
        }
        (KnowledgeStore::new(db.connection().clone()), dir)
    }
}
