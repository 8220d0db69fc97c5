// SPDX-FileCopyrightText: 2026 Palaver Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Knowledge retrieval trait.

use async_trait::async_trait;

use crate::error::PalaverError;
use crate::traits::adapter::PluginAdapter;
use crate::types::KnowledgeChunk;

/// Returns the most relevant previously ingested chunks for a tenant.
#[async_trait]
pub trait KnowledgeRetriever: PluginAdapter {
    /// At most `top_k` chunks, best first, scoped to `organization_id`.
    async fn retrieve(
        &self,
        query: &str,
        organization_id: &str,
        top_k: usize,
    ) -> Result<Vec<KnowledgeChunk>, PalaverError>;
}
