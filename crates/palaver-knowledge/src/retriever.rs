// SPDX-FileCopyrightText: 2026 Palaver Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! BM25 retriever and text ingestion.

use std::sync::Arc;

use async_trait::async_trait;
use palaver_config::model::KnowledgeConfig;
use palaver_core::types::KnowledgeChunk;
use palaver_core::{AdapterType, HealthStatus, KnowledgeRetriever, PalaverError, PluginAdapter};
use tracing::debug;

use crate::chunker::chunk_text;
use crate::store::KnowledgeStore;

/// Maps a BM25 rank (negative, lower is better) to `0.0..1.0`.
fn normalize_rank(rank: f32) -> f32 {
    let relevance = (-rank).max(0.0);
    relevance / (1.0 + relevance)
}

/// FTS5-backed retriever scoped per organization.
pub struct FtsRetriever {
    store: Arc<KnowledgeStore>,
    config: KnowledgeConfig,
}

impl FtsRetriever {
    pub fn new(store: Arc<KnowledgeStore>, config: KnowledgeConfig) -> Self {
        Self { store, config }
    }

    /// Chunks `text` and indexes it under `source`, replacing anything
    /// previously ingested with the same source name. Returns the chunk count.
    pub async fn ingest(
        &self,
        organization_id: &str,
        source: &str,
        text: &str,
    ) -> Result<usize, PalaverError> {
        let chunks = chunk_text(text, self.config.chunk_size);
        let replaced = self.store.delete_source(organization_id, source).await?;
        let count = chunks.len();
        if count > 0 {
            self.store
                .insert_chunks(organization_id, source, chunks)
                .await?;
        }
        debug!(organization_id, source, chunks = count, replaced, "knowledge ingested");
        Ok(count)
    }
}

#[async_trait]
impl PluginAdapter for FtsRetriever {
    fn name(&self) -> &str {
        "fts5"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Retrieval
    }

    async fn health_check(&self) -> Result<HealthStatus, PalaverError> {
        if self.config.enabled {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Degraded("knowledge retrieval disabled".into()))
        }
    }

    async fn shutdown(&self) -> Result<(), PalaverError> {
        Ok(())
    }
}

#[async_trait]
impl KnowledgeRetriever for FtsRetriever {
    async fn retrieve(
        &self,
        query: &str,
        organization_id: &str,
        top_k: usize,
    ) -> Result<Vec<KnowledgeChunk>, PalaverError> {
        if !self.config.enabled || top_k == 0 {
            return Ok(Vec::new());
        }
        let mut chunks = self.store.search_bm25(organization_id, query, top_k).await?;
        for chunk in &mut chunks {
            chunk.score = normalize_rank(chunk.score);
        }
        chunks.retain(|c| c.score >= self.config.min_score);
        Ok(chunks)
    }
}
