//! Vector index orchestration: embedding chunks and queries, batching
//! upserts, and mapping remote failures to the engine's degradation rules.

pub mod memory;
pub mod remote;

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::embedding::Embedder;
use crate::error::{IngestError, IngestResult};
use crate::types::{Chunk, SearchResult};

use remote::{IndexMatch, MetadataFilter, QueryRequest, RemoteIndex, VectorMetadata, VectorRecord};

/// Remote upsert calls carry at most this many vectors each.
pub const UPSERT_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone, Serialize)]
pub struct KnowledgeStats {
    pub tenant_id: String,
    pub total_vectors: u64,
    pub dimension: usize,
}

/// Embeds chunks and queries through one shared [`Embedder`] and talks to
/// the remote similarity index.
///
/// Failure semantics are asymmetric on purpose: upsert failures surface as
/// typed errors because silent knowledge-base loss is unacceptable, while
/// search failures collapse to empty result sets so the conversational flow
/// stays responsive.
pub struct KnowledgeIndex {
    remote: Arc<dyn RemoteIndex>,
    embedder: Arc<dyn Embedder>,
}

impl KnowledgeIndex {
    pub fn new(remote: Arc<dyn RemoteIndex>, embedder: Arc<dyn Embedder>) -> Self {
        Self { remote, embedder }
    }

    /// Embed and upsert `chunks`, returning vector ids in input order.
    ///
    /// Batches already committed before a failure stay committed; the error
    /// names the batch that failed so the caller can retry from there.
    pub async fn upsert_chunks(&self, chunks: &[Chunk]) -> IngestResult<Vec<String>> {
        let mut records = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let values = self.embedder.embed(&chunk.text).await.map_err(|source| {
                IngestError::IndexUpsertFailed {
                    batch: records.len() / UPSERT_BATCH_SIZE,
                    source,
                }
            })?;
            records.push(VectorRecord {
                id: chunk.id.clone(),
                values,
                metadata: VectorMetadata {
                    category: chunk.category.clone(),
                    tenant_id: chunk.tenant_id.clone(),
                    source_document: chunk.source_document.clone(),
                    text: chunk.text.clone(),
                    title: chunk.title.clone(),
                    created_at: Utc::now().to_rfc3339(),
                },
            });
        }

        let total_batches = records.len().div_ceil(UPSERT_BATCH_SIZE);
        let mut vector_ids = Vec::with_capacity(records.len());
        for (batch_index, batch) in records.chunks(UPSERT_BATCH_SIZE).enumerate() {
            self.remote
                .upsert(batch.to_vec())
                .await
                .map_err(|source| IngestError::IndexUpsertFailed {
                    batch: batch_index,
                    source,
                })?;
            vector_ids.extend(batch.iter().map(|record| record.id.clone()));
            info!(
                batch = batch_index + 1,
                total = total_batches,
                "Upserted vector batch"
            );
        }

        Ok(vector_ids)
    }

    /// Top-`top_k` similarity matches for `query`, scoped to `tenant_id`.
    ///
    /// Any failure (embedding, transport, remote status) degrades to an
    /// empty result set, as does a query that embeds to the zero vector.
    pub async fn search(
        &self,
        query: &str,
        tenant_id: Option<&str>,
        top_k: usize,
    ) -> Vec<SearchResult> {
        let vector = match self.embedder.embed(query).await {
            Ok(vector) => vector,
            Err(err) => {
                warn!(?err, "Query embedding failed; returning no matches");
                return Vec::new();
            }
        };
        if vector.iter().all(|value| *value == 0.0) {
            return Vec::new();
        }

        let request = QueryRequest {
            vector,
            top_k,
            filter: tenant_id.map(MetadataFilter::tenant),
            include_metadata: true,
        };

        match self.remote.query(request).await {
            Ok(matches) => matches.into_iter().filter_map(result_from_match).collect(),
            Err(err) => {
                warn!(?err, "Vector index search failed; returning no matches");
                Vec::new()
            }
        }
    }

    /// Delete a tenant's vectors, optionally narrowed to one source
    /// document. Failures are reported as `false`, not errors.
    pub async fn delete_by_tenant(&self, tenant_id: &str, source_document: Option<&str>) -> bool {
        let mut filter = MetadataFilter::tenant(tenant_id);
        if let Some(source) = source_document {
            filter = filter.with_source(source);
        }

        match self.remote.delete(filter).await {
            Ok(()) => {
                info!(tenant = tenant_id, "Deleted knowledge base vectors");
                true
            }
            Err(err) => {
                warn!(?err, tenant = tenant_id, "Knowledge base delete failed");
                false
            }
        }
    }

    /// Index statistics for a tenant; zeroed counts when the remote call
    /// fails.
    pub async fn stats(&self, tenant_id: &str) -> KnowledgeStats {
        match self
            .remote
            .stats(Some(MetadataFilter::tenant(tenant_id)))
            .await
        {
            Ok(stats) => KnowledgeStats {
                tenant_id: tenant_id.to_string(),
                total_vectors: stats.total_vectors,
                dimension: if stats.dimension > 0 {
                    stats.dimension
                } else {
                    self.embedder.dimension()
                },
            },
            Err(err) => {
                warn!(?err, tenant = tenant_id, "Knowledge base stats failed");
                KnowledgeStats {
                    tenant_id: tenant_id.to_string(),
                    total_vectors: 0,
                    dimension: self.embedder.dimension(),
                }
            }
        }
    }
}

fn result_from_match(hit: IndexMatch) -> Option<SearchResult> {
    let metadata = hit.metadata?;
    Some(SearchResult {
        id: hit.id,
        score: hit.score,
        tenant_id: metadata.tenant_id,
        category: metadata.category,
        source_document: metadata.source_document,
        text: metadata.text,
        title: metadata.title,
    })
}
