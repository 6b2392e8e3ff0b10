//! In-memory stand-in for the remote vector index.
//!
//! Backs tests and runs without a configured index endpoint. Scoring is a
//! dot product, which equals cosine similarity for the normalized vectors
//! the embedder produces.

use std::sync::Mutex;

use anyhow::anyhow;
use async_trait::async_trait;

use super::remote::{
    IndexMatch, IndexStats, MetadataFilter, QueryRequest, RemoteIndex, VectorRecord,
};

#[derive(Default)]
pub struct MemoryVectorIndex {
    records: Mutex<Vec<VectorRecord>>,
}

impl MemoryVectorIndex {
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.records.lock().expect("vector store poisoned").len()
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[async_trait]
impl RemoteIndex for MemoryVectorIndex {
    async fn upsert(&self, incoming: Vec<VectorRecord>) -> anyhow::Result<()> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| anyhow!("vector store lock poisoned"))?;
        for record in incoming {
            match records.iter_mut().find(|existing| existing.id == record.id) {
                Some(existing) => *existing = record,
                None => records.push(record),
            }
        }
        Ok(())
    }

    async fn query(&self, request: QueryRequest) -> anyhow::Result<Vec<IndexMatch>> {
        let records = self
            .records
            .lock()
            .map_err(|_| anyhow!("vector store lock poisoned"))?;

        let mut matches: Vec<IndexMatch> = records
            .iter()
            .filter(|record| {
                request
                    .filter
                    .as_ref()
                    .is_none_or(|filter| filter.matches(&record.metadata))
            })
            .map(|record| IndexMatch {
                id: record.id.clone(),
                score: dot(&request.vector, &record.values),
                metadata: request.include_metadata.then(|| record.metadata.clone()),
            })
            .collect();

        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(request.top_k);
        Ok(matches)
    }

    async fn delete(&self, filter: MetadataFilter) -> anyhow::Result<()> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| anyhow!("vector store lock poisoned"))?;
        records.retain(|record| !filter.matches(&record.metadata));
        Ok(())
    }

    async fn stats(&self, filter: Option<MetadataFilter>) -> anyhow::Result<IndexStats> {
        let records = self
            .records
            .lock()
            .map_err(|_| anyhow!("vector store lock poisoned"))?;

        let scoped: Vec<&VectorRecord> = records
            .iter()
            .filter(|record| {
                filter
                    .as_ref()
                    .is_none_or(|filter| filter.matches(&record.metadata))
            })
            .collect();

        Ok(IndexStats {
            total_vectors: scoped.len() as u64,
            dimension: scoped
                .first()
                .map(|record| record.values.len())
                .unwrap_or_default(),
        })
    }
}
