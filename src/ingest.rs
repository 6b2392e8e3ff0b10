//! Knowledge base ingestion: extract text from an upload, chunk it, and
//! push the chunk vectors into the index.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::chunker::{self, ChunkParams};
use crate::error::IngestResult;
use crate::extract::{self, FileKind};
use crate::index::KnowledgeIndex;
use crate::types::{Chunk, Document};

pub const DEFAULT_CATEGORY: &str = "General Knowledge";

/// A raw uploaded file as handed over by the (out-of-scope) upload layer.
/// Size ceilings and extension filtering happen before this point.
#[derive(Debug, Clone)]
pub struct Upload {
    pub name: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub document: Document,
    pub chunks_processed: usize,
    pub vector_ids: Vec<String>,
}

pub struct IngestPipeline {
    index: Arc<KnowledgeIndex>,
    params: ChunkParams,
}

impl IngestPipeline {
    pub fn new(index: Arc<KnowledgeIndex>, params: ChunkParams) -> Self {
        Self { index, params }
    }

    /// Run one upload through extract -> chunk -> upsert.
    ///
    /// Extraction errors are non-retryable (the file is bad); an upsert
    /// error identifies the failed batch, and batches before it remain
    /// indexed.
    pub async fn ingest_document(
        &self,
        upload: Upload,
        tenant_id: &str,
        category: Option<&str>,
    ) -> IngestResult<IngestReport> {
        let kind = FileKind::from_name_or_mime(&upload.name, upload.mime_type.as_deref())?;
        let text = extract::extract(&upload.bytes, kind)?;
        let category = category.unwrap_or(DEFAULT_CATEGORY);

        let document = Document {
            id: blake3::hash(&upload.bytes).to_hex().to_string(),
            tenant_id: tenant_id.to_string(),
            category: category.to_string(),
            source_name: upload.name.clone(),
            kind,
            byte_len: upload.bytes.len(),
        };

        let chunks: Vec<Chunk> = chunker::chunk(&text, &upload.name, self.params)
            .into_iter()
            .map(|piece| Chunk {
                id: piece.id,
                tenant_id: tenant_id.to_string(),
                category: category.to_string(),
                source_document: upload.name.clone(),
                title: piece.title,
                text: piece.text,
            })
            .collect();

        let vector_ids = self.index.upsert_chunks(&chunks).await?;
        info!(
            tenant = tenant_id,
            source = %upload.name,
            chunks = chunks.len(),
            "Processed knowledge base document"
        );

        Ok(IngestReport {
            document,
            chunks_processed: chunks.len(),
            vector_ids,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;
    use crate::error::IngestError;
    use crate::index::memory::MemoryVectorIndex;

    fn pipeline() -> (IngestPipeline, Arc<KnowledgeIndex>) {
        let index = Arc::new(KnowledgeIndex::new(
            Arc::new(MemoryVectorIndex::default()),
            Arc::new(HashEmbedder::new(256)),
        ));
        (
            IngestPipeline::new(index.clone(), ChunkParams::default()),
            index,
        )
    }

    fn upload(name: &str, body: &str) -> Upload {
        Upload {
            name: name.to_string(),
            mime_type: None,
            bytes: body.as_bytes().to_vec(),
        }
    }

    fn long_document() -> String {
        (0..55)
            .map(|i| format!("this is sentence number {i} about the support handbook content."))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[tokio::test]
    async fn ingest_then_search_round_trip() {
        let (pipeline, index) = pipeline();
        let mut body = long_document();
        body.truncate(3000);

        let report = pipeline
            .ingest_document(upload("handbook.txt", &body), "acme", None)
            .await
            .expect("ingest");

        assert!((3..=4).contains(&report.chunks_processed));
        assert_eq!(report.vector_ids.len(), report.chunks_processed);
        assert_eq!(report.document.tenant_id, "acme");
        assert_eq!(report.document.category, DEFAULT_CATEGORY);
        assert_eq!(report.document.byte_len, body.len());

        let results = index
            .search("sentence number 30 about the support handbook", Some("acme"), 10)
            .await;
        assert!(!results.is_empty());
        assert_eq!(results[0].source_document, "handbook.txt");
    }

    #[tokio::test]
    async fn custom_category_is_attached_to_every_vector() {
        let (pipeline, index) = pipeline();

        pipeline
            .ingest_document(
                upload(
                    "billing.txt",
                    "invoices are issued at the start of every month and are payable within thirty days",
                ),
                "acme",
                Some("Billing"),
            )
            .await
            .expect("ingest");

        let results = index.search("invoices payable thirty days", Some("acme"), 5).await;
        assert!(!results.is_empty());
        assert!(results.iter().all(|r| r.category == "Billing"));
    }

    #[tokio::test]
    async fn unsupported_upload_is_rejected_before_any_indexing() {
        let (pipeline, index) = pipeline();

        let err = pipeline
            .ingest_document(upload("slides.pptx", "whatever"), "acme", None)
            .await
            .expect_err("pptx should be rejected");
        assert!(matches!(err, IngestError::UnsupportedFileKind(_)));

        let stats = index.stats("acme").await;
        assert_eq!(stats.total_vectors, 0);
    }

    #[tokio::test]
    async fn markdown_upload_is_stripped_before_chunking() {
        let (pipeline, index) = pipeline();

        pipeline
            .ingest_document(
                upload(
                    "faq.md",
                    "# Shipping\n\nOrders ship within **two business days** from our main warehouse location.",
                ),
                "acme",
                None,
            )
            .await
            .expect("ingest");

        let results = index.search("orders ship within two business days", Some("acme"), 5).await;
        assert!(!results.is_empty());
        assert!(!results[0].text.contains('#'));
        assert!(!results[0].text.contains("**"));
    }
}
