pub type IngestResult<T> = std::result::Result<T, IngestError>;

/// Typed failures surfaced by the ingestion path.
///
/// Search-side failures never appear here: the query path degrades to empty
/// result sets instead of erroring, while ingestion failures must reach the
/// caller so a bad upload is rejected rather than silently dropped.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("unsupported file kind: {0}")]
    UnsupportedFileKind(String),

    /// The file itself is bad; retrying the same bytes will fail again.
    #[error("text extraction failed: {0}")]
    ExtractionFailed(String),

    /// Batches before `batch` are already committed; only the failed batch
    /// and later ones need to be retried.
    #[error("vector index upsert failed at batch {batch}: {source:#}")]
    IndexUpsertFailed { batch: usize, source: anyhow::Error },
}
