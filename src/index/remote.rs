//! Wire types and HTTP transport for the external vector index service.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::IndexConfig;

/// Externally stored projection of a chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: VectorMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorMetadata {
    pub category: String,
    pub tenant_id: String,
    pub source_document: String,
    pub text: String,
    pub title: String,
    pub created_at: String,
}

/// Equality filter over vector metadata, serialized as
/// `{"tenant_id": {"$eq": "..."}}`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetadataFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<EqFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_document: Option<EqFilter>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EqFilter {
    #[serde(rename = "$eq")]
    pub eq: String,
}

impl MetadataFilter {
    pub fn tenant(tenant_id: &str) -> Self {
        Self {
            tenant_id: Some(EqFilter {
                eq: tenant_id.to_string(),
            }),
            source_document: None,
        }
    }

    pub fn with_source(mut self, source_document: &str) -> Self {
        self.source_document = Some(EqFilter {
            eq: source_document.to_string(),
        });
        self
    }

    /// Local evaluation of the same predicate the remote applies; used by
    /// the in-memory backend.
    pub fn matches(&self, metadata: &VectorMetadata) -> bool {
        self.tenant_id
            .as_ref()
            .is_none_or(|filter| metadata.tenant_id == filter.eq)
            && self
                .source_document
                .as_ref()
                .is_none_or(|filter| metadata.source_document == filter.eq)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryRequest {
    pub vector: Vec<f32>,
    #[serde(rename = "topK")]
    pub top_k: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<MetadataFilter>,
    #[serde(rename = "includeMetadata")]
    pub include_metadata: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexMatch {
    pub id: String,
    #[serde(default)]
    pub score: f32,
    #[serde(default)]
    pub metadata: Option<VectorMetadata>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct IndexStats {
    #[serde(rename = "totalVectorCount", default)]
    pub total_vectors: u64,
    #[serde(default)]
    pub dimension: usize,
}

/// The remote similarity-search surface. One HTTP implementation talks to
/// the real service; an in-memory one backs tests and config-less runs.
#[async_trait]
pub trait RemoteIndex: Send + Sync {
    async fn upsert(&self, records: Vec<VectorRecord>) -> anyhow::Result<()>;
    async fn query(&self, request: QueryRequest) -> anyhow::Result<Vec<IndexMatch>>;
    async fn delete(&self, filter: MetadataFilter) -> anyhow::Result<()>;
    async fn stats(&self, filter: Option<MetadataFilter>) -> anyhow::Result<IndexStats>;
}

#[derive(Serialize)]
struct UpsertBody<'a> {
    vectors: &'a [VectorRecord],
    namespace: &'a str,
}

#[derive(Serialize)]
struct QueryBody<'a> {
    #[serde(flatten)]
    request: &'a QueryRequest,
    namespace: &'a str,
}

#[derive(Serialize)]
struct DeleteBody<'a> {
    filter: &'a MetadataFilter,
    namespace: &'a str,
}

#[derive(Serialize)]
struct StatsBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<&'a MetadataFilter>,
    namespace: &'a str,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<IndexMatch>,
}

/// Minimal HTTP client for the vector index's REST surface.
pub struct HttpVectorIndex {
    http: reqwest::Client,
    config: IndexConfig,
}

impl HttpVectorIndex {
    pub fn new(config: IndexConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .context("Failed to build vector index HTTP client")?;
        Ok(Self { http, config })
    }

    fn endpoint(&self, path: &str) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }

    fn apply_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(token) = &self.config.api_token {
            builder.bearer_auth(token)
        } else {
            builder
        }
    }

    /// POST a JSON payload under a per-call deadline; search-adjacent calls
    /// stay short while bulk ingestion calls are allowed more time.
    async fn post_json<T: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        payload: &T,
        timeout_ms: u64,
    ) -> anyhow::Result<R> {
        let response = self
            .apply_auth(self.http.post(self.endpoint(path)))
            .timeout(Duration::from_millis(timeout_ms.max(1)))
            .json(payload)
            .send()
            .await
            .with_context(|| format!("vector index request '{path}' failed"))?
            .error_for_status()
            .with_context(|| format!("vector index request '{path}' returned error status"))?;

        response
            .json::<R>()
            .await
            .with_context(|| format!("failed to deserialize vector index '{path}' response"))
    }
}

#[async_trait]
impl RemoteIndex for HttpVectorIndex {
    async fn upsert(&self, records: Vec<VectorRecord>) -> anyhow::Result<()> {
        let body = UpsertBody {
            vectors: &records,
            namespace: &self.config.namespace,
        };
        let _: serde_json::Value = self
            .post_json("vectors/upsert", &body, self.config.upsert_timeout_ms)
            .await?;
        Ok(())
    }

    async fn query(&self, request: QueryRequest) -> anyhow::Result<Vec<IndexMatch>> {
        let body = QueryBody {
            request: &request,
            namespace: &self.config.namespace,
        };
        let response: QueryResponse = self
            .post_json("query", &body, self.config.search_timeout_ms)
            .await?;
        Ok(response.matches)
    }

    async fn delete(&self, filter: MetadataFilter) -> anyhow::Result<()> {
        let body = DeleteBody {
            filter: &filter,
            namespace: &self.config.namespace,
        };
        let _: serde_json::Value = self
            .post_json("vectors/delete", &body, self.config.search_timeout_ms)
            .await?;
        Ok(())
    }

    async fn stats(&self, filter: Option<MetadataFilter>) -> anyhow::Result<IndexStats> {
        let body = StatsBody {
            filter: filter.as_ref(),
            namespace: &self.config.namespace,
        };
        self.post_json("describe_index_stats", &body, self.config.search_timeout_ms)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_request_serializes_expected_wire_shape() {
        let request = QueryRequest {
            vector: vec![0.5, 0.5],
            top_k: 10,
            filter: Some(MetadataFilter::tenant("acme")),
            include_metadata: true,
        };

        let value = serde_json::to_value(&request).expect("serialize");
        assert_eq!(value["topK"], 10);
        assert_eq!(value["includeMetadata"], true);
        assert_eq!(value["filter"]["tenant_id"]["$eq"], "acme");
        assert!(value["filter"].get("source_document").is_none());
    }

    #[test]
    fn filter_matches_narrow_by_tenant_and_source() {
        let metadata = VectorMetadata {
            category: "General Knowledge".into(),
            tenant_id: "acme".into(),
            source_document: "faq.md".into(),
            text: "t".into(),
            title: "t".into(),
            created_at: "2026-01-01T00:00:00Z".into(),
        };

        assert!(MetadataFilter::tenant("acme").matches(&metadata));
        assert!(!MetadataFilter::tenant("globex").matches(&metadata));
        assert!(MetadataFilter::tenant("acme")
            .with_source("faq.md")
            .matches(&metadata));
        assert!(!MetadataFilter::tenant("acme")
            .with_source("other.md")
            .matches(&metadata));
        assert!(MetadataFilter::default().matches(&metadata));
    }
}
