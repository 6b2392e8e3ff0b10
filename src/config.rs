use std::env;

use crate::chunker::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use crate::embedding::DEFAULT_DIMENSION;
use crate::memory::{DEFAULT_MAX_HISTORY, DEFAULT_RECENT_HISTORY};

/// Connection settings for the remote vector index service.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    pub base_url: String,
    pub api_token: Option<String>,
    pub namespace: String,
    pub search_timeout_ms: u64,
    pub upsert_timeout_ms: u64,
}

impl IndexConfig {
    const BASE_URL_VARS: [&'static str; 2] = ["KB_INDEX_BASE_URL", "DESKMIND_INDEX_BASE_URL"];
    const API_TOKEN_VARS: [&'static str; 2] = ["KB_INDEX_API_TOKEN", "DESKMIND_INDEX_API_TOKEN"];
    const NAMESPACE_VARS: [&'static str; 2] = ["KB_INDEX_NAMESPACE", "DESKMIND_INDEX_NAMESPACE"];
    const SEARCH_TIMEOUT_VARS: [&'static str; 1] = ["KB_INDEX_SEARCH_TIMEOUT_MS"];
    const UPSERT_TIMEOUT_VARS: [&'static str; 1] = ["KB_INDEX_UPSERT_TIMEOUT_MS"];

    pub fn from_env() -> anyhow::Result<Self> {
        let base_url = read_env(&Self::BASE_URL_VARS).ok_or_else(|| {
            anyhow::anyhow!("Set KB_INDEX_BASE_URL to point at the vector index service")
        })?;
        let namespace =
            read_env(&Self::NAMESPACE_VARS).unwrap_or_else(|| "knowledge-base".to_string());
        let search_timeout_ms = read_env(&Self::SEARCH_TIMEOUT_VARS)
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(5_000);
        let upsert_timeout_ms = read_env(&Self::UPSERT_TIMEOUT_VARS)
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(30_000);

        Ok(Self {
            base_url,
            api_token: read_env(&Self::API_TOKEN_VARS),
            namespace,
            search_timeout_ms,
            upsert_timeout_ms,
        })
    }
}

/// Tunables for chunking, retrieval, and conversation memory.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub vector_dim: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub max_context_chunks: usize,
    pub max_history: usize,
    pub recent_history: usize,
}

impl EngineConfig {
    const VECTOR_DIM_VARS: [&'static str; 2] = ["KB_VECTOR_DIM", "DESKMIND_VECTOR_DIM"];
    const CHUNK_SIZE_VARS: [&'static str; 1] = ["KB_CHUNK_SIZE"];
    const CHUNK_OVERLAP_VARS: [&'static str; 1] = ["KB_CHUNK_OVERLAP"];
    const TOP_K_VARS: [&'static str; 1] = ["KB_TOP_K"];
    const MAX_CONTEXT_VARS: [&'static str; 1] = ["KB_MAX_CONTEXT_CHUNKS"];
    const MAX_HISTORY_VARS: [&'static str; 1] = ["KB_MAX_HISTORY"];
    const RECENT_HISTORY_VARS: [&'static str; 1] = ["KB_RECENT_HISTORY"];

    const DEFAULT_TOP_K: usize = 10;
    const DEFAULT_MAX_CONTEXT_CHUNKS: usize = 5;

    pub fn from_env() -> Self {
        Self {
            vector_dim: read_usize(&Self::VECTOR_DIM_VARS, DEFAULT_DIMENSION),
            chunk_size: read_usize(&Self::CHUNK_SIZE_VARS, DEFAULT_CHUNK_SIZE),
            chunk_overlap: read_usize(&Self::CHUNK_OVERLAP_VARS, DEFAULT_CHUNK_OVERLAP),
            top_k: read_usize(&Self::TOP_K_VARS, Self::DEFAULT_TOP_K),
            max_context_chunks: read_usize(&Self::MAX_CONTEXT_VARS, Self::DEFAULT_MAX_CONTEXT_CHUNKS),
            max_history: read_usize(&Self::MAX_HISTORY_VARS, DEFAULT_MAX_HISTORY),
            recent_history: read_usize(&Self::RECENT_HISTORY_VARS, DEFAULT_RECENT_HISTORY),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            vector_dim: DEFAULT_DIMENSION,
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            top_k: Self::DEFAULT_TOP_K,
            max_context_chunks: Self::DEFAULT_MAX_CONTEXT_CHUNKS,
            max_history: DEFAULT_MAX_HISTORY,
            recent_history: DEFAULT_RECENT_HISTORY,
        }
    }
}

fn read_env(candidates: &[&'static str]) -> Option<String> {
    candidates.iter().find_map(|key| env::var(key).ok())
}

fn read_usize(candidates: &[&'static str], default: usize) -> usize {
    read_env(candidates)
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}
