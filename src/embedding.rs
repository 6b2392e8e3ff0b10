//! Query and chunk embeddings.
//!
//! The only correctness requirement here is that ingestion and search embed
//! text through the same function; semantic quality is explicitly not a
//! goal of the built-in scheme. Real model-backed providers plug in behind
//! [`Embedder`] without touching the chunker, index client, or orchestrator.

use std::collections::HashMap;

use async_trait::async_trait;

pub const DEFAULT_DIMENSION: usize = 1024;

const HASH_MULTIPLIER: u64 = 31;
const HASH_MODULUS: u64 = 2_147_483_647;
/// Three independent hash seeds spread each token over three slots.
const HASH_SEEDS: [u64; 3] = [31, 37, 41];
const SEED_WEIGHTS: [f32; 3] = [1.0, 0.7, 0.5];
/// Tokens this short carry little signal and are dropped.
const MIN_TOKEN_CHARS: usize = 3;

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;
    fn dimension(&self) -> usize;
}

/// Deterministic hashing embedder: token frequency and position weights
/// accumulated into hashed slots, L2-normalized. Pure, no I/O.
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    /// Synchronous body; the trait impl defers here.
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let tokens = tokenize(text);
        let mut vector = vec![0.0f32; self.dimension];
        if tokens.is_empty() {
            return vector;
        }

        let mut frequency: HashMap<&str, usize> = HashMap::new();
        for token in &tokens {
            *frequency.entry(token.as_str()).or_insert(0) += 1;
        }

        for (position, token) in tokens.iter().enumerate() {
            let tf_weight = (1.0 + frequency[token.as_str()] as f32).ln();
            let position_weight = 1.0 / ((position as f32) + 1.0).sqrt();
            let weight = tf_weight * position_weight;

            for (seed, scale) in HASH_SEEDS.iter().zip(SEED_WEIGHTS) {
                let slot = (seeded_hash(token, *seed) % self.dimension as u64) as usize;
                vector[slot] += weight * scale;
            }
        }

        let magnitude = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Lowercase, replace punctuation with spaces, drop short tokens.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .chars()
        .map(|ch| {
            if ch.is_alphanumeric() || ch == '_' {
                ch
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .filter(|word| word.chars().count() >= MIN_TOKEN_CHARS)
        .map(str::to_string)
        .collect()
}

fn seeded_hash(token: &str, seed: u64) -> u64 {
    let mut hash = seed;
    for byte in token.bytes() {
        hash = (hash * HASH_MULTIPLIER + u64::from(byte)) % HASH_MODULUS;
    }
    hash
}
