//! Splits normalized document text into overlapping retrieval chunks.
//!
//! Long sections are cut into windows of roughly `target_size` characters
//! with `overlap` characters shared between neighbors, preferring to cut at
//! sentence terminators so chunks read as coherent passages.

use uuid::Uuid;

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Sections at or below this many characters are discarded as noise.
const MIN_SECTION_LEN: usize = 50;
/// The sentence-boundary search may not pull the cut earlier than this
/// fraction of the window.
const SENTENCE_SEARCH_FLOOR: f64 = 0.7;
/// First sentences at or above this length fall back to a word-prefix title.
const MAX_TITLE_LEN: usize = 100;
const TITLE_PREFIX_WORDS: usize = 10;

/// Validated sizing for the overlap-window chunker.
#[derive(Debug, Clone, Copy)]
pub struct ChunkParams {
    pub target_size: usize,
    pub overlap: usize,
}

impl ChunkParams {
    pub fn new(target_size: usize, overlap: usize) -> anyhow::Result<Self> {
        anyhow::ensure!(target_size > 0, "chunk target size must be positive");
        anyhow::ensure!(
            overlap < target_size,
            "chunk overlap {overlap} must be smaller than target size {target_size}"
        );
        Ok(Self {
            target_size,
            overlap,
        })
    }
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            target_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// A chunk before tenant and category attribution.
#[derive(Debug, Clone)]
pub struct ChunkText {
    pub id: String,
    pub title: String,
    pub text: String,
}

/// Chunk `text` into titled, overlapping pieces.
pub fn chunk(text: &str, source_label: &str, params: ChunkParams) -> Vec<ChunkText> {
    let clean = normalize_whitespace(text);
    if clean.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    for section in split_into_sections(&clean) {
        if section.chars().count() <= params.target_size {
            chunks.push(make_chunk(section, source_label));
        } else {
            for piece in split_with_overlap(&section, params) {
                chunks.push(make_chunk(piece, source_label));
            }
        }
    }
    chunks
}

/// Collapse all whitespace runs to single spaces and trim.
fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split normalized text into logical sections at sentence ends (`.` or `;`
/// followed by whitespace and an uppercase letter). Sections at or below
/// [`MIN_SECTION_LEN`] characters are dropped; if nothing survives, the
/// whole text is one section.
fn split_into_sections(clean: &str) -> Vec<String> {
    let chars: Vec<char> = clean.chars().collect();
    let mut sections = Vec::new();
    let mut current = String::new();

    let mut i = 0;
    while i < chars.len() {
        let ch = chars[i];
        if (ch == '.' || ch == ';') && chars.get(i + 1).is_some_and(|c| c.is_whitespace()) {
            let mut next = i + 1;
            while next < chars.len() && chars[next].is_whitespace() {
                next += 1;
            }
            if chars.get(next).is_some_and(|c| c.is_uppercase()) {
                sections.push(std::mem::take(&mut current));
                i = next;
                continue;
            }
        }
        current.push(ch);
        i += 1;
    }
    sections.push(current);

    let kept: Vec<String> = sections
        .into_iter()
        .map(|section| section.trim().to_string())
        .filter(|section| section.chars().count() > MIN_SECTION_LEN)
        .collect();

    if kept.is_empty() {
        vec![clean.to_string()]
    } else {
        kept
    }
}

/// Slide a window of `target_size` characters across the section with a step
/// of `target_size - overlap`, pulling each cut back to the nearest sentence
/// terminator as long as it lies past [`SENTENCE_SEARCH_FLOOR`] of the window.
fn split_with_overlap(section: &str, params: ChunkParams) -> Vec<String> {
    let chars: Vec<char> = section.chars().collect();
    let mut pieces = Vec::new();
    let mut start = 0usize;

    while start < chars.len() {
        let mut end = (start + params.target_size).min(chars.len());

        if end < chars.len() {
            let floor = start + (params.target_size as f64 * SENTENCE_SEARCH_FLOOR) as usize;
            if let Some(offset) = chars[start..end]
                .iter()
                .rposition(|c| matches!(c, '.' | '!' | '?'))
            {
                let terminator = start + offset;
                if terminator > floor {
                    end = terminator + 1;
                }
            }
        }

        let piece: String = chars[start..end].iter().collect();
        let piece = piece.trim().to_string();
        if !piece.is_empty() {
            pieces.push(piece);
        }

        if end >= chars.len() {
            break;
        }
        // The window always advances even when the pullback left less than
        // `overlap` characters of new text.
        start = if end > start + params.overlap {
            end - params.overlap
        } else {
            end
        };
    }

    pieces
}

fn make_chunk(text: String, source_label: &str) -> ChunkText {
    let title = chunk_title(&text, source_label);
    ChunkText {
        id: Uuid::new_v4().to_string(),
        title,
        text,
    }
}

/// Title a chunk by its first sentence, or its first few words suffixed with
/// the source label when the first sentence runs long.
fn chunk_title(text: &str, source_label: &str) -> String {
    let first_sentence = text
        .split(['.', '!', '?'])
        .next()
        .map(str::trim)
        .unwrap_or_default();

    if !first_sentence.is_empty() && first_sentence.chars().count() < MAX_TITLE_LEN {
        return first_sentence.to_string();
    }

    let prefix: Vec<&str> = text.split(' ').take(TITLE_PREFIX_WORDS).collect();
    format!("{}... (from {})", prefix.join(" "), source_label)
}
