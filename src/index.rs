use crate::chunking::TextChunk;
use crate::gemini::Embedding;
use anyhow::Result;

/// A chunk returned by a similarity search together with its score
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub chunk: TextChunk,
    pub score: f32,
}

/// In-memory vector index over the chunks of a single uploaded file.
///
/// Built once per upload and replaced wholesale on the next one; there are
/// no update or delete operations.
pub struct VectorIndex {
    entries: Vec<(Embedding, TextChunk)>,
}

impl VectorIndex {
    /// Build the index from matching chunk and embedding sequences
    pub fn build(chunks: Vec<TextChunk>, embeddings: Vec<Embedding>) -> Result<Self> {
        if chunks.len() != embeddings.len() {
            return Err(anyhow::anyhow!(
                "Chunk/embedding count mismatch: {} chunks, {} embeddings",
                chunks.len(),
                embeddings.len()
            ));
        }

        Ok(VectorIndex {
            entries: embeddings.into_iter().zip(chunks).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Return the `k` chunks nearest to the query under cosine similarity,
    /// best first
    pub fn retrieve(&self, query: &Embedding, k: usize) -> Vec<RetrievedChunk> {
        let mut scored: Vec<RetrievedChunk> = self
            .entries
            .iter()
            .map(|(embedding, chunk)| RetrievedChunk {
                chunk: chunk.clone(),
                score: cosine_similarity(&embedding.values, &query.values),
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        scored
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}
