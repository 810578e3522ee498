use crate::chunking;
use crate::document::Document;
use crate::gemini::GeminiClient;
use crate::index::{RetrievedChunk, VectorIndex};
use anyhow::Result;
use log::info;

/// Number of chunks retrieved per question
const TOP_K: usize = 4;

/// A generated answer together with the chunks it was grounded on, in rank
/// order
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<RetrievedChunk>,
}

/// RAG (Retrieval-Augmented Generation) engine
pub struct RagEngine {
    gemini: GeminiClient,
}

impl RagEngine {
    /// Create a new RAG engine
    pub fn new(gemini: GeminiClient) -> Self {
        RagEngine { gemini }
    }

    /// Build the vector index for one uploaded file: chunk the documents,
    /// embed the chunks in a batch and pair them up.
    pub async fn index_documents(&self, documents: &[Document]) -> Result<VectorIndex> {
        let chunks = chunking::chunk_documents(documents);
        if chunks.is_empty() {
            return Err(anyhow::anyhow!("Document contains no extractable text"));
        }
        info!("Split into {} chunks", chunks.len());

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let embeddings = self.gemini.embed_batch(&texts).await?;
        info!("Embedded {} chunks", embeddings.len());

        VectorIndex::build(chunks, embeddings)
    }

    /// Answer a question against a built index: embed the question, retrieve
    /// the nearest chunks and hand them to the model as context.
    pub async fn answer(&self, index: &VectorIndex, question: &str) -> Result<Answer> {
        let question_embedding = self.gemini.embed_text(question).await?;

        let retrieved = index.retrieve(&question_embedding, TOP_K);

        let context = retrieved
            .iter()
            .map(|r| r.chunk.text.as_str())
            .collect::<Vec<&str>>()
            .join("\n\n");

        let text = self.gemini.generate_answer(&context, question).await?;

        Ok(Answer {
            text,
            sources: retrieved,
        })
    }
}
