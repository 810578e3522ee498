use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_EMBEDDING_MODEL: &str = "models/embedding-001";
const DEFAULT_GENERATION_MODEL: &str = "models/gemini-1.5-flash";

/// Maximum number of texts the batch embedding endpoint accepts per request
const EMBED_BATCH_LIMIT: usize = 100;

/// Configuration for Gemini API
#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub embedding_model: String,
    pub generation_model: String,
}

impl GeminiConfig {
    /// Create a new configuration from environment variables.
    ///
    /// A missing or empty GOOGLE_API_KEY is not an error here: the first
    /// remote call fails with the API's own authentication error instead.
    pub fn from_env() -> Self {
        GeminiConfig {
            api_key: env::var("GOOGLE_API_KEY").unwrap_or_default(),
            base_url: env::var("GEMINI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            embedding_model: env::var("GEMINI_EMBEDDING_MODEL")
                .unwrap_or_else(|_| DEFAULT_EMBEDDING_MODEL.to_string()),
            generation_model: env::var("GEMINI_GENERATION_MODEL")
                .unwrap_or_else(|_| DEFAULT_GENERATION_MODEL.to_string()),
        }
    }
}

/// Representation of a vector embedding
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Embedding {
    pub values: Vec<f32>,
}

/// Client for interacting with Gemini API
#[derive(Clone)]
pub struct GeminiClient {
    config: GeminiConfig,
    client: reqwest::Client,
}

impl GeminiClient {
    /// Create a new Gemini client
    pub fn new(config: GeminiConfig) -> Self {
        let client = reqwest::Client::new();
        GeminiClient { config, client }
    }

    /// Get the client configuration
    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    /// Generate an embedding for a single text
    pub async fn embed_text(&self, text: &str) -> Result<Embedding> {
        let request = EmbedRequest {
            model: &self.config.embedding_model,
            content: Content::user_text(text),
        };

        let url = format!(
            "{}/{}:embedContent?key={}",
            self.config.base_url, self.config.embedding_model, self.config.api_key
        );

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow::anyhow!(
                "Embedding request failed: {} {}",
                status,
                error_text
            ));
        }

        let response_data: EmbedResponse = response.json().await?;

        Ok(response_data.embedding)
    }

    /// Generate embeddings for a batch of texts.
    ///
    /// The batch endpoint caps one request at [`EMBED_BATCH_LIMIT`] texts,
    /// so larger batches are split across several requests.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(EMBED_BATCH_LIMIT) {
            embeddings.extend(self.embed_batch_request(batch).await?);
        }
        Ok(embeddings)
    }

    /// One `batchEmbedContents` request for at most [`EMBED_BATCH_LIMIT`] texts
    async fn embed_batch_request(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let requests: Vec<EmbedRequest> = texts
            .iter()
            .map(|text| EmbedRequest {
                model: &self.config.embedding_model,
                content: Content::user_text(text),
            })
            .collect();

        let request = BatchEmbedRequest { requests };

        let url = format!(
            "{}/{}:batchEmbedContents?key={}",
            self.config.base_url, self.config.embedding_model, self.config.api_key
        );

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow::anyhow!(
                "Batch embedding request failed: {} {}",
                status,
                error_text
            ));
        }

        let response_data: BatchEmbedResponse = response.json().await?;

        if response_data.embeddings.len() != texts.len() {
            return Err(anyhow::anyhow!(
                "Embedding count mismatch: sent {} texts, received {} embeddings",
                texts.len(),
                response_data.embeddings.len()
            ));
        }

        Ok(response_data.embeddings)
    }

    /// Generate text from a prompt
    pub async fn generate_text(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            contents: vec![Content::user_text(prompt)],
            generation_config: GenerationConfig {
                temperature: 0.2,
                top_p: 0.8,
                top_k: 40,
                max_output_tokens: 1024,
            },
        };

        let url = format!(
            "{}/{}:generateContent?key={}",
            self.config.base_url, self.config.generation_model, self.config.api_key
        );

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow::anyhow!(
                "Generation request failed: {} {}",
                status,
                error_text
            ));
        }

        let response_data: GenerateResponse = response
            .json()
            .await
            .context("Failed to decode generation response")?;

        // Extract the generated text from the response
        response_data
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| anyhow::anyhow!("No response generated"))
    }

    /// Generate a response based on retrieved context and the user's question
    pub async fn generate_answer(&self, context: &str, question: &str) -> Result<String> {
        let prompt = format!("Context: {}\n\nQuestion: {}", context, question);
        self.generate_text(&prompt).await
    }
}

// Shared request/response structures for the Gemini API

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
    role: &'static str,
}

impl<'a> Content<'a> {
    fn user_text(text: &'a str) -> Self {
        Content {
            parts: vec![Part { text }],
            role: "user",
        }
    }
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    content: Content<'a>,
}

#[derive(Deserialize, Debug)]
struct EmbedResponse {
    embedding: Embedding,
}

#[derive(Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedRequest<'a>>,
}

#[derive(Deserialize, Debug)]
struct BatchEmbedResponse {
    embeddings: Vec<Embedding>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: i32,
}

#[derive(Deserialize, Debug)]
struct GenerateResponse {
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Deserialize, Debug)]
struct ResponseContent {
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    text: String,
}
