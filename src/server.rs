use anyhow::Context;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::document;
use crate::index::VectorIndex;
use crate::rag::RagEngine;

/// Characters of each source chunk shown in the answer
const PREVIEW_CHARS: usize = 200;

const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// The index built for the currently uploaded file
pub struct IndexedDocument {
    pub file_name: String,
    pub index: VectorIndex,
}

/// Shared application state: the engine plus at most one live index
#[derive(Clone)]
pub struct AppState {
    engine: Arc<RagEngine>,
    current: Arc<RwLock<Option<IndexedDocument>>>,
}

impl AppState {
    pub fn new(engine: RagEngine) -> Self {
        AppState {
            engine: Arc::new(engine),
            current: Arc::new(RwLock::new(None)),
        }
    }

    /// Replace the live index. The previous file's index is dropped
    /// entirely, so answers never mix files.
    pub async fn install(&self, document: IndexedDocument) {
        let mut guard = self.current.write().await;
        if let Some(previous) = guard.as_ref() {
            info!("Discarding index for {}", previous.file_name);
        }
        *guard = Some(document);
    }
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_page))
        .route("/upload", post(upload_file))
        .route("/ask", post(ask_question))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

/// Bind and serve until the process is stopped
pub async fn serve(state: AppState, host: &str, port: u16) -> anyhow::Result<()> {
    let address = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;

    info!("Listening on http://{}", address);

    axum::serve(listener, router(state))
        .await
        .context("Server error")?;

    Ok(())
}

async fn index_page() -> Html<&'static str> {
    Html(include_str!("../assets/index.html"))
}

#[derive(Serialize)]
struct UploadResponse {
    file_name: String,
    chunks: usize,
}

/// POST /upload - run the whole intake pipeline for one multipart file
async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .context("Failed to read multipart field")?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field
            .file_name()
            .map(|name| name.to_string())
            .unwrap_or_else(|| "upload.txt".to_string());
        // Keep only the final path component from the browser-supplied name
        let file_name = Path::new(&file_name)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.txt".to_string());

        let data = field.bytes().await.context("Failed to read uploaded file")?;
        info!("Received {} ({} bytes)", file_name, data.len());

        // Loaders read from disk, so stage the upload in a temp directory
        let staging = tempfile::tempdir().context("Failed to create temp directory")?;
        let staged_path = staging.path().join(&file_name);
        std::fs::write(&staged_path, &data).context("Failed to write uploaded file")?;

        let documents = document::load_documents(&staged_path)?;
        let index = state.engine.index_documents(&documents).await?;
        let chunks = index.len();

        state
            .install(IndexedDocument {
                file_name: file_name.clone(),
                index,
            })
            .await;

        info!("Indexed {} into {} chunks", file_name, chunks);
        return Ok(Json(UploadResponse { file_name, chunks }));
    }

    Err(AppError::bad_request("Missing 'file' field in upload"))
}

#[derive(Deserialize)]
struct AskRequest {
    question: String,
}

#[derive(Serialize)]
struct SourceRef {
    preview: String,
    source: String,
    page: Option<u32>,
    score: f32,
}

#[derive(Serialize)]
struct AskResponse {
    answer: String,
    sources: Vec<SourceRef>,
}

/// POST /ask - answer a question against the current index
async fn ask_question(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    let question = request.question.trim();
    // Gate before any remote call
    if question.is_empty() {
        return Err(AppError::bad_request("Question must not be empty"));
    }

    let guard = state.current.read().await;
    let Some(current) = guard.as_ref() else {
        return Err(AppError::conflict("No document has been uploaded yet"));
    };

    info!("Question about {}: {}", current.file_name, question);
    let answer = state.engine.answer(&current.index, question).await?;

    let sources = answer
        .sources
        .iter()
        .map(|retrieved| SourceRef {
            preview: preview(&retrieved.chunk.text, PREVIEW_CHARS),
            source: retrieved.chunk.source.clone(),
            page: retrieved.chunk.page,
            score: retrieved.score,
        })
        .collect();

    Ok(Json(AskResponse {
        answer: answer.text,
        sources,
    }))
}

/// The first `max` characters of a chunk for display
fn preview(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}....", &text[..cut]),
        None => text.to_string(),
    }
}

/// Adapter rendering handler failures as plain HTTP responses with the full
/// error chain, the way the framework would show an uncaught failure
pub struct AppError {
    status: StatusCode,
    error: anyhow::Error,
}

impl AppError {
    fn bad_request(message: &'static str) -> Self {
        AppError {
            status: StatusCode::BAD_REQUEST,
            error: anyhow::anyhow!(message),
        }
    }

    fn conflict(message: &'static str) -> Self {
        AppError {
            status: StatusCode::CONFLICT,
            error: anyhow::anyhow!(message),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("Request failed: {:#}", self.error);
        }
        (self.status, format!("{:#}", self.error)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::TextChunk;
    use crate::gemini::{Embedding, GeminiClient, GeminiConfig};
    use axum::body::Body;
    use axum::http::{header, Request};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        // Points at localhost so an accidental remote call cannot leave the
        // machine; these tests never reach the network anyway
        let config = GeminiConfig {
            api_key: String::new(),
            base_url: "http://127.0.0.1:9".to_string(),
            embedding_model: "models/embedding-001".to_string(),
            generation_model: "models/gemini-1.5-flash".to_string(),
        };
        AppState::new(RagEngine::new(GeminiClient::new(config)))
    }

    fn fake_index(source: &str) -> VectorIndex {
        let chunks = vec![TextChunk {
            text: format!("content of {}", source),
            source: source.to_string(),
            page: None,
        }];
        let embeddings = vec![Embedding {
            values: vec![1.0, 0.0],
        }];
        VectorIndex::build(chunks, embeddings).unwrap()
    }

    fn ask(question: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/ask")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(format!("{{\"question\":{:?}}}", question)))
            .unwrap()
    }

    #[tokio::test]
    async fn test_index_page_served() {
        let app = router(test_state());
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let page = String::from_utf8(body.to_vec()).unwrap();
        assert!(page.contains("type=\"file\""));
        assert!(page.contains(".pdf,.docx,.txt"));
    }

    #[tokio::test]
    async fn test_empty_question_is_rejected_before_retrieval() {
        let state = test_state();
        state
            .install(IndexedDocument {
                file_name: "a.txt".to_string(),
                index: fake_index("a.txt"),
            })
            .await;

        // A non-empty question would hit the network; a blank one must be
        // rejected before that
        let response = router(state).oneshot(ask("   ")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_upload_without_file_field_is_rejected() {
        let boundary = "test-boundary";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"other\"\r\n\r\nvalue\r\n--{b}--\r\n",
            b = boundary
        );
        let request = Request::builder()
            .method("POST")
            .uri("/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .unwrap();

        let response = router(test_state()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_question_without_upload_is_rejected() {
        let response = router(test_state())
            .oneshot(ask("what is this about?"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_reupload_replaces_previous_index() {
        let state = test_state();
        state
            .install(IndexedDocument {
                file_name: "first.txt".to_string(),
                index: fake_index("first.txt"),
            })
            .await;
        state
            .install(IndexedDocument {
                file_name: "second.txt".to_string(),
                index: fake_index("second.txt"),
            })
            .await;

        let guard = state.current.read().await;
        let current = guard.as_ref().unwrap();
        assert_eq!(current.file_name, "second.txt");

        // Retrieval over the live index only ever sees the second file
        let query = Embedding {
            values: vec![1.0, 0.0],
        };
        let results = current.index.retrieve(&query, 10);
        assert!(!results.is_empty());
        assert!(results.iter().all(|r| r.chunk.source == "second.txt"));
    }

    #[test]
    fn test_preview_truncates_long_chunks() {
        let text = "x".repeat(300);
        let shown = preview(&text, PREVIEW_CHARS);
        assert_eq!(shown.len(), PREVIEW_CHARS + 4);
        assert!(shown.ends_with("...."));

        assert_eq!(preview("short", PREVIEW_CHARS), "short");
    }
}
