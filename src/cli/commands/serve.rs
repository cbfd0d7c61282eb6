//! HTTP API server for the chat frontend.
//!
//! Provides the chat endpoint, manual management and the rendered charts.

use crate::assistant::Assistant;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::error::TyrewiseError;
use crate::orchestrator::Orchestrator;
use crate::rag::Conversation;
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::{error, info};

/// Largest accepted manual upload.
const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Shared application state.
pub(crate) struct AppState {
    orchestrator: Orchestrator,
    assistant: Assistant,
    conversation: Mutex<Conversation>,
}

/// Run the HTTP API server.
pub async fn run_serve(host: &str, port: u16, settings: Settings) -> anyhow::Result<()> {
    if let Err(e) = preflight::check(Operation::Chat) {
        Output::error(&format!("{}", e));
        Output::info("Run 'tyrewise doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings.clone())?;
    let assistant = Assistant::from_settings(
        &settings,
        orchestrator.vector_store(),
        orchestrator.embedder(),
    )?;

    let artifacts_dir = settings.artifacts_dir();
    std::fs::create_dir_all(&artifacts_dir)?;

    let state = Arc::new(AppState {
        orchestrator,
        assistant,
        conversation: Mutex::new(Conversation::new(settings.rag.max_history)),
    });

    let app = router(state).nest_service("/graphs", ServeDir::new(&artifacts_dir));

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Tyrewise API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET    /health");
    Output::kv("Chat", "POST   /chat");
    Output::kv("List manuals", "GET    /manuals");
    Output::kv("Upload manual", "POST   /manuals");
    Output::kv("Delete manual", "DELETE /manuals/{filename}");
    Output::kv("Charts", "GET    /graphs/{id}.png");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

/// API routes, open to any origin.
pub(crate) fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/chat", post(chat))
        .route(
            "/manuals",
            get(list_manuals)
                .post(upload_manual)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/manuals/{filename}", delete(delete_manual))
        .layer(cors)
        .with_state(state)
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct ChatRequest {
    message: String,
}

#[derive(Serialize)]
struct ChatResponse {
    response: String,
    image: Option<String>,
    url: Option<String>,
}

#[derive(Serialize)]
struct ManualListResponse {
    files: Vec<String>,
}

#[derive(Serialize)]
struct UploadResponse {
    filename: String,
    chunks_indexed: usize,
}

#[derive(Serialize)]
struct DeleteResponse {
    deleted: String,
    chunks_removed: usize,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, error: impl ToString) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}

fn status_for(e: &TyrewiseError) -> StatusCode {
    match e {
        TyrewiseError::ManualNotFound(_) => StatusCode::NOT_FOUND,
        TyrewiseError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// One turn against the shared conversation, recorded only on success.
async fn chat(State(state): State<Arc<AppState>>, Json(req): Json<ChatRequest>) -> Response {
    let snapshot = state.conversation.lock().await.clone();

    match state.assistant.respond(&snapshot, &req.message).await {
        Ok(outcome) => {
            state.conversation.lock().await.record(outcome.exchange);
            Json(ChatResponse {
                response: outcome.text,
                image: outcome.image.map(|path| path.display().to_string()),
                url: outcome.url,
            })
            .into_response()
        }
        Err(e) => {
            error!("Chat turn failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}

async fn list_manuals(State(state): State<Arc<AppState>>) -> Response {
    match state.orchestrator.library().list() {
        Ok(files) => Json(ManualListResponse { files }).into_response(),
        Err(e) => error_response(status_for(&e), e),
    }
}

async fn upload_manual(State(state): State<Arc<AppState>>, mut multipart: Multipart) -> Response {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return error_response(StatusCode::BAD_REQUEST, e),
        };

        if field.name() != Some("file") {
            continue;
        }

        let Some(filename) = field.file_name().map(str::to_string) else {
            return error_response(StatusCode::BAD_REQUEST, "Upload has no file name");
        };
        let bytes = match field.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => return error_response(StatusCode::BAD_REQUEST, e),
        };

        let path = match state.orchestrator.library().save(&filename, &bytes) {
            Ok(path) => path,
            Err(e) => return error_response(status_for(&e), e),
        };

        return match state.orchestrator.index_manual(&path).await {
            Ok(chunks_indexed) => {
                info!("Indexed uploaded manual {} ({} chunks)", filename, chunks_indexed);
                Json(UploadResponse {
                    filename,
                    chunks_indexed,
                })
                .into_response()
            }
            Err(e) => error_response(status_for(&e), e),
        };
    }

    error_response(StatusCode::BAD_REQUEST, "Missing multipart field 'file'")
}

async fn delete_manual(State(state): State<Arc<AppState>>, Path(filename): Path<String>) -> Response {
    match state.orchestrator.remove_manual(&filename).await {
        Ok(chunks_removed) => Json(DeleteResponse {
            deleted: filename,
            chunks_removed,
        })
        .into_response(),
        Err(e) => error_response(status_for(&e), e),
    }
}
