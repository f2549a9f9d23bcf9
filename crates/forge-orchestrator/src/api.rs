//! HTTP API endpoints for the Forge studio.
//!
//! This module provides the REST API a presentation layer drives: submitting
//! prompts, queueing attachments, browsing and managing the project library,
//! and fetching the rendered preview.
//!
//! # Endpoints
//!
//! - `GET /api/status` - Session snapshot
//! - `POST /api/generate` - Generate or refine a site
//! - `POST /api/attachments?name=` - Queue a raw file body as an attachment
//! - `DELETE /api/attachments` - Drop all pending attachments
//! - `DELETE /api/attachments/:name` - Drop one pending attachment
//! - `GET /api/projects` - Library summaries, most recent first
//! - `GET /api/projects/:id` - One saved project
//! - `POST /api/projects/:id/load` - Put a project on display
//! - `DELETE /api/projects/:id?confirm=true` - Delete a project
//! - `GET /api/credential` - Re-check the API key
//! - `GET /preview?viewport=` - Rendered preview of the displayed site
//! - `GET /ws` - Live studio events
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use forge_client::GeminiClient;
//! use forge_orchestrator::{create_router, AppState, Config, EnvCredentialFlow, ProjectStore, Studio};
//!
//! # async fn example() {
//! let config = Config::default();
//! let studio = Studio::new(
//!     Arc::new(GeminiClient::new("key", &config.model)),
//!     Arc::new(EnvCredentialFlow::new(&config.api_key_env)),
//!     ProjectStore::load(&config.store_file).await,
//! );
//!
//! let router = create_router(AppState::new(config, Arc::new(studio)));
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:4173").await.unwrap();
//! axum::serve(listener, router).await.unwrap();
//! # }
//! ```

use std::path::Path as FsPath;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use forge_preview::{PreviewDocument, Viewport};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::attachment::{encode_bytes, guess_mime_type};
use crate::studio::{AttachmentSummary, GenerationOutcome, ProjectSummary, SessionSnapshot, Studio};
use crate::store::SavedProject;
use crate::websocket::ws_handler;
use crate::{Config, ForgeError};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for `POST /api/generate`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GenerateRequest {
    /// Prompt text; the session's pending prompt is used when absent.
    #[serde(default)]
    pub prompt: Option<String>,
    /// Refine the displayed site instead of starting a new project.
    #[serde(default)]
    pub refine: bool,
}

/// Query for `POST /api/attachments`.
#[derive(Debug, Clone, Deserialize)]
pub struct AttachmentQuery {
    /// File name of the attachment.
    pub name: String,
}

/// Query for `DELETE /api/projects/:id`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeleteQuery {
    /// Must be `true`; deletion is irreversible.
    #[serde(default)]
    pub confirm: bool,
}

/// Query for `GET /preview`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PreviewQuery {
    /// Frame the preview at this device width.
    pub viewport: Option<String>,
}

/// Response body for `DELETE /api/projects/:id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    /// Whether a project was removed.
    pub deleted: bool,
}

/// Response body for `DELETE /api/attachments`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearResponse {
    /// Number of attachments dropped.
    pub cleared: usize,
}

/// Response body for `GET /api/credential`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialResponse {
    /// Whether a usable key is available.
    pub valid: bool,
}

/// Error response body returned on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Description of the error.
    pub error: String,
}

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for the HTTP server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Studio configuration.
    pub config: Config,
    /// The orchestrator.
    pub studio: Arc<Studio>,
}

impl AppState {
    /// Creates the state from a configuration and a studio.
    #[must_use]
    pub const fn new(config: Config, studio: Arc<Studio>) -> Self {
        Self { config, studio }
    }
}

// ============================================================================
// API Error Type
// ============================================================================

/// Internal error type for API handlers.
#[derive(Debug)]
enum ApiError {
    /// An orchestrator failure.
    Forge(ForgeError),
    /// The request itself is unacceptable.
    BadRequest(String),
    /// The addressed resource does not exist.
    NotFound(String),
}

impl From<ForgeError> for ApiError {
    fn from(err: ForgeError) -> Self {
        Self::Forge(err)
    }
}

const fn forge_status(err: &ForgeError) -> StatusCode {
    match err {
        ForgeError::GenerationInProgress => StatusCode::CONFLICT,
        ForgeError::ParseError { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        ForgeError::ModelError { .. } => StatusCode::BAD_GATEWAY,
        ForgeError::ProjectNotFound { .. } => StatusCode::NOT_FOUND,
        ForgeError::AttachmentTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        ForgeError::AttachmentRead { .. } | ForgeError::ConfigValidationError { .. } => {
            StatusCode::BAD_REQUEST
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Forge(err) => (forge_status(&err), err.to_string()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        };

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}

// ============================================================================
// Router Setup
// ============================================================================

/// Creates the HTTP router with all endpoints.
///
/// Includes CORS for local front-ends and request tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let body_limit = usize::try_from(state.config.max_attachment_bytes).unwrap_or(usize::MAX);

    let api_routes = Router::new()
        .route("/status", get(handle_status))
        .route("/generate", post(handle_generate))
        .route(
            "/attachments",
            post(handle_add_attachment)
                .layer(DefaultBodyLimit::max(body_limit))
                .delete(handle_clear_attachments),
        )
        .route("/attachments/:name", delete(handle_remove_attachment))
        .route("/projects", get(handle_list_projects))
        .route(
            "/projects/:id",
            get(handle_get_project).delete(handle_delete_project),
        )
        .route("/projects/:id/load", post(handle_load_project))
        .route("/credential", get(handle_credential));

    Router::new()
        .nest("/api", api_routes)
        .route("/preview", get(handle_preview))
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}

// ============================================================================
// Handlers
// ============================================================================

/// Handler for `GET /api/status`.
async fn handle_status(State(state): State<Arc<AppState>>) -> Json<SessionSnapshot> {
    Json(state.studio.snapshot().await)
}

/// Handler for `POST /api/generate`.
async fn handle_generate(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<GenerationOutcome>, ApiError> {
    let prompt = match request.prompt {
        Some(prompt) => prompt,
        None => state.studio.snapshot().await.prompt,
    };
    info!(refine = request.refine, prompt_len = prompt.len(), "Generation requested");

    let outcome = state
        .studio
        .request_generation(&prompt, request.refine)
        .await?;
    Ok(Json(outcome))
}

/// Handler for `POST /api/attachments?name=`.
///
/// The body is the raw file. The MIME type comes from `Content-Type`, or is
/// guessed from the name when the header is missing.
async fn handle_add_attachment(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AttachmentQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<AttachmentSummary>), ApiError> {
    let name = query.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("attachment name must not be empty".to_string()));
    }

    let limit = state.config.max_attachment_bytes;
    let size = u64::try_from(body.len()).unwrap_or(u64::MAX);
    if size > limit {
        warn!(name = %name, size, limit, "Rejecting oversized attachment");
        return Err(ForgeError::attachment_too_large(name, size, limit).into());
    }

    let mime_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map_or_else(|| guess_mime_type(FsPath::new(name)), str::to_string);

    let attachment = encode_bytes(name, &body, mime_type);
    let summary = AttachmentSummary::from(&attachment);
    state.studio.add_attachment(attachment).await;
    Ok((StatusCode::CREATED, Json(summary)))
}

/// Handler for `DELETE /api/attachments`.
async fn handle_clear_attachments(State(state): State<Arc<AppState>>) -> Json<ClearResponse> {
    let cleared = state.studio.clear_attachments().await;
    Json(ClearResponse { cleared })
}

/// Handler for `DELETE /api/attachments/:name`.
async fn handle_remove_attachment(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.studio.remove_attachment(&name).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("No pending attachment named '{name}'")))
    }
}

/// Handler for `GET /api/projects`.
async fn handle_list_projects(State(state): State<Arc<AppState>>) -> Json<Vec<ProjectSummary>> {
    Json(state.studio.project_summaries().await)
}

/// Handler for `GET /api/projects/:id`.
async fn handle_get_project(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SavedProject>, ApiError> {
    state
        .studio
        .project(&id)
        .await
        .map(Json)
        .ok_or_else(|| ForgeError::project_not_found(id).into())
}

/// Handler for `POST /api/projects/:id/load`.
async fn handle_load_project(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SavedProject>, ApiError> {
    Ok(Json(state.studio.load_project(&id).await?))
}

/// Handler for `DELETE /api/projects/:id?confirm=true`.
async fn handle_delete_project(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<DeleteQuery>,
) -> Result<Json<DeleteResponse>, ApiError> {
    if !query.confirm {
        return Err(ApiError::BadRequest(
            "Deleting a project cannot be undone; repeat the request with ?confirm=true".to_string(),
        ));
    }
    let deleted = state.studio.delete_project(&id).await?;
    Ok(Json(DeleteResponse { deleted }))
}

/// Handler for `GET /api/credential`.
async fn handle_credential(State(state): State<Arc<AppState>>) -> Json<CredentialResponse> {
    Json(CredentialResponse {
        valid: state.studio.refresh_credential().await,
    })
}

/// Handler for `GET /preview?viewport=`.
///
/// Without a viewport the bare document is returned; with one it is framed.
async fn handle_preview(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PreviewQuery>,
) -> Result<Html<String>, ApiError> {
    let viewport = query
        .viewport
        .as_deref()
        .map(str::parse::<Viewport>)
        .transpose()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let site = state
        .studio
        .displayed_site()
        .await
        .ok_or_else(|| ApiError::NotFound("Nothing on display yet; generate or load a project first".to_string()))?;

    let document = PreviewDocument::new(&site).with_options(state.config.preview.to_options());
    Ok(Html(match viewport {
        Some(viewport) => document.render_frame(viewport),
        None => document.render(),
    }))
}

// ============================================================================
// Tests
// ============================================================================
