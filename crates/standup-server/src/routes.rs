// HTTP routes for teams, standup history, submissions, CSV export, and health.

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{Local, Utc};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use standup_core::export::{csv_filename, summary_csv};
use standup_core::standup::{Standup, TeamSummary};
use standup_core::store::StandupStore;
use standup_llm::client::{model_available, OllamaClient};
use standup_llm::pipeline::StandupPipeline;

use crate::error::ApiError;
use crate::submission::{Submission, SubmissionInput};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<StandupStore>,
    pub pipeline: Arc<StandupPipeline>,
    /// Used by the Ollama health probe whatever the active provider.
    pub ollama: OllamaClient,
}

impl AppState {
    pub fn new(store: StandupStore, pipeline: StandupPipeline, ollama: OllamaClient) -> Self {
        Self {
            store: Arc::new(store),
            pipeline: Arc::new(pipeline),
            ollama,
        }
    }
}

/// Build the router with CORS, request tracing, and the upload size limit.
pub fn build_app(state: AppState, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/api/teams", get(list_teams))
        .route("/api/teams/:team_name/history", get(team_history))
        .route("/api/standups/:standup_id", get(get_standup))
        .route("/api/standups/:standup_id/export", get(export_standup))
        .route("/api/process-standup", post(process_standup))
        .route("/api/health", get(health))
        .route("/api/health/ollama", get(ollama_health))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/teams
async fn list_teams(State(state): State<AppState>) -> Json<Vec<TeamSummary>> {
    Json(state.store.list_teams())
}

/// GET /api/teams/:team_name/history
async fn team_history(
    State(state): State<AppState>,
    Path(team_name): Path<String>,
) -> Json<Vec<Standup>> {
    Json(state.store.team_history(&team_name))
}

/// GET /api/standups/:standup_id
async fn get_standup(
    State(state): State<AppState>,
    Path(standup_id): Path<String>,
) -> Result<Json<Standup>, ApiError> {
    find_standup(&state, &standup_id).map(Json)
}

/// GET /api/standups/:standup_id/export: the summary table as a CSV download.
async fn export_standup(
    State(state): State<AppState>,
    Path(standup_id): Path<String>,
) -> Result<Response, ApiError> {
    let standup = find_standup(&state, &standup_id)?;
    let csv = summary_csv(&standup).map_err(ApiError::Internal)?;
    let disposition =
        HeaderValue::from_str(&format!("attachment; filename=\"{}\"", csv_filename(&standup)))
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("invalid export file name: {e}")))?;

    Ok((
        [
            (CONTENT_TYPE, HeaderValue::from_static("text/csv; charset=utf-8")),
            (CONTENT_DISPOSITION, disposition),
        ],
        csv,
    )
        .into_response())
}

/// POST /api/process-standup
async fn process_standup(
    State(state): State<AppState>,
    submission: Submission,
) -> Result<Json<Standup>, ApiError> {
    let (team, input) = submission.validate()?;
    info!(team = %team, "Processing standup");

    let summary = match input {
        SubmissionInput::Audio(audio) => {
            info!(file = %audio.filename, "Processing audio file");
            state.pipeline.process_audio(&audio).await
        }
        SubmissionInput::Transcript(text) => {
            info!("Processing text transcript");
            state.pipeline.process_transcript(&text).await
        }
    }
    .map_err(ApiError::Processing)?;

    let standup = Standup::new(&team, &Local::now(), summary);
    state.store.prepend(&team, standup.clone());

    info!(id = %standup.id, speakers = standup.summary.len(), "Standup processing completed");
    Ok(Json(standup))
}

/// GET /api/health
async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "provider": state.pipeline.provider().to_string(),
        "teams": state.store.team_count(),
        "standups": state.store.standup_count(),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// GET /api/health/ollama: probe the Ollama server and its configured model.
async fn ollama_health(State(state): State<AppState>) -> Response {
    let url = state.ollama.base_url().to_string();
    let model = state.ollama.model().to_string();

    match state.ollama.list_models().await {
        Ok(models) => {
            let available = model_available(&models, &model);
            if !available {
                warn!(model = %model, "configured Ollama model is not installed");
            }
            Json(json!({
                "status": "ok",
                "url": url,
                "model": model,
                "modelAvailable": available,
                "models": models,
            }))
            .into_response()
        }
        Err(e) => {
            warn!("Ollama health check failed: {e:#}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "error",
                    "url": url,
                    "error": format!("{e:#}"),
                })),
            )
                .into_response()
        }
    }
}

fn find_standup(state: &AppState, standup_id: &str) -> Result<Standup, ApiError> {
    state
        .store
        .find(standup_id)
        .ok_or_else(|| ApiError::NotFound("Standup not found".into()))
}
