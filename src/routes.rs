use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::{
    gemini::AiError,
    models::{
        FactoryChatRequest, FactoryChatResponse, GenerationRequest, GenerationResult, Lang, MarketReaction,
        MarketReactionRequest, NewsArticle, NewsRegion, ProjectRecord, ToolAction, Variation, VariationRequest,
    },
    orchestrator::{Orchestrator, OrchestratorError},
    pdf::generate_pdf,
    store::ProjectStore,
};

/// Header carrying the signed-in principal id issued by the identity provider.
pub const PRINCIPAL_HEADER: &str = "x-user-id";

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ProjectStore>,
    pub orchestrator: Arc<Orchestrator>,
}

#[derive(Debug)]
pub enum ApiError {
    Orchestrator(OrchestratorError),
    NotFound(String),
    Internal(String),
}

impl From<OrchestratorError> for ApiError {
    fn from(e: OrchestratorError) -> Self {
        ApiError::Orchestrator(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Orchestrator(e @ OrchestratorError::Configuration(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
            }
            ApiError::Orchestrator(e @ OrchestratorError::InvalidImage(_)) => (StatusCode::BAD_REQUEST, e.to_string()),
            ApiError::Orchestrator(OrchestratorError::Ai(AiError::MissingApiKey)) => {
                (StatusCode::SERVICE_UNAVAILABLE, AiError::MissingApiKey.to_string())
            }
            ApiError::Orchestrator(OrchestratorError::Ai(e)) => (StatusCode::BAD_GATEWAY, e.to_string()),
            ApiError::NotFound(what) => (StatusCode::NOT_FOUND, format!("{what} not found")),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        if status.is_server_error() {
            tracing::error!(%status, "❌ {}", message);
        } else {
            tracing::warn!(%status, "⚠️ {}", message);
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}

fn principal(headers: &HeaderMap) -> Option<String> {
    headers
        .get(PRINCIPAL_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn generate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<GenerationRequest>,
) -> Result<Json<GenerationResult>, ApiError> {
    tracing::info!("🚀 Generation requested: tool={:?} action={:?}", body.tool, body.action);
    let result = state.orchestrator.process(&body).await?;

    tracing::info!(
        "✅ Generation finished: flat={} styled={} techpack={}",
        result.image_url.is_some(),
        result.image_url2.is_some(),
        result.tech_pack_data.is_some()
    );

    if body.action == ToolAction::Generate {
        if let (Some(user), Some(meta)) = (principal(&headers), body.meta.clone()) {
            if !meta.style_no.trim().is_empty() {
                state.store.save(&user, meta, result.clone());
                tracing::info!("💾 Saved project for principal {}", user);
            }
        }
    }
    Ok(Json(result))
}

pub async fn generate_variations(
    State(state): State<AppState>,
    Json(body): Json<VariationRequest>,
) -> Result<Json<Vec<Variation>>, ApiError> {
    Ok(Json(state.orchestrator.generate_variations(&body).await?))
}

pub async fn market_reaction(
    State(state): State<AppState>,
    Json(body): Json<MarketReactionRequest>,
) -> Result<Json<MarketReaction>, ApiError> {
    Ok(Json(state.orchestrator.simulate_market_reaction(&body.image, &body.meta).await?))
}

pub async fn factory_chat(
    State(state): State<AppState>,
    Json(body): Json<FactoryChatRequest>,
) -> Result<Json<FactoryChatResponse>, ApiError> {
    let reply = state.orchestrator.factory_response(&body.history, &body.meta, body.lang).await?;
    Ok(Json(FactoryChatResponse { reply }))
}

#[derive(Debug, Deserialize)]
pub struct NewsQuery {
    #[serde(default)]
    lang: Lang,
    #[serde(default)]
    region: NewsRegion,
}

pub async fn news(State(state): State<AppState>, Query(q): Query<NewsQuery>) -> Result<Json<Vec<NewsArticle>>, ApiError> {
    Ok(Json(state.orchestrator.fashion_news(q.lang, q.region).await?))
}

pub async fn list_projects(Path(user): Path<String>, State(state): State<AppState>) -> Json<Vec<ProjectRecord>> {
    Json(state.store.list(&user))
}

pub async fn get_project(
    Path((user, style_no)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<Json<ProjectRecord>, ApiError> {
    state
        .store
        .get(&user, &style_no)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("project {style_no}")))
}

pub async fn export_pdf(
    Path((user, style_no)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    let record = state
        .store
        .get(&user, &style_no)
        .ok_or_else(|| ApiError::NotFound(format!("project {style_no}")))?;
    let pdf_bytes = generate_pdf(&record).map_err(|e| ApiError::Internal(format!("pdf export failed: {e}")))?;

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"techpack_{}.pdf\"", sanitize(&style_no)))
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let headers = [
        (header::CONTENT_TYPE, HeaderValue::from_static("application/pdf")),
        (header::CONTENT_DISPOSITION, disposition),
    ];
    Ok((StatusCode::OK, headers, pdf_bytes).into_response())
}

fn sanitize(name: &str) -> String {
    name.chars().map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' }).collect()
}
