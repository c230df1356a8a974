// src/api.rs
//! HTTP boundary: `GET /`, `GET /health`, `POST /ask`.

use std::sync::Arc;

use shuttle_axum::axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::{error, warn};

use crate::system::{AskError, ExpertSystem};

pub const STAGE_HEADER: &str = "x-answer-stage";

/// Outcome of expert system initialization, carried in router state.
#[derive(Clone)]
pub enum SystemHandle {
    Ready(Arc<ExpertSystem>),
    Failed(Arc<str>),
}

impl SystemHandle {
    pub fn from_init(init: anyhow::Result<ExpertSystem>) -> Self {
        match init {
            Ok(system) => SystemHandle::Ready(Arc::new(system)),
            Err(e) => {
                let reason = format!("{e:#}");
                error!(target: "api", error = %reason, "expert system failed to initialize");
                SystemHandle::Failed(Arc::from(reason))
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, SystemHandle::Ready(_))
    }
}

#[derive(Clone)]
pub struct AppState {
    pub system: SystemHandle,
}

impl AppState {
    pub fn new(system: SystemHandle) -> Self {
        Self { system }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/health", get(health))
        .route("/ask", post(ask))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Alias kept for the binary.
pub fn create_router(state: AppState) -> Router {
    router(state)
}

async fn home() -> Json<serde_json::Value> {
    Json(json!({
        "status": "online",
        "version": "1.0.0",
        "endpoints": {
            "ask": "/ask (POST) - Get expert response",
            "health": "/health (GET) - Check system health",
        }
    }))
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let expert_system = if state.system.is_ready() {
        "running"
    } else {
        "error"
    };
    Json(json!({
        "status": "healthy",
        "services": {
            "api": "running",
            "telegram_bot": "disabled",
            "expert_system": expert_system,
        }
    }))
}

#[derive(Debug, Deserialize)]
struct AskReq {
    #[serde(default)]
    question: Option<String>,
}

impl IntoResponse for AskError {
    fn into_response(self) -> Response {
        let body = json!({
            "status": "error",
            "error": self.to_string(),
            "code": self.code(),
        });
        (self.status(), Json(body)).into_response()
    }
}

async fn ask(
    State(state): State<AppState>,
    body: Result<Json<AskReq>, JsonRejection>,
) -> Result<Response, AskError> {
    let system = match &state.system {
        SystemHandle::Ready(s) => Arc::clone(s),
        SystemHandle::Failed(_) => return Err(AskError::NotInitialized),
    };

    let Json(req) = body.map_err(|e| {
        warn!(target: "api", error = %e, "rejected /ask body");
        AskError::Internal(e.body_text())
    })?;
    let question = req.question.unwrap_or_default();

    let answer = system.ask(&question).await?;

    let payload = json!({
        "status": "success",
        "data": {
            "answer": answer.answer,
            "expert_type": answer
                .expert_type
                .map(|k| k.as_str())
                .unwrap_or("general"),
        }
    });
    let mut resp = (StatusCode::OK, Json(payload)).into_response();
    resp.headers_mut().insert(
        STAGE_HEADER,
        HeaderValue::from_static(answer.stage.as_str()),
    );
    Ok(resp)
}
