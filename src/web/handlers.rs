//! Request handlers for the form page and the two JSON endpoints.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::response::{Html, IntoResponse};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::AppState;
use crate::draft::Draft;
use crate::error::{DispatchError, DraftError, FieldViolation};
use crate::mail::SendRequest;

const INDEX_HTML: &str = include_str!("../../assets/index.html");

// ── Page ────────────────────────────────────────────────────────────────

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

// ── Health ──────────────────────────────────────────────────────────────

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "ai-email-assistant"
    }))
}

// ── Generate ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub prompt: String,
}

/// POST /api/generate
pub async fn generate(
    State(state): State<AppState>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<Draft>, DraftError> {
    let Json(request) = payload.map_err(|rejection| {
        DraftError::InvalidInput(format!(
            "Prompt is required and must be a string ({})",
            rejection.body_text()
        ))
    })?;

    state
        .generator
        .generate(&request.prompt)
        .await
        .map(Json)
        .inspect_err(|e| warn!(error = %e, status = e.status_code().as_u16(), "Draft generation failed"))
}

// ── Send ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResponse {
    pub success: bool,
    pub message: String,
    pub message_id: String,
}

/// POST /api/send
pub async fn send(
    State(state): State<AppState>,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<SendResponse>, DispatchError> {
    let Json(body) = payload.map_err(|rejection| {
        DispatchError::Validation(vec![FieldViolation::new(
            "request",
            rejection.body_text(),
        )])
    })?;
    let request = SendRequest::from_json(&body)?;

    let result = state
        .dispatcher
        .send(&request)
        .await
        .inspect_err(|e| warn!(error = %e, status = e.status_code().as_u16(), "Email dispatch failed"))?;

    Ok(Json(SendResponse {
        success: result.success,
        message: "Email sent successfully".to_string(),
        message_id: result.message_id,
    }))
}
