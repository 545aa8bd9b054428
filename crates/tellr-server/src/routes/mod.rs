//! API route handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use tellr_core::workflow::EMPTY_QUESTION;
use tellr_core::{Capability, RunId, RunResponse};

use crate::state::AppState;

const DEFAULT_EVENT_LIMIT: usize = 100;

// ========== Ask Routes ==========

#[derive(Deserialize)]
pub struct AskRequest {
    #[serde(default)]
    question: String,
}

/// Answer one question
pub async fn ask(State(state): State<AppState>, Json(req): Json<AskRequest>) -> impl IntoResponse {
    let question = req.question;
    if question.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": EMPTY_QUESTION })),
        );
    }

    // The workflow is blocking: oracle and backend calls go over ureq
    let service = state.service.clone();
    let outcome = tokio::task::spawn_blocking(move || service.run(&question)).await;

    match outcome {
        Ok(response @ RunResponse::Completed { .. }) => (StatusCode::OK, Json(serde_json::json!(response))),
        Ok(response @ RunResponse::Rejected { .. }) => {
            (StatusCode::BAD_REQUEST, Json(serde_json::json!(response)))
        }
        Err(e) => {
            tracing::error!(error = %e, "ask task failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "Internal error while answering" })),
            )
        }
    }
}

#[derive(Deserialize)]
pub struct FanOutRequest {
    tasks: BTreeMap<Capability, String>,
}

/// Run several capabilities at once, outside the workflow
pub async fn fan_out(State(state): State<AppState>, Json(req): Json<FanOutRequest>) -> impl IntoResponse {
    if req.tasks.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "No tasks given" })),
        );
    }

    let report = state.service.fan_out(req.tasks).await;
    (StatusCode::OK, Json(serde_json::json!(report)))
}

// ========== Event Routes ==========

#[derive(Deserialize)]
pub struct EventsQuery {
    limit: Option<usize>,
}

/// Most recent run events across all runs
pub async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(DEFAULT_EVENT_LIMIT);
    Json(serde_json::json!({
        "events": state.history.recent(limit),
        "capacity": state.history.capacity()
    }))
}

/// Events of one run
pub async fn run_events(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> impl IntoResponse {
    let run_id: RunId = match run_id.parse() {
        Ok(id) => id,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": "Invalid run ID" })),
            )
        }
    };

    let events = state.history.for_run(run_id);
    if events.is_empty() {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "Run not found" })),
        );
    }

    (
        StatusCode::OK,
        Json(serde_json::json!({ "run_id": run_id, "events": events })),
    )
}
