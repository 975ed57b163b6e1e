//! HTTP route handlers.

use agent::agents::planner::PlanningAgent;
use agent::cancel::CancelToken;
use agent::core::report::format_plan;
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct ChatRequest {
    message: String,
}

type JsonResponse = (StatusCode, Json<Value>);

/// Build the router for the JSON endpoints.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/chat", post(chat))
        .route("/code", post(code))
        .route("/api/health", get(health))
}

async fn health() -> &'static str {
    "ok"
}

fn error(status: StatusCode, message: impl Into<String>) -> JsonResponse {
    (status, Json(json!({ "error": message.into() })))
}

/// POST /chat - plan the task in `message` and return the progress report.
async fn chat(State(state): State<AppState>, body: Bytes) -> JsonResponse {
    let request = match serde_json::from_slice::<ChatRequest>(&body) {
        Ok(request) if !request.message.trim().is_empty() => request,
        Ok(_) => return error(StatusCode::BAD_REQUEST, "Invalid request"),
        Err(err) => {
            warn!(err = %err, "rejecting chat request");
            return error(StatusCode::BAD_REQUEST, "Invalid request");
        }
    };

    let gateway = state.gateway.clone();
    let planned = tokio::task::spawn_blocking(move || {
        PlanningAgent::new().create_plan(&gateway, &request.message, &CancelToken::new())
    })
    .await;

    match planned {
        Ok(Ok(plan)) => {
            info!(plan_id = %plan.id, steps = plan.steps.len(), "plan created");
            (
                StatusCode::OK,
                Json(json!({ "response": format_plan(&plan) })),
            )
        }
        Ok(Err(err)) => {
            warn!(err = %format!("{err:#}"), "planning failed");
            error(StatusCode::INTERNAL_SERVER_ERROR, format!("{err:#}"))
        }
        Err(err) => error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("planning task failed: {err}"),
        ),
    }
}

/// POST /code - not available over HTTP.
async fn code() -> JsonResponse {
    error(
        StatusCode::NOT_IMPLEMENTED,
        "code execution is not available over HTTP",
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use agent::core::error::GatewayError;
    use agent::test_support::{ScriptedGateway, planning_response};

    use super::*;

    fn state(gateway: ScriptedGateway) -> AppState {
        AppState::new(Arc::new(gateway))
    }

    #[tokio::test]
    async fn chat_returns_progress_report() {
        let gateway = ScriptedGateway::new([planning_response("Greet", &["Say hi", "Wave"])]);
        let (status, Json(body)) = chat(
            State(state(gateway)),
            Bytes::from_static(br#"{"message":"greet the user"}"#),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let report = body["response"].as_str().expect("response");
        assert!(report.starts_with("Plan: Greet (ID: plan_"));
        assert!(report.contains("0. [ ] Say hi"));
        assert!(report.contains("1. [ ] Wave"));
    }

    #[tokio::test]
    async fn invalid_json_is_bad_request() {
        let (status, Json(body)) = chat(
            State(state(ScriptedGateway::default())),
            Bytes::from_static(b"not json"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "Invalid request"}));
    }

    #[tokio::test]
    async fn missing_message_is_bad_request() {
        let (status, _) = chat(
            State(state(ScriptedGateway::default())),
            Bytes::from_static(br#"{"text":"hi"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn planning_failure_is_internal_error() {
        let gateway = ScriptedGateway::default().then_fail(GatewayError::Transport(
            "connection refused".to_string(),
        ));
        let (status, Json(body)) = chat(
            State(state(gateway)),
            Bytes::from_static(br#"{"message":"anything"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(
            body["error"]
                .as_str()
                .expect("error")
                .contains("connection refused")
        );
    }

    #[tokio::test]
    async fn code_is_not_implemented() {
        let (status, _) = code().await;
        assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
    }
}
