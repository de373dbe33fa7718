use axum::http::{HeaderMap, StatusCode};
use axum::{
    extract::State,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::commands::{ChatCommand, CommandDispatcher};
use crate::lifecycle::{LifecycleOrchestrator, Progress};

pub struct AppState {
    pub dispatcher: Arc<CommandDispatcher>,
    pub lifecycle: Arc<LifecycleOrchestrator>,
    pub bot_token: String,
}

#[derive(Deserialize, Debug)]
pub struct CommandRequest {
    pub channel_id: String,
    pub text: String,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct CommandResponse {
    pub messages: Vec<String>,
}

fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    let auth = headers.get(axum::http::header::AUTHORIZATION)?;
    let Ok(auth) = auth.to_str() else {
        return None;
    };
    let auth = auth.trim();
    let prefix = "Bearer ";
    if auth.len() <= prefix.len() || !auth.starts_with(prefix) {
        return None;
    }
    Some(auth[prefix.len()..].trim().to_string())
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/admin/status", get(get_status))
        .route("/commands", post(post_command))
        .with_state(state)
}

async fn root() -> &'static str {
    "Spinup Orchestrator Online"
}

async fn get_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.lifecycle.snapshot().await)
}

/// Runs one chat command to completion and answers with its progress lines
/// followed by the final reply. Nothing is streamed.
async fn post_command(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<CommandRequest>,
) -> impl IntoResponse {
    if extract_bearer(&headers).as_deref() != Some(state.bot_token.as_str()) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "unauthorized"})),
        )
            .into_response();
    }

    let command = match ChatCommand::parse(&payload.text) {
        Ok(c) => c,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": e.to_string()})),
            )
                .into_response();
        }
    };

    // Detached so a dropped connection cannot cancel a launch halfway.
    let (progress, mut rx) = Progress::channel();
    let dispatcher = state.dispatcher.clone();
    let channel_id = payload.channel_id;
    let task = tokio::spawn(async move { dispatcher.dispatch(&channel_id, command, &progress).await });

    let replies = match task.await {
        Ok(replies) => replies,
        Err(e) => {
            tracing::error!(error = %e, "command task failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "command failed"})),
            )
                .into_response();
        }
    };

    // Replies are batched: progress lines come back with the final reply,
    // in the order they were sent.
    let mut messages = Vec::new();
    while let Ok(message) = rx.try_recv() {
        messages.push(message);
    }
    messages.extend(replies.unwrap_or_default());
    (StatusCode::OK, Json(CommandResponse { messages })).into_response()
}
