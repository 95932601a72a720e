//! Chat function route

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::post,
};
use serde::{Deserialize, Serialize};

use super::ApiState;
use super::error::ApiError;
use crate::journal::ChatTurn;

/// Build chat router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .with_state(state)
}

/// Body shared by the chat and voice-chat functions
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub user_input: String,
    pub user_id: String,
    pub chat_id: String,
}

impl From<ChatRequest> for ChatTurn {
    fn from(request: ChatRequest) -> Self {
        Self {
            user_id: request.user_id,
            conversation_id: request.chat_id,
            user_input: request.user_input,
        }
    }
}

/// Chat response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub bot_response: String,
}

/// Answer a journal entry
async fn chat(
    State(state): State<Arc<ApiState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(request) = payload?;
    let reply = state.journal.chat(&request.into()).await?;

    Ok(Json(ChatResponse {
        bot_response: reply.reply,
    }))
}
