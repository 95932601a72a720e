//! Conversation management routes
//!
//! Every route is scoped to the `userId` supplied by the caller; conversations
//! owned by someone else are reported as unauthorized.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;

use super::ApiState;
use super::error::ApiError;
use crate::Error;
use crate::db::{Conversation, Message};

/// Build conversations router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/conversations", post(create).get(list))
        .route("/conversations/{id}", axum::routing::patch(rename))
        .route("/conversations/{id}/messages", get(messages))
        .with_state(state)
}

/// Caller identity for read routes
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    pub user_id: String,
}

/// Create request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConversationRequest {
    pub user_id: String,
    pub title: Option<String>,
}

/// Rename request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameConversationRequest {
    pub user_id: String,
    pub title: String,
}

fn require_user(user_id: &str) -> Result<&str, ApiError> {
    let user_id = user_id.trim();
    if user_id.is_empty() {
        return Err(Error::InvalidInput("userId is required".to_string()).into());
    }
    Ok(user_id)
}

/// Start a new journal conversation
async fn create(
    State(state): State<Arc<ApiState>>,
    payload: Result<Json<CreateConversationRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Conversation>), ApiError> {
    let Json(request) = payload?;
    let user_id = require_user(&request.user_id)?;

    let conversation = state
        .journal
        .conversations()
        .create(user_id, request.title.as_deref())?;
    tracing::info!(conversation_id = %conversation.id, "conversation created");

    Ok((StatusCode::CREATED, Json(conversation)))
}

/// List the caller's conversations, newest first
async fn list(
    State(state): State<Arc<ApiState>>,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> Result<Json<Vec<Conversation>>, ApiError> {
    let Query(query) = query?;
    let user_id = require_user(&query.user_id)?;

    Ok(Json(state.journal.conversations().list_for_user(user_id)?))
}

/// Full message history of one conversation, oldest first
async fn messages(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let Query(query) = query?;
    let user_id = require_user(&query.user_id)?;

    state.journal.conversations().get_owned(&id, user_id)?;
    Ok(Json(state.journal.messages().list_for_conversation(&id)?))
}

/// Retitle a conversation
async fn rename(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
    payload: Result<Json<RenameConversationRequest>, JsonRejection>,
) -> Result<Json<Conversation>, ApiError> {
    let Json(request) = payload?;
    let user_id = require_user(&request.user_id)?;

    Ok(Json(state.journal.conversations().rename(
        &id,
        user_id,
        &request.title,
    )?))
}
