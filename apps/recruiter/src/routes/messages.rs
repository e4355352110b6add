//! Chat gateway endpoint: one inbound message in, one reply out.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::conversation::state::ConversationKey;
use crate::conversation::Reply;
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub user_id: String,
    /// Set for @-mentions inside a group thread; each thread is its own conversation.
    #[serde(default)]
    pub group_id: Option<String>,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub reply: Reply,
}

/// POST /api/v1/messages
///
/// Runs the message through the conversation engine on the worker pool.
pub async fn handle_message(
    State(state): State<AppState>,
    Json(request): Json<MessageRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let user_id = request.user_id.trim().to_string();
    if user_id.is_empty() {
        return Err(AppError::Validation("user_id cannot be empty".to_string()));
    }
    if request.content.trim().is_empty() {
        return Err(AppError::Validation("content cannot be empty".to_string()));
    }
    if !state.config.is_authorized(&user_id) {
        warn!("Rejected message from unauthorized user {user_id}");
        return Err(AppError::Forbidden);
    }

    let group_id = request
        .group_id
        .map(|g| g.trim().to_string())
        .filter(|g| !g.is_empty());
    let key = match group_id {
        Some(group_id) => ConversationKey::in_group(user_id, group_id),
        None => ConversationKey::direct(user_id),
    };
    let engine = state.engine.clone();
    let content = request.content;
    let reply = state
        .workers
        .run(async move { engine.handle(&key, &content).await })
        .await?;

    Ok(Json(MessageResponse { reply }))
}
