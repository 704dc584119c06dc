use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::{error, warn};

use quad_types::api::{Claims, MessageResponse, MessageStatus, SendMessageRequest};
use quad_types::events::ChatEvent;

use quad_db::models::MessageRow;

use crate::conversations::require_participant;
use crate::error::ApiError;
use crate::{AppState, parse_timestamp};

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Cursor-based pagination: pass the id of the oldest message from the
    /// previous page to fetch the next older page.
    pub cursor: Option<i64>,
}

fn default_limit() -> u32 {
    50
}

/// One page of conversation history, ascending by id. Without a cursor this
/// is the newest `limit` messages; with one, the newest `limit` messages
/// strictly older than it.
pub async fn get_messages(
    State(state): State<AppState>,
    Path(conversation_id): Path<i64>,
    Query(query): Query<MessageQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<MessageResponse>>, ApiError> {
    let db = state.clone();
    let user_id = claims.sub.clone();
    let limit = query.limit.min(200);
    let cursor = query.cursor;

    let rows = tokio::task::spawn_blocking(move || -> Result<Vec<MessageRow>, ApiError> {
        require_participant(&db, conversation_id, &user_id)?;
        Ok(db.db.get_messages(conversation_id, limit, cursor)?)
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(e.into())
    })??;

    Ok(Json(rows.into_iter().map(message_response).collect()))
}

/// Persist a message, then push it to subscribers of the conversation's chat
/// topic. The push is best-effort: once the transaction commits the message
/// exists, whether or not anyone is listening.
pub async fn send_message(
    State(state): State<AppState>,
    Path(conversation_id): Path<i64>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let content = req.content.trim().to_string();
    if content.is_empty() {
        return Err(ApiError::Validation("message content must not be empty".into()));
    }

    let db = state.clone();
    let sender_id = claims.sub.clone();
    let row = tokio::task::spawn_blocking(move || -> Result<MessageRow, ApiError> {
        require_participant(&db, conversation_id, &sender_id)?;
        Ok(db.db.insert_message(conversation_id, &sender_id, &content)?)
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(e.into())
    })??;

    let message = message_response(row);

    state.dispatcher.publish(ChatEvent::NewMessage {
        message: message.clone(),
    });

    Ok((StatusCode::CREATED, Json(message)))
}

pub(crate) fn message_response(row: MessageRow) -> MessageResponse {
    let status = MessageStatus::parse(&row.status).unwrap_or_else(|| {
        warn!("Corrupt status '{}' on message {}", row.status, row.id);
        MessageStatus::Sent
    });

    MessageResponse {
        id: row.id,
        conversation_id: row.conversation_id,
        sender_id: row.sender_id,
        sender_avatar_url: row.sender_avatar_url,
        status,
        created_at: parse_timestamp(&row.created_at, "message created_at", row.id),
        content: row.content,
    }
}
