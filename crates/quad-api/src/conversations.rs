use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::error;

use quad_types::api::{
    Claims, ConversationMeta, ConversationPeer, ConversationSummary, CreateConversationRequest,
    CreateConversationResponse, MessagePreview, TypingRequest,
};
use quad_types::events::ChatEvent;

use crate::error::ApiError;
use crate::{AppState, parse_timestamp};

/// Start (or return) the conversation with another user. Creation is lazy
/// and idempotent: the first call for a pair creates the conversation and
/// both participant rows atomically, every later call returns the same id.
pub async fn create_conversation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateConversationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let other_user_id = req.other_user_id.trim().to_string();
    if other_user_id.is_empty() {
        return Err(ApiError::Validation("other_user_id must not be empty".into()));
    }
    if other_user_id == claims.sub {
        return Err(ApiError::Validation(
            "cannot start a conversation with yourself".into(),
        ));
    }

    let db = state.clone();
    let requester = claims.sub.clone();
    let (conversation_id, created) =
        tokio::task::spawn_blocking(move || -> Result<(i64, bool), ApiError> {
            if db.db.get_user(&other_user_id)?.is_none() {
                return Err(ApiError::NotFound("user not found"));
            }
            Ok(db.db.get_or_create_conversation(&requester, &other_user_id)?)
        })
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(e.into())
        })??;

    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(CreateConversationResponse { conversation_id })))
}

/// Sidebar listing: every conversation the caller participates in, most
/// recently active first, with last message preview and unread count.
pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<ConversationSummary>>, ApiError> {
    let db = state.clone();
    let user_id = claims.sub.clone();
    let rows = tokio::task::spawn_blocking(move || {
        db.db.list_conversations_for_user(&user_id).map_err(ApiError::from)
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(e.into())
    })??;

    let summaries = rows
        .into_iter()
        .map(|row| ConversationSummary {
            conversation: ConversationMeta {
                id: row.conversation.id,
                created_at: parse_timestamp(
                    &row.conversation.created_at,
                    "conversation created_at",
                    row.conversation.id,
                ),
                updated_at: parse_timestamp(
                    &row.conversation.updated_at,
                    "conversation updated_at",
                    row.conversation.id,
                ),
            },
            other_user: row.other_user.into(),
            last_message: row.last_message.map(|m| MessagePreview {
                created_at: parse_timestamp(&m.created_at, "message created_at", m.id),
                id: m.id,
                sender_id: m.sender_id,
                content: m.content,
            }),
            unread_count: row.unread_count,
        })
        .collect();

    Ok(Json(summaries))
}

/// The other participant's public info, for the conversation header.
pub async fn get_conversation(
    State(state): State<AppState>,
    Path(conversation_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<ConversationPeer>, ApiError> {
    let db = state.clone();
    let user_id = claims.sub.clone();
    let other = tokio::task::spawn_blocking(move || {
        let other = require_participant(&db, conversation_id, &user_id)?;
        Ok::<_, ApiError>(other)
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(e.into())
    })??;

    Ok(Json(ConversationPeer {
        conversation_id,
        user: other.into(),
    }))
}

/// Move the caller's read marker to now. Messages older than the marker no
/// longer count as unread in listConversations.
pub async fn mark_read(
    State(state): State<AppState>,
    Path(conversation_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<StatusCode, ApiError> {
    let db = state.clone();
    let user_id = claims.sub.clone();
    tokio::task::spawn_blocking(move || {
        require_participant(&db, conversation_id, &user_id)?;
        db.db.mark_read(conversation_id, &user_id)?;
        Ok::<_, ApiError>(())
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(e.into())
    })??;

    Ok(StatusCode::NO_CONTENT)
}

/// Typing indicator: nothing is persisted, the event goes out on the
/// conversation's typing topic and that is the whole operation.
pub async fn set_typing(
    State(state): State<AppState>,
    Path(conversation_id): Path<i64>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<TypingRequest>,
) -> Result<StatusCode, ApiError> {
    let db = state.clone();
    let user_id = claims.sub.clone();
    tokio::task::spawn_blocking(move || {
        require_participant(&db, conversation_id, &user_id)?;
        Ok::<_, ApiError>(())
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(e.into())
    })??;

    state.dispatcher.publish(ChatEvent::TypingStatus {
        conversation_id,
        user_id: claims.sub,
        is_typing: req.is_typing,
    });

    Ok(StatusCode::NO_CONTENT)
}

/// Shared authorization gate: the conversation must exist (NotFound) and the
/// caller must be one of its two participants (Forbidden). Returns the other
/// participant, which every caller wants anyway.
pub(crate) fn require_participant(
    state: &AppState,
    conversation_id: i64,
    user_id: &str,
) -> Result<quad_db::models::UserRow, ApiError> {
    if state.db.get_conversation(conversation_id)?.is_none() {
        return Err(ApiError::NotFound("conversation not found"));
    }
    if !state.db.is_participant(conversation_id, user_id)? {
        return Err(ApiError::Forbidden("not a participant in this conversation"));
    }
    state
        .db
        .other_participant(conversation_id, user_id)?
        .ok_or_else(|| {
            ApiError::Internal(anyhow::anyhow!(
                "conversation {} has no second participant",
                conversation_id
            ))
        })
}
