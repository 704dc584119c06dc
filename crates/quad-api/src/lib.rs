use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use tracing::warn;

use quad_db::Database;
use quad_gateway::dispatcher::Dispatcher;

pub mod conversations;
pub mod error;
pub mod matching;
pub mod messages;
pub mod middleware;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub dispatcher: Dispatcher,
    pub jwt_secret: String,
}

/// All RPC routes, behind the bearer-token middleware. The WebSocket gateway
/// route is attached separately by the server binary.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/conversations", get(conversations::list_conversations))
        .route("/conversations", post(conversations::create_conversation))
        .route(
            "/conversations/{conversation_id}",
            get(conversations::get_conversation),
        )
        .route(
            "/conversations/{conversation_id}/messages",
            get(messages::get_messages),
        )
        .route(
            "/conversations/{conversation_id}/messages",
            post(messages::send_message),
        )
        .route(
            "/conversations/{conversation_id}/read",
            post(conversations::mark_read),
        )
        .route(
            "/conversations/{conversation_id}/typing",
            post(conversations::set_typing),
        )
        .route("/matching/next", get(matching::next_candidate))
        .route("/matching/swipe", post(matching::swipe))
        .route("/friends", get(matching::friends))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ))
        .with_state(state)
}

/// Stored timestamps are written by this core as fixed-width RFC 3339, so a
/// parse failure means the row was tampered with. Log and keep serving.
pub(crate) fn parse_timestamp(raw: &str, field: &'static str, row_id: i64) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}' on row {}: {}", field, raw, row_id, e);
        DateTime::default()
    })
}
