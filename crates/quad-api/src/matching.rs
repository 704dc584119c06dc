use axum::{Extension, Json, extract::State};
use tracing::error;

use quad_types::api::{
    Claims, FriendEntry, NextCandidateResponse, SwipeRequest, SwipeResponse,
};

use quad_db::models::SwipeResult;

use crate::AppState;
use crate::error::ApiError;

/// Next discovery candidate: any user the caller has not swiped on yet.
/// Running out of candidates is a status, not an error.
pub async fn next_candidate(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<NextCandidateResponse>, ApiError> {
    let db = state.clone();
    let user_id = claims.sub.clone();
    let row = tokio::task::spawn_blocking(move || {
        db.db.next_candidate(&user_id).map_err(ApiError::from)
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(e.into())
    })??;

    let response = match row {
        Some(row) => NextCandidateResponse::Success {
            candidate: row.into(),
        },
        None => NextCandidateResponse::NoMoreCandidates,
    };

    Ok(Json(response))
}

/// Record a swipe. A right swipe meeting an existing reciprocal right swipe
/// is a match, which materializes the symmetric friend link in the same
/// transaction and reports MATCH to exactly this caller.
pub async fn swipe(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SwipeRequest>,
) -> Result<Json<SwipeResponse>, ApiError> {
    let swiped_user_id = req.swiped_user_id.trim().to_string();
    if swiped_user_id.is_empty() {
        return Err(ApiError::Validation("swiped_user_id must not be empty".into()));
    }
    if swiped_user_id == claims.sub {
        return Err(ApiError::Validation("cannot swipe on yourself".into()));
    }

    let db = state.clone();
    let swiper_id = claims.sub.clone();
    let direction = req.direction;
    let response = tokio::task::spawn_blocking(move || -> Result<SwipeResponse, ApiError> {
        if db.db.get_user(&swiped_user_id)?.is_none() {
            return Err(ApiError::NotFound("user not found"));
        }
        match db.db.record_swipe(&swiper_id, &swiped_user_id, direction)? {
            SwipeResult::Matched => Ok(SwipeResponse::Match {
                matched_user_id: swiped_user_id,
            }),
            SwipeResult::NoMatch => Ok(SwipeResponse::NoMatch),
            SwipeResult::Duplicate => Err(ApiError::Conflict("already swiped on this user")),
        }
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(e.into())
    })??;

    Ok(Json(response))
}

/// Everyone the caller has matched with, exactly once per friend.
pub async fn friends(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<FriendEntry>>, ApiError> {
    let db = state.clone();
    let user_id = claims.sub.clone();
    let rows = tokio::task::spawn_blocking(move || {
        db.db.friends_of(&user_id).map_err(ApiError::from)
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(e.into())
    })??;

    Ok(Json(rows.into_iter().map(FriendEntry::from).collect()))
}
