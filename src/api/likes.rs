//! Like API endpoints
//!
//! - POST /articles/{id}/like - Toggle the reader's like
//! - GET /articles/{id}/likes - Like count and the reader's like state
//!
//! The reader is the `user_id` sent by the page, or a fingerprint of the
//! client address and user agent when none is sent.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Form, Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState, ClientIdentity};
use crate::api::responses::ResultsResponse;
use crate::models::LikeSummary;
use crate::services::resolve_user_id;

/// Reader identity sent as a form field or query parameter
#[derive(Debug, Default, Deserialize)]
pub struct ReaderParams {
    pub user_id: Option<String>,
}

/// Build the likes router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/articles/{id}/like", post(toggle_like))
        .route("/articles/{id}/likes", get(get_likes))
}

/// POST /articles/{id}/like
async fn toggle_like(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    client: ClientIdentity,
    Form(params): Form<ReaderParams>,
) -> Result<Json<ResultsResponse<LikeSummary>>, ApiError> {
    let user_id = resolve_user_id(params.user_id.as_deref(), &client.ip, &client.user_agent);
    let summary = state.like_service.toggle(id, &user_id).await?;
    tracing::debug!("Article {} now has {} likes", id, summary.count);
    Ok(Json(ResultsResponse::new(summary)))
}

/// GET /articles/{id}/likes
async fn get_likes(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    client: ClientIdentity,
    Query(params): Query<ReaderParams>,
) -> Result<Json<ResultsResponse<LikeSummary>>, ApiError> {
    let user_id = resolve_user_id(params.user_id.as_deref(), &client.ip, &client.user_agent);
    let summary = state.like_service.get(id, &user_id).await?;
    Ok(Json(ResultsResponse::new(summary)))
}
