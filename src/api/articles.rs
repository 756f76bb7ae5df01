//! Article API endpoints
//!
//! Handles the editor's write requests:
//! - POST /articles/publish - Create or update an article (multipart)
//! - POST /articles/{id}/status - Change the status of an article
//! - POST /articles/{id}/delete - Delete an article

use axum::{
    extract::{Multipart, Path, State},
    routing::post,
    Form, Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState};
use crate::api::responses::ResultsResponse;
use crate::models::ArticleStatus;
use crate::services::PublishInput;

/// Form body for status changes
#[derive(Debug, Deserialize)]
pub struct StatusForm {
    pub status: String,
}

/// Build the articles router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/articles/publish", post(publish_article))
        .route("/articles/{id}/status", post(update_status))
        .route("/articles/{id}/delete", post(delete_article))
}

/// POST /articles/publish - Store the editor form
///
/// Accepts multipart/form-data with the fields `articleId`, `title`,
/// `status`, `description`, `topics`, `content` and an optional `thumbnail`
/// file. An empty thumbnail keeps the stored one.
async fn publish_article(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ResultsResponse<i64>>, ApiError> {
    let mut input = PublishInput::default();
    let mut article_id = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation_error(format!("Failed to read multipart: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();

        if name == "thumbnail" {
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::validation_error(format!("Failed to read file: {}", e)))?;
            input.thumbnail = Some(data.to_vec());
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| ApiError::validation_error(format!("Failed to read field {}: {}", name, e)))?;

        match name.as_str() {
            "articleId" => article_id = Some(parse_article_id(&value)?),
            "title" => input.title = value,
            "status" => {
                input.status = ArticleStatus::parse(&value).ok_or_else(|| {
                    ApiError::with_details(
                        "VALIDATION_ERROR",
                        format!("Invalid status: {}", value),
                        serde_json::json!({"field": "status", "value": value}),
                    )
                })?
            }
            "description" => input.description = value,
            "topics" => input.topics = value,
            "content" => input.content = value,
            _ => {}
        }
    }

    input.article_id =
        article_id.ok_or_else(|| ApiError::validation_error("Missing field: articleId"))?;

    let id = state.article_service.publish(input).await?;
    Ok(Json(ResultsResponse::new(id)))
}

/// POST /articles/{id}/status - Move an article between draft and publish
async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Form(form): Form<StatusForm>,
) -> Result<Json<ResultsResponse<i64>>, ApiError> {
    let status = ArticleStatus::parse(&form.status)
        .ok_or_else(|| ApiError::validation_error(format!("Invalid status: {}", form.status)))?;

    state.article_service.set_status(id, status).await?;
    Ok(Json(ResultsResponse::new(id)))
}

/// POST /articles/{id}/delete - Delete an article with its topics, images
/// and likes
async fn delete_article(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ResultsResponse<i64>>, ApiError> {
    state.article_service.delete(id).await?;
    Ok(Json(ResultsResponse::new(id)))
}

/// Parse the `articleId` form value
pub(crate) fn parse_article_id(value: &str) -> Result<i64, ApiError> {
    value.trim().parse::<i64>().map_err(|_| {
        ApiError::with_details(
            "VALIDATION_ERROR",
            format!("Invalid article id: {}", value),
            serde_json::json!({"field": "articleId", "value": value}),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_article_id() {
        assert_eq!(parse_article_id(" 12 ").unwrap(), 12);

        let err = parse_article_id("twelve").unwrap_err();
        assert_eq!(err.error.code, "VALIDATION_ERROR");
        assert_eq!(
            err.error.details,
            Some(serde_json::json!({"field": "articleId", "value": "twelve"}))
        );
    }
}
