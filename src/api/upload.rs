//! Upload API endpoints
//!
//! Handles image uploads from the editor:
//! - POST /uploadimage - Store an image for an article

use axum::{
    extract::{Multipart, State},
    routing::post,
    Json, Router,
};

use crate::api::articles::parse_article_id;
use crate::api::middleware::{ApiError, AppState};
use crate::api::responses::LocationResponse;

/// Image file received in the form
struct ImageField {
    filename: String,
    content_type: Option<String>,
    data: Vec<u8>,
}

/// Build the upload router
pub fn router() -> Router<AppState> {
    Router::new().route("/uploadimage", post(upload_image))
}

/// POST /uploadimage - Upload an image referenced by an article body
///
/// Accepts multipart/form-data with a file field `image` and a text field
/// `articleId`. Responds with the public location of the stored file.
async fn upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<LocationResponse>, ApiError> {
    let mut image = None;
    let mut article_id = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation_error(format!("Failed to read multipart: {}", e)))?
    {
        match field.name().unwrap_or("") {
            "image" => {
                let filename = field.file_name().unwrap_or("").to_string();
                let content_type = field.content_type().map(|s| s.to_string());
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::validation_error(format!("Failed to read file: {}", e)))?;
                image = Some(ImageField {
                    filename,
                    content_type,
                    data: data.to_vec(),
                });
            }
            "articleId" => {
                let value = field.text().await.map_err(|e| {
                    ApiError::validation_error(format!("Failed to read articleId: {}", e))
                })?;
                article_id = Some(parse_article_id(&value)?);
            }
            _ => {}
        }
    }

    let image = image.ok_or_else(|| ApiError::validation_error("No file provided"))?;
    let article_id =
        article_id.ok_or_else(|| ApiError::validation_error("Missing field: articleId"))?;

    let location = state
        .upload_service
        .save_image(
            article_id,
            &image.filename,
            image.content_type.as_deref(),
            &image.data,
        )
        .await?;

    Ok(Json(LocationResponse { location }))
}
