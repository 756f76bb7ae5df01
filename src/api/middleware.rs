//! API middleware
//!
//! Contains the pieces every handler shares:
//! - `AppState` with the assembled services
//! - `ApiError`, the JSON error envelope
//! - `ClientIdentity`, the reader identity used for likes

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::Config;
use crate::db::repositories::{
    SqlxArticleRepository, SqlxImageRepository, SqlxLikeRepository, SqlxTopicRepository,
};
use crate::db::DynDatabasePool;
use crate::services::{
    ArticleService, ArticleServiceError, ContentCodec, LikeService, UploadError, UploadService,
};
use crate::theme::TemplateEngine;

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub article_service: Arc<ArticleService>,
    pub like_service: Arc<LikeService>,
    pub upload_service: Arc<UploadService>,
    pub templates: Arc<TemplateEngine>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Wire repositories and services over an open pool
    pub fn new(
        pool: DynDatabasePool,
        config: Config,
        templates: TemplateEngine,
    ) -> anyhow::Result<Self> {
        let article_repo = SqlxArticleRepository::boxed(pool.clone());
        let topic_repo = SqlxTopicRepository::boxed(pool.clone());
        let image_repo = SqlxImageRepository::boxed(pool.clone());
        let like_repo = SqlxLikeRepository::boxed(pool.clone());

        let codec = ContentCodec::new(&config.upload.normalized_url_prefix())?;

        let article_service = Arc::new(ArticleService::new(
            article_repo.clone(),
            topic_repo,
            image_repo.clone(),
            like_repo.clone(),
            codec,
        ));
        let like_service = Arc::new(LikeService::new(like_repo, article_repo));
        let upload_service = Arc::new(UploadService::new(image_repo, config.upload.clone()));

        Ok(Self {
            pool,
            article_service,
            like_service,
            upload_service,
            templates: Arc::new(templates),
            config: Arc::new(config),
        })
    }
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    /// HTTP status for the error code
    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<ArticleServiceError> for ApiError {
    fn from(e: ArticleServiceError) -> Self {
        match e {
            ArticleServiceError::NotFound(id) => {
                ApiError::not_found(format!("Article not found: {}", id))
            }
            ArticleServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            ArticleServiceError::InternalError(e) => {
                tracing::error!("Article operation failed: {:#}", e);
                ApiError::internal_error(e.to_string())
            }
        }
    }
}

impl From<UploadError> for ApiError {
    fn from(e: UploadError) -> Self {
        match e {
            UploadError::Validation(msg) => ApiError::validation_error(msg),
            UploadError::Io(e) => {
                tracing::error!("Failed to store upload: {}", e);
                ApiError::internal_error(format!("Failed to save file: {}", e))
            }
            UploadError::InternalError(e) => {
                tracing::error!("Upload failed: {:#}", e);
                ApiError::internal_error(e.to_string())
            }
        }
    }
}

/// Client address and user agent of the request
///
/// The address comes from `x-forwarded-for` (first hop), then `x-real-ip`,
/// then the socket peer. Missing parts are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientIdentity {
    pub ip: String,
    pub user_agent: String,
}

impl<S> FromRequestParts<S> for ClientIdentity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ip = extract_ip(&parts.headers)
            .or_else(|| {
                parts
                    .extensions
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip().to_string())
            })
            .unwrap_or_default();
        let user_agent = parts
            .headers
            .get("user-agent")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        Ok(Self { ip, user_agent })
    }
}

fn extract_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.trim().to_string())
        })
}
