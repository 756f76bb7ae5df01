//! API layer - HTTP handlers and routing
//!
//! This module contains all HTTP endpoints of the newsroom.
//! It includes:
//! - Server-rendered pages (listings, article, editor)
//! - Article write endpoints (publish, status, delete)
//! - Image upload endpoint
//! - Like endpoints
//! - Static serving of uploaded images

pub mod articles;
pub mod likes;
pub mod middleware;
pub mod pages;
pub mod responses;
pub mod static_files;
pub mod upload;

use axum::{extract::DefaultBodyLimit, Router};
use tower_http::trace::TraceLayer;

use crate::config::UploadConfig;

pub use middleware::{ApiError, AppState, ClientIdentity};

/// Room left in a request body for the non-file form fields
const FORM_OVERHEAD: usize = 2 * 1024 * 1024;

/// Build the complete router
pub fn build_router(state: AppState) -> Router {
    let body_limit = body_limit(&state.config.upload);

    Router::new()
        .merge(pages::router())
        .merge(articles::router())
        .merge(likes::router())
        .merge(upload::router())
        // Uploaded images under the configured prefix
        .fallback(static_files::serve_static)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Request body limit: one file at the upload size limit plus form fields
fn body_limit(config: &UploadConfig) -> usize {
    usize::try_from(config.max_file_size)
        .unwrap_or(usize::MAX)
        .saturating_add(FORM_OVERHEAD)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::{create_test_pool, migrations};
    use crate::theme::TemplateEngine;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn test_router(dir: &std::path::Path) -> Router {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let mut config = Config::default();
        config.upload.path = dir.join("uploads");
        config.upload.url_prefix = "media".to_string();
        let templates = TemplateEngine::new(&dir.join("templates")).unwrap();
        build_router(AppState::new(pool, config, templates).unwrap())
    }

    async fn status_of(router: Router, uri: &str) -> StatusCode {
        router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[test]
    fn test_body_limit_includes_overhead() {
        let config = UploadConfig {
            max_file_size: 1024,
            ..UploadConfig::default()
        };
        assert_eq!(body_limit(&config), 1024 + FORM_OVERHEAD);
    }

    #[tokio::test]
    async fn test_fallback_serves_uploads_under_prefix() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(temp_dir.path().join("uploads")).unwrap();
        std::fs::write(temp_dir.path().join("uploads").join("a b.png"), b"png").unwrap();
        let router = test_router(temp_dir.path()).await;

        assert_eq!(status_of(router.clone(), "/media/a%20b.png").await, StatusCode::OK);
        assert_eq!(status_of(router.clone(), "/media/missing.png").await, StatusCode::NOT_FOUND);
        assert_eq!(status_of(router.clone(), "/uploads/a%20b.png").await, StatusCode::NOT_FOUND);
        assert_eq!(status_of(router, "/").await, StatusCode::OK);
    }
}
