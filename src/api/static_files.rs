//! Static file serving for uploaded images

use axum::{
    extract::State,
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use std::path::{Component, Path, PathBuf};
use tokio::fs;

use crate::api::middleware::AppState;

/// Serve files below the upload URL prefix; everything else is a 404
pub async fn serve_static(State(state): State<AppState>, uri: Uri) -> Response {
    let path = uri.path();
    // URL decode the path to handle encoded characters like %20
    let decoded_path = urlencoding::decode(path).unwrap_or_else(|_| path.into());

    let prefix = state.config.upload.normalized_url_prefix();
    match decoded_path.strip_prefix(prefix.as_str()) {
        Some(relative) => serve_upload(&state.config.upload.path, relative).await,
        None => not_found(),
    }
}

/// Serve an uploaded file from disk
async fn serve_upload(upload_dir: &Path, relative: &str) -> Response {
    let Some(file_path) = resolve_upload_path(upload_dir, relative) else {
        return not_found();
    };

    match fs::read(&file_path).await {
        Ok(contents) => (
            [
                (header::CONTENT_TYPE, get_content_type(relative)),
                (header::CACHE_CONTROL, "public, max-age=3600"),
            ],
            contents,
        )
            .into_response(),
        Err(_) => not_found(),
    }
}

/// Join a request path onto the upload directory, refusing anything that
/// could leave it
fn resolve_upload_path(upload_dir: &Path, relative: &str) -> Option<PathBuf> {
    let relative = Path::new(relative);
    if relative.as_os_str().is_empty()
        || !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
    {
        return None;
    }
    Some(upload_dir.join(relative))
}

/// 404 response
fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        "<html><body><h1>404 Not Found</h1></body></html>",
    )
        .into_response()
}

/// Get content type from file extension
fn get_content_type(path: &str) -> &'static str {
    match path.rsplit('.').next().unwrap_or("").to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_upload_path() {
        let dir = Path::new("uploads");
        assert_eq!(
            resolve_upload_path(dir, "cat.png"),
            Some(PathBuf::from("uploads/cat.png"))
        );
        assert_eq!(resolve_upload_path(dir, "../secret"), None);
        assert_eq!(resolve_upload_path(dir, "/etc/passwd"), None);
        assert_eq!(resolve_upload_path(dir, ""), None);
    }

    #[test]
    fn test_get_content_type() {
        assert_eq!(get_content_type("a.PNG"), "image/png");
        assert_eq!(get_content_type("a.jpeg"), "image/jpeg");
        assert_eq!(get_content_type("a"), "application/octet-stream");
    }
}
