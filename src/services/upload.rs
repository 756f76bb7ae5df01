//! Upload service
//!
//! Stores images uploaded from the editor. Each image is written to the
//! upload directory first and then recorded against its article, so the
//! editor can reference it by URL right away and the stored copy can be
//! embedded when the article is rendered. A failed database write leaves the
//! file on disk.

use crate::config::UploadConfig;
use crate::db::repositories::ImageRepository;
use crate::models::ArticleImage;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;

/// Error types for upload operations
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// Rejected input (file name, type or size)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Writing to the upload directory failed
    #[error("Failed to store file: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Service for editor image uploads
pub struct UploadService {
    images: Arc<dyn ImageRepository>,
    config: UploadConfig,
}

impl UploadService {
    pub fn new(images: Arc<dyn ImageRepository>, config: UploadConfig) -> Self {
        Self { images, config }
    }

    /// Directory uploads are written to
    pub fn upload_dir(&self) -> &PathBuf {
        &self.config.path
    }

    /// Store an uploaded image for an article
    ///
    /// Returns the public location of the file, `<url_prefix><file name>`.
    pub async fn save_image(
        &self,
        article_id: i64,
        filename: &str,
        content_type: Option<&str>,
        data: &[u8],
    ) -> Result<String, UploadError> {
        let file_name = secure_filename(filename);
        if file_name.is_empty() {
            return Err(UploadError::Validation(format!(
                "Invalid file name: {:?}",
                filename
            )));
        }

        let content_type = resolve_content_type(content_type, &file_name);
        if !self.config.is_type_allowed(content_type) {
            return Err(UploadError::Validation(format!(
                "Invalid file type: {}. Allowed types: {:?}",
                content_type, self.config.allowed_types
            )));
        }

        if data.len() as u64 > self.config.max_file_size {
            return Err(UploadError::Validation(format!(
                "File too large. Maximum size: {} bytes ({} MB)",
                self.config.max_file_size,
                self.config.max_file_size / 1024 / 1024
            )));
        }

        fs::create_dir_all(&self.config.path).await?;
        fs::write(self.config.path.join(&file_name), data).await?;

        let image = ArticleImage::new(article_id, file_name.as_str(), data.to_vec());
        self.images.add_image(&image).await?;

        tracing::info!(
            "Uploaded image {} for article {} ({} bytes)",
            file_name,
            article_id,
            data.len()
        );

        Ok(format!("{}{}", self.config.normalized_url_prefix(), file_name))
    }
}

/// Make an uploaded file name safe to use as a path component
///
/// Non-ASCII characters are dropped, path separators become spaces,
/// whitespace runs become `_`, anything outside `[A-Za-z0-9_.-]` is removed
/// and leading/trailing `.` and `_` are stripped. May return an empty string.
pub fn secure_filename(filename: &str) -> String {
    let ascii: String = filename
        .chars()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let joined = ascii.split_whitespace().collect::<Vec<_>>().join("_");

    joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect::<String>()
        .trim_matches(|c| c == '.' || c == '_')
        .to_string()
}

/// Content type sent by the client, or one guessed from the extension when
/// the client sent none or a generic one
fn resolve_content_type<'a>(declared: Option<&'a str>, file_name: &str) -> &'a str {
    match declared {
        Some(ct) if !ct.is_empty() && ct != "application/octet-stream" => ct,
        _ => guess_image_type(file_name),
    }
}

fn guess_image_type(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxImageRepository;
    use crate::db::{create_test_pool, migrations};

    async fn setup_service(dir: &std::path::Path) -> (UploadService, Arc<dyn ImageRepository>) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let images = SqlxImageRepository::boxed(pool);
        let config = UploadConfig {
            path: dir.join("uploads"),
            max_file_size: 16,
            ..UploadConfig::default()
        };
        (UploadService::new(images.clone(), config), images)
    }

    #[test]
    fn test_secure_filename() {
        assert_eq!(secure_filename("My cool movie.mov"), "My_cool_movie.mov");
        assert_eq!(secure_filename("../../../etc/passwd"), "etc_passwd");
        assert_eq!(secure_filename("i contain cool \u{fc}ml\u{e4}uts.txt"), "i_contain_cool_mluts.txt");
        assert_eq!(secure_filename("__.hidden.png"), "hidden.png");
        assert_eq!(secure_filename("a\\b\\c.jpg"), "a_b_c.jpg");
        assert_eq!(secure_filename("..."), "");
    }

    #[test]
    fn test_resolve_content_type() {
        assert_eq!(resolve_content_type(Some("image/png"), "x.jpg"), "image/png");
        assert_eq!(resolve_content_type(None, "x.JPG"), "image/jpeg");
        assert_eq!(
            resolve_content_type(Some("application/octet-stream"), "x.webp"),
            "image/webp"
        );
        assert_eq!(resolve_content_type(None, "x"), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_save_image_writes_file_then_row() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let (service, images) = setup_service(temp_dir.path()).await;

        let location = service
            .save_image(4, "my cat.png", Some("image/png"), b"pngdata")
            .await
            .expect("Upload should succeed");
        assert_eq!(location, "/uploads/my_cat.png");

        let on_disk = std::fs::read(temp_dir.path().join("uploads").join("my_cat.png")).unwrap();
        assert_eq!(on_disk, b"pngdata");

        let stored = images.get_images(4).await.unwrap();
        assert!(stored.contains_key("my_cat.png"));
    }

    #[tokio::test]
    async fn test_save_image_twice_is_idempotent() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let (service, images) = setup_service(temp_dir.path()).await;

        for _ in 0..2 {
            service
                .save_image(1, "a.gif", None, b"gif")
                .await
                .expect("Upload should succeed");
        }
        assert_eq!(images.get_images(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_save_image_rejects_bad_input() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let (service, _images) = setup_service(temp_dir.path()).await;

        let err = service
            .save_image(1, "notes.txt", Some("text/plain"), b"hi")
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Validation(_)));

        let err = service
            .save_image(1, "big.png", Some("image/png"), &[0u8; 17])
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Validation(_)));

        let err = service
            .save_image(1, "..", Some("image/png"), b"x")
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Validation(_)));

        assert!(!temp_dir.path().join("uploads").join("big.png").exists());
    }
}
