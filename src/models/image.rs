//! Article image model

use serde::{Deserialize, Serialize};

/// An image uploaded while authoring an article.
///
/// Images are written once on upload and never updated individually.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleImage {
    /// Unique key, see [`image_key`]
    pub key: String,
    pub article_id: i64,
    /// Sanitized file name, also the placeholder name in article bodies
    pub file_name: String,
    #[serde(skip)]
    pub data: Vec<u8>,
}

impl ArticleImage {
    pub fn new(article_id: i64, file_name: impl Into<String>, data: Vec<u8>) -> Self {
        let file_name = file_name.into();
        Self {
            key: image_key(article_id, &file_name),
            article_id,
            file_name,
            data,
        }
    }
}

/// Build the unique key of an article image.
///
/// Re-uploading the same file name for the same article yields the same key.
pub fn image_key(article_id: i64, file_name: &str) -> String {
    format!("{}_{}", article_id, file_name)
}
