//! Article image repository
//!
//! Images are stored as raw bytes and handed back base64-encoded, ready to be
//! embedded as data URIs.

use crate::db::{Backend, DynDatabasePool};
use crate::models::ArticleImage;
use anyhow::{Context, Result};
use async_trait::async_trait;
use data_encoding::BASE64;
use std::collections::HashMap;
use std::sync::Arc;

/// Article image repository trait
#[async_trait]
pub trait ImageRepository: Send + Sync {
    /// Store an image; a second call with the same key is a no-op
    ///
    /// Returns `true` if a row was inserted.
    async fn add_image(&self, image: &ArticleImage) -> Result<bool>;

    /// Map of file name to base64 image data for an article
    async fn get_images(&self, article_id: i64) -> Result<HashMap<String, String>>;
}

/// SQLx-based image repository implementation
pub struct SqlxImageRepository {
    pool: DynDatabasePool,
}

impl SqlxImageRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ImageRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ImageRepository for SqlxImageRepository {
    async fn add_image(&self, image: &ArticleImage) -> Result<bool> {
        let result = match self.pool.backend()? {
            Backend::Sqlite(pool) => {
                sqlx::query(
                    r#"
                    INSERT OR IGNORE INTO article_images (image_key, article_id, file_name, image)
                    VALUES (?, ?, ?, ?)
                    "#,
                )
                .bind(&image.key)
                .bind(image.article_id)
                .bind(&image.file_name)
                .bind(&image.data)
                .execute(pool)
                .await
                .map(|r| r.rows_affected())
            }
            Backend::Mysql(pool) => {
                sqlx::query(
                    r#"
                    INSERT IGNORE INTO article_images (image_key, article_id, file_name, image)
                    VALUES (?, ?, ?, ?)
                    "#,
                )
                .bind(&image.key)
                .bind(image.article_id)
                .bind(&image.file_name)
                .bind(&image.data)
                .execute(pool)
                .await
                .map(|r| r.rows_affected())
            }
        };

        let inserted = result.context("Failed to add article image")? > 0;
        tracing::debug!(
            "Stored image {} ({} bytes, inserted: {})",
            image.key,
            image.data.len(),
            inserted
        );
        Ok(inserted)
    }

    async fn get_images(&self, article_id: i64) -> Result<HashMap<String, String>> {
        let rows = match self.pool.backend()? {
            Backend::Sqlite(pool) => {
                sqlx::query_as::<_, (String, Vec<u8>)>("SELECT file_name, image FROM article_images WHERE article_id = ?")
                    .bind(article_id)
                    .fetch_all(pool)
                    .await
            }
            Backend::Mysql(pool) => {
                sqlx::query_as::<_, (String, Vec<u8>)>("SELECT file_name, image FROM article_images WHERE article_id = ?")
                    .bind(article_id)
                    .fetch_all(pool)
                    .await
            }
        }
        .context("Failed to get article images")?;

        Ok(rows
            .into_iter()
            .map(|(file_name, data)| (file_name, BASE64.encode(&data)))
            .collect())
    }
}
