//! Like service
//!
//! Readers like articles without an account. A reader is identified by the
//! `user_id` the page sends along, or failing that by a fingerprint of client
//! IP and user agent.

use crate::db::repositories::{ArticleRepository, LikeRepository};
use crate::models::LikeSummary;
use crate::services::article::ArticleServiceError;
use std::sync::Arc;

/// Service for article likes
pub struct LikeService {
    repo: Arc<dyn LikeRepository>,
    articles: Arc<dyn ArticleRepository>,
}

impl LikeService {
    pub fn new(repo: Arc<dyn LikeRepository>, articles: Arc<dyn ArticleRepository>) -> Self {
        Self { repo, articles }
    }

    /// Like the article if the user has not, otherwise take the like back
    pub async fn toggle(
        &self,
        article_id: i64,
        user_id: &str,
    ) -> Result<LikeSummary, ArticleServiceError> {
        self.ensure_article(article_id).await?;
        Ok(self.repo.toggle_like(article_id, user_id).await?)
    }

    /// Like count and whether `user_id` liked the article
    pub async fn get(&self, article_id: i64, user_id: &str) -> Result<LikeSummary, ArticleServiceError> {
        Ok(self.repo.get_like_count(article_id, user_id).await?)
    }

    async fn ensure_article(&self, article_id: i64) -> Result<(), ArticleServiceError> {
        if self.articles.article_exists(article_id).await? {
            Ok(())
        } else {
            Err(ArticleServiceError::NotFound(article_id.to_string()))
        }
    }
}

/// Generate fingerprint from IP and User-Agent
pub fn generate_fingerprint(ip: &str, user_agent: &str) -> String {
    let data = format!("{}:{}", ip, user_agent);
    format!("{:x}", md5::compute(data))
}

/// Identity a like is recorded under
///
/// An explicit, non-blank user id wins; otherwise the client fingerprint.
pub fn resolve_user_id(explicit: Option<&str>, ip: &str, user_agent: &str) -> String {
    match explicit.map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => generate_fingerprint(ip, user_agent),
    }
}
