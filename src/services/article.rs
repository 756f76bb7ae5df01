//! Article service
//!
//! Implements business logic for article management:
//! - Allocating ids for new drafts
//! - Publishing (encode body, derive search text, upsert with topics)
//! - Rendering stored bodies with their embedded images
//! - Listing, searching, status changes and deletion

use crate::db::repositories::{
    ArticleRepository, ImageRepository, LikeRepository, TopicRepository, RELATED_ARTICLES_LIMIT,
};
use crate::models::{
    join_topics, split_topics, Article, ArticleStatus, LikeSummary, UpsertArticleInput,
    MAX_ARTICLE_ID,
};
use crate::services::content::ContentCodec;
use std::collections::HashMap;
use std::sync::Arc;

/// Error types for article service operations
#[derive(Debug, thiserror::Error)]
pub enum ArticleServiceError {
    /// Article not found
    #[error("Article not found: {0}")]
    NotFound(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// A fresh editor session
#[derive(Debug, Clone)]
pub struct NewArticleDraft {
    /// Id reserved for the article (not yet stored)
    pub article_id: i64,
    /// Known topics to pick from
    pub topics: Vec<String>,
}

/// Editor submission
#[derive(Debug, Clone, Default)]
pub struct PublishInput {
    pub article_id: i64,
    pub status: ArticleStatus,
    pub title: String,
    pub description: String,
    /// Comma-separated topic labels as typed
    pub topics: String,
    /// New thumbnail; `None` keeps the current one
    pub thumbnail: Option<Vec<u8>>,
    /// Body HTML as produced by the editor
    pub content: String,
}

/// An article ready to be shown to a reader
#[derive(Debug, Clone)]
pub struct ArticleView {
    pub article: Article,
    /// Body HTML with images embedded
    pub body: String,
    pub likes: LikeSummary,
    /// Published articles sharing the first topic
    pub related: Vec<Article>,
}

/// An article loaded back into the editor
#[derive(Debug, Clone)]
pub struct ArticleEditor {
    pub article: Article,
    /// Body HTML with images pointing at the upload directory
    pub body: String,
    /// File name to base64 data of every stored image
    pub images: HashMap<String, String>,
    /// Known topics to pick from
    pub topics: Vec<String>,
    /// The article's own topics as the comma-separated field value
    pub article_topics: String,
}

/// Article service for managing blog articles
pub struct ArticleService {
    repo: Arc<dyn ArticleRepository>,
    topic_repo: Arc<dyn TopicRepository>,
    image_repo: Arc<dyn ImageRepository>,
    like_repo: Arc<dyn LikeRepository>,
    codec: ContentCodec,
}

impl ArticleService {
    /// Create a new article service
    pub fn new(
        repo: Arc<dyn ArticleRepository>,
        topic_repo: Arc<dyn TopicRepository>,
        image_repo: Arc<dyn ImageRepository>,
        like_repo: Arc<dyn LikeRepository>,
        codec: ContentCodec,
    ) -> Self {
        Self {
            repo,
            topic_repo,
            image_repo,
            like_repo,
            codec,
        }
    }

    /// Content codec used for bodies
    pub fn codec(&self) -> &ContentCodec {
        &self.codec
    }

    /// Start a new article: reserve an id and offer the known topics
    pub async fn new_article(&self) -> Result<NewArticleDraft, ArticleServiceError> {
        let article_id = self.repo.allocate_next_article_id().await?;
        let topics = self.known_topics().await;
        Ok(NewArticleDraft { article_id, topics })
    }

    /// Store an editor submission, creating or updating the article
    pub async fn publish(&self, input: PublishInput) -> Result<i64, ArticleServiceError> {
        if !(0..=MAX_ARTICLE_ID).contains(&input.article_id) {
            return Err(ArticleServiceError::ValidationError(format!(
                "Invalid article id: {}",
                input.article_id
            )));
        }
        let title = input.title.trim();
        if title.is_empty() {
            return Err(ArticleServiceError::ValidationError(
                "Title cannot be empty".to_string(),
            ));
        }

        let upsert = UpsertArticleInput {
            id: input.article_id,
            status: input.status,
            title: title.to_string(),
            description: input.description.trim().to_string(),
            topics: split_topics(&input.topics),
            thumbnail: input.thumbnail.filter(|t| !t.is_empty()),
            content: self.codec.encode(&input.content),
            text_content: self.codec.plain_text(&input.content),
        };

        let created = self.repo.upsert_article(&upsert).await?;
        tracing::info!(
            "{} article {} ({})",
            if created { "Created" } else { "Updated" },
            upsert.id,
            upsert.status
        );
        Ok(upsert.id)
    }

    /// Load an article for reading
    pub async fn view(&self, id: i64, user_id: &str) -> Result<ArticleView, ArticleServiceError> {
        let article = self.get(id).await?;
        let images = self.image_repo.get_images(id).await?;
        let body = self.codec.render(&article.content, &images);
        let likes = self.like_repo.get_like_count(id, user_id).await?;

        let related = match article.topics.first() {
            Some(topic) => {
                self.repo
                    .list_related_articles(ArticleStatus::Publish, topic, id, RELATED_ARTICLES_LIMIT)
                    .await?
            }
            None => Vec::new(),
        };

        Ok(ArticleView {
            article,
            body,
            likes,
            related,
        })
    }

    /// Load an article back into the editor
    pub async fn edit(&self, id: i64) -> Result<ArticleEditor, ArticleServiceError> {
        let article = self.get(id).await?;
        let images = self.image_repo.get_images(id).await?;
        let body = self.codec.upload_sources(&article.content);
        let topics = self.known_topics().await;
        let article_topics = join_topics(&article.topics);

        Ok(ArticleEditor {
            article,
            body,
            images,
            topics,
            article_topics,
        })
    }

    /// Get article by ID
    pub async fn get(&self, id: i64) -> Result<Article, ArticleServiceError> {
        self.repo
            .get_article(id)
            .await?
            .ok_or_else(|| ArticleServiceError::NotFound(id.to_string()))
    }

    /// List articles with a status, newest first
    pub async fn list(&self, status: ArticleStatus) -> Result<Vec<Article>, ArticleServiceError> {
        Ok(self.repo.list_articles(status).await?)
    }

    /// Search articles with a status, newest first
    pub async fn search(
        &self,
        status: ArticleStatus,
        query: &str,
    ) -> Result<Vec<Article>, ArticleServiceError> {
        Ok(self.repo.search_articles(status, query).await?)
    }

    /// List articles with a status carrying a topic, newest first
    pub async fn list_by_topic(
        &self,
        status: ArticleStatus,
        topic: &str,
    ) -> Result<Vec<Article>, ArticleServiceError> {
        Ok(self.repo.list_articles_by_topic(status, topic).await?)
    }

    /// Change the status of an article
    pub async fn set_status(
        &self,
        id: i64,
        status: ArticleStatus,
    ) -> Result<(), ArticleServiceError> {
        if self.repo.set_status(id, status).await? {
            tracing::info!("Article {} is now {}", id, status);
            Ok(())
        } else {
            Err(ArticleServiceError::NotFound(id.to_string()))
        }
    }

    /// Delete an article and everything attached to it
    pub async fn delete(&self, id: i64) -> Result<(), ArticleServiceError> {
        if self.repo.delete_article(id).await? {
            tracing::info!("Deleted article {}", id);
            Ok(())
        } else {
            Err(ArticleServiceError::NotFound(id.to_string()))
        }
    }

    /// All topic labels; a failing lookup degrades to an empty list
    async fn known_topics(&self) -> Vec<String> {
        match self.topic_repo.list_topics().await {
            Ok(topics) => topics,
            Err(e) => {
                tracing::warn!("Failed to list topics: {:#}", e);
                Vec::new()
            }
        }
    }
}
