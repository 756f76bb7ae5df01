//! Article model
//!
//! This module provides:
//! - `Article` entity, a named record replacing positional row access
//! - `ArticleStatus` enum for publication states
//! - `UpsertArticleInput` used for both first publish and later edits

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Highest id an article may have
pub const MAX_ARTICLE_ID: i64 = i64::MAX - 1;

/// Article entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    /// Application-assigned identifier, immutable once stored
    pub id: i64,
    /// Publication status
    pub status: ArticleStatus,
    /// Creation timestamp (set on first insert)
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
    /// Article title
    pub title: String,
    /// Short description shown in listings
    pub description: String,
    /// Normalized topic labels, sorted
    #[serde(default)]
    pub topics: Vec<String>,
    /// Raw thumbnail image bytes
    #[serde(skip)]
    pub thumbnail: Option<Vec<u8>>,
    /// Body in placeholder (template) form
    pub content: String,
    /// Plain-text rendition of the body used for search
    pub text_content: String,
}

impl Article {
    /// Whether the article is visible to readers
    pub fn is_published(&self) -> bool {
        self.status == ArticleStatus::Publish
    }
}

/// Article publication status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    /// Draft - only visible to the editor
    #[default]
    Draft,
    /// Published - visible to readers
    Publish,
}

impl ArticleStatus {
    /// Convert status to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ArticleStatus::Draft => "draft",
            ArticleStatus::Publish => "publish",
        }
    }

    /// Parse status from its string form
    ///
    /// `published` is accepted as an alias of `publish`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "draft" => Some(ArticleStatus::Draft),
            "publish" | "published" => Some(ArticleStatus::Publish),
            _ => None,
        }
    }
}

impl std::fmt::Display for ArticleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Input for inserting or updating an article by id
#[derive(Debug, Clone, Default)]
pub struct UpsertArticleInput {
    pub id: i64,
    pub status: ArticleStatus,
    pub title: String,
    pub description: String,
    /// Desired topic set; normalized by the store before reconciliation
    pub topics: Vec<String>,
    /// `None` keeps the stored thumbnail on update
    pub thumbnail: Option<Vec<u8>>,
    /// Body in placeholder form
    pub content: String,
    pub text_content: String,
}
