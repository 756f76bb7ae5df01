//! Shared API response types
//!
//! Response structures used by both the JSON endpoints and the page
//! templates, so a listing looks the same wherever it is rendered.

use serde::Serialize;

use crate::models::Article;
use crate::services::data_uri;

/// Date format shown on article pages and listings
pub const DATE_FORMAT: &str = "%B %-d, %Y";

/// Article fields needed by listings and page headers
#[derive(Debug, Clone, Serialize)]
pub struct ArticleSummary {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub status: String,
    pub topics: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
    /// Thumbnail as a `data:` URI
    pub thumbnail: Option<String>,
}

impl From<&Article> for ArticleSummary {
    fn from(article: &Article) -> Self {
        Self {
            id: article.id,
            title: article.title.clone(),
            description: article.description.clone(),
            status: article.status.to_string(),
            topics: article.topics.clone(),
            created_at: article.created_at.format(DATE_FORMAT).to_string(),
            updated_at: article.updated_at.format(DATE_FORMAT).to_string(),
            thumbnail: article.thumbnail.as_deref().map(data_uri),
        }
    }
}

/// Convert a list of articles for display
pub fn summaries(articles: &[Article]) -> Vec<ArticleSummary> {
    articles.iter().map(ArticleSummary::from).collect()
}

/// `{"results": ...}` envelope
#[derive(Debug, Serialize)]
pub struct ResultsResponse<T> {
    pub results: T,
}

impl<T> ResultsResponse<T> {
    pub fn new(results: T) -> Self {
        Self { results }
    }
}

/// `{"location": ...}` envelope returned for uploads
#[derive(Debug, Serialize)]
pub struct LocationResponse {
    pub location: String,
}
