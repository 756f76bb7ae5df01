//! Data models
//!
//! Named records shared by the store, the services and the HTTP layer:
//! - Articles and their publication status
//! - Uploaded article images
//! - Like summaries
//! - Topic label normalization

mod article;
mod image;
mod like;
pub mod topic;

pub use article::{Article, ArticleStatus, UpsertArticleInput, MAX_ARTICLE_ID};
pub use image::{image_key, ArticleImage};
pub use like::LikeSummary;
pub use topic::{join_topics, normalize_topic, normalize_topics, split_topics};
