//! Database repositories
//!
//! Each repository owns the SQL for one part of the Content Store and
//! implements it for both SQLite and MySQL. Write operations run inside a
//! single transaction per call.

pub mod article;
pub mod image;
pub mod like;
pub mod topic;

pub use article::{ArticleRepository, SqlxArticleRepository, RELATED_ARTICLES_LIMIT};
pub use image::{ImageRepository, SqlxImageRepository};
pub use like::{LikeRepository, SqlxLikeRepository};
pub use topic::{TopicRepository, SqlxTopicRepository};
