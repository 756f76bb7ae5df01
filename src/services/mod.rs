//! Services layer - Business logic
//!
//! Services sit between the HTTP handlers and the Content Store:
//! - `content`: the content pipeline (placeholder encoding, rendering,
//!   plain-text extraction)
//! - `article`: publishing and rendering orchestration
//! - `upload`: editor image uploads
//! - `like`: like toggling and reader fingerprints

pub mod article;
pub mod content;
pub mod like;
pub mod upload;

pub use article::{
    ArticleEditor, ArticleService, ArticleServiceError, ArticleView, NewArticleDraft, PublishInput,
};
pub use content::{data_uri, ContentCodec};
pub use like::{generate_fingerprint, resolve_user_id, LikeService};
pub use upload::{secure_filename, UploadError, UploadService};
