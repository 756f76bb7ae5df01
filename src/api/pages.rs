//! HTML pages
//!
//! Server-rendered pages for readers and the editor:
//! - GET / and /articles/published - published articles
//! - GET /articles/drafts - drafts, with edit links
//! - GET /articles/search?q= - published articles matching a query
//! - GET /articles/topic/{topic} - published articles with a topic
//! - GET /articles/{id} - a single article
//! - GET /articles/new_article - editor for a new article
//! - GET /articles/edit_article/{id} - editor for an existing article
//!
//! Failures render `error.html` with a matching status code.

use axum::{
    extract::{Path, Query, State},
    http::{StatusCode, Uri},
    response::Html,
    routing::get,
    Router,
};
use serde::Deserialize;
use tera::Context as TeraContext;

use crate::api::middleware::{AppState, ClientIdentity};
use crate::api::responses::{summaries, ArticleSummary};
use crate::models::ArticleStatus;
use crate::services::{resolve_user_id, ArticleServiceError};
use crate::theme::StandardTemplateVars;

type PageResult = Result<Html<String>, (StatusCode, Html<String>)>;

/// Query parameters for search
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

/// Build the page router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(published_articles))
        .route("/articles/published", get(published_articles))
        .route("/articles/drafts", get(draft_articles))
        .route("/articles/search", get(search_articles))
        .route("/articles/topic/{topic}", get(topic_articles))
        .route("/articles/new_article", get(new_article))
        .route("/articles/edit_article/{id}", get(edit_article))
        .route("/articles/{id}", get(view_article))
}

/// GET / - Published articles, newest first
async fn published_articles(State(state): State<AppState>, uri: Uri) -> PageResult {
    let articles = state
        .article_service
        .list(ArticleStatus::Publish)
        .await
        .map_err(|e| service_error_page(&state, &uri, e))?;

    let mut context = TeraContext::new();
    context.insert("heading", "Latest articles");
    context.insert("articles", &summaries(&articles));
    context.insert("editable", &false);
    render_page(&state, &uri, "index.html", &context)
}

/// GET /articles/drafts - Drafts, each with an edit link
async fn draft_articles(State(state): State<AppState>, uri: Uri) -> PageResult {
    let articles = state
        .article_service
        .list(ArticleStatus::Draft)
        .await
        .map_err(|e| service_error_page(&state, &uri, e))?;

    let mut context = TeraContext::new();
    context.insert("heading", "Drafts");
    context.insert("articles", &summaries(&articles));
    context.insert("editable", &true);
    render_page(&state, &uri, "index.html", &context)
}

/// GET /articles/search?q= - Full-text search over published articles
async fn search_articles(
    State(state): State<AppState>,
    uri: Uri,
    Query(query): Query<SearchQuery>,
) -> PageResult {
    let q = query.q.trim();
    let articles = state
        .article_service
        .search(ArticleStatus::Publish, q)
        .await
        .map_err(|e| service_error_page(&state, &uri, e))?;

    let mut context = TeraContext::new();
    context.insert("heading", &format!("Search results for \"{}\"", q));
    context.insert("query", q);
    context.insert("articles", &summaries(&articles));
    context.insert("editable", &false);
    render_page(&state, &uri, "index.html", &context)
}

/// GET /articles/topic/{topic} - Published articles with a topic
async fn topic_articles(
    State(state): State<AppState>,
    uri: Uri,
    Path(topic): Path<String>,
) -> PageResult {
    let articles = state
        .article_service
        .list_by_topic(ArticleStatus::Publish, &topic)
        .await
        .map_err(|e| service_error_page(&state, &uri, e))?;

    let mut context = TeraContext::new();
    context.insert("heading", &format!("Articles about {}", topic.trim()));
    context.insert("articles", &summaries(&articles));
    context.insert("editable", &false);
    render_page(&state, &uri, "index.html", &context)
}

/// GET /articles/{id} - A single article with its images, likes and
/// related articles
async fn view_article(
    State(state): State<AppState>,
    uri: Uri,
    client: ClientIdentity,
    Path(id): Path<String>,
) -> PageResult {
    let id = parse_id(&state, &uri, &id)?;
    let user_id = resolve_user_id(None, &client.ip, &client.user_agent);

    let view = state
        .article_service
        .view(id, &user_id)
        .await
        .map_err(|e| service_error_page(&state, &uri, e))?;

    let mut context = TeraContext::new();
    context.insert("article", &ArticleSummary::from(&view.article));
    context.insert("body", &view.body);
    context.insert("likes", &view.likes);
    context.insert("related", &summaries(&view.related));
    render_page(&state, &uri, "article.html", &context)
}

/// GET /articles/new_article - Editor with a freshly reserved id
async fn new_article(State(state): State<AppState>, uri: Uri) -> PageResult {
    let draft = state
        .article_service
        .new_article()
        .await
        .map_err(|e| service_error_page(&state, &uri, e))?;

    let mut context = TeraContext::new();
    context.insert("article_id", &draft.article_id);
    context.insert("topics", &draft.topics);
    context.insert("article_topics", "");
    context.insert("body", "");
    context.insert("status", ArticleStatus::Draft.as_str());
    render_page(&state, &uri, "editor.html", &context)
}

/// GET /articles/edit_article/{id} - Editor loaded with an existing article
async fn edit_article(
    State(state): State<AppState>,
    uri: Uri,
    Path(id): Path<String>,
) -> PageResult {
    let id = parse_id(&state, &uri, &id)?;
    let editor = state
        .article_service
        .edit(id)
        .await
        .map_err(|e| service_error_page(&state, &uri, e))?;

    let mut context = TeraContext::new();
    context.insert("article_id", &editor.article.id);
    context.insert("article", &ArticleSummary::from(&editor.article));
    context.insert("topics", &editor.topics);
    context.insert("article_topics", &editor.article_topics);
    context.insert("body", &editor.body);
    context.insert("status", editor.article.status.as_str());
    render_page(&state, &uri, "editor.html", &context)
}

fn standard_vars(state: &AppState, uri: &Uri) -> StandardTemplateVars {
    StandardTemplateVars::new(
        state.config.site.name.as_str(),
        state.config.site.description.as_str(),
        uri.path(),
    )
}

fn render_page(state: &AppState, uri: &Uri, template: &str, context: &TeraContext) -> PageResult {
    state
        .templates
        .render_with_standard_vars(template, context, &standard_vars(state, uri))
        .map(Html)
        .map_err(|e| {
            tracing::error!("{:#}", e);
            error_page(
                state,
                uri,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Something went wrong",
                "The page could not be rendered.",
            )
        })
}

fn parse_id(state: &AppState, uri: &Uri, raw: &str) -> Result<i64, (StatusCode, Html<String>)> {
    raw.parse::<i64>().map_err(|_| {
        error_page(
            state,
            uri,
            StatusCode::NOT_FOUND,
            "Not found",
            &format!("No article with id {:?}", raw),
        )
    })
}

fn service_error_page(
    state: &AppState,
    uri: &Uri,
    e: ArticleServiceError,
) -> (StatusCode, Html<String>) {
    match e {
        ArticleServiceError::NotFound(id) => error_page(
            state,
            uri,
            StatusCode::NOT_FOUND,
            "Not found",
            &format!("No article with id {}", id),
        ),
        ArticleServiceError::ValidationError(msg) => {
            error_page(state, uri, StatusCode::BAD_REQUEST, "Bad request", &msg)
        }
        ArticleServiceError::InternalError(e) => {
            tracing::error!("Page {} failed: {:#}", uri.path(), e);
            error_page(
                state,
                uri,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Something went wrong",
                "The page could not be loaded.",
            )
        }
    }
}

fn error_page(
    state: &AppState,
    uri: &Uri,
    status: StatusCode,
    title: &str,
    message: &str,
) -> (StatusCode, Html<String>) {
    let mut context = TeraContext::new();
    standard_vars(state, uri).insert_into(&mut context);
    context.insert("error_title", title);
    context.insert("error_message", message);
    (
        status,
        Html(state.templates.render_with_fallback("error.html", &context)),
    )
}
