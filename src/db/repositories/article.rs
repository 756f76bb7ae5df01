//! Article repository
//!
//! Database operations for articles.
//!
//! This module provides:
//! - `ArticleRepository` trait defining the interface for article data access
//! - `SqlxArticleRepository` implementing the trait for SQLite and MySQL
//!
//! Article ids are allocated by the application (`max + 1`) rather than by
//! the database, because the editor needs an id before the first save so
//! uploaded images can be keyed to it. Allocation is not atomic: two editors
//! opening "new article" at the same moment receive the same id.
//!
//! Every write runs in its own transaction. On SQLite the `articles_fts`
//! search table is maintained in the same transaction as the article row.

use super::topic::{
    article_topics_mysql, article_topics_sqlite, reconcile_topics_mysql, reconcile_topics_sqlite,
};
use crate::db::{Backend, DynDatabasePool};
use crate::models::{normalize_topic, Article, ArticleStatus, UpsertArticleInput, MAX_ARTICLE_ID};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySql, MySqlConnection, QueryBuilder, Row, Sqlite, SqliteConnection};
use std::collections::HashMap;
use std::sync::Arc;

/// Default number of related articles shown under an article
pub const RELATED_ARTICLES_LIMIT: i64 = 5;

const ARTICLE_COLUMNS: &str = "a.article_id, a.status, a.created_at, a.updated_at, a.title, \
     a.short_description, a.thumbnail, a.content, a.text_content";

/// Article repository trait
#[async_trait]
pub trait ArticleRepository: Send + Sync {
    /// Next free article id: `max(id) + 1`, or `0` for an empty store
    ///
    /// Fails once the next id would exceed `MAX_ARTICLE_ID`.
    async fn allocate_next_article_id(&self) -> Result<i64>;

    /// Check if an article with this id is stored
    async fn article_exists(&self, id: i64) -> Result<bool>;

    /// Insert the article if absent, otherwise update it
    ///
    /// A `None` thumbnail keeps the stored one. Topic assignments are
    /// reconciled in the same transaction. Returns `true` if the article
    /// was created.
    async fn upsert_article(&self, input: &UpsertArticleInput) -> Result<bool>;

    /// Set the status of an article. Returns `false` if it does not exist.
    async fn set_status(&self, id: i64, status: ArticleStatus) -> Result<bool>;

    /// Delete an article with its topic assignments, images and likes.
    /// Returns `false` if it does not exist.
    async fn delete_article(&self, id: i64) -> Result<bool>;

    /// List articles with a status, newest first
    async fn list_articles(&self, status: ArticleStatus) -> Result<Vec<Article>>;

    /// Get article by ID
    async fn get_article(&self, id: i64) -> Result<Option<Article>>;

    /// Full-text search over title and plain-text body, newest first
    async fn search_articles(&self, status: ArticleStatus, query: &str) -> Result<Vec<Article>>;

    /// List articles carrying a topic, newest first
    async fn list_articles_by_topic(
        &self,
        status: ArticleStatus,
        topic: &str,
    ) -> Result<Vec<Article>>;

    /// Random selection of articles sharing a topic, excluding one article
    async fn list_related_articles(
        &self,
        status: ArticleStatus,
        topic: &str,
        excluding_id: i64,
        limit: i64,
    ) -> Result<Vec<Article>>;
}

/// SQLx-based article repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxArticleRepository {
    pool: DynDatabasePool,
}

impl SqlxArticleRepository {
    /// Create a new SQLx article repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ArticleRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ArticleRepository for SqlxArticleRepository {
    async fn allocate_next_article_id(&self) -> Result<i64> {
        let max_id = match self.pool.backend()? {
            Backend::Sqlite(pool) => {
                sqlx::query_scalar::<_, Option<i64>>("SELECT MAX(article_id) FROM articles")
                    .fetch_one(pool)
                    .await
            }
            Backend::Mysql(pool) => {
                sqlx::query_scalar::<_, Option<i64>>("SELECT MAX(article_id) FROM articles")
                    .fetch_one(pool)
                    .await
            }
        }
        .context("Failed to allocate article id")?;

        match max_id {
            None => Ok(0),
            Some(max_id) => max_id
                .checked_add(1)
                .filter(|id| *id <= MAX_ARTICLE_ID)
                .ok_or_else(|| anyhow::anyhow!("Article ids exhausted: highest id is {}", max_id)),
        }
    }

    async fn article_exists(&self, id: i64) -> Result<bool> {
        match self.pool.backend()? {
            Backend::Sqlite(pool) => {
                let mut conn = pool.acquire().await.context("Failed to acquire connection")?;
                article_exists_sqlite(&mut conn, id).await
            }
            Backend::Mysql(pool) => {
                let mut conn = pool.acquire().await.context("Failed to acquire connection")?;
                article_exists_mysql(&mut conn, id).await
            }
        }
    }

    async fn upsert_article(&self, input: &UpsertArticleInput) -> Result<bool> {
        let created = match self.pool.backend()? {
            Backend::Sqlite(pool) => {
                let mut tx = pool.begin().await.context("Failed to begin transaction")?;
                let created = upsert_article_sqlite(&mut tx, input).await?;
                tx.commit().await.context("Failed to commit article")?;
                created
            }
            Backend::Mysql(pool) => {
                let mut tx = pool.begin().await.context("Failed to begin transaction")?;
                let created = upsert_article_mysql(&mut tx, input).await?;
                tx.commit().await.context("Failed to commit article")?;
                created
            }
        };

        tracing::debug!(
            "Saved article {} (created: {}, status: {}, topics: {})",
            input.id,
            created,
            input.status,
            input.topics.len()
        );
        Ok(created)
    }

    async fn set_status(&self, id: i64, status: ArticleStatus) -> Result<bool> {
        let result = match self.pool.backend()? {
            Backend::Sqlite(pool) => {
                sqlx::query("UPDATE articles SET status = ?, updated_at = ? WHERE article_id = ?")
                    .bind(status.as_str())
                    .bind(Utc::now())
                    .bind(id)
                    .execute(pool)
                    .await
                    .map(|r| r.rows_affected())
            }
            Backend::Mysql(pool) => {
                sqlx::query("UPDATE articles SET status = ?, updated_at = ? WHERE article_id = ?")
                    .bind(status.as_str())
                    .bind(Utc::now())
                    .bind(id)
                    .execute(pool)
                    .await
                    .map(|r| r.rows_affected())
            }
        };

        let updated = result.context("Failed to set article status")? > 0;
        tracing::debug!("Set article {} status to {} (found: {})", id, status, updated);
        Ok(updated)
    }

    async fn delete_article(&self, id: i64) -> Result<bool> {
        let deleted = match self.pool.backend()? {
            Backend::Sqlite(pool) => {
                let mut tx = pool.begin().await.context("Failed to begin transaction")?;
                let deleted = delete_article_sqlite(&mut tx, id).await?;
                tx.commit().await.context("Failed to commit article deletion")?;
                deleted
            }
            Backend::Mysql(pool) => {
                let mut tx = pool.begin().await.context("Failed to begin transaction")?;
                let deleted = delete_article_mysql(&mut tx, id).await?;
                tx.commit().await.context("Failed to commit article deletion")?;
                deleted
            }
        };

        tracing::debug!("Deleted article {} (found: {})", id, deleted);
        Ok(deleted)
    }

    async fn list_articles(&self, status: ArticleStatus) -> Result<Vec<Article>> {
        let sql = format!(
            "SELECT {} FROM articles a WHERE a.status = ? \
             ORDER BY a.created_at DESC, a.article_id DESC",
            ARTICLE_COLUMNS
        );

        match self.pool.backend()? {
            Backend::Sqlite(pool) => {
                let mut conn = pool.acquire().await.context("Failed to acquire connection")?;
                let rows = sqlx::query(&sql)
                    .bind(status.as_str())
                    .fetch_all(&mut *conn)
                    .await
                    .context("Failed to list articles")?;
                articles_from_sqlite_rows(&mut conn, &rows).await
            }
            Backend::Mysql(pool) => {
                let mut conn = pool.acquire().await.context("Failed to acquire connection")?;
                let rows = sqlx::query(&sql)
                    .bind(status.as_str())
                    .fetch_all(&mut *conn)
                    .await
                    .context("Failed to list articles")?;
                articles_from_mysql_rows(&mut conn, &rows).await
            }
        }
    }

    async fn get_article(&self, id: i64) -> Result<Option<Article>> {
        let sql = format!("SELECT {} FROM articles a WHERE a.article_id = ?", ARTICLE_COLUMNS);

        match self.pool.backend()? {
            Backend::Sqlite(pool) => {
                let mut conn = pool.acquire().await.context("Failed to acquire connection")?;
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(&mut *conn)
                    .await
                    .context("Failed to get article by ID")?;

                match row {
                    Some(row) => {
                        let mut article = row_to_article_sqlite(&row)?;
                        article.topics = article_topics_sqlite(&mut conn, id).await?;
                        Ok(Some(article))
                    }
                    None => Ok(None),
                }
            }
            Backend::Mysql(pool) => {
                let mut conn = pool.acquire().await.context("Failed to acquire connection")?;
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(&mut *conn)
                    .await
                    .context("Failed to get article by ID")?;

                match row {
                    Some(row) => {
                        let mut article = row_to_article_mysql(&row)?;
                        article.topics = article_topics_mysql(&mut conn, id).await?;
                        Ok(Some(article))
                    }
                    None => Ok(None),
                }
            }
        }
    }

    async fn search_articles(&self, status: ArticleStatus, query: &str) -> Result<Vec<Article>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let articles = match self.pool.backend()? {
            Backend::Sqlite(pool) => {
                let sql = format!(
                    "SELECT {} FROM articles a \
                     INNER JOIN articles_fts ON articles_fts.rowid = a.article_id \
                     WHERE articles_fts MATCH ? AND a.status = ? \
                     ORDER BY a.created_at DESC, a.article_id DESC",
                    ARTICLE_COLUMNS
                );
                let mut conn = pool.acquire().await.context("Failed to acquire connection")?;
                let rows = sqlx::query(&sql)
                    .bind(fts5_phrase(query))
                    .bind(status.as_str())
                    .fetch_all(&mut *conn)
                    .await
                    .context("Failed to search articles")?;
                articles_from_sqlite_rows(&mut conn, &rows).await?
            }
            Backend::Mysql(pool) => {
                let sql = format!(
                    "SELECT {} FROM articles a \
                     WHERE MATCH(a.title, a.text_content) AGAINST (? IN NATURAL LANGUAGE MODE) \
                     AND a.status = ? \
                     ORDER BY a.created_at DESC, a.article_id DESC",
                    ARTICLE_COLUMNS
                );
                let mut conn = pool.acquire().await.context("Failed to acquire connection")?;
                let rows = sqlx::query(&sql)
                    .bind(query)
                    .bind(status.as_str())
                    .fetch_all(&mut *conn)
                    .await
                    .context("Failed to search articles")?;
                articles_from_mysql_rows(&mut conn, &rows).await?
            }
        };

        tracing::debug!("Search {:?} matched {} article(s)", query, articles.len());
        Ok(articles)
    }

    async fn list_articles_by_topic(
        &self,
        status: ArticleStatus,
        topic: &str,
    ) -> Result<Vec<Article>> {
        let sql = format!(
            "SELECT {} FROM articles a \
             INNER JOIN article_topics ta ON ta.article_id = a.article_id \
             INNER JOIN topics t ON t.id = ta.topic_id \
             WHERE t.name = ? AND a.status = ? \
             ORDER BY a.created_at DESC, a.article_id DESC",
            ARTICLE_COLUMNS
        );
        let topic = normalize_topic(topic);

        match self.pool.backend()? {
            Backend::Sqlite(pool) => {
                let mut conn = pool.acquire().await.context("Failed to acquire connection")?;
                let rows = sqlx::query(&sql)
                    .bind(&topic)
                    .bind(status.as_str())
                    .fetch_all(&mut *conn)
                    .await
                    .context("Failed to list articles by topic")?;
                articles_from_sqlite_rows(&mut conn, &rows).await
            }
            Backend::Mysql(pool) => {
                let mut conn = pool.acquire().await.context("Failed to acquire connection")?;
                let rows = sqlx::query(&sql)
                    .bind(&topic)
                    .bind(status.as_str())
                    .fetch_all(&mut *conn)
                    .await
                    .context("Failed to list articles by topic")?;
                articles_from_mysql_rows(&mut conn, &rows).await
            }
        }
    }

    async fn list_related_articles(
        &self,
        status: ArticleStatus,
        topic: &str,
        excluding_id: i64,
        limit: i64,
    ) -> Result<Vec<Article>> {
        let topic = normalize_topic(topic);

        match self.pool.backend()? {
            Backend::Sqlite(pool) => {
                let sql = format!(
                    "SELECT {} FROM articles a \
                     INNER JOIN article_topics ta ON ta.article_id = a.article_id \
                     INNER JOIN topics t ON t.id = ta.topic_id \
                     WHERE t.name = ? AND a.status = ? AND a.article_id <> ? \
                     ORDER BY RANDOM() LIMIT ?",
                    ARTICLE_COLUMNS
                );
                let mut conn = pool.acquire().await.context("Failed to acquire connection")?;
                let rows = sqlx::query(&sql)
                    .bind(&topic)
                    .bind(status.as_str())
                    .bind(excluding_id)
                    .bind(limit)
                    .fetch_all(&mut *conn)
                    .await
                    .context("Failed to list related articles")?;
                articles_from_sqlite_rows(&mut conn, &rows).await
            }
            Backend::Mysql(pool) => {
                let sql = format!(
                    "SELECT {} FROM articles a \
                     INNER JOIN article_topics ta ON ta.article_id = a.article_id \
                     INNER JOIN topics t ON t.id = ta.topic_id \
                     WHERE t.name = ? AND a.status = ? AND a.article_id <> ? \
                     ORDER BY RAND() LIMIT ?",
                    ARTICLE_COLUMNS
                );
                let mut conn = pool.acquire().await.context("Failed to acquire connection")?;
                let rows = sqlx::query(&sql)
                    .bind(&topic)
                    .bind(status.as_str())
                    .bind(excluding_id)
                    .bind(limit)
                    .fetch_all(&mut *conn)
                    .await
                    .context("Failed to list related articles")?;
                articles_from_mysql_rows(&mut conn, &rows).await
            }
        }
    }
}

/// Quote user input as a single FTS5 phrase
fn fts5_phrase(query: &str) -> String {
    format!("\"{}\"", query.replace('"', "\"\""))
}

fn parse_status(raw: &str) -> Result<ArticleStatus> {
    ArticleStatus::parse(raw).ok_or_else(|| anyhow::anyhow!("Invalid article status: {}", raw))
}

/// Attach sorted topic labels to each article, keyed by article id
fn assign_topics(articles: &mut [Article], rows: Vec<(i64, String)>) {
    let mut by_article: HashMap<i64, Vec<String>> = HashMap::new();
    for (article_id, name) in rows {
        by_article.entry(article_id).or_default().push(name);
    }
    for article in articles.iter_mut() {
        article.topics = by_article.remove(&article.id).unwrap_or_default();
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn article_exists_sqlite(conn: &mut SqliteConnection, id: i64) -> Result<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM articles WHERE article_id = ?")
        .bind(id)
        .fetch_one(&mut *conn)
        .await
        .context("Failed to check article existence")?;
    Ok(count > 0)
}

async fn upsert_article_sqlite(
    conn: &mut SqliteConnection,
    input: &UpsertArticleInput,
) -> Result<bool> {
    let now = Utc::now();
    let exists = article_exists_sqlite(conn, input.id).await?;

    if !exists {
        sqlx::query(
            r#"
            INSERT INTO articles (article_id, status, created_at, updated_at, title, short_description, thumbnail, content, text_content)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(input.id)
        .bind(input.status.as_str())
        .bind(now)
        .bind(now)
        .bind(&input.title)
        .bind(&input.description)
        .bind(&input.thumbnail)
        .bind(&input.content)
        .bind(&input.text_content)
        .execute(&mut *conn)
        .await
        .context("Failed to insert article")?;
    } else if let Some(thumbnail) = &input.thumbnail {
        sqlx::query(
            r#"
            UPDATE articles
            SET status = ?, updated_at = ?, title = ?, short_description = ?, thumbnail = ?, content = ?, text_content = ?
            WHERE article_id = ?
            "#,
        )
        .bind(input.status.as_str())
        .bind(now)
        .bind(&input.title)
        .bind(&input.description)
        .bind(thumbnail)
        .bind(&input.content)
        .bind(&input.text_content)
        .bind(input.id)
        .execute(&mut *conn)
        .await
        .context("Failed to update article")?;
    } else {
        sqlx::query(
            r#"
            UPDATE articles
            SET status = ?, updated_at = ?, title = ?, short_description = ?, content = ?, text_content = ?
            WHERE article_id = ?
            "#,
        )
        .bind(input.status.as_str())
        .bind(now)
        .bind(&input.title)
        .bind(&input.description)
        .bind(&input.content)
        .bind(&input.text_content)
        .bind(input.id)
        .execute(&mut *conn)
        .await
        .context("Failed to update article")?;
    }

    sqlx::query("DELETE FROM articles_fts WHERE rowid = ?")
        .bind(input.id)
        .execute(&mut *conn)
        .await
        .context("Failed to clear search index entry")?;
    sqlx::query("INSERT INTO articles_fts (rowid, title, text_content) VALUES (?, ?, ?)")
        .bind(input.id)
        .bind(&input.title)
        .bind(&input.text_content)
        .execute(&mut *conn)
        .await
        .context("Failed to index article")?;

    reconcile_topics_sqlite(conn, input.id, &input.topics).await?;

    Ok(!exists)
}

async fn delete_article_sqlite(conn: &mut SqliteConnection, id: i64) -> Result<bool> {
    // Dependents first so the foreign keys on article_topics hold
    for (sql, what) in [
        ("DELETE FROM article_topics WHERE article_id = ?", "topic assignments"),
        ("DELETE FROM article_images WHERE article_id = ?", "images"),
        ("DELETE FROM likes WHERE article_id = ?", "likes"),
        ("DELETE FROM articles_fts WHERE rowid = ?", "search index entry"),
    ] {
        sqlx::query(sql)
            .bind(id)
            .execute(&mut *conn)
            .await
            .with_context(|| format!("Failed to delete article {}", what))?;
    }

    let result = sqlx::query("DELETE FROM articles WHERE article_id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await
        .context("Failed to delete article")?;

    Ok(result.rows_affected() > 0)
}

async fn articles_from_sqlite_rows(
    conn: &mut SqliteConnection,
    rows: &[sqlx::sqlite::SqliteRow],
) -> Result<Vec<Article>> {
    let mut articles = rows
        .iter()
        .map(row_to_article_sqlite)
        .collect::<Result<Vec<_>>>()?;
    if articles.is_empty() {
        return Ok(articles);
    }

    let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT ta.article_id, t.name FROM article_topics ta \
         INNER JOIN topics t ON t.id = ta.topic_id WHERE ta.article_id IN (",
    );
    let mut ids = query.separated(", ");
    for article in &articles {
        ids.push_bind(article.id);
    }
    ids.push_unseparated(") ORDER BY t.name");

    let topic_rows: Vec<(i64, String)> = query
        .build_query_as()
        .fetch_all(&mut *conn)
        .await
        .context("Failed to get article topics")?;

    assign_topics(&mut articles, topic_rows);
    Ok(articles)
}

fn row_to_article_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Article> {
    let status: String = row.try_get("status")?;

    Ok(Article {
        id: row.try_get("article_id")?,
        status: parse_status(&status)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        title: row.try_get("title")?,
        description: row.try_get("short_description")?,
        topics: Vec::new(),
        thumbnail: row.try_get("thumbnail")?,
        content: row.try_get("content")?,
        text_content: row.try_get("text_content")?,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn article_exists_mysql(conn: &mut MySqlConnection, id: i64) -> Result<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM articles WHERE article_id = ?")
        .bind(id)
        .fetch_one(&mut *conn)
        .await
        .context("Failed to check article existence")?;
    Ok(count > 0)
}

async fn upsert_article_mysql(
    conn: &mut MySqlConnection,
    input: &UpsertArticleInput,
) -> Result<bool> {
    let now = Utc::now();
    let exists = article_exists_mysql(conn, input.id).await?;

    if !exists {
        sqlx::query(
            r#"
            INSERT INTO articles (article_id, status, created_at, updated_at, title, short_description, thumbnail, content, text_content)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(input.id)
        .bind(input.status.as_str())
        .bind(now)
        .bind(now)
        .bind(&input.title)
        .bind(&input.description)
        .bind(&input.thumbnail)
        .bind(&input.content)
        .bind(&input.text_content)
        .execute(&mut *conn)
        .await
        .context("Failed to insert article")?;
    } else if let Some(thumbnail) = &input.thumbnail {
        sqlx::query(
            r#"
            UPDATE articles
            SET status = ?, updated_at = ?, title = ?, short_description = ?, thumbnail = ?, content = ?, text_content = ?
            WHERE article_id = ?
            "#,
        )
        .bind(input.status.as_str())
        .bind(now)
        .bind(&input.title)
        .bind(&input.description)
        .bind(thumbnail)
        .bind(&input.content)
        .bind(&input.text_content)
        .bind(input.id)
        .execute(&mut *conn)
        .await
        .context("Failed to update article")?;
    } else {
        sqlx::query(
            r#"
            UPDATE articles
            SET status = ?, updated_at = ?, title = ?, short_description = ?, content = ?, text_content = ?
            WHERE article_id = ?
            "#,
        )
        .bind(input.status.as_str())
        .bind(now)
        .bind(&input.title)
        .bind(&input.description)
        .bind(&input.content)
        .bind(&input.text_content)
        .bind(input.id)
        .execute(&mut *conn)
        .await
        .context("Failed to update article")?;
    }

    reconcile_topics_mysql(conn, input.id, &input.topics).await?;

    Ok(!exists)
}

async fn delete_article_mysql(conn: &mut MySqlConnection, id: i64) -> Result<bool> {
    for (sql, what) in [
        ("DELETE FROM article_topics WHERE article_id = ?", "topic assignments"),
        ("DELETE FROM article_images WHERE article_id = ?", "images"),
        ("DELETE FROM likes WHERE article_id = ?", "likes"),
    ] {
        sqlx::query(sql)
            .bind(id)
            .execute(&mut *conn)
            .await
            .with_context(|| format!("Failed to delete article {}", what))?;
    }

    let result = sqlx::query("DELETE FROM articles WHERE article_id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await
        .context("Failed to delete article")?;

    Ok(result.rows_affected() > 0)
}

async fn articles_from_mysql_rows(
    conn: &mut MySqlConnection,
    rows: &[sqlx::mysql::MySqlRow],
) -> Result<Vec<Article>> {
    let mut articles = rows
        .iter()
        .map(row_to_article_mysql)
        .collect::<Result<Vec<_>>>()?;
    if articles.is_empty() {
        return Ok(articles);
    }

    let mut query: QueryBuilder<MySql> = QueryBuilder::new(
        "SELECT ta.article_id, t.name FROM article_topics ta \
         INNER JOIN topics t ON t.id = ta.topic_id WHERE ta.article_id IN (",
    );
    let mut ids = query.separated(", ");
    for article in &articles {
        ids.push_bind(article.id);
    }
    ids.push_unseparated(") ORDER BY t.name");

    let topic_rows: Vec<(i64, String)> = query
        .build_query_as()
        .fetch_all(&mut *conn)
        .await
        .context("Failed to get article topics")?;

    assign_topics(&mut articles, topic_rows);
    Ok(articles)
}

fn row_to_article_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Article> {
    let status: String = row.try_get("status")?;

    Ok(Article {
        id: row.try_get("article_id")?,
        status: parse_status(&status)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        title: row.try_get("title")?,
        description: row.try_get("short_description")?,
        topics: Vec::new(),
        thumbnail: row.try_get("thumbnail")?,
        content: row.try_get("content")?,
        text_content: row.try_get("text_content")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use crate::db::repositories::{
        ImageRepository, LikeRepository, SqlxImageRepository, SqlxLikeRepository,
    };
    use crate::models::ArticleImage;

    async fn setup_test_repo() -> (DynDatabasePool, SqlxArticleRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxArticleRepository::new(pool.clone());
        (pool, repo)
    }

    fn input(id: i64, status: ArticleStatus, title: &str, text: &str) -> UpsertArticleInput {
        UpsertArticleInput {
            id,
            status,
            title: title.to_string(),
            description: format!("About {}", title),
            topics: Vec::new(),
            thumbnail: None,
            content: format!("<p>{}</p>", text),
            text_content: text.to_string(),
        }
    }

    fn with_topics(mut input: UpsertArticleInput, topics: &[&str]) -> UpsertArticleInput {
        input.topics = topics.iter().map(|t| t.to_string()).collect();
        input
    }

    fn ids(articles: &[Article]) -> Vec<i64> {
        articles.iter().map(|a| a.id).collect()
    }

    #[tokio::test]
    async fn test_allocate_next_article_id() {
        let (_pool, repo) = setup_test_repo().await;
        assert_eq!(repo.allocate_next_article_id().await.unwrap(), 0);

        repo.upsert_article(&input(0, ArticleStatus::Draft, "First", ""))
            .await
            .unwrap();
        assert_eq!(repo.allocate_next_article_id().await.unwrap(), 1);

        repo.upsert_article(&input(7, ArticleStatus::Draft, "Seventh", ""))
            .await
            .unwrap();
        assert_eq!(repo.allocate_next_article_id().await.unwrap(), 8);
    }

    #[tokio::test]
    async fn test_allocate_next_article_id_at_upper_bound() {
        let (_pool, repo) = setup_test_repo().await;

        repo.upsert_article(&input(MAX_ARTICLE_ID - 1, ArticleStatus::Draft, "Last but one", ""))
            .await
            .unwrap();
        assert_eq!(repo.allocate_next_article_id().await.unwrap(), MAX_ARTICLE_ID);

        repo.upsert_article(&input(MAX_ARTICLE_ID, ArticleStatus::Draft, "Last", ""))
            .await
            .unwrap();
        let err = repo.allocate_next_article_id().await.unwrap_err();
        assert!(err.to_string().contains("Article ids exhausted"));

        // A row written past the bound must not overflow the query
        repo.upsert_article(&input(i64::MAX, ArticleStatus::Draft, "Beyond", ""))
            .await
            .unwrap();
        let err = repo.allocate_next_article_id().await.unwrap_err();
        assert!(err.to_string().contains("Article ids exhausted"));
    }

    #[tokio::test]
    async fn test_upsert_inserts_then_updates() {
        let (_pool, repo) = setup_test_repo().await;
        assert!(!repo.article_exists(1).await.unwrap());

        let created = repo
            .upsert_article(&input(1, ArticleStatus::Draft, "Draft title", "draft body"))
            .await
            .unwrap();
        assert!(created);
        assert!(repo.article_exists(1).await.unwrap());
        let first = repo.get_article(1).await.unwrap().unwrap();

        let created = repo
            .upsert_article(&input(1, ArticleStatus::Publish, "Final title", "final body"))
            .await
            .unwrap();
        assert!(!created);

        let article = repo.get_article(1).await.unwrap().unwrap();
        assert_eq!(article.title, "Final title");
        assert_eq!(article.text_content, "final body");
        assert_eq!(article.status, ArticleStatus::Publish);
        assert_eq!(article.created_at, first.created_at);
        assert!(article.updated_at >= first.updated_at);
    }

    #[tokio::test]
    async fn test_upsert_preserves_thumbnail_when_omitted() {
        let (_pool, repo) = setup_test_repo().await;

        let mut first = input(1, ArticleStatus::Draft, "With thumb", "");
        first.thumbnail = Some(vec![1, 2, 3]);
        repo.upsert_article(&first).await.unwrap();

        repo.upsert_article(&input(1, ArticleStatus::Draft, "No thumb", ""))
            .await
            .unwrap();
        let article = repo.get_article(1).await.unwrap().unwrap();
        assert_eq!(article.title, "No thumb");
        assert_eq!(article.thumbnail, Some(vec![1, 2, 3]));

        let mut replaced = input(1, ArticleStatus::Draft, "New thumb", "");
        replaced.thumbnail = Some(vec![9]);
        repo.upsert_article(&replaced).await.unwrap();
        let article = repo.get_article(1).await.unwrap().unwrap();
        assert_eq!(article.thumbnail, Some(vec![9]));
    }

    #[tokio::test]
    async fn test_upsert_reconciles_topics() {
        let (_pool, repo) = setup_test_repo().await;

        repo.upsert_article(&with_topics(
            input(1, ArticleStatus::Publish, "T", ""),
            &["rust", " Web ", "RUST"],
        ))
        .await
        .unwrap();
        let article = repo.get_article(1).await.unwrap().unwrap();
        assert_eq!(article.topics, vec!["Rust", "Web"]);

        repo.upsert_article(&with_topics(
            input(1, ArticleStatus::Publish, "T", ""),
            &["web", "databases"],
        ))
        .await
        .unwrap();
        let article = repo.get_article(1).await.unwrap().unwrap();
        assert_eq!(article.topics, vec!["Databases", "Web"]);
    }

    #[tokio::test]
    async fn test_get_article_not_found() {
        let (_pool, repo) = setup_test_repo().await;
        assert!(repo.get_article(99).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_status() {
        let (_pool, repo) = setup_test_repo().await;
        repo.upsert_article(&input(1, ArticleStatus::Draft, "T", ""))
            .await
            .unwrap();

        assert!(repo.set_status(1, ArticleStatus::Publish).await.unwrap());
        let article = repo.get_article(1).await.unwrap().unwrap();
        assert!(article.is_published());

        assert!(!repo.set_status(2, ArticleStatus::Publish).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_articles_by_status_newest_first() {
        let (_pool, repo) = setup_test_repo().await;
        repo.upsert_article(&with_topics(
            input(0, ArticleStatus::Publish, "Old", ""),
            &["go"],
        ))
        .await
        .unwrap();
        repo.upsert_article(&input(1, ArticleStatus::Draft, "Draft", ""))
            .await
            .unwrap();
        repo.upsert_article(&input(2, ArticleStatus::Publish, "New", ""))
            .await
            .unwrap();

        let published = repo.list_articles(ArticleStatus::Publish).await.unwrap();
        assert_eq!(ids(&published), vec![2, 0]);
        assert!(published[0].topics.is_empty());
        assert_eq!(published[1].topics, vec!["Go"]);

        let drafts = repo.list_articles(ArticleStatus::Draft).await.unwrap();
        assert_eq!(ids(&drafts), vec![1]);
    }

    #[tokio::test]
    async fn test_search_articles() {
        let (_pool, repo) = setup_test_repo().await;
        repo.upsert_article(&input(0, ArticleStatus::Publish, "Intro", "a database primer"))
            .await
            .unwrap();
        repo.upsert_article(&input(1, ArticleStatus::Publish, "Database tuning", "indexes"))
            .await
            .unwrap();
        repo.upsert_article(&input(2, ArticleStatus::Draft, "Database draft", "wip"))
            .await
            .unwrap();
        repo.upsert_article(&input(3, ArticleStatus::Publish, "Cooking", "pasta"))
            .await
            .unwrap();

        let found = repo
            .search_articles(ArticleStatus::Publish, "database")
            .await
            .unwrap();
        assert_eq!(ids(&found), vec![1, 0]);

        let drafts = repo
            .search_articles(ArticleStatus::Draft, "database")
            .await
            .unwrap();
        assert_eq!(ids(&drafts), vec![2]);
    }

    #[tokio::test]
    async fn test_search_tracks_updates_and_odd_input() {
        let (_pool, repo) = setup_test_repo().await;
        repo.upsert_article(&input(0, ArticleStatus::Publish, "Rust", "ownership"))
            .await
            .unwrap();
        repo.upsert_article(&input(0, ArticleStatus::Publish, "Rust", "borrowing"))
            .await
            .unwrap();

        let old = repo
            .search_articles(ArticleStatus::Publish, "ownership")
            .await
            .unwrap();
        assert!(old.is_empty());
        let new = repo
            .search_articles(ArticleStatus::Publish, "borrowing")
            .await
            .unwrap();
        assert_eq!(ids(&new), vec![0]);

        // Quotes and FTS operators are treated as text
        let odd = repo
            .search_articles(ArticleStatus::Publish, "\"rust\" OR *")
            .await
            .unwrap();
        assert!(odd.is_empty());
        let blank = repo.search_articles(ArticleStatus::Publish, "  ").await.unwrap();
        assert!(blank.is_empty());
    }

    #[tokio::test]
    async fn test_list_articles_by_topic() {
        let (_pool, repo) = setup_test_repo().await;
        repo.upsert_article(&with_topics(
            input(0, ArticleStatus::Publish, "A", ""),
            &["rust"],
        ))
        .await
        .unwrap();
        repo.upsert_article(&with_topics(
            input(1, ArticleStatus::Publish, "B", ""),
            &["rust", "web"],
        ))
        .await
        .unwrap();
        repo.upsert_article(&with_topics(
            input(2, ArticleStatus::Draft, "C", ""),
            &["rust"],
        ))
        .await
        .unwrap();

        let rust = repo
            .list_articles_by_topic(ArticleStatus::Publish, " RUST")
            .await
            .unwrap();
        assert_eq!(ids(&rust), vec![1, 0]);

        let web = repo
            .list_articles_by_topic(ArticleStatus::Publish, "web")
            .await
            .unwrap();
        assert_eq!(ids(&web), vec![1]);
    }

    #[tokio::test]
    async fn test_list_related_articles() {
        let (_pool, repo) = setup_test_repo().await;
        for id in 0..8 {
            repo.upsert_article(&with_topics(
                input(id, ArticleStatus::Publish, "Related", ""),
                &["rust"],
            ))
            .await
            .unwrap();
        }

        let related = repo
            .list_related_articles(ArticleStatus::Publish, "Rust", 3, RELATED_ARTICLES_LIMIT)
            .await
            .unwrap();
        assert_eq!(related.len(), 5);
        assert!(related.iter().all(|a| a.id != 3));

        let none = repo
            .list_related_articles(ArticleStatus::Publish, "Go", 3, RELATED_ARTICLES_LIMIT)
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_delete_article_cascades() {
        let (pool, repo) = setup_test_repo().await;
        let images = SqlxImageRepository::new(pool.clone());
        let likes = SqlxLikeRepository::new(pool.clone());

        repo.upsert_article(&with_topics(
            input(1, ArticleStatus::Publish, "Doomed", "searchable"),
            &["rust"],
        ))
        .await
        .unwrap();
        images
            .add_image(&ArticleImage::new(1, "a.png", vec![1]))
            .await
            .unwrap();
        likes.add_like(1, "alice").await.unwrap();

        assert!(repo.delete_article(1).await.unwrap());
        assert!(!repo.delete_article(1).await.unwrap());

        assert!(repo.get_article(1).await.unwrap().is_none());
        assert!(images.get_images(1).await.unwrap().is_empty());
        assert_eq!(likes.get_like_count(1, "alice").await.unwrap().count, 0);
        assert!(repo
            .search_articles(ArticleStatus::Publish, "searchable")
            .await
            .unwrap()
            .is_empty());

        let assignments: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM article_topics")
            .fetch_one(pool.as_sqlite().unwrap())
            .await
            .unwrap();
        assert_eq!(assignments, 0);
    }

    #[test]
    fn test_fts5_phrase_escapes_quotes() {
        assert_eq!(fts5_phrase("rust"), "\"rust\"");
        assert_eq!(fts5_phrase("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
