//! Topic repository
//!
//! Topics are created lazily the first time an article references them and
//! are never deleted globally, only unassigned from articles.
//!
//! The connection-level functions are shared with the article repository so
//! an article and its topic assignments can commit in one transaction.

use crate::db::{Backend, DynDatabasePool};
use crate::models::normalize_topics;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySql, MySqlConnection, QueryBuilder, Sqlite, SqliteConnection};
use std::sync::Arc;

/// Topic repository trait
#[async_trait]
pub trait TopicRepository: Send + Sync {
    /// List every known topic label, sorted by name
    async fn list_topics(&self) -> Result<Vec<String>>;

    /// List the topics assigned to an article, sorted by name
    async fn get_article_topics(&self, article_id: i64) -> Result<Vec<String>>;

    /// Make the article's topic assignments equal to `topics`
    ///
    /// Labels are normalized and blanks dropped before diffing against the
    /// current assignments.
    async fn reconcile_topics(&self, article_id: i64, topics: &[String]) -> Result<()>;
}

/// SQLx-based topic repository implementation
pub struct SqlxTopicRepository {
    pool: DynDatabasePool,
}

impl SqlxTopicRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TopicRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl TopicRepository for SqlxTopicRepository {
    async fn list_topics(&self) -> Result<Vec<String>> {
        let topics = match self.pool.backend()? {
            Backend::Sqlite(pool) => {
                sqlx::query_scalar::<_, String>("SELECT name FROM topics ORDER BY name")
                    .fetch_all(pool)
                    .await
            }
            Backend::Mysql(pool) => {
                sqlx::query_scalar::<_, String>("SELECT name FROM topics ORDER BY name")
                    .fetch_all(pool)
                    .await
            }
        };
        topics.context("Failed to list topics")
    }

    async fn get_article_topics(&self, article_id: i64) -> Result<Vec<String>> {
        match self.pool.backend()? {
            Backend::Sqlite(pool) => {
                let mut conn = pool.acquire().await.context("Failed to acquire connection")?;
                article_topics_sqlite(&mut conn, article_id).await
            }
            Backend::Mysql(pool) => {
                let mut conn = pool.acquire().await.context("Failed to acquire connection")?;
                article_topics_mysql(&mut conn, article_id).await
            }
        }
    }

    async fn reconcile_topics(&self, article_id: i64, topics: &[String]) -> Result<()> {
        match self.pool.backend()? {
            Backend::Sqlite(pool) => {
                let mut tx = pool.begin().await.context("Failed to begin transaction")?;
                reconcile_topics_sqlite(&mut tx, article_id, topics).await?;
                tx.commit().await.context("Failed to commit topics")?;
            }
            Backend::Mysql(pool) => {
                let mut tx = pool.begin().await.context("Failed to begin transaction")?;
                reconcile_topics_mysql(&mut tx, article_id, topics).await?;
                tx.commit().await.context("Failed to commit topics")?;
            }
        }
        Ok(())
    }
}

/// Desired topics split into (to add, to remove) against the current set
fn diff_topics(current: &[String], desired: &[String]) -> (Vec<String>, Vec<String>) {
    let added = desired
        .iter()
        .filter(|t| !current.contains(t))
        .cloned()
        .collect();
    let removed = current
        .iter()
        .filter(|t| !desired.contains(t))
        .cloned()
        .collect();
    (added, removed)
}

// ============================================================================
// SQLite implementations
// ============================================================================

pub(crate) async fn article_topics_sqlite(
    conn: &mut SqliteConnection,
    article_id: i64,
) -> Result<Vec<String>> {
    sqlx::query_scalar::<_, String>(
        r#"
        SELECT t.name
        FROM topics t
        INNER JOIN article_topics ta ON ta.topic_id = t.id
        WHERE ta.article_id = ?
        ORDER BY t.name
        "#,
    )
    .bind(article_id)
    .fetch_all(&mut *conn)
    .await
    .context("Failed to get article topics")
}

pub(crate) async fn reconcile_topics_sqlite(
    conn: &mut SqliteConnection,
    article_id: i64,
    topics: &[String],
) -> Result<()> {
    let desired = normalize_topics(topics);
    let current = article_topics_sqlite(conn, article_id).await?;
    let (added, removed) = diff_topics(&current, &desired);

    if !added.is_empty() {
        let mut insert_topics: QueryBuilder<Sqlite> =
            QueryBuilder::new("INSERT OR IGNORE INTO topics (name) ");
        insert_topics.push_values(added.iter(), |mut row, name| {
            row.push_bind(name.as_str());
        });
        insert_topics
            .build()
            .execute(&mut *conn)
            .await
            .context("Failed to create topics")?;

        let mut assign: QueryBuilder<Sqlite> =
            QueryBuilder::new("INSERT OR IGNORE INTO article_topics (article_id, topic_id) SELECT ");
        assign.push_bind(article_id);
        assign.push(", id FROM topics WHERE name IN (");
        let mut names = assign.separated(", ");
        for name in &added {
            names.push_bind(name.as_str());
        }
        names.push_unseparated(")");
        assign
            .build()
            .execute(&mut *conn)
            .await
            .context("Failed to assign topics")?;
    }

    if !removed.is_empty() {
        let mut unassign: QueryBuilder<Sqlite> =
            QueryBuilder::new("DELETE FROM article_topics WHERE article_id = ");
        unassign.push_bind(article_id);
        unassign.push(" AND topic_id IN (SELECT id FROM topics WHERE name IN (");
        let mut names = unassign.separated(", ");
        for name in &removed {
            names.push_bind(name.as_str());
        }
        names.push_unseparated("))");
        unassign
            .build()
            .execute(&mut *conn)
            .await
            .context("Failed to unassign topics")?;
    }

    tracing::debug!(
        "Reconciled topics for article {}: +{} -{}",
        article_id,
        added.len(),
        removed.len()
    );
    Ok(())
}

// ============================================================================
// MySQL implementations
// ============================================================================

pub(crate) async fn article_topics_mysql(
    conn: &mut MySqlConnection,
    article_id: i64,
) -> Result<Vec<String>> {
    sqlx::query_scalar::<_, String>(
        r#"
        SELECT t.name
        FROM topics t
        INNER JOIN article_topics ta ON ta.topic_id = t.id
        WHERE ta.article_id = ?
        ORDER BY t.name
        "#,
    )
    .bind(article_id)
    .fetch_all(&mut *conn)
    .await
    .context("Failed to get article topics")
}

pub(crate) async fn reconcile_topics_mysql(
    conn: &mut MySqlConnection,
    article_id: i64,
    topics: &[String],
) -> Result<()> {
    let desired = normalize_topics(topics);
    let current = article_topics_mysql(conn, article_id).await?;
    let (added, removed) = diff_topics(&current, &desired);

    if !added.is_empty() {
        let mut insert_topics: QueryBuilder<MySql> =
            QueryBuilder::new("INSERT IGNORE INTO topics (name) ");
        insert_topics.push_values(added.iter(), |mut row, name| {
            row.push_bind(name.as_str());
        });
        insert_topics
            .build()
            .execute(&mut *conn)
            .await
            .context("Failed to create topics")?;

        let mut assign: QueryBuilder<MySql> =
            QueryBuilder::new("INSERT IGNORE INTO article_topics (article_id, topic_id) SELECT ");
        assign.push_bind(article_id);
        assign.push(", id FROM topics WHERE name IN (");
        let mut names = assign.separated(", ");
        for name in &added {
            names.push_bind(name.as_str());
        }
        names.push_unseparated(")");
        assign
            .build()
            .execute(&mut *conn)
            .await
            .context("Failed to assign topics")?;
    }

    if !removed.is_empty() {
        let mut unassign: QueryBuilder<MySql> =
            QueryBuilder::new("DELETE FROM article_topics WHERE article_id = ");
        unassign.push_bind(article_id);
        unassign.push(" AND topic_id IN (SELECT id FROM topics WHERE name IN (");
        let mut names = unassign.separated(", ");
        for name in &removed {
            names.push_bind(name.as_str());
        }
        names.push_unseparated("))");
        unassign
            .build()
            .execute(&mut *conn)
            .await
            .context("Failed to unassign topics")?;
    }

    tracing::debug!(
        "Reconciled topics for article {}: +{} -{}",
        article_id,
        added.len(),
        removed.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> (DynDatabasePool, SqlxTopicRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxTopicRepository::new(pool.clone());
        (pool, repo)
    }

    async fn insert_article(pool: &DynDatabasePool, id: i64) {
        sqlx::query("INSERT INTO articles (article_id, title) VALUES (?, ?)")
            .bind(id)
            .bind(format!("Article {}", id))
            .execute(pool.as_sqlite().unwrap())
            .await
            .expect("Failed to insert article");
    }

    fn labels(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_reconcile_normalizes_and_dedupes() {
        let (pool, repo) = setup_test_repo().await;
        insert_article(&pool, 0).await;

        repo.reconcile_topics(0, &labels(&["Go", "go ", "  GO"]))
            .await
            .expect("Failed to reconcile");

        let topics = repo.get_article_topics(0).await.unwrap();
        assert_eq!(topics, vec!["Go"]);
    }

    #[tokio::test]
    async fn test_reconcile_adds_and_removes() {
        let (pool, repo) = setup_test_repo().await;
        insert_article(&pool, 1).await;

        repo.reconcile_topics(1, &labels(&["rust", "databases"]))
            .await
            .unwrap();
        repo.reconcile_topics(1, &labels(&["Rust", "web", ""]))
            .await
            .unwrap();

        let topics = repo.get_article_topics(1).await.unwrap();
        assert_eq!(topics, vec!["Rust", "Web"]);
    }

    #[tokio::test]
    async fn test_orphaned_topics_are_kept() {
        let (pool, repo) = setup_test_repo().await;
        insert_article(&pool, 1).await;

        repo.reconcile_topics(1, &labels(&["rust"])).await.unwrap();
        repo.reconcile_topics(1, &[]).await.unwrap();

        assert!(repo.get_article_topics(1).await.unwrap().is_empty());
        assert_eq!(repo.list_topics().await.unwrap(), vec!["Rust"]);
    }

    #[tokio::test]
    async fn test_topics_shared_between_articles() {
        let (pool, repo) = setup_test_repo().await;
        insert_article(&pool, 1).await;
        insert_article(&pool, 2).await;

        repo.reconcile_topics(1, &labels(&["rust", "web"])).await.unwrap();
        repo.reconcile_topics(2, &labels(&["RUST", "async"])).await.unwrap();

        assert_eq!(
            repo.list_topics().await.unwrap(),
            vec!["Async", "Rust", "Web"]
        );
        assert_eq!(repo.get_article_topics(2).await.unwrap(), vec!["Async", "Rust"]);

        repo.reconcile_topics(2, &[]).await.unwrap();
        assert_eq!(repo.get_article_topics(1).await.unwrap(), vec!["Rust", "Web"]);
    }

    #[tokio::test]
    async fn test_list_topics_empty() {
        let (_pool, repo) = setup_test_repo().await;
        assert!(repo.list_topics().await.unwrap().is_empty());
    }

    #[test]
    fn test_diff_topics() {
        let current = labels(&["A", "B"]);
        let desired = labels(&["B", "C"]);
        let (added, removed) = diff_topics(&current, &desired);
        assert_eq!(added, vec!["C"]);
        assert_eq!(removed, vec!["A"]);
    }
}
