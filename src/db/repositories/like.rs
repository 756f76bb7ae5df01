//! Like repository
//!
//! A like is a (article, user) pair. Users are identified by an opaque
//! string, either supplied by the client or derived from a fingerprint.

use crate::db::{Backend, DynDatabasePool};
use crate::models::LikeSummary;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlConnection, SqliteConnection};
use std::sync::Arc;

/// Like repository trait
#[async_trait]
pub trait LikeRepository: Send + Sync {
    /// Like an article; no-op if the user already likes it
    async fn add_like(&self, article_id: i64, user_id: &str) -> Result<LikeSummary>;

    /// Remove a like; no-op if there is none
    async fn remove_like(&self, article_id: i64, user_id: &str) -> Result<LikeSummary>;

    /// Flip the user's like on an article
    async fn toggle_like(&self, article_id: i64, user_id: &str) -> Result<LikeSummary>;

    /// Current like count and whether `user_id` is among the likers
    async fn get_like_count(&self, article_id: i64, user_id: &str) -> Result<LikeSummary>;
}

/// SQLx-based like repository implementation
pub struct SqlxLikeRepository {
    pool: DynDatabasePool,
}

impl SqlxLikeRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn LikeRepository> {
        Arc::new(Self::new(pool))
    }
}

/// What a write does to the (article, user) pair
#[derive(Debug, Clone, Copy)]
enum LikeChange {
    Add,
    Remove,
    Toggle,
}

#[async_trait]
impl LikeRepository for SqlxLikeRepository {
    async fn add_like(&self, article_id: i64, user_id: &str) -> Result<LikeSummary> {
        self.write(article_id, user_id, LikeChange::Add).await
    }

    async fn remove_like(&self, article_id: i64, user_id: &str) -> Result<LikeSummary> {
        self.write(article_id, user_id, LikeChange::Remove).await
    }

    async fn toggle_like(&self, article_id: i64, user_id: &str) -> Result<LikeSummary> {
        self.write(article_id, user_id, LikeChange::Toggle).await
    }

    async fn get_like_count(&self, article_id: i64, user_id: &str) -> Result<LikeSummary> {
        match self.pool.backend()? {
            Backend::Sqlite(pool) => {
                let mut conn = pool.acquire().await.context("Failed to acquire connection")?;
                like_summary_sqlite(&mut conn, article_id, user_id).await
            }
            Backend::Mysql(pool) => {
                let mut conn = pool.acquire().await.context("Failed to acquire connection")?;
                like_summary_mysql(&mut conn, article_id, user_id).await
            }
        }
    }
}

impl SqlxLikeRepository {
    async fn write(&self, article_id: i64, user_id: &str, change: LikeChange) -> Result<LikeSummary> {
        let summary = match self.pool.backend()? {
            Backend::Sqlite(pool) => {
                let mut tx = pool.begin().await.context("Failed to begin transaction")?;
                let summary = write_like_sqlite(&mut tx, article_id, user_id, change).await?;
                tx.commit().await.context("Failed to commit like")?;
                summary
            }
            Backend::Mysql(pool) => {
                let mut tx = pool.begin().await.context("Failed to begin transaction")?;
                let summary = write_like_mysql(&mut tx, article_id, user_id, change).await?;
                tx.commit().await.context("Failed to commit like")?;
                summary
            }
        };

        tracing::debug!(
            "Like {:?} on article {}: count={} liked={}",
            change,
            article_id,
            summary.count,
            summary.liked
        );
        Ok(summary)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn like_summary_sqlite(
    conn: &mut SqliteConnection,
    article_id: i64,
    user_id: &str,
) -> Result<LikeSummary> {
    let (count, liked): (i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*), COALESCE(SUM(CASE WHEN user_id = ? THEN 1 ELSE 0 END), 0)
        FROM likes
        WHERE article_id = ?
        "#,
    )
    .bind(user_id)
    .bind(article_id)
    .fetch_one(&mut *conn)
    .await
    .context("Failed to count likes")?;

    Ok(LikeSummary {
        count,
        liked: liked > 0,
    })
}

async fn write_like_sqlite(
    conn: &mut SqliteConnection,
    article_id: i64,
    user_id: &str,
    change: LikeChange,
) -> Result<LikeSummary> {
    let add = match change {
        LikeChange::Add => true,
        LikeChange::Remove => false,
        LikeChange::Toggle => !like_summary_sqlite(conn, article_id, user_id).await?.liked,
    };

    if add {
        sqlx::query("INSERT OR IGNORE INTO likes (article_id, user_id) VALUES (?, ?)")
            .bind(article_id)
            .bind(user_id)
            .execute(&mut *conn)
            .await
            .context("Failed to add like")?;
    } else {
        sqlx::query("DELETE FROM likes WHERE article_id = ? AND user_id = ?")
            .bind(article_id)
            .bind(user_id)
            .execute(&mut *conn)
            .await
            .context("Failed to remove like")?;
    }

    like_summary_sqlite(conn, article_id, user_id).await
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn like_summary_mysql(
    conn: &mut MySqlConnection,
    article_id: i64,
    user_id: &str,
) -> Result<LikeSummary> {
    // SUM yields DECIMAL on MySQL, so cast it back to an integer
    let (count, liked): (i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*), CAST(COALESCE(SUM(CASE WHEN user_id = ? THEN 1 ELSE 0 END), 0) AS SIGNED)
        FROM likes
        WHERE article_id = ?
        "#,
    )
    .bind(user_id)
    .bind(article_id)
    .fetch_one(&mut *conn)
    .await
    .context("Failed to count likes")?;

    Ok(LikeSummary {
        count,
        liked: liked > 0,
    })
}

async fn write_like_mysql(
    conn: &mut MySqlConnection,
    article_id: i64,
    user_id: &str,
    change: LikeChange,
) -> Result<LikeSummary> {
    let add = match change {
        LikeChange::Add => true,
        LikeChange::Remove => false,
        LikeChange::Toggle => !like_summary_mysql(conn, article_id, user_id).await?.liked,
    };

    if add {
        sqlx::query("INSERT IGNORE INTO likes (article_id, user_id) VALUES (?, ?)")
            .bind(article_id)
            .bind(user_id)
            .execute(&mut *conn)
            .await
            .context("Failed to add like")?;
    } else {
        sqlx::query("DELETE FROM likes WHERE article_id = ? AND user_id = ?")
            .bind(article_id)
            .bind(user_id)
            .execute(&mut *conn)
            .await
            .context("Failed to remove like")?;
    }

    like_summary_mysql(conn, article_id, user_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxLikeRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxLikeRepository::new(pool)
    }

    #[tokio::test]
    async fn test_no_likes() {
        let repo = setup_test_repo().await;
        let summary = repo.get_like_count(1, "alice").await.unwrap();
        assert_eq!(summary, LikeSummary { count: 0, liked: false });
    }

    #[tokio::test]
    async fn test_add_like_is_idempotent() {
        let repo = setup_test_repo().await;
        for _ in 0..3 {
            repo.add_like(1, "alice").await.unwrap();
        }
        let summary = repo.get_like_count(1, "alice").await.unwrap();
        assert_eq!(summary, LikeSummary { count: 1, liked: true });
    }

    #[tokio::test]
    async fn test_toggle_like() {
        let repo = setup_test_repo().await;

        let summary = repo.toggle_like(1, "alice").await.unwrap();
        assert_eq!(summary, LikeSummary { count: 1, liked: true });

        let summary = repo.toggle_like(1, "bob").await.unwrap();
        assert_eq!(summary, LikeSummary { count: 2, liked: true });

        let summary = repo.toggle_like(1, "alice").await.unwrap();
        assert_eq!(summary, LikeSummary { count: 1, liked: false });
    }

    #[tokio::test]
    async fn test_remove_like_without_like() {
        let repo = setup_test_repo().await;
        repo.add_like(1, "bob").await.unwrap();

        let summary = repo.remove_like(1, "alice").await.unwrap();
        assert_eq!(summary, LikeSummary { count: 1, liked: false });
    }

    #[tokio::test]
    async fn test_likes_are_per_article() {
        let repo = setup_test_repo().await;
        repo.add_like(1, "alice").await.unwrap();

        let summary = repo.get_like_count(2, "alice").await.unwrap();
        assert_eq!(summary, LikeSummary::default());
    }
}
