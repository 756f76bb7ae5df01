//! Database migrations module
//!
//! Code-based migrations for the newsroom schema. Every migration is embedded
//! as SQL strings for both SQLite and MySQL, applied once at startup and
//! recorded in `_migrations`. Table DDL uses `CREATE ... IF NOT EXISTS`.
//! MySQL has no such guard for indexes, so an index that already exists is
//! skipped there. Either way a half-applied migration can be re-run.
//!
//! # Usage
//!
//! ```ignore
//! use newsroom::db::{create_pool, migrations};
//!
//! let pool = create_pool(&config).await?;
//! migrations::run_migrations(&pool).await?;
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlDatabaseError;
use sqlx::{MySqlPool, Row, SqlitePool};

use super::DynDatabasePool;
use crate::config::DatabaseDriver;

/// A database migration with SQL for both SQLite and MySQL
#[derive(Debug, Clone)]
pub struct Migration {
    /// Migration version number (must be unique and sequential)
    pub version: i32,
    /// Human-readable migration name
    pub name: &'static str,
    /// SQL statements for SQLite
    pub up_sqlite: &'static str,
    /// SQL statements for MySQL
    pub up_mysql: &'static str,
}

/// Migration record stored in the database
#[derive(Debug, Clone)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

/// All migrations, in application order.
pub const MIGRATIONS: &[Migration] = &[
    // Article ids are allocated by the application, never by the database
    Migration {
        version: 1,
        name: "create_articles",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS articles (
                article_id INTEGER PRIMARY KEY,
                status VARCHAR(20) NOT NULL DEFAULT 'draft',
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                title VARCHAR(255) NOT NULL,
                short_description VARCHAR(500) NOT NULL DEFAULT '',
                thumbnail BLOB,
                content TEXT NOT NULL DEFAULT '',
                text_content TEXT NOT NULL DEFAULT ''
            );
            CREATE INDEX IF NOT EXISTS idx_articles_status ON articles(status);
            CREATE INDEX IF NOT EXISTS idx_articles_created_at ON articles(created_at);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS articles (
                article_id BIGINT PRIMARY KEY,
                status VARCHAR(20) NOT NULL DEFAULT 'draft',
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                title VARCHAR(255) NOT NULL,
                short_description VARCHAR(500) NOT NULL DEFAULT '',
                thumbnail LONGBLOB,
                content LONGTEXT NOT NULL,
                text_content LONGTEXT NOT NULL
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;
            CREATE INDEX idx_articles_status ON articles(status);
            CREATE INDEX idx_articles_created_at ON articles(created_at);
        "#,
    },
    Migration {
        version: 2,
        name: "create_topics",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS topics (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name VARCHAR(100) NOT NULL UNIQUE
            );
            CREATE TABLE IF NOT EXISTS article_topics (
                article_id INTEGER NOT NULL,
                topic_id INTEGER NOT NULL,
                PRIMARY KEY (article_id, topic_id),
                FOREIGN KEY (article_id) REFERENCES articles(article_id),
                FOREIGN KEY (topic_id) REFERENCES topics(id)
            );
            CREATE INDEX IF NOT EXISTS idx_article_topics_topic_id ON article_topics(topic_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS topics (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                name VARCHAR(100) NOT NULL UNIQUE
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;
            CREATE TABLE IF NOT EXISTS article_topics (
                article_id BIGINT NOT NULL,
                topic_id BIGINT NOT NULL,
                PRIMARY KEY (article_id, topic_id),
                FOREIGN KEY (article_id) REFERENCES articles(article_id),
                FOREIGN KEY (topic_id) REFERENCES topics(id)
            ) ENGINE=InnoDB;
            CREATE INDEX idx_article_topics_topic_id ON article_topics(topic_id);
        "#,
    },
    Migration {
        version: 3,
        name: "create_article_images",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS article_images (
                image_key VARCHAR(300) PRIMARY KEY,
                article_id INTEGER NOT NULL,
                file_name VARCHAR(255) NOT NULL,
                image BLOB NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_article_images_article_id ON article_images(article_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS article_images (
                image_key VARCHAR(300) PRIMARY KEY,
                article_id BIGINT NOT NULL,
                file_name VARCHAR(255) NOT NULL,
                image LONGBLOB NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;
            CREATE INDEX idx_article_images_article_id ON article_images(article_id);
        "#,
    },
    Migration {
        version: 4,
        name: "create_likes",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS likes (
                article_id INTEGER NOT NULL,
                user_id VARCHAR(255) NOT NULL,
                liked_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (article_id, user_id)
            );
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS likes (
                article_id BIGINT NOT NULL,
                user_id VARCHAR(255) NOT NULL,
                liked_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (article_id, user_id)
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;
        "#,
    },
    // rowid of articles_fts is the article id
    Migration {
        version: 5,
        name: "create_search_index",
        up_sqlite: r#"
            CREATE VIRTUAL TABLE IF NOT EXISTS articles_fts USING fts5(title, text_content);
        "#,
        up_mysql: r#"
            CREATE FULLTEXT INDEX idx_articles_search ON articles(title, text_content);
        "#,
    },
];

/// Run all pending migrations
///
/// Returns the number of migrations applied.
pub async fn run_migrations(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;

    let applied = get_applied_migrations(pool).await?;
    let applied_versions: Vec<i32> = applied.iter().map(|m| m.version as i32).collect();

    let mut count = 0;

    for migration in MIGRATIONS {
        if !applied_versions.contains(&migration.version) {
            tracing::info!(
                "Applying migration {}: {}",
                migration.version,
                migration.name
            );
            apply_migration(pool, migration)
                .await
                .with_context(|| format!("Failed to apply migration: {}", migration.name))?;
            count += 1;
        }
    }

    if count > 0 {
        tracing::info!("Applied {} migration(s)", count);
    } else {
        tracing::debug!("No pending migrations");
    }

    Ok(count)
}

async fn create_migrations_table(pool: &DynDatabasePool) -> Result<()> {
    let sql = match pool.driver() {
        DatabaseDriver::Sqlite => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#
        }
        DatabaseDriver::Mysql => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INT PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#
        }
    };

    pool.execute(sql).await?;
    Ok(())
}

async fn get_applied_migrations(pool: &DynDatabasePool) -> Result<Vec<MigrationRecord>> {
    if let Some(pool) = pool.as_sqlite() {
        get_applied_migrations_sqlite(pool).await
    } else if let Some(pool) = pool.as_mysql() {
        get_applied_migrations_mysql(pool).await
    } else {
        anyhow::bail!("Unsupported database backend")
    }
}

async fn get_applied_migrations_sqlite(pool: &SqlitePool) -> Result<Vec<MigrationRecord>> {
    let rows = sqlx::query("SELECT version, name, applied_at FROM _migrations ORDER BY version")
        .fetch_all(pool)
        .await?;

    Ok(rows
        .iter()
        .map(|row| MigrationRecord {
            version: row.get("version"),
            name: row.get("name"),
            applied_at: row.get("applied_at"),
        })
        .collect())
}

async fn get_applied_migrations_mysql(pool: &MySqlPool) -> Result<Vec<MigrationRecord>> {
    let rows = sqlx::query("SELECT version, name, applied_at FROM _migrations ORDER BY version")
        .fetch_all(pool)
        .await?;

    Ok(rows
        .iter()
        .map(|row| MigrationRecord {
            version: row.get::<i32, _>("version") as i64,
            name: row.get("name"),
            applied_at: row.get("applied_at"),
        })
        .collect())
}

async fn apply_migration(pool: &DynDatabasePool, migration: &Migration) -> Result<()> {
    if let Some(pool) = pool.as_sqlite() {
        apply_statements(pool, migration.up_sqlite).await?;
        sqlx::query("INSERT INTO _migrations (version, name) VALUES (?, ?)")
            .bind(migration.version)
            .bind(migration.name)
            .execute(pool)
            .await?;
    } else if let Some(pool) = pool.as_mysql() {
        for statement in split_sql_statements(migration.up_mysql) {
            match sqlx::query(statement).execute(pool).await {
                Ok(_) => {}
                Err(e) if is_index_statement(statement) && is_duplicate_index(&e) => {
                    tracing::debug!("Index already exists: {}", truncate_sql(statement));
                }
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))
                }
            }
        }
        sqlx::query("INSERT INTO _migrations (version, name) VALUES (?, ?)")
            .bind(migration.version)
            .bind(migration.name)
            .execute(pool)
            .await?;
    }
    Ok(())
}

async fn apply_statements(pool: &SqlitePool, sql: &str) -> Result<()> {
    for statement in split_sql_statements(sql) {
        sqlx::query(statement)
            .execute(pool)
            .await
            .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
    }
    Ok(())
}

/// MySQL `ER_DUP_KEYNAME`
const MYSQL_DUPLICATE_KEY_NAME: u16 = 1061;

fn is_index_statement(statement: &str) -> bool {
    let head = statement
        .split_whitespace()
        .take(3)
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_uppercase();
    ["CREATE INDEX ", "CREATE UNIQUE INDEX", "CREATE FULLTEXT INDEX"]
        .iter()
        .any(|prefix| head.starts_with(prefix))
}

fn is_duplicate_index(error: &sqlx::Error) -> bool {
    error
        .as_database_error()
        .and_then(|e| e.try_downcast_ref::<MySqlDatabaseError>())
        .is_some_and(|e| e.number() == MYSQL_DUPLICATE_KEY_NAME)
}

/// Truncate SQL for error messages
fn truncate_sql(sql: &str) -> String {
    if sql.len() > 100 {
        let mut end = 100;
        while !sql.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &sql[..end])
    } else {
        sql.to_string()
    }
}

/// Split SQL into individual statements, skipping comment-only fragments
fn split_sql_statements(sql: &str) -> Vec<&str> {
    sql.split(';')
        .map(str::trim)
        .filter(|stmt| !stmt.is_empty() && !is_comment_only(stmt))
        .collect()
}

fn is_comment_only(s: &str) -> bool {
    s.lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with("--"))
}

/// Check if migrations are up to date
pub async fn is_up_to_date(pool: &DynDatabasePool) -> Result<bool> {
    create_migrations_table(pool).await?;
    let applied = get_applied_migrations(pool).await?;
    Ok(applied.len() == MIGRATIONS.len())
}
