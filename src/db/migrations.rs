//! Database migrations module
//!
//! Code-based migrations for the dronehub content store. Every migration
//! carries SQL for SQLite and for MySQL, so the same binary can create the
//! local store and a remote deployment.
//!
//! # Usage
//!
//! ```ignore
//! use dronehub::db::{create_pool, migrations};
//!
//! let pool = create_pool(&config).await?;
//! migrations::run_migrations(&pool).await?;
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::Row;

use super::{on_pool, DynDatabasePool};
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

/// All migrations, embedded in the binary.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_users_and_groups",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username VARCHAR(150) NOT NULL UNIQUE,
                email VARCHAR(254) NOT NULL DEFAULT '',
                is_staff BOOLEAN NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS user_groups (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name VARCHAR(150) NOT NULL UNIQUE
            );
            CREATE TABLE IF NOT EXISTS user_group_members (
                user_id INTEGER NOT NULL,
                group_id INTEGER NOT NULL,
                PRIMARY KEY (user_id, group_id),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (group_id) REFERENCES user_groups(id) ON DELETE CASCADE
            );
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS users (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                username VARCHAR(150) NOT NULL UNIQUE,
                email VARCHAR(254) NOT NULL DEFAULT '',
                is_staff BOOLEAN NOT NULL DEFAULT 0,
                created_at DATETIME(6) NOT NULL DEFAULT CURRENT_TIMESTAMP(6)
            );
            CREATE TABLE IF NOT EXISTS user_groups (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                name VARCHAR(150) NOT NULL UNIQUE
            );
            CREATE TABLE IF NOT EXISTS user_group_members (
                user_id BIGINT NOT NULL,
                group_id BIGINT NOT NULL,
                PRIMARY KEY (user_id, group_id),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (group_id) REFERENCES user_groups(id) ON DELETE CASCADE
            );
        "#,
    },
    Migration {
        version: 2,
        name: "create_component_categories",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS component_categories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name VARCHAR(40) NOT NULL UNIQUE,
                on_board BOOLEAN NOT NULL
            );
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS component_categories (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                name VARCHAR(40) NOT NULL UNIQUE,
                on_board BOOLEAN NOT NULL
            );
        "#,
    },
    Migration {
        version: 3,
        name: "create_articles",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS articles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title VARCHAR(255) NOT NULL,
                body TEXT NOT NULL,
                author_id INTEGER,
                staff BOOLEAN NOT NULL DEFAULT 0,
                private BOOLEAN NOT NULL DEFAULT 0,
                superprivate BOOLEAN NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL,
                UNIQUE (title, created_at),
                FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE SET NULL
            );
            CREATE INDEX IF NOT EXISTS idx_articles_created_at ON articles(created_at);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS articles (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                title VARCHAR(255) NOT NULL,
                body TEXT NOT NULL,
                author_id BIGINT,
                staff BOOLEAN NOT NULL DEFAULT 0,
                private BOOLEAN NOT NULL DEFAULT 0,
                superprivate BOOLEAN NOT NULL DEFAULT 0,
                created_at DATETIME(6) NOT NULL,
                UNIQUE (title, created_at),
                FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE SET NULL
            );
            CREATE INDEX idx_articles_created_at ON articles(created_at);
        "#,
    },
    Migration {
        version: 4,
        name: "create_components",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS components (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title VARCHAR(255) NOT NULL,
                body TEXT NOT NULL,
                author_id INTEGER,
                category_id INTEGER NOT NULL,
                specs TEXT NOT NULL,
                datasheet VARCHAR(200),
                photo VARCHAR(255),
                staff BOOLEAN NOT NULL DEFAULT 0,
                private BOOLEAN NOT NULL DEFAULT 0,
                superprivate BOOLEAN NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL,
                UNIQUE (title, category_id),
                FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE SET NULL,
                FOREIGN KEY (category_id) REFERENCES component_categories(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_components_category_id ON components(category_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS components (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                title VARCHAR(255) NOT NULL,
                body TEXT NOT NULL,
                author_id BIGINT,
                category_id BIGINT NOT NULL,
                specs TEXT NOT NULL,
                datasheet VARCHAR(200),
                photo VARCHAR(255),
                staff BOOLEAN NOT NULL DEFAULT 0,
                private BOOLEAN NOT NULL DEFAULT 0,
                superprivate BOOLEAN NOT NULL DEFAULT 0,
                created_at DATETIME(6) NOT NULL,
                UNIQUE (title, category_id),
                FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE SET NULL,
                FOREIGN KEY (category_id) REFERENCES component_categories(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_components_category_id ON components(category_id);
        "#,
    },
    Migration {
        version: 5,
        name: "create_configurations",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS configurations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title VARCHAR(255) NOT NULL,
                body TEXT NOT NULL,
                author_id INTEGER,
                version_number VARCHAR(10) NOT NULL,
                firmware_version VARCHAR(40) NOT NULL DEFAULT '',
                photo VARCHAR(255),
                staff BOOLEAN NOT NULL DEFAULT 0,
                private BOOLEAN NOT NULL DEFAULT 0,
                superprivate BOOLEAN NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL,
                UNIQUE (title, version_number),
                FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE SET NULL
            );
            CREATE TABLE IF NOT EXISTS configuration_components (
                configuration_id INTEGER NOT NULL,
                component_id INTEGER NOT NULL,
                PRIMARY KEY (configuration_id, component_id),
                FOREIGN KEY (configuration_id) REFERENCES configurations(id) ON DELETE CASCADE,
                FOREIGN KEY (component_id) REFERENCES components(id) ON DELETE CASCADE
            );
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS configurations (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                title VARCHAR(255) NOT NULL,
                body TEXT NOT NULL,
                author_id BIGINT,
                version_number VARCHAR(10) NOT NULL,
                firmware_version VARCHAR(40) NOT NULL DEFAULT '',
                photo VARCHAR(255),
                staff BOOLEAN NOT NULL DEFAULT 0,
                private BOOLEAN NOT NULL DEFAULT 0,
                superprivate BOOLEAN NOT NULL DEFAULT 0,
                created_at DATETIME(6) NOT NULL,
                UNIQUE (title, version_number),
                FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE SET NULL
            );
            CREATE TABLE IF NOT EXISTS configuration_components (
                configuration_id BIGINT NOT NULL,
                component_id BIGINT NOT NULL,
                PRIMARY KEY (configuration_id, component_id),
                FOREIGN KEY (configuration_id) REFERENCES configurations(id) ON DELETE CASCADE,
                FOREIGN KEY (component_id) REFERENCES components(id) ON DELETE CASCADE
            );
        "#,
    },
    Migration {
        version: 6,
        name: "create_flights",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS flights (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title VARCHAR(255) NOT NULL,
                body TEXT NOT NULL,
                author_id INTEGER,
                configuration_id INTEGER NOT NULL,
                meteo TEXT NOT NULL,
                datalog VARCHAR(255),
                video VARCHAR(255),
                staff BOOLEAN NOT NULL DEFAULT 0,
                private BOOLEAN NOT NULL DEFAULT 0,
                superprivate BOOLEAN NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL,
                UNIQUE (title, created_at),
                FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE SET NULL,
                FOREIGN KEY (configuration_id) REFERENCES configurations(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_flights_configuration_id ON flights(configuration_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS flights (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                title VARCHAR(255) NOT NULL,
                body TEXT NOT NULL,
                author_id BIGINT,
                configuration_id BIGINT NOT NULL,
                meteo TEXT NOT NULL,
                datalog VARCHAR(255),
                video VARCHAR(255),
                staff BOOLEAN NOT NULL DEFAULT 0,
                private BOOLEAN NOT NULL DEFAULT 0,
                superprivate BOOLEAN NOT NULL DEFAULT 0,
                created_at DATETIME(6) NOT NULL,
                UNIQUE (title, created_at),
                FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE SET NULL,
                FOREIGN KEY (configuration_id) REFERENCES configurations(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_flights_configuration_id ON flights(configuration_id);
        "#,
    },
    // One comment table; exactly one parent column is set per row. MySQL
    // rejects CHECK on columns carrying ON DELETE actions, so there the
    // repository alone guarantees it.
    Migration {
        version: 7,
        name: "create_comments",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS comments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                article_id INTEGER,
                component_id INTEGER,
                configuration_id INTEGER,
                flight_id INTEGER,
                author_id INTEGER NOT NULL,
                content TEXT NOT NULL,
                active BOOLEAN NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL,
                CHECK ((article_id IS NOT NULL) + (component_id IS NOT NULL)
                     + (configuration_id IS NOT NULL) + (flight_id IS NOT NULL) = 1),
                FOREIGN KEY (article_id) REFERENCES articles(id) ON DELETE CASCADE,
                FOREIGN KEY (component_id) REFERENCES components(id) ON DELETE CASCADE,
                FOREIGN KEY (configuration_id) REFERENCES configurations(id) ON DELETE CASCADE,
                FOREIGN KEY (flight_id) REFERENCES flights(id) ON DELETE CASCADE,
                FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_comments_article_id ON comments(article_id);
            CREATE INDEX IF NOT EXISTS idx_comments_component_id ON comments(component_id);
            CREATE INDEX IF NOT EXISTS idx_comments_configuration_id ON comments(configuration_id);
            CREATE INDEX IF NOT EXISTS idx_comments_flight_id ON comments(flight_id);
            CREATE INDEX IF NOT EXISTS idx_comments_active ON comments(active);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS comments (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                article_id BIGINT,
                component_id BIGINT,
                configuration_id BIGINT,
                flight_id BIGINT,
                author_id BIGINT NOT NULL,
                content TEXT NOT NULL,
                active BOOLEAN NOT NULL DEFAULT 0,
                created_at DATETIME(6) NOT NULL,
                FOREIGN KEY (article_id) REFERENCES articles(id) ON DELETE CASCADE,
                FOREIGN KEY (component_id) REFERENCES components(id) ON DELETE CASCADE,
                FOREIGN KEY (configuration_id) REFERENCES configurations(id) ON DELETE CASCADE,
                FOREIGN KEY (flight_id) REFERENCES flights(id) ON DELETE CASCADE,
                FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_comments_active ON comments(active);
        "#,
    },
];

/// Run all pending migrations.
///
/// # Returns
///
/// Number of migrations applied
pub async fn run_migrations(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;

    let applied = get_applied_migrations(pool).await?;
    let applied_versions: Vec<i64> = applied.iter().map(|m| m.version).collect();

    let mut count = 0;

    for migration in MIGRATIONS {
        if !applied_versions.contains(&(migration.version as i64)) {
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

/// Create the migrations tracking table if it doesn't exist
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
                version BIGINT PRIMARY KEY,
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
    on_pool!(pool, conn => {
        let rows = sqlx::query("SELECT version, name, applied_at FROM _migrations ORDER BY version")
            .fetch_all(conn)
            .await?;

        Ok(rows
            .iter()
            .map(|row| MigrationRecord {
                version: row.get("version"),
                name: row.get("name"),
                applied_at: row.get("applied_at"),
            })
            .collect())
    })
}

async fn apply_migration(pool: &DynDatabasePool, migration: &Migration) -> Result<()> {
    let sql = match pool.driver() {
        DatabaseDriver::Sqlite => migration.up_sqlite,
        DatabaseDriver::Mysql => migration.up_mysql,
    };

    on_pool!(pool, conn => {
        for statement in split_sql_statements(sql) {
            sqlx::query(statement)
                .execute(conn)
                .await
                .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
        }

        sqlx::query("INSERT INTO _migrations (version, name) VALUES (?, ?)")
            .bind(migration.version as i64)
            .bind(migration.name)
            .execute(conn)
            .await?;
    });

    Ok(())
}

/// Truncate SQL for error messages
fn truncate_sql(sql: &str) -> String {
    match sql.char_indices().nth(100) {
        Some((idx, _)) => format!("{}...", &sql[..idx]),
        None => sql.to_string(),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    async fn migrated_pool() -> DynDatabasePool {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");
        pool
    }

    #[tokio::test]
    async fn test_run_migrations() {
        let pool = create_test_pool().await.expect("Failed to create test pool");

        let count = run_migrations(&pool).await.expect("Failed to run migrations");
        assert_eq!(count, MIGRATIONS.len());

        // Running again should apply 0 migrations
        let count = run_migrations(&pool).await.expect("Failed to run migrations");
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_comment_requires_exactly_one_parent() {
        let pool = migrated_pool().await;
        let sqlite = pool.as_sqlite().unwrap();

        sqlx::query("INSERT INTO users (username) VALUES ('pilot')")
            .execute(sqlite)
            .await
            .unwrap();

        let orphan = sqlx::query(
            "INSERT INTO comments (author_id, content, created_at) VALUES (1, 'x', CURRENT_TIMESTAMP)",
        )
        .execute(sqlite)
        .await;
        assert!(orphan.is_err());
    }

    #[tokio::test]
    async fn test_component_requires_category() {
        let pool = migrated_pool().await;
        let sqlite = pool.as_sqlite().unwrap();

        let result = sqlx::query(
            "INSERT INTO components (title, body, category_id, specs, created_at) VALUES ('Moteur 2207', '', 42, '{}', CURRENT_TIMESTAMP)",
        )
        .execute(sqlite)
        .await;
        assert!(result.is_err(), "foreign keys must be enforced");
    }

    #[test]
    fn test_split_sql_statements() {
        let sql = "CREATE TABLE a (x INT);\n-- just a comment\n;\nCREATE INDEX i ON a(x)";
        let statements = split_sql_statements(sql);
        assert_eq!(statements, vec!["CREATE TABLE a (x INT)", "CREATE INDEX i ON a(x)"]);
    }

    #[test]
    fn test_truncate_sql() {
        let long = "x".repeat(150);
        assert_eq!(truncate_sql(&long).len(), 103);
        assert_eq!(truncate_sql("SELECT 1"), "SELECT 1");
    }
}
