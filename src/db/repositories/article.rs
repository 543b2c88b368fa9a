//! Article repository
//!
//! Articles are the only content carrying restriction flags; they are stored
//! as given.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::db::{on_pool, DynDatabasePool, LastInsertId};
use crate::models::{Article, Visibility};

/// Article repository trait
#[async_trait]
pub trait ArticleRepository: Send + Sync {
    /// Create a new article
    async fn create(&self, article: &Article) -> Result<Article>;

    /// Get article by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Article>>;

    /// Update title, body and visibility of an article
    async fn update(&self, article: &Article) -> Result<Article>;

    /// Newest articles first, at most `limit`
    async fn list_latest(&self, limit: i64) -> Result<Vec<Article>>;

    /// Every article, newest first
    async fn list(&self) -> Result<Vec<Article>>;
}

const ARTICLE_COLUMNS: &str = "id, title, body, author_id, staff, private, superprivate, created_at";

#[derive(sqlx::FromRow)]
struct ArticleRow {
    id: i64,
    title: String,
    body: String,
    author_id: Option<i64>,
    staff: bool,
    private: bool,
    superprivate: bool,
    created_at: DateTime<Utc>,
}

impl From<ArticleRow> for Article {
    fn from(row: ArticleRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            body: row.body,
            author_id: row.author_id,
            visibility: Visibility {
                staff: row.staff,
                private: row.private,
                superprivate: row.superprivate,
            },
            created_at: row.created_at,
        }
    }
}

/// SQLx-based article repository implementation
pub struct SqlxArticleRepository {
    pool: DynDatabasePool,
}

impl SqlxArticleRepository {
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
    async fn create(&self, article: &Article) -> Result<Article> {
        let id = on_pool!(self.pool, conn => {
            sqlx::query(
                r#"INSERT INTO articles (title, body, author_id, staff, private, superprivate, created_at)
                   VALUES (?, ?, ?, ?, ?, ?, ?)"#,
            )
            .bind(&article.title)
            .bind(&article.body)
            .bind(article.author_id)
            .bind(article.visibility.staff)
            .bind(article.visibility.private)
            .bind(article.visibility.superprivate)
            .bind(article.created_at)
            .execute(conn)
            .await
            .with_context(|| format!("Failed to create article: {}", article.title))?
            .last_id()
        });

        Ok(Article {
            id,
            ..article.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Article>> {
        let sql = format!("SELECT {} FROM articles WHERE id = ?", ARTICLE_COLUMNS);
        let row = on_pool!(self.pool, conn => {
            sqlx::query_as::<_, ArticleRow>(&sql)
                .bind(id)
                .fetch_optional(conn)
                .await?
        });
        Ok(row.map(Article::from))
    }

    async fn update(&self, article: &Article) -> Result<Article> {
        let affected = on_pool!(self.pool, conn => {
            sqlx::query(
                r#"UPDATE articles SET title = ?, body = ?, staff = ?, private = ?, superprivate = ?
                   WHERE id = ?"#,
            )
            .bind(&article.title)
            .bind(&article.body)
            .bind(article.visibility.staff)
            .bind(article.visibility.private)
            .bind(article.visibility.superprivate)
            .bind(article.id)
            .execute(conn)
            .await?
            .rows_affected()
        });

        if affected == 0 {
            anyhow::bail!("Article not found: {}", article.id);
        }
        Ok(article.clone())
    }

    async fn list_latest(&self, limit: i64) -> Result<Vec<Article>> {
        let sql = format!(
            "SELECT {} FROM articles ORDER BY created_at DESC LIMIT ?",
            ARTICLE_COLUMNS
        );
        let rows = on_pool!(self.pool, conn => {
            sqlx::query_as::<_, ArticleRow>(&sql)
                .bind(limit)
                .fetch_all(conn)
                .await?
        });
        Ok(rows.into_iter().map(Article::from).collect())
    }

    async fn list(&self) -> Result<Vec<Article>> {
        let sql = format!("SELECT {} FROM articles ORDER BY created_at DESC", ARTICLE_COLUMNS);
        let rows = on_pool!(self.pool, conn => {
            sqlx::query_as::<_, ArticleRow>(&sql).fetch_all(conn).await?
        });
        Ok(rows.into_iter().map(Article::from).collect())
    }
}
