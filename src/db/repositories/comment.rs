//! Comment repository
//!
//! Comments on all four content kinds share the `comments` table; each row
//! sets exactly one of the parent columns.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::db::{on_pool, DynDatabasePool, LastInsertId};
use crate::models::{Comment, CommentParent, ContentKind, NewComment};

/// Comment repository trait
#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Persist a new comment
    async fn create(&self, comment: &NewComment) -> Result<Comment>;

    /// Get a comment by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>>;

    /// Active comments of a parent, newest first
    async fn list_visible(&self, parent: CommentParent) -> Result<Vec<Comment>>;

    /// Inactive comments awaiting moderation, oldest first
    async fn list_pending(&self) -> Result<Vec<Comment>>;

    /// Every comment, oldest first
    async fn list_all(&self) -> Result<Vec<Comment>>;

    /// Set the active flag; returns false if the comment doesn't exist
    async fn set_active(&self, id: i64, active: bool) -> Result<bool>;
}

const COMMENT_COLUMNS: &str =
    "id, article_id, component_id, configuration_id, flight_id, author_id, content, active, created_at";

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: i64,
    article_id: Option<i64>,
    component_id: Option<i64>,
    configuration_id: Option<i64>,
    flight_id: Option<i64>,
    author_id: i64,
    content: String,
    active: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<CommentRow> for Comment {
    type Error = anyhow::Error;

    fn try_from(row: CommentRow) -> Result<Self> {
        let parents: Vec<CommentParent> = [
            row.article_id.map(CommentParent::Article),
            row.component_id.map(CommentParent::Component),
            row.configuration_id.map(CommentParent::Configuration),
            row.flight_id.map(CommentParent::Flight),
        ]
        .into_iter()
        .flatten()
        .collect();

        let parent = match parents.as_slice() {
            [parent] => *parent,
            _ => anyhow::bail!(
                "Comment {} must reference exactly one parent, found {}",
                row.id,
                parents.len()
            ),
        };

        Ok(Self {
            id: row.id,
            parent,
            author_id: row.author_id,
            content: row.content,
            active: row.active,
            created_at: row.created_at,
        })
    }
}

fn into_comments(rows: Vec<CommentRow>) -> Result<Vec<Comment>> {
    rows.into_iter().map(Comment::try_from).collect()
}

/// Parent column values for an INSERT, in `ContentKind::ALL` order
fn parent_columns(parent: CommentParent) -> [Option<i64>; 4] {
    ContentKind::ALL.map(|kind| (parent.kind() == kind).then(|| parent.id()))
}

/// SQLx-based comment repository implementation
pub struct SqlxCommentRepository {
    pool: DynDatabasePool,
}

impl SqlxCommentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CommentRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CommentRepository for SqlxCommentRepository {
    async fn create(&self, comment: &NewComment) -> Result<Comment> {
        let [article_id, component_id, configuration_id, flight_id] =
            parent_columns(comment.parent);

        let id = on_pool!(self.pool, conn => {
            sqlx::query(
                r#"INSERT INTO comments
                   (article_id, component_id, configuration_id, flight_id, author_id, content, active, created_at)
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
            )
            .bind(article_id)
            .bind(component_id)
            .bind(configuration_id)
            .bind(flight_id)
            .bind(comment.author_id)
            .bind(&comment.content)
            .bind(comment.active)
            .bind(comment.created_at)
            .execute(conn)
            .await
            .with_context(|| format!("Failed to create comment on {} {}", comment.parent.kind(), comment.parent.id()))?
            .last_id()
        });

        Ok(Comment {
            id,
            parent: comment.parent,
            author_id: comment.author_id,
            content: comment.content.clone(),
            active: comment.active,
            created_at: comment.created_at,
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>> {
        let sql = format!("SELECT {} FROM comments WHERE id = ?", COMMENT_COLUMNS);
        let row = on_pool!(self.pool, conn => {
            sqlx::query_as::<_, CommentRow>(&sql)
                .bind(id)
                .fetch_optional(conn)
                .await?
        });
        row.map(Comment::try_from).transpose()
    }

    async fn list_visible(&self, parent: CommentParent) -> Result<Vec<Comment>> {
        let sql = format!(
            "SELECT {} FROM comments WHERE {} = ? AND active = true ORDER BY created_at DESC",
            COMMENT_COLUMNS,
            parent.kind().comment_column()
        );
        let rows = on_pool!(self.pool, conn => {
            sqlx::query_as::<_, CommentRow>(&sql)
                .bind(parent.id())
                .fetch_all(conn)
                .await?
        });
        into_comments(rows)
    }

    async fn list_pending(&self) -> Result<Vec<Comment>> {
        let sql = format!(
            "SELECT {} FROM comments WHERE active = false ORDER BY created_at",
            COMMENT_COLUMNS
        );
        let rows = on_pool!(self.pool, conn => {
            sqlx::query_as::<_, CommentRow>(&sql).fetch_all(conn).await?
        });
        into_comments(rows)
    }

    async fn list_all(&self) -> Result<Vec<Comment>> {
        let sql = format!("SELECT {} FROM comments ORDER BY created_at, id", COMMENT_COLUMNS);
        let rows = on_pool!(self.pool, conn => {
            sqlx::query_as::<_, CommentRow>(&sql).fetch_all(conn).await?
        });
        into_comments(rows)
    }

    async fn set_active(&self, id: i64, active: bool) -> Result<bool> {
        let affected = on_pool!(self.pool, conn => {
            sqlx::query("UPDATE comments SET active = ? WHERE id = ?")
                .bind(active)
                .bind(id)
                .execute(conn)
                .await?
                .rows_affected()
        });
        Ok(affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        ArticleRepository, SqlxArticleRepository, SqlxUserRepository, UserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::{Article, User, Visibility};
    use chrono::Duration;

    struct Fixture {
        pool: DynDatabasePool,
        repo: SqlxCommentRepository,
        article: i64,
        author: i64,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let author = SqlxUserRepository::new(pool.clone())
            .create(&User::new("pilote", "pilote@example.com"))
            .await
            .unwrap();
        let article = SqlxArticleRepository::new(pool.clone())
            .create(&Article::new("Sortie".into(), "".into(), None, Visibility::PUBLIC))
            .await
            .unwrap();
        Fixture {
            repo: SqlxCommentRepository::new(pool.clone()),
            pool,
            article: article.id,
            author: author.id,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_comment() {
        let fx = setup().await;
        let parent = CommentParent::Article(fx.article);

        let created = fx
            .repo
            .create(&NewComment::new(parent, fx.author, "Bon vol !".into()))
            .await
            .unwrap();

        let found = fx.repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(found.parent, parent);
        assert_eq!(found.content, "Bon vol !");
        assert!(!found.active);
    }

    #[tokio::test]
    async fn test_list_visible_hides_inactive() {
        let fx = setup().await;
        let parent = CommentParent::Article(fx.article);
        let now = Utc::now();

        for (offset, active) in [(2, true), (1, false), (0, true)] {
            let mut comment = NewComment::new(parent, fx.author, format!("c{}", offset));
            comment.active = active;
            comment.created_at = now - Duration::minutes(offset);
            fx.repo.create(&comment).await.unwrap();
        }

        let visible: Vec<String> = fx
            .repo
            .list_visible(parent)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.content)
            .collect();
        assert_eq!(visible, vec!["c0", "c2"]);

        let pending = fx.repo.list_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].content, "c1");

        assert!(fx
            .repo
            .list_visible(CommentParent::Flight(fx.article))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_set_active() {
        let fx = setup().await;
        let created = fx
            .repo
            .create(&NewComment::new(CommentParent::Article(fx.article), fx.author, "En attente".into()))
            .await
            .unwrap();

        assert!(fx.repo.set_active(created.id, true).await.unwrap());
        assert!(fx.repo.get_by_id(created.id).await.unwrap().unwrap().active);
        assert!(!fx.repo.set_active(9999, true).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_parent_rejected_by_schema() {
        let fx = setup().await;
        let result = sqlx::query(
            "INSERT INTO comments (author_id, content, active, created_at) VALUES (?, 'orphan', 0, ?)",
        )
        .bind(fx.author)
        .bind(Utc::now())
        .execute(fx.pool.as_sqlite().unwrap())
        .await;
        assert!(result.is_err());
    }
}
