//! Component category repository
//!
//! This module provides:
//! - `CategoryRepository` trait defining the interface for category data access
//! - `SqlxCategoryRepository` implementing the trait for SQLite and MySQL

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

use crate::db::{on_pool, DynDatabasePool, LastInsertId};
use crate::models::ComponentCategory;

/// Category repository trait
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// Create a new category
    async fn create(&self, category: &ComponentCategory) -> Result<ComponentCategory>;

    /// Get category by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<ComponentCategory>>;

    /// Get category by name
    async fn get_by_name(&self, name: &str) -> Result<Option<ComponentCategory>>;

    /// List all categories, ordered by name
    async fn list(&self) -> Result<Vec<ComponentCategory>>;
}

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: i64,
    name: String,
    on_board: bool,
}

impl From<CategoryRow> for ComponentCategory {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            on_board: row.on_board,
        }
    }
}

/// SQLx-based category repository implementation
pub struct SqlxCategoryRepository {
    pool: DynDatabasePool,
}

impl SqlxCategoryRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CategoryRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CategoryRepository for SqlxCategoryRepository {
    async fn create(&self, category: &ComponentCategory) -> Result<ComponentCategory> {
        let id = on_pool!(self.pool, conn => {
            sqlx::query("INSERT INTO component_categories (name, on_board) VALUES (?, ?)")
                .bind(&category.name)
                .bind(category.on_board)
                .execute(conn)
                .await
                .with_context(|| format!("Failed to create category: {}", category.name))?
                .last_id()
        });

        Ok(ComponentCategory {
            id,
            ..category.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<ComponentCategory>> {
        let row = on_pool!(self.pool, conn => {
            sqlx::query_as::<_, CategoryRow>("SELECT id, name, on_board FROM component_categories WHERE id = ?")
                .bind(id)
                .fetch_optional(conn)
                .await?
        });
        Ok(row.map(ComponentCategory::from))
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<ComponentCategory>> {
        let row = on_pool!(self.pool, conn => {
            sqlx::query_as::<_, CategoryRow>("SELECT id, name, on_board FROM component_categories WHERE name = ?")
                .bind(name)
                .fetch_optional(conn)
                .await?
        });
        Ok(row.map(ComponentCategory::from))
    }

    async fn list(&self) -> Result<Vec<ComponentCategory>> {
        let rows = on_pool!(self.pool, conn => {
            sqlx::query_as::<_, CategoryRow>("SELECT id, name, on_board FROM component_categories ORDER BY name")
                .fetch_all(conn)
                .await?
        });
        Ok(rows.into_iter().map(ComponentCategory::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxCategoryRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxCategoryRepository::new(pool)
    }

    #[tokio::test]
    async fn test_create_category() {
        let repo = setup_test_repo().await;

        let created = repo
            .create(&ComponentCategory::new("Hélice", true))
            .await
            .expect("Failed to create category");

        assert!(created.id > 0);
        assert_eq!(created.name, "Hélice");
        assert!(created.on_board);

        let found = repo.get_by_id(created.id).await.unwrap();
        assert_eq!(found, Some(created));
    }

    #[tokio::test]
    async fn test_get_by_name() {
        let repo = setup_test_repo().await;
        repo.create(&ComponentCategory::new("Télécommande", false)).await.unwrap();

        let found = repo.get_by_name("Télécommande").await.unwrap().unwrap();
        assert!(!found.on_board);
        assert!(repo.get_by_name("Gyroscope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_name_rejected() {
        let repo = setup_test_repo().await;
        repo.create(&ComponentCategory::new("Batterie", true)).await.unwrap();

        let result = repo.create(&ComponentCategory::new("Batterie", true)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_list_ordered_by_name() {
        let repo = setup_test_repo().await;
        repo.create(&ComponentCategory::new("Moteur", true)).await.unwrap();
        repo.create(&ComponentCategory::new("Cadre", true)).await.unwrap();

        let names: Vec<String> = repo.list().await.unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Cadre", "Moteur"]);
    }
}
