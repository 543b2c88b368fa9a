//! Component repository
//!
//! Components are never restricted: every write stores the three
//! visibility columns as literal `false`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::db::{json_to_text, on_pool, text_to_json, DynDatabasePool, LastInsertId};
use crate::models::Component;

/// Component repository trait
#[async_trait]
pub trait ComponentRepository: Send + Sync {
    /// Create a new component
    async fn create(&self, component: &Component) -> Result<Component>;

    /// Get component by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Component>>;

    /// Update an existing component
    async fn update(&self, component: &Component) -> Result<Component>;

    /// All components, by category name then title
    async fn list(&self) -> Result<Vec<Component>>;

    /// Components of one category, by title
    async fn list_by_category(&self, category_id: i64) -> Result<Vec<Component>>;
}

const COMPONENT_COLUMNS: &str =
    "c.id, c.title, c.body, c.author_id, c.category_id, c.specs, c.datasheet, c.photo, c.created_at";

#[derive(sqlx::FromRow)]
struct ComponentRow {
    id: i64,
    title: String,
    body: String,
    author_id: Option<i64>,
    category_id: i64,
    specs: String,
    datasheet: Option<String>,
    photo: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<ComponentRow> for Component {
    fn from(row: ComponentRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            body: row.body,
            author_id: row.author_id,
            category_id: row.category_id,
            specs: text_to_json(&row.specs),
            datasheet: row.datasheet,
            photo: row.photo,
            created_at: row.created_at,
        }
    }
}

/// SQLx-based component repository implementation
pub struct SqlxComponentRepository {
    pool: DynDatabasePool,
}

impl SqlxComponentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ComponentRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ComponentRepository for SqlxComponentRepository {
    async fn create(&self, component: &Component) -> Result<Component> {
        let specs = json_to_text(&component.specs);
        let id = on_pool!(self.pool, conn => {
            sqlx::query(
                r#"INSERT INTO components
                   (title, body, author_id, category_id, specs, datasheet, photo,
                    staff, private, superprivate, created_at)
                   VALUES (?, ?, ?, ?, ?, ?, ?, false, false, false, ?)"#,
            )
            .bind(&component.title)
            .bind(&component.body)
            .bind(component.author_id)
            .bind(component.category_id)
            .bind(&specs)
            .bind(&component.datasheet)
            .bind(&component.photo)
            .bind(component.created_at)
            .execute(conn)
            .await
            .with_context(|| format!("Failed to create component: {}", component.title))?
            .last_id()
        });

        Ok(Component {
            id,
            ..component.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Component>> {
        let sql = format!("SELECT {} FROM components c WHERE c.id = ?", COMPONENT_COLUMNS);
        let row = on_pool!(self.pool, conn => {
            sqlx::query_as::<_, ComponentRow>(&sql)
                .bind(id)
                .fetch_optional(conn)
                .await?
        });
        Ok(row.map(Component::from))
    }

    async fn update(&self, component: &Component) -> Result<Component> {
        let specs = json_to_text(&component.specs);
        let affected = on_pool!(self.pool, conn => {
            sqlx::query(
                r#"UPDATE components
                   SET title = ?, body = ?, category_id = ?, specs = ?, datasheet = ?, photo = ?,
                       staff = false, private = false, superprivate = false
                   WHERE id = ?"#,
            )
            .bind(&component.title)
            .bind(&component.body)
            .bind(component.category_id)
            .bind(&specs)
            .bind(&component.datasheet)
            .bind(&component.photo)
            .bind(component.id)
            .execute(conn)
            .await?
            .rows_affected()
        });

        if affected == 0 {
            anyhow::bail!("Component not found: {}", component.id);
        }
        Ok(component.clone())
    }

    async fn list(&self) -> Result<Vec<Component>> {
        let sql = format!(
            r#"SELECT {} FROM components c
               JOIN component_categories cat ON cat.id = c.category_id
               ORDER BY cat.name, c.title"#,
            COMPONENT_COLUMNS
        );
        let rows = on_pool!(self.pool, conn => {
            sqlx::query_as::<_, ComponentRow>(&sql).fetch_all(conn).await?
        });
        Ok(rows.into_iter().map(Component::from).collect())
    }

    async fn list_by_category(&self, category_id: i64) -> Result<Vec<Component>> {
        let sql = format!(
            "SELECT {} FROM components c WHERE c.category_id = ? ORDER BY c.title",
            COMPONENT_COLUMNS
        );
        let rows = on_pool!(self.pool, conn => {
            sqlx::query_as::<_, ComponentRow>(&sql)
                .bind(category_id)
                .fetch_all(conn)
                .await?
        });
        Ok(rows.into_iter().map(Component::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{CategoryRepository, SqlxCategoryRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::ComponentCategory;
    use serde_json::json;

    async fn setup() -> (DynDatabasePool, SqlxComponentRepository, i64, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let categories = SqlxCategoryRepository::new(pool.clone());
        let moteur = categories
            .create(&ComponentCategory::new("Moteur", true))
            .await
            .unwrap();
        let cadre = categories
            .create(&ComponentCategory::new("Cadre", true))
            .await
            .unwrap();
        (pool.clone(), SqlxComponentRepository::new(pool), moteur.id, cadre.id)
    }

    async fn raw_flags(pool: &DynDatabasePool, id: i64) -> (bool, bool, bool) {
        sqlx::query_as::<_, (bool, bool, bool)>("SELECT staff, private, superprivate FROM components WHERE id = ?")
            .bind(id)
            .fetch_one(pool.as_sqlite().unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_component_with_specs() {
        let (_, repo, moteur, _) = setup().await;
        let mut component = Component::new("T-Motor F40".into(), "Moteur 2306".into(), moteur);
        component.specs = json!({"kv": 2400, "stator": "2306"})
            .as_object()
            .cloned()
            .unwrap();

        let created = repo.create(&component).await.unwrap();
        let found = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(found.specs["kv"], json!(2400));
        assert_eq!(found.category_id, moteur);
    }

    #[tokio::test]
    async fn test_update_rewrites_flags_false() {
        let (pool, repo, moteur, _) = setup().await;
        let created = repo
            .create(&Component::new("Emax".into(), "".into(), moteur))
            .await
            .unwrap();
        assert_eq!(raw_flags(&pool, created.id).await, (false, false, false));

        sqlx::query("UPDATE components SET staff = 1, private = 1, superprivate = 1 WHERE id = ?")
            .bind(created.id)
            .execute(pool.as_sqlite().unwrap())
            .await
            .unwrap();

        repo.update(&created).await.unwrap();
        assert_eq!(raw_flags(&pool, created.id).await, (false, false, false));
    }

    #[tokio::test]
    async fn test_list_orders_by_category_then_title() {
        let (_, repo, moteur, cadre) = setup().await;
        repo.create(&Component::new("Zeta".into(), "".into(), moteur)).await.unwrap();
        repo.create(&Component::new("Alpha".into(), "".into(), moteur)).await.unwrap();
        repo.create(&Component::new("Source One".into(), "".into(), cadre)).await.unwrap();

        let titles: Vec<String> = repo.list().await.unwrap().into_iter().map(|c| c.title).collect();
        assert_eq!(titles, vec!["Source One", "Alpha", "Zeta"]);

        let moteurs = repo.list_by_category(moteur).await.unwrap();
        assert_eq!(moteurs.len(), 2);
    }

    #[tokio::test]
    async fn test_same_title_in_same_category_rejected() {
        let (_, repo, moteur, cadre) = setup().await;
        repo.create(&Component::new("Générique".into(), "".into(), moteur)).await.unwrap();
        repo.create(&Component::new("Générique".into(), "".into(), cadre)).await.unwrap();

        let duplicate = repo.create(&Component::new("Générique".into(), "".into(), moteur)).await;
        assert!(duplicate.is_err());
    }
}
