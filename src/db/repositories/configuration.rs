//! Configuration repository
//!
//! A configuration row and its component associations are written in one
//! transaction. Like components, configurations are stored unrestricted.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use crate::db::{on_pool, on_tx, DynDatabasePool, LastInsertId, StoreTransaction};
use crate::models::Configuration;

/// Configuration repository trait
#[async_trait]
pub trait ConfigurationRepository: Send + Sync {
    /// Create a configuration with its component associations
    async fn create(&self, configuration: &Configuration) -> Result<Configuration>;

    /// Get configuration by ID, components included
    async fn get_by_id(&self, id: i64) -> Result<Option<Configuration>>;

    /// Update a configuration and replace its component associations
    async fn update(&self, configuration: &Configuration) -> Result<Configuration>;

    /// All configurations, highest version first
    async fn list(&self) -> Result<Vec<Configuration>>;
}

const CONFIGURATION_COLUMNS: &str =
    "id, title, body, author_id, version_number, firmware_version, photo, created_at";

#[derive(sqlx::FromRow)]
struct ConfigurationRow {
    id: i64,
    title: String,
    body: String,
    author_id: Option<i64>,
    version_number: String,
    firmware_version: String,
    photo: Option<String>,
    created_at: DateTime<Utc>,
}

impl ConfigurationRow {
    fn into_configuration(self, component_ids: Vec<i64>) -> Configuration {
        Configuration {
            id: self.id,
            title: self.title,
            body: self.body,
            author_id: self.author_id,
            version_number: self.version_number,
            firmware_version: self.firmware_version,
            photo: self.photo,
            component_ids,
            created_at: self.created_at,
        }
    }
}

/// SQLx-based configuration repository implementation
pub struct SqlxConfigurationRepository {
    pool: DynDatabasePool,
}

impl SqlxConfigurationRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ConfigurationRepository> {
        Arc::new(Self::new(pool))
    }

    async fn component_ids(&self, configuration_id: i64) -> Result<Vec<i64>> {
        let ids = on_pool!(self.pool, conn => {
            sqlx::query_scalar::<_, i64>(
                "SELECT component_id FROM configuration_components WHERE configuration_id = ? ORDER BY component_id",
            )
            .bind(configuration_id)
            .fetch_all(conn)
            .await?
        });
        Ok(ids)
    }
}

#[async_trait]
impl ConfigurationRepository for SqlxConfigurationRepository {
    async fn create(&self, configuration: &Configuration) -> Result<Configuration> {
        let mut tx = StoreTransaction::begin(&self.pool).await?;

        let id = on_tx!(&mut tx, conn => {
            let id = sqlx::query(
                r#"INSERT INTO configurations
                   (title, body, author_id, version_number, firmware_version, photo,
                    staff, private, superprivate, created_at)
                   VALUES (?, ?, ?, ?, ?, ?, false, false, false, ?)"#,
            )
            .bind(&configuration.title)
            .bind(&configuration.body)
            .bind(configuration.author_id)
            .bind(&configuration.version_number)
            .bind(&configuration.firmware_version)
            .bind(&configuration.photo)
            .bind(configuration.created_at)
            .execute(&mut *conn)
            .await
            .with_context(|| format!("Failed to create configuration: {}", configuration.title))?
            .last_id();

            for component_id in &configuration.component_ids {
                sqlx::query(
                    "INSERT INTO configuration_components (configuration_id, component_id) VALUES (?, ?)",
                )
                .bind(id)
                .bind(component_id)
                .execute(&mut *conn)
                .await
                .with_context(|| format!("Failed to attach component {}", component_id))?;
            }
            id
        });

        tx.commit().await?;

        Ok(Configuration {
            id,
            ..configuration.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Configuration>> {
        let sql = format!(
            "SELECT {} FROM configurations WHERE id = ?",
            CONFIGURATION_COLUMNS
        );
        let row = on_pool!(self.pool, conn => {
            sqlx::query_as::<_, ConfigurationRow>(&sql)
                .bind(id)
                .fetch_optional(conn)
                .await?
        });

        match row {
            Some(row) => {
                let component_ids = self.component_ids(row.id).await?;
                Ok(Some(row.into_configuration(component_ids)))
            }
            None => Ok(None),
        }
    }

    async fn update(&self, configuration: &Configuration) -> Result<Configuration> {
        let mut tx = StoreTransaction::begin(&self.pool).await?;

        let affected = on_tx!(&mut tx, conn => {
            let affected = sqlx::query(
                r#"UPDATE configurations
                   SET title = ?, body = ?, version_number = ?, firmware_version = ?, photo = ?,
                       staff = false, private = false, superprivate = false
                   WHERE id = ?"#,
            )
            .bind(&configuration.title)
            .bind(&configuration.body)
            .bind(&configuration.version_number)
            .bind(&configuration.firmware_version)
            .bind(&configuration.photo)
            .bind(configuration.id)
            .execute(&mut *conn)
            .await?
            .rows_affected();

            if affected > 0 {
                sqlx::query("DELETE FROM configuration_components WHERE configuration_id = ?")
                    .bind(configuration.id)
                    .execute(&mut *conn)
                    .await?;
                for component_id in &configuration.component_ids {
                    sqlx::query(
                        "INSERT INTO configuration_components (configuration_id, component_id) VALUES (?, ?)",
                    )
                    .bind(configuration.id)
                    .bind(component_id)
                    .execute(&mut *conn)
                    .await
                    .with_context(|| format!("Failed to attach component {}", component_id))?;
                }
            }
            affected
        });

        if affected == 0 {
            tx.rollback().await?;
            anyhow::bail!("Configuration not found: {}", configuration.id);
        }
        tx.commit().await?;
        Ok(configuration.clone())
    }

    async fn list(&self) -> Result<Vec<Configuration>> {
        let sql = format!(
            "SELECT {} FROM configurations ORDER BY version_number DESC",
            CONFIGURATION_COLUMNS
        );
        let (rows, links) = on_pool!(self.pool, conn => {
            let rows = sqlx::query_as::<_, ConfigurationRow>(&sql).fetch_all(conn).await?;
            let links = sqlx::query_as::<_, (i64, i64)>(
                "SELECT configuration_id, component_id FROM configuration_components ORDER BY component_id",
            )
            .fetch_all(conn)
            .await?;
            (rows, links)
        });

        let mut by_configuration: HashMap<i64, Vec<i64>> = HashMap::new();
        for (configuration_id, component_id) in links {
            by_configuration
                .entry(configuration_id)
                .or_default()
                .push(component_id);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let ids = by_configuration.remove(&row.id).unwrap_or_default();
                row.into_configuration(ids)
            })
            .collect())
    }
}
