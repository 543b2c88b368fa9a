//! Flight repository

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::db::{json_to_text, on_pool, text_to_json, DynDatabasePool, LastInsertId};
use crate::models::Flight;

/// Flight repository trait
#[async_trait]
pub trait FlightRepository: Send + Sync {
    /// Create a new flight
    async fn create(&self, flight: &Flight) -> Result<Flight>;

    /// Get flight by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Flight>>;

    /// Update an existing flight
    async fn update(&self, flight: &Flight) -> Result<Flight>;

    /// All flights, newest first
    async fn list(&self) -> Result<Vec<Flight>>;

    /// Flights flown with a configuration, newest first
    async fn list_by_configuration(&self, configuration_id: i64) -> Result<Vec<Flight>>;
}

const FLIGHT_COLUMNS: &str =
    "id, title, body, author_id, configuration_id, meteo, datalog, video, created_at";

#[derive(sqlx::FromRow)]
struct FlightRow {
    id: i64,
    title: String,
    body: String,
    author_id: Option<i64>,
    configuration_id: i64,
    meteo: String,
    datalog: Option<String>,
    video: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<FlightRow> for Flight {
    fn from(row: FlightRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            body: row.body,
            author_id: row.author_id,
            configuration_id: row.configuration_id,
            meteo: text_to_json(&row.meteo),
            datalog: row.datalog,
            video: row.video,
            created_at: row.created_at,
        }
    }
}

/// SQLx-based flight repository implementation
pub struct SqlxFlightRepository {
    pool: DynDatabasePool,
}

impl SqlxFlightRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn FlightRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl FlightRepository for SqlxFlightRepository {
    async fn create(&self, flight: &Flight) -> Result<Flight> {
        let meteo = json_to_text(&flight.meteo);
        let id = on_pool!(self.pool, conn => {
            sqlx::query(
                r#"INSERT INTO flights
                   (title, body, author_id, configuration_id, meteo, datalog, video,
                    staff, private, superprivate, created_at)
                   VALUES (?, ?, ?, ?, ?, ?, ?, false, false, false, ?)"#,
            )
            .bind(&flight.title)
            .bind(&flight.body)
            .bind(flight.author_id)
            .bind(flight.configuration_id)
            .bind(&meteo)
            .bind(&flight.datalog)
            .bind(&flight.video)
            .bind(flight.created_at)
            .execute(conn)
            .await
            .with_context(|| format!("Failed to create flight: {}", flight.title))?
            .last_id()
        });

        Ok(Flight {
            id,
            ..flight.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Flight>> {
        let sql = format!("SELECT {} FROM flights WHERE id = ?", FLIGHT_COLUMNS);
        let row = on_pool!(self.pool, conn => {
            sqlx::query_as::<_, FlightRow>(&sql)
                .bind(id)
                .fetch_optional(conn)
                .await?
        });
        Ok(row.map(Flight::from))
    }

    async fn update(&self, flight: &Flight) -> Result<Flight> {
        let meteo = json_to_text(&flight.meteo);
        let affected = on_pool!(self.pool, conn => {
            sqlx::query(
                r#"UPDATE flights
                   SET title = ?, body = ?, configuration_id = ?, meteo = ?, datalog = ?, video = ?,
                       staff = false, private = false, superprivate = false
                   WHERE id = ?"#,
            )
            .bind(&flight.title)
            .bind(&flight.body)
            .bind(flight.configuration_id)
            .bind(&meteo)
            .bind(&flight.datalog)
            .bind(&flight.video)
            .bind(flight.id)
            .execute(conn)
            .await?
            .rows_affected()
        });

        if affected == 0 {
            anyhow::bail!("Flight not found: {}", flight.id);
        }
        Ok(flight.clone())
    }

    async fn list(&self) -> Result<Vec<Flight>> {
        let sql = format!("SELECT {} FROM flights ORDER BY created_at DESC", FLIGHT_COLUMNS);
        let rows = on_pool!(self.pool, conn => {
            sqlx::query_as::<_, FlightRow>(&sql).fetch_all(conn).await?
        });
        Ok(rows.into_iter().map(Flight::from).collect())
    }

    async fn list_by_configuration(&self, configuration_id: i64) -> Result<Vec<Flight>> {
        let sql = format!(
            "SELECT {} FROM flights WHERE configuration_id = ? ORDER BY created_at DESC",
            FLIGHT_COLUMNS
        );
        let rows = on_pool!(self.pool, conn => {
            sqlx::query_as::<_, FlightRow>(&sql)
                .bind(configuration_id)
                .fetch_all(conn)
                .await?
        });
        Ok(rows.into_iter().map(Flight::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{ConfigurationRepository, SqlxConfigurationRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::Configuration;
    use chrono::Duration;
    use serde_json::json;

    async fn setup_with_pool() -> (DynDatabasePool, SqlxFlightRepository, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let configuration = SqlxConfigurationRepository::new(pool.clone())
            .create(&Configuration::new("Quad".into(), "".into(), "1.0".into()))
            .await
            .unwrap();
        (pool.clone(), SqlxFlightRepository::new(pool), configuration.id)
    }

    async fn setup() -> (SqlxFlightRepository, i64) {
        let (_, repo, configuration_id) = setup_with_pool().await;
        (repo, configuration_id)
    }

    async fn raw_flags(pool: &DynDatabasePool, id: i64) -> (bool, bool, bool) {
        sqlx::query_as::<_, (bool, bool, bool)>("SELECT staff, private, superprivate FROM flights WHERE id = ?")
            .bind(id)
            .fetch_one(pool.as_sqlite().unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_flight_with_meteo() {
        let (repo, configuration_id) = setup().await;
        let mut flight = Flight::new("Premier vol".into(), "RAS".into(), configuration_id);
        flight.meteo = json!({"couverture": "couvert", "force_vent": "10 km/h"})
            .as_object()
            .cloned()
            .unwrap();

        let created = repo.create(&flight).await.unwrap();
        let found = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(found.meteo["couverture"], json!("couvert"));
        assert_eq!(found.configuration_id, configuration_id);
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let (repo, configuration_id) = setup().await;
        let now = Utc::now();
        for (days, title) in [(3, "Vieux"), (1, "Récent"), (2, "Moyen")] {
            let mut flight = Flight::new(title.into(), "".into(), configuration_id);
            flight.created_at = now - Duration::days(days);
            repo.create(&flight).await.unwrap();
        }

        let titles: Vec<String> = repo.list().await.unwrap().into_iter().map(|f| f.title).collect();
        assert_eq!(titles, vec!["Récent", "Moyen", "Vieux"]);
        assert_eq!(repo.list_by_configuration(configuration_id).await.unwrap().len(), 3);
        assert!(repo.list_by_configuration(configuration_id + 1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_flight() {
        let (repo, configuration_id) = setup().await;
        let mut flight = repo
            .create(&Flight::new("Vol".into(), "".into(), configuration_id))
            .await
            .unwrap();

        flight.video = Some("videos/vol.mp4".into());
        repo.update(&flight).await.unwrap();

        let found = repo.get_by_id(flight.id).await.unwrap().unwrap();
        assert_eq!(found.video.as_deref(), Some("videos/vol.mp4"));
    }

    #[tokio::test]
    async fn test_flags_forced_false_on_save() {
        let (pool, repo, configuration_id) = setup_with_pool().await;
        let created = repo
            .create(&Flight::new("Vol de nuit".into(), "".into(), configuration_id))
            .await
            .unwrap();
        assert_eq!(raw_flags(&pool, created.id).await, (false, false, false));

        sqlx::query("UPDATE flights SET staff = 1, private = 1, superprivate = 1 WHERE id = ?")
            .bind(created.id)
            .execute(pool.as_sqlite().unwrap())
            .await
            .unwrap();
        assert_eq!(raw_flags(&pool, created.id).await, (true, true, true));

        repo.update(&created).await.unwrap();
        assert_eq!(raw_flags(&pool, created.id).await, (false, false, false));
    }
}
