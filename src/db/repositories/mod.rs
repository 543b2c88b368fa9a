//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles the operations of one entity.

pub mod article;
pub mod category;
pub mod comment;
pub mod component;
pub mod configuration;
pub mod flight;
pub mod user;

pub use article::{ArticleRepository, SqlxArticleRepository};
pub use category::{CategoryRepository, SqlxCategoryRepository};
pub use comment::{CommentRepository, SqlxCommentRepository};
pub use component::{ComponentRepository, SqlxComponentRepository};
pub use configuration::{ConfigurationRepository, SqlxConfigurationRepository};
pub use flight::{FlightRepository, SqlxFlightRepository};
pub use user::{SqlxUserRepository, UserRepository};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::models::{Component, ComponentCategory, Configuration, Flight};
    use proptest::prelude::*;

    type Flags = (bool, bool, bool);

    async fn stored_flags(pool: &DynDatabasePool, table: &str, id: i64) -> Flags {
        let sql = format!("SELECT staff, private, superprivate FROM {} WHERE id = ?", table);
        sqlx::query_as::<_, Flags>(&sql)
            .bind(id)
            .fetch_one(pool.as_sqlite().unwrap())
            .await
            .unwrap()
    }

    async fn preset_flags(pool: &DynDatabasePool, table: &str, id: i64, flags: Flags) {
        let sql = format!(
            "UPDATE {} SET staff = ?, private = ?, superprivate = ? WHERE id = ?",
            table
        );
        sqlx::query(&sql)
            .bind(flags.0)
            .bind(flags.1)
            .bind(flags.2)
            .bind(id)
            .execute(pool.as_sqlite().unwrap())
            .await
            .unwrap();
    }

    /// Create one entity of each unrestricted type, preset `flags` on every
    /// row, save them again and return the stored flags after each step.
    async fn save_with_preset(flags: Flags) -> Vec<(&'static str, Flags, Flags)> {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let category = SqlxCategoryRepository::new(pool.clone())
            .create(&ComponentCategory::new("Batterie", true))
            .await
            .unwrap();
        let components = SqlxComponentRepository::new(pool.clone());
        let configurations = SqlxConfigurationRepository::new(pool.clone());
        let flights = SqlxFlightRepository::new(pool.clone());

        let component = components
            .create(&Component::new("Tattu 1300".into(), "".into(), category.id))
            .await
            .unwrap();
        let mut configuration = Configuration::new("Quad".into(), "".into(), "1.0".into());
        configuration.component_ids = vec![component.id];
        let configuration = configurations.create(&configuration).await.unwrap();
        let flight = flights
            .create(&Flight::new("Vol".into(), "".into(), configuration.id))
            .await
            .unwrap();

        let mut after_create = Vec::new();
        for (table, id) in [
            ("components", component.id),
            ("configurations", configuration.id),
            ("flights", flight.id),
        ] {
            after_create.push((table, id, stored_flags(&pool, table, id).await));
            preset_flags(&pool, table, id, flags).await;
        }

        components.update(&component).await.unwrap();
        configurations.update(&configuration).await.unwrap();
        flights.update(&flight).await.unwrap();

        let mut results = Vec::new();
        for (table, id, created) in after_create {
            results.push((table, created, stored_flags(&pool, table, id).await));
        }
        results
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        /// Components, configurations and flights are never stored restricted
        #[test]
        fn property_unrestricted_entities_store_false_flags(
            flags in any::<(bool, bool, bool)>(),
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let result: Result<(), TestCaseError> = rt.block_on(async {
                for (table, created, updated) in save_with_preset(flags).await {
                    prop_assert_eq!(created, (false, false, false), "{} after create", table);
                    prop_assert_eq!(updated, (false, false, false), "{} after update", table);
                }
                Ok(())
            });
            result?;
        }
    }
}
