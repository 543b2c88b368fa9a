//! Source database connections

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::config::MysqlSourceConfig;
use crate::db::{DynDatabasePool, MysqlDatabase};

/// Opens the pool the export pass reads from
#[async_trait]
pub trait SourceConnector: Send + Sync {
    async fn connect(&self, profile: &MysqlSourceConfig) -> Result<DynDatabasePool>;
}

/// Connects to the MySQL server described by the profile
#[derive(Debug, Default, Clone, Copy)]
pub struct MysqlConnector;

#[async_trait]
impl SourceConnector for MysqlConnector {
    async fn connect(&self, profile: &MysqlSourceConfig) -> Result<DynDatabasePool> {
        let options = profile.connect_options()?;
        let db = MysqlDatabase::connect_with(options, &profile.display_target()).await?;
        Ok(Arc::new(db))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_port_fails_before_connecting() {
        let profile = MysqlSourceConfig::from_lookup(|key| match key {
            "MYSQL_PORT" => Some("not-a-port".to_string()),
            _ => Some("x".to_string()),
        });

        let err = MysqlConnector.connect(&profile).await.err().unwrap();
        assert!(err.to_string().contains("MYSQL_PORT"));
    }

    #[tokio::test]
    #[ignore = "requires a MySQL server configured through MYSQL_* variables"]
    async fn test_connect_to_mysql() {
        let profile = MysqlSourceConfig::from_env();
        profile.validate().unwrap();

        let pool = MysqlConnector.connect(&profile).await.unwrap();
        pool.ping().await.unwrap();
        pool.close().await;
    }
}
