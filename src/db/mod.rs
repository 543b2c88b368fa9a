//! Database layer
//!
//! This module provides database abstraction for dronehub.
//! It supports:
//! - SQLite (default, the local content store)
//! - MySQL (remote deployments, and the source of `import-from-mysql`)
//!
//! Repositories are written once against both backends: [`on_pool!`] runs a
//! query body against whichever sqlx pool a [`DynDatabasePool`] wraps, and
//! [`on_tx!`] does the same for a [`StoreTransaction`].

use anyhow::{Context, Result};
use sqlx::mysql::MySqlQueryResult;
use sqlx::sqlite::SqliteQueryResult;
use sqlx::{MySql, Sqlite, Transaction};

mod macros;

pub(crate) use macros::{on_pool, on_tx};

pub mod migrations;
pub mod pool;
pub mod registry;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
pub use registry::{ConnectionRegistry, ProfileGuard};

/// Row id generated by an INSERT, whatever the backend.
pub trait LastInsertId {
    fn last_id(&self) -> i64;
}

impl LastInsertId for SqliteQueryResult {
    fn last_id(&self) -> i64 {
        self.last_insert_rowid()
    }
}

impl LastInsertId for MySqlQueryResult {
    fn last_id(&self) -> i64 {
        self.last_insert_id() as i64
    }
}

/// An open transaction on either backend.
pub enum StoreTransaction {
    Sqlite(Transaction<'static, Sqlite>),
    Mysql(Transaction<'static, MySql>),
}

impl StoreTransaction {
    /// Begin a transaction on the given pool
    pub async fn begin(pool: &DynDatabasePool) -> Result<Self> {
        if let Some(sqlite) = pool.as_sqlite() {
            let tx = sqlite.begin().await.context("Failed to begin SQLite transaction")?;
            return Ok(Self::Sqlite(tx));
        }
        let mysql = pool
            .as_mysql()
            .context("Database pool exposes no backend")?;
        let tx = mysql.begin().await.context("Failed to begin MySQL transaction")?;
        Ok(Self::Mysql(tx))
    }

    pub async fn commit(self) -> Result<(), sqlx::Error> {
        match self {
            Self::Sqlite(tx) => tx.commit().await,
            Self::Mysql(tx) => tx.commit().await,
        }
    }

    pub async fn rollback(self) -> Result<(), sqlx::Error> {
        match self {
            Self::Sqlite(tx) => tx.rollback().await,
            Self::Mysql(tx) => tx.rollback().await,
        }
    }
}

/// Encode a JSON object for a TEXT column.
pub(crate) fn json_to_text(map: &serde_json::Map<String, serde_json::Value>) -> String {
    serde_json::Value::Object(map.clone()).to_string()
}

/// Decode a TEXT column holding a JSON object; anything else reads as empty.
pub(crate) fn text_to_json(text: &str) -> serde_json::Map<String, serde_json::Value> {
    match serde_json::from_str(text) {
        Ok(serde_json::Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    }
}
