//! Backend dispatch macros shared by the repositories and the importer.

/// Run `$body` with `$conn` bound to the concrete sqlx pool behind `$pool`.
///
/// The body is expanded once per backend, so it must type-check against both
/// `&SqlitePool` and `&MySqlPool`.
macro_rules! on_pool {
    ($pool:expr, $conn:ident => $body:expr) => {
        match $pool.driver() {
            $crate::config::DatabaseDriver::Sqlite => {
                let $conn = $pool
                    .as_sqlite()
                    .ok_or_else(|| ::anyhow::anyhow!("SQLite pool unavailable"))?;
                $body
            }
            $crate::config::DatabaseDriver::Mysql => {
                let $conn = $pool
                    .as_mysql()
                    .ok_or_else(|| ::anyhow::anyhow!("MySQL pool unavailable"))?;
                $body
            }
        }
    };
}

/// Run `$body` with `$conn` bound to the connection of an open transaction.
macro_rules! on_tx {
    ($tx:expr, $conn:ident => $body:expr) => {
        match $tx {
            $crate::db::StoreTransaction::Sqlite(tx) => {
                let $conn = &mut **tx;
                $body
            }
            $crate::db::StoreTransaction::Mysql(tx) => {
                let $conn = &mut **tx;
                $body
            }
        }
    };
}

pub(crate) use on_pool;
pub(crate) use on_tx;
