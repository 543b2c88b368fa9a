//! Cross-database import
//!
//! Copies a MySQL deployment into the local store in two passes:
//! 1. export: read the source and write every record, keyed by natural keys,
//!    to a fresh temporary JSON artifact
//! 2. load: read the artifact back and insert it into the destination in a
//!    single transaction, resolving natural keys to the destination's ids
//!
//! The source profile is registered under [`SOURCE_ALIAS`] for the duration
//! of a run. Whatever the outcome, the artifact is deleted and the profile
//! deregistered before [`ImportPipeline::run`] returns.

use std::collections::BTreeMap;
use std::io::{Seek, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{error, info};

use crate::config::{ConfigError, MysqlSourceConfig};
use crate::db::registry::AliasInUse;
use crate::db::{ConnectionRegistry, DynDatabasePool};

pub mod connector;
pub mod dump;
pub mod export;
pub mod load;

pub use connector::{MysqlConnector, SourceConnector};
pub use dump::DumpRecord;

/// Alias of the temporary source profile
pub const SOURCE_ALIAS: &str = "mysql_source";

/// Error types for the import pipeline
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    ProfileInUse(#[from] AliasInUse),

    #[error("Failed to create the dump file: {0}")]
    TempFile(#[source] std::io::Error),

    #[error("Failed to connect to the source database: {0:#}")]
    Connect(#[source] anyhow::Error),

    #[error("Export failed: {0:#}")]
    Export(#[source] anyhow::Error),

    #[error("Invalid dump artifact: {0}")]
    Artifact(#[from] serde_json::Error),

    #[error("Natural key {key} appears more than once for {model}")]
    AmbiguousNaturalKey { model: &'static str, key: String },

    #[error("{model} {key} already exists in the destination")]
    NaturalKeyConflict { model: &'static str, key: String },

    #[error("No {model} with natural key {key}")]
    UnresolvedNaturalKey { model: &'static str, key: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Load failed: {0:#}")]
    Load(#[from] anyhow::Error),

    #[error("Failed to delete the dump file: {0}")]
    Cleanup(#[source] std::io::Error),

    #[error("Failed to write operator output: {0}")]
    Output(#[source] std::io::Error),
}

/// Number of records loaded, per model
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    counts: BTreeMap<&'static str, usize>,
}

impl ImportReport {
    pub fn record(&mut self, model: &'static str) {
        *self.counts.entry(model).or_default() += 1;
    }

    pub fn count(&self, model: &str) -> usize {
        self.counts.get(model).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn counts(&self) -> &BTreeMap<&'static str, usize> {
        &self.counts
    }
}

impl std::fmt::Display for ImportReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.counts.is_empty() {
            return write!(f, "no records");
        }
        let parts: Vec<String> = self
            .counts
            .iter()
            .map(|(model, count)| format!("{} {}", count, model))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// Result of an import command
#[derive(Debug)]
pub enum ImportOutcome {
    /// Source parameters incomplete; nothing was attempted
    MissingConfig(ConfigError),
    Imported(ImportReport),
}

/// MySQL to local store import
pub struct ImportPipeline {
    destination: DynDatabasePool,
    registry: Arc<ConnectionRegistry>,
    connector: Arc<dyn SourceConnector>,
    temp_dir: Option<PathBuf>,
}

impl ImportPipeline {
    pub fn new(destination: DynDatabasePool, connector: Arc<dyn SourceConnector>) -> Self {
        Self {
            destination,
            registry: ConnectionRegistry::new(),
            connector,
            temp_dir: None,
        }
    }

    /// Share an existing registry
    pub fn with_registry(mut self, registry: Arc<ConnectionRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Directory for the dump artifact, the system temp dir if `None`
    pub fn with_temp_dir(mut self, temp_dir: Option<PathBuf>) -> Self {
        self.temp_dir = temp_dir;
        self
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Run the import command, reporting progress on `out` and
    /// configuration problems on `err`.
    ///
    /// Missing source parameters are reported and yield
    /// [`ImportOutcome::MissingConfig`] without touching any database.
    /// Transfer failures are returned after cleanup.
    pub async fn execute(
        &self,
        source: MysqlSourceConfig,
        out: &mut dyn Write,
        err: &mut dyn Write,
    ) -> Result<ImportOutcome, ImportError> {
        if let Err(e) = source.validate() {
            error!("Import aborted: {}", e);
            writeln!(err, "{}", e).map_err(ImportError::Output)?;
            return Ok(ImportOutcome::MissingConfig(e));
        }

        writeln!(out, "Connecting to MySQL {}...", source.display_target())
            .map_err(ImportError::Output)?;
        let report = self.run(source).await?;
        writeln!(out, "Import finished: {}", report).map_err(ImportError::Output)?;
        Ok(ImportOutcome::Imported(report))
    }

    /// Register the source profile, transfer, then clean up.
    pub async fn run(&self, source: MysqlSourceConfig) -> Result<ImportReport, ImportError> {
        source.validate()?;
        let guard = self.registry.register(SOURCE_ALIAS, source.clone())?;

        let dump = match self.create_dump_file() {
            Ok(dump) => dump,
            Err(e) => {
                guard.release();
                return Err(ImportError::TempFile(e));
            }
        };
        info!("Dump artifact: {}", dump.path().display());

        let result = self.transfer(&source, &dump).await;

        let cleanup = dump.close();
        guard.release();

        match (result, cleanup) {
            (Err(e), _) => {
                error!("Import failed: {}", e);
                Err(e)
            }
            (Ok(_), Err(e)) => Err(ImportError::Cleanup(e)),
            (Ok(report), Ok(())) => {
                info!("Import finished: {}", report);
                Ok(report)
            }
        }
    }

    fn create_dump_file(&self) -> std::io::Result<NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("dronehub-dump-").suffix(".json");
        match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
    }

    async fn transfer(
        &self,
        source: &MysqlSourceConfig,
        dump: &NamedTempFile,
    ) -> Result<ImportReport, ImportError> {
        let pool = self
            .connector
            .connect(source)
            .await
            .map_err(ImportError::Connect)?;

        info!("Exporting from {}", source.display_target());
        let exported = export::export(&pool).await;
        pool.close().await;
        let records = exported.map_err(ImportError::Export)?;

        dump::write_artifact(&records, dump.as_file())?;
        drop(records);

        info!("Loading into the local store");
        let mut file = dump.as_file();
        file.rewind().map_err(serde_json::Error::io)?;
        let records = dump::read_artifact(file)?;
        load::load(&self.destination, records).await
    }
}
