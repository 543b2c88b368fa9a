//! Dronehub - command line entry point

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dronehub::{
    config::{Config, MysqlSourceConfig},
    db,
    transfer::{ImportOutcome, ImportPipeline, MysqlConnector},
};

/// dronehub - drone club content store
#[derive(Debug, Parser)]
#[command(name = "dronehub")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, default_value = "config.yml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Debug, Subcommand)]
enum Commands {
    /// Create or upgrade the schema of the configured database
    Migrate,

    /// Copy the whole MySQL database described by MYSQL_* into the configured database
    ImportFromMysql,
}

fn setup_logging(verbosity: u8) {
    let default = match verbosity {
        0 => "dronehub=info",
        1 => "dronehub=debug",
        _ => "dronehub=trace,sqlx=debug",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

/// Open the configured store and bring its schema up to date.
async fn open_store(config: &Config) -> Result<db::DynDatabasePool> {
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    let applied = db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed ({} applied)", applied);
    Ok(pool)
}

async fn migrate(config: &Config, out: &mut dyn Write) -> Result<()> {
    let pool = open_store(config).await?;
    writeln!(out, "Schema is up to date")?;
    pool.close().await;
    Ok(())
}

/// Run the import. A missing source setting is reported on `err` before
/// the local store is opened, so such a run leaves no trace.
async fn import_from_mysql(
    config: &Config,
    source: MysqlSourceConfig,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> Result<()> {
    if let Err(e) = source.validate() {
        tracing::warn!("Import aborted: {}", e);
        writeln!(err, "{}", e)?;
        return Ok(());
    }

    let pool = open_store(config).await?;
    let pipeline = ImportPipeline::new(pool.clone(), Arc::new(MysqlConnector))
        .with_temp_dir(config.import.temp_dir.clone());

    let outcome = pipeline.execute(source, out, err).await;
    pool.close().await;

    if let ImportOutcome::Imported(report) = outcome? {
        tracing::info!("Imported {} records", report.total());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // MYSQL_* usually lives in .env next to the config file
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let config = Config::load_with_env(&cli.config)?;
    tracing::info!("Configuration loaded");

    let mut stdout = std::io::stdout().lock();
    let mut stderr = std::io::stderr().lock();
    match cli.command {
        Commands::Migrate => migrate(&config, &mut stdout).await?,
        Commands::ImportFromMysql => {
            import_from_mysql(&config, MysqlSourceConfig::from_env(), &mut stdout, &mut stderr)
                .await?
        }
    }
    stdout.flush()?;
    Ok(())
}
