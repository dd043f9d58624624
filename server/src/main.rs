use std::sync::Arc;

use anyhow::{Context, Result};
use refinery::config::{Config, ConfigDbType};
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

use recorder::clock::SystemClock;
use recorder::config::{DbConfig, RecorderConfig};
use recorder::recorder_server::{RecorderServer, RecorderServerDeps};
use recorder::storage::{FileRecordingStore, MemorySubjectStore, PgSubjectStore, SubjectStore};
use recorder::transport::http::PlatformEndpoint;
use recorder::transport::{HttpIdentityDirectory, HttpSpectatorTransport};

mod migrations {
    use refinery::embed_migrations;
    embed_migrations!("./migrations");
}

async fn connect_subject_store(db: &DbConfig) -> Result<Arc<dyn SubjectStore>> {
    let mut db_config = Config::new(ConfigDbType::Postgres)
        .set_db_host(&db.host)
        .set_db_port(&db.port)
        .set_db_user(&db.user)
        .set_db_pass(&db.pass)
        .set_db_name(&db.name);

    migrations::migrations::runner()
        .run_async(&mut db_config)
        .await
        .context("Failed to run database migrations")?;
    info!("Database migrations completed");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&db.url())
        .await
        .context("Failed to create PostgreSQL connection pool")?;

    Ok(Arc::new(PgSubjectStore::new(pool)))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if exists
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = RecorderConfig::from_env()?;

    let subjects: Arc<dyn SubjectStore> = match &config.db {
        Some(db) => connect_subject_store(db).await?,
        None => {
            info!("No database configured, tracked subjects are kept in memory");
            Arc::new(MemorySubjectStore::new())
        }
    };

    let recordings = FileRecordingStore::open(&config.data_dir)?;
    info!("Recordings stored under {:?}", recordings.root());

    let platform = PlatformEndpoint::new(config.platform_api_base.clone(), config.api_key.clone());
    let deps = RecorderServerDeps {
        transport: Arc::new(HttpSpectatorTransport::new(platform.clone())?),
        directory: Arc::new(HttpIdentityDirectory::new(platform)?),
        recordings: Arc::new(recordings),
        subjects,
        clock: Arc::new(SystemClock),
    };

    let server = RecorderServer::start(config, deps).await?;
    info!("Replay API listening on: {}", server.api_addr());

    info!("Server started. Waiting for shutdown signal (Ctrl+C)...");
    tokio::signal::ctrl_c().await?;

    info!("Received shutdown signal. Shutting down gracefully...");
    server.shutdown().await?;

    info!("Server shut down successfully");
    Ok(())
}
