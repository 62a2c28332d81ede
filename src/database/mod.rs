pub mod recipes;

use anyhow::Result;
use sqlx::{
    migrate::Migrator,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Pool, Sqlite,
};
use std::{fs, path::Path, str::FromStr, time::Duration};
use tracing::info;

pub type DbPool = Pool<Sqlite>;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Ensures the directory holding the database file exists
pub fn ensure_directory_structure(database_url: &str) -> Result<()> {
    // Handle SQLite URL format ("sqlite:" prefix and "?mode=rwc" style options)
    let clean_path = database_url
        .strip_prefix("sqlite:")
        .unwrap_or(database_url);
    let clean_path = clean_path.split('?').next().unwrap_or(clean_path);
    let db_path = Path::new(clean_path);

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
            info!("Using data directory: {}", parent.display());
        }
    }

    Ok(())
}

pub async fn create_pool(database_url: &str) -> Result<DbPool> {
    info!("Connecting to SQLite database");

    ensure_directory_structure(database_url)?;

    let connect_opts = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));
    let pool = SqlitePoolOptions::new().connect_with(connect_opts).await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

pub async fn run_migrations(pool: &DbPool) -> Result<()> {
    info!("Running database migrations");

    MIGRATOR
        .run(pool)
        .await
        .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;

    info!("Database migrations completed successfully");
    Ok(())
}

pub async fn close_pool(pool: DbPool) {
    info!("Closing database connection pool");
    pool.close().await;
}

/// Fresh file-backed database for tests. The directory guard must outlive the pool.
#[cfg(test)]
pub(crate) async fn test_pool() -> (tempfile::TempDir, DbPool) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let url = format!("sqlite:{}?mode=rwc", dir.path().join("recipes.db").display());
    let pool = create_pool(&url).await.expect("create test pool");
    (dir, pool)
}
