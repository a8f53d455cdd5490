use std::{path::Path, time::Duration};

use anyhow::Context;
use sqlx::{
    migrate::MigrateError,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions},
};

/// Opens the credential and link store at `database_path` and brings its
/// schema up to date. With `create`, a missing file and its parent
/// directories are created.
pub async fn open_store(
    database_path: &str,
    create: bool,
) -> Result<SqlitePool, anyhow::Error> {
    if create {
        if let Some(parent) = Path::new(database_path).parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create directory for {database_path}"))?;
        }
    }

    let opts = SqliteConnectOptions::new()
        .create_if_missing(create)
        .filename(database_path)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(2)
        .connect_with(opts)
        .await
        .with_context(|| format!("open {database_path}"))?;

    match sqlx::migrate!("./migrations").run(&pool).await {
        Err(MigrateError::VersionMismatch(version)) => {
            warn!("tracker store migration {version} changed after it was applied")
        }
        Err(e) => {
            return Err(e.into());
        }
        Ok(()) => {}
    }

    debug!("tracker store ready at {database_path}");

    Ok(pool)
}

#[cfg(test)]
mod test {
    use sqlx::Row;
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn test_open_store_creates_schema() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data").join("animiru.db");

        let pool = open_store(&path.display().to_string(), true).await.unwrap();
        assert!(path.exists());

        let tables: Vec<String> = sqlx::query(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name LIKE 'tracker_%' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap()
        .iter()
        .map(|row| row.get(0))
        .collect();
        assert_eq!(vec!["tracker_anime", "tracker_credential"], tables);
    }

    #[tokio::test]
    async fn test_open_store_without_create() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.db");

        assert!(open_store(&path.display().to_string(), false).await.is_err());
        assert!(!path.exists());
    }
}
