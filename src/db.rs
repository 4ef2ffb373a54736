use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// File name of the index database inside the storage directory.
pub const INDEX_FILE: &str = "index.sqlite3";

pub fn index_file(storage_dir: &Path) -> PathBuf {
    storage_dir.join(INDEX_FILE)
}

/// Connect to the index database under `storage_dir`.
///
/// With `create`, the directory and database file are created if absent;
/// without it, a missing file is a connection error.
pub async fn connect(storage_dir: &Path, create: bool) -> Result<SqlitePool> {
    if create {
        std::fs::create_dir_all(storage_dir)?;
    }

    let options = SqliteConnectOptions::new()
        .filename(index_file(storage_dir))
        .create_if_missing(create)
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}
