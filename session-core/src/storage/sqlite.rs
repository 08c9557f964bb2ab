//! Durable storage area

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use super::{Error, Result, StorageArea};

/// Durable storage configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Durable {
    /// In-memory database, for testing and development
    Memory,
    /// SQLite database file
    SqLite {
        path: PathBuf,
        #[serde(default = "Durable::default_max_connections")]
        max_connections: u32,
    },
}

impl Default for Durable {
    fn default() -> Self {
        Self::Memory
    }
}

impl Durable {
    fn default_max_connections() -> u32 {
        4
    }
}

/// Storage area kept in a SQLite key/value table
///
/// Multiple areas may share a single database, they are told apart by name.
#[derive(Debug, Clone)]
pub struct SqliteArea {
    db: SqlitePool,
    area: String,
}

impl SqliteArea {
    /// Opens the area according to configuration, migrating the database
    pub async fn open(config: &Durable, area: impl Into<String>) -> Result<Self> {
        let db = match config {
            Durable::Memory => Self::memory_pool(),
            Durable::SqLite {
                path,
                max_connections,
            } => Self::file_pool(path, *max_connections)?,
        };

        sqlx::migrate!("./migrations").run(&db).await?;

        Ok(Self {
            db,
            area: area.into(),
        })
    }

    fn memory_pool() -> SqlitePool {
        let opts = SqliteConnectOptions::new()
            .filename(":memory:")
            .create_if_missing(true)
            .shared_cache(true);

        // A private in-memory database lives only as long as its connection
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_lazy_with(opts)
    }

    fn file_pool(path: &Path, max_connections: u32) -> Result<SqlitePool> {
        let path = path
            .to_str()
            .ok_or_else(|| Error::Unavailable(format!("invalid SQLite path: {}", path.display())))?;

        let opts = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        Ok(SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_lazy_with(opts))
    }
}

#[async_trait]
impl StorageArea for SqliteArea {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(String,)> =
            sqlx::query_as("select value from session_storage where area = ? and key = ?")
                .bind(&self.area)
                .bind(key)
                .fetch_optional(&self.db)
                .await?;

        Ok(row.map(|(value,)| value))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "insert into session_storage (area, key, value) values (?, ?, ?) \
             on conflict(area, key) do update set value = excluded.value",
        )
        .bind(&self.area)
        .bind(key)
        .bind(value)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        sqlx::query("delete from session_storage where area = ? and key = ?")
            .bind(&self.area)
            .bind(key)
            .execute(&self.db)
            .await?;

        Ok(())
    }
}
