use std::path::Path;

use semver::Version;
use sqlx::{Executor, SqlitePool, query, sqlite::SqliteConnectOptions};
use tokio::fs::create_dir_all;

use crate::name::PackageName;

const DB_INIT_QUERY: &str = include_str!("cache.sql");

/// Durable record of tarballs written by previous runs.
///
/// Only intent of presence is stored; the files themselves are never
/// verified. Cheap to clone, connections are pooled.
#[derive(Clone)]
pub struct TarballCache {
    index: SqlitePool,
}

impl TarballCache {
    pub async fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            create_dir_all(parent).await?;
        }
        let opt = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true);
        let index = SqlitePool::connect_with(opt).await?;
        index.execute(DB_INIT_QUERY).await?;
        Ok(Self { index })
    }

    pub async fn exists(&self, name: &PackageName, version: &Version) -> anyhow::Result<bool> {
        let found = query("SELECT 1 FROM tarball WHERE name = ? AND version = ?")
            .bind(name.as_str())
            .bind(version.to_string())
            .fetch_optional(&self.index)
            .await?;
        Ok(found.is_some())
    }

    pub async fn add(&self, name: &PackageName, version: &Version) -> anyhow::Result<()> {
        query("INSERT OR IGNORE INTO tarball (name, version) VALUES (?, ?)")
            .bind(name.as_str())
            .bind(version.to_string())
            .execute(&self.index)
            .await?;
        Ok(())
    }

    /// Flush and close the underlying pool.
    pub async fn close(&self) {
        self.index.close().await
    }
}
