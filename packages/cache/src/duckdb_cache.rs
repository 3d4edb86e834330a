//! File-backed cache stored in `DuckDB`.
//!
//! Payloads are stored as JSON next to their write time, one table per
//! kind. Freshness is left to the caller.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use duckdb::{Connection, OptionalExt};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{
    CACHE_PATH_ENV, CacheError, CacheKey, CachedHistogram, CachedLocalities, LandCoverCache,
};

const HISTOGRAM_TABLE: &str = "histogram_cache";
const LOCALITY_TABLE: &str = "locality_cache";

/// `DuckDB`-backed [`LandCoverCache`].
///
/// `duckdb::Connection` is `Send` but not `Sync`, so it sits behind a
/// `Mutex`. Queries are small and run inline.
pub struct DuckDbCache {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for DuckDbCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuckDbCache").finish_non_exhaustive()
    }
}

/// Default cache location: `$LANDCOVER_CACHE_PATH`, else
/// `data/cache/landcover.duckdb`.
#[must_use]
pub fn default_path() -> PathBuf {
    std::env::var_os(CACHE_PATH_ENV).map_or_else(
        || Path::new("data").join("cache").join("landcover.duckdb"),
        PathBuf::from,
    )
}

impl DuckDbCache {
    /// Opens (or creates) the cache at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the directory, connection or schema
    /// cannot be created.
    pub fn open(path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Self::with_connection(Connection::open(path)?)
    }

    /// Opens the cache at [`default_path`].
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the store cannot be opened.
    pub fn open_default() -> Result<Self, CacheError> {
        Self::open(&default_path())
    }

    /// An in-memory store, mostly for tests.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if `DuckDB` cannot start.
    pub fn open_in_memory() -> Result<Self, CacheError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, CacheError> {
        for table in [HISTOGRAM_TABLE, LOCALITY_TABLE] {
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    cache_key TEXT PRIMARY KEY,
                    payload TEXT NOT NULL,
                    stored_at_ms BIGINT NOT NULL
                );"
            ))?;
        }
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn read<T: DeserializeOwned>(
        &self,
        table: &str,
        key: &CacheKey,
    ) -> Result<Option<T>, CacheError> {
        let conn = self.conn.lock().map_err(|_| CacheError::Poisoned)?;
        let payload: Option<String> = conn
            .query_row(
                &format!("SELECT payload FROM {table} WHERE cache_key = ?"),
                duckdb::params![key.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        drop(conn);
        Ok(payload
            .map(|payload| serde_json::from_str(&payload))
            .transpose()?)
    }

    fn write<T: Serialize>(
        &self,
        table: &str,
        key: &CacheKey,
        entry: &T,
        stored_at: DateTime<Utc>,
    ) -> Result<(), CacheError> {
        let payload = serde_json::to_string(entry)?;
        let conn = self.conn.lock().map_err(|_| CacheError::Poisoned)?;
        conn.execute(
            &format!(
                "INSERT INTO {table} (cache_key, payload, stored_at_ms) VALUES (?, ?, ?)
                 ON CONFLICT (cache_key) DO UPDATE SET
                    payload = excluded.payload,
                    stored_at_ms = excluded.stored_at_ms"
            ),
            duckdb::params![key.as_str(), payload, stored_at.timestamp_millis()],
        )?;
        Ok(())
    }
}

#[async_trait]
impl LandCoverCache for DuckDbCache {
    async fn get_histogram(&self, key: &CacheKey) -> Result<Option<CachedHistogram>, CacheError> {
        self.read(HISTOGRAM_TABLE, key)
    }

    async fn put_histogram(
        &self,
        key: &CacheKey,
        entry: &CachedHistogram,
    ) -> Result<(), CacheError> {
        self.write(HISTOGRAM_TABLE, key, entry, entry.stored_at)
    }

    async fn get_localities(&self, key: &CacheKey) -> Result<Option<CachedLocalities>, CacheError> {
        self.read(LOCALITY_TABLE, key)
    }

    async fn put_localities(
        &self,
        key: &CacheKey,
        entry: &CachedLocalities,
    ) -> Result<(), CacheError> {
        self.write(LOCALITY_TABLE, key, entry, entry.stored_at)
    }
}

#[cfg(test)]
mod tests {
    use landcover_models::{HistogramMeasure, PixelHistogram};

    use super::*;

    #[tokio::test]
    async fn upserts_histograms() {
        let cache = DuckDbCache::open_in_memory().unwrap();
        let key = CacheKey::new("Chennai", "Adyar");
        assert!(cache.get_histogram(&key).await.unwrap().is_none());

        let first = CachedHistogram {
            histogram: PixelHistogram::from_bins(HistogramMeasure::Count, [(0, 5.0), (6, 95.0)]),
            image_date: chrono::NaiveDate::from_ymd_opt(2024, 2, 1),
            stored_at: Utc::now(),
        };
        cache.put_histogram(&key, &first).await.unwrap();
        let second = CachedHistogram {
            histogram: PixelHistogram::from_bins(HistogramMeasure::Count, [(6, 1.0)]),
            ..first.clone()
        };
        cache.put_histogram(&key, &second).await.unwrap();

        let stored = cache.get_histogram(&key).await.unwrap().unwrap();
        assert!((stored.histogram.get(6) - 1.0).abs() < 1e-9);
        assert_eq!(stored.image_date, first.image_date);
    }
}
