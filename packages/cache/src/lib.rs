#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Optional caches for locality analyses.
//!
//! Two things are cached, keyed by normalized city and locality name:
//! the pixel histogram of a fixed locality AOI, and the list of
//! locality names around a city. Caches are side channels: a miss, a
//! stale entry and a cache error all take the same path as a cold
//! cache. Staleness is decided by the caller through [`Freshness`].

pub mod memory;

#[cfg(feature = "duckdb")]
pub mod duckdb_cache;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use landcover_models::PixelHistogram;
use landcover_models::readings::Locality;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use memory::MemoryCache;

#[cfg(feature = "duckdb")]
pub use duckdb_cache::DuckDbCache;

/// Environment variable naming the `DuckDB` cache file.
pub const CACHE_PATH_ENV: &str = "LANDCOVER_CACHE_PATH";

/// Errors from a cache backend.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Stored payload could not be (de)serialized.
    #[error("Cache payload error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// `DuckDB` error.
    #[cfg(feature = "duckdb")]
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    /// Filesystem error while opening the store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A previous writer panicked while holding the store.
    #[error("Cache store is poisoned")]
    Poisoned,
}

/// Normalized `(city, locality)` key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CacheKey(String);

fn normalize(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

impl CacheKey {
    /// Key for one locality of a city. Case and spacing are ignored.
    #[must_use]
    pub fn new(city: &str, locality: &str) -> Self {
        Self(format!("{}|{}", normalize(city), normalize(locality)))
    }

    /// Key for the locality list of `city` within `radius_km`.
    #[must_use]
    pub fn locality_list(city: &str, radius_km: f64) -> Self {
        Self(format!("{}|*{radius_km}km", normalize(city)))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Maximum age an entry may have and still be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Freshness {
    pub max_age: Duration,
}

impl Freshness {
    /// Raster histograms are reused for 30 days.
    pub const RASTER: Self = Self {
        max_age: Duration::days(30),
    };

    /// Locality name lists are reused for 7 days.
    pub const NAMES: Self = Self {
        max_age: Duration::days(7),
    };

    /// Whether something stored at `stored_at` is still usable at `now`.
    #[must_use]
    pub fn is_fresh(&self, stored_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(stored_at) <= self.max_age
    }
}

/// A cached locality histogram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedHistogram {
    pub histogram: PixelHistogram,
    pub image_date: Option<NaiveDate>,
    pub stored_at: DateTime<Utc>,
}

/// A cached locality name list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedLocalities {
    pub localities: Vec<Locality>,
    pub stored_at: DateTime<Utc>,
}

/// Key-value store for analysis side data.
#[async_trait]
pub trait LandCoverCache: Send + Sync {
    /// # Errors
    ///
    /// Returns [`CacheError`] if the backend fails.
    async fn get_histogram(&self, key: &CacheKey) -> Result<Option<CachedHistogram>, CacheError>;

    /// Stores `entry`, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the backend fails.
    async fn put_histogram(
        &self,
        key: &CacheKey,
        entry: &CachedHistogram,
    ) -> Result<(), CacheError>;

    /// # Errors
    ///
    /// Returns [`CacheError`] if the backend fails.
    async fn get_localities(&self, key: &CacheKey) -> Result<Option<CachedLocalities>, CacheError>;

    /// Stores `entry`, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the backend fails.
    async fn put_localities(
        &self,
        key: &CacheKey,
        entry: &CachedLocalities,
    ) -> Result<(), CacheError>;
}

/// Fresh histogram for `key`, if any. Errors are logged and read as a
/// miss.
pub async fn fresh_histogram(
    cache: &dyn LandCoverCache,
    key: &CacheKey,
    freshness: Freshness,
) -> Option<CachedHistogram> {
    match cache.get_histogram(key).await {
        Ok(Some(entry)) if freshness.is_fresh(entry.stored_at, Utc::now()) => {
            log::debug!("Histogram cache hit for {key}");
            Some(entry)
        }
        Ok(Some(_)) => {
            log::debug!("Histogram cache entry for {key} is stale");
            None
        }
        Ok(None) => None,
        Err(e) => {
            log::warn!("Histogram cache read failed for {key}: {e}");
            None
        }
    }
}

/// Fresh locality list for `key`, if any. Errors are logged and read
/// as a miss.
pub async fn fresh_localities(
    cache: &dyn LandCoverCache,
    key: &CacheKey,
    freshness: Freshness,
) -> Option<CachedLocalities> {
    match cache.get_localities(key).await {
        Ok(Some(entry)) if freshness.is_fresh(entry.stored_at, Utc::now()) => Some(entry),
        Ok(_) => None,
        Err(e) => {
            log::warn!("Locality cache read failed for {key}: {e}");
            None
        }
    }
}

/// Stores a histogram, logging instead of failing.
pub async fn store_histogram(cache: &dyn LandCoverCache, key: &CacheKey, entry: &CachedHistogram) {
    if let Err(e) = cache.put_histogram(key, entry).await {
        log::warn!("Histogram cache write failed for {key}: {e}");
    }
}

/// Stores a locality list, logging instead of failing.
pub async fn store_localities(
    cache: &dyn LandCoverCache,
    key: &CacheKey,
    entry: &CachedLocalities,
) {
    if let Err(e) = cache.put_localities(key, entry).await {
        log::warn!("Locality cache write failed for {key}: {e}");
    }
}

#[cfg(test)]
mod tests {
    use landcover_models::HistogramMeasure;

    use super::*;

    #[test]
    fn keys_ignore_case_and_spacing() {
        assert_eq!(
            CacheKey::new("  Hyderabad ", "Banjara   Hills"),
            CacheKey::new("hyderabad", "banjara hills")
        );
        assert_eq!(CacheKey::new("Pune", "Baner").as_str(), "pune|baner");
        assert_ne!(
            CacheKey::locality_list("Pune", 10.0),
            CacheKey::locality_list("Pune", 20.0)
        );
    }

    #[test]
    fn raster_entries_last_thirty_days() {
        let now = Utc::now();
        assert!(Freshness::RASTER.is_fresh(now - Duration::days(29), now));
        assert!(Freshness::RASTER.is_fresh(now - Duration::days(30), now));
        assert!(!Freshness::RASTER.is_fresh(now - Duration::days(31), now));
    }

    #[test]
    fn name_lists_last_seven_days() {
        let now = Utc::now();
        assert!(Freshness::NAMES.is_fresh(now - Duration::days(6), now));
        assert!(!Freshness::NAMES.is_fresh(now - Duration::days(8), now));
    }

    struct FailingCache;

    #[async_trait]
    impl LandCoverCache for FailingCache {
        async fn get_histogram(
            &self,
            _key: &CacheKey,
        ) -> Result<Option<CachedHistogram>, CacheError> {
            Err(CacheError::Poisoned)
        }

        async fn put_histogram(
            &self,
            _key: &CacheKey,
            _entry: &CachedHistogram,
        ) -> Result<(), CacheError> {
            Err(CacheError::Poisoned)
        }

        async fn get_localities(
            &self,
            _key: &CacheKey,
        ) -> Result<Option<CachedLocalities>, CacheError> {
            Err(CacheError::Poisoned)
        }

        async fn put_localities(
            &self,
            _key: &CacheKey,
            _entry: &CachedLocalities,
        ) -> Result<(), CacheError> {
            Err(CacheError::Poisoned)
        }
    }

    #[tokio::test]
    async fn backend_errors_read_as_misses() {
        let key = CacheKey::new("Delhi", "Saket");
        assert!(fresh_histogram(&FailingCache, &key, Freshness::RASTER).await.is_none());
        assert!(fresh_localities(&FailingCache, &key, Freshness::NAMES).await.is_none());
        store_histogram(
            &FailingCache,
            &key,
            &CachedHistogram {
                histogram: PixelHistogram::new(HistogramMeasure::Count),
                image_date: None,
                stored_at: Utc::now(),
            },
        )
        .await;
    }

    #[tokio::test]
    async fn stale_entries_are_misses() {
        let cache = MemoryCache::default();
        let key = CacheKey::new("Delhi", "Saket");
        let entry = CachedHistogram {
            histogram: PixelHistogram::from_bins(HistogramMeasure::Count, [(6, 10.0)]),
            image_date: None,
            stored_at: Utc::now() - Duration::days(45),
        };
        store_histogram(&cache, &key, &entry).await;
        assert!(fresh_histogram(&cache, &key, Freshness::RASTER).await.is_none());

        let recent = CachedHistogram {
            stored_at: Utc::now(),
            ..entry
        };
        store_histogram(&cache, &key, &recent).await;
        assert_eq!(
            fresh_histogram(&cache, &key, Freshness::RASTER).await,
            Some(recent)
        );
    }
}
