//! Process-local cache.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{CacheError, CacheKey, CachedHistogram, CachedLocalities, LandCoverCache};

/// In-memory cache shared across requests of one process.
#[derive(Debug, Default)]
pub struct MemoryCache {
    histograms: RwLock<BTreeMap<CacheKey, CachedHistogram>>,
    localities: RwLock<BTreeMap<CacheKey, CachedLocalities>>,
}

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached histograms.
    pub async fn histogram_count(&self) -> usize {
        self.histograms.read().await.len()
    }
}

#[async_trait]
impl LandCoverCache for MemoryCache {
    async fn get_histogram(&self, key: &CacheKey) -> Result<Option<CachedHistogram>, CacheError> {
        Ok(self.histograms.read().await.get(key).cloned())
    }

    async fn put_histogram(
        &self,
        key: &CacheKey,
        entry: &CachedHistogram,
    ) -> Result<(), CacheError> {
        self.histograms
            .write()
            .await
            .insert(key.clone(), entry.clone());
        Ok(())
    }

    async fn get_localities(&self, key: &CacheKey) -> Result<Option<CachedLocalities>, CacheError> {
        Ok(self.localities.read().await.get(key).cloned())
    }

    async fn put_localities(
        &self,
        key: &CacheKey,
        entry: &CachedLocalities,
    ) -> Result<(), CacheError> {
        self.localities
            .write()
            .await
            .insert(key.clone(), entry.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use landcover_models::Coordinates;
    use landcover_models::readings::Locality;

    use super::*;

    #[tokio::test]
    async fn round_trips_localities() {
        let cache = MemoryCache::new();
        let key = CacheKey::locality_list("Bengaluru", 10.0);
        assert!(cache.get_localities(&key).await.unwrap().is_none());

        let entry = CachedLocalities {
            localities: vec![Locality {
                name: "Indiranagar".to_string(),
                center: Coordinates::new(12.9719, 77.6412),
                place_type: "suburb".to_string(),
            }],
            stored_at: Utc::now(),
        };
        cache.put_localities(&key, &entry).await.unwrap();
        assert_eq!(cache.get_localities(&key).await.unwrap(), Some(entry));
        assert_eq!(cache.histogram_count().await, 0);
    }
}
