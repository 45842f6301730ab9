//! Weather acquisition cache
//!
//! Process-wide TTL cache in front of a [`WeatherProvider`]. Entries are
//! replaced whole, so readers never see a partially written observation.
//! Concurrent misses for the same city may both reach the provider; the
//! later insert wins. Failed fetches are never cached.

use crate::error::AcquisitionError;
use crate::models::WeatherObservation;
use crate::observability::ForecastMetrics;
use crate::provider::WeatherProvider;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Default time-to-live for cached observations (5 minutes)
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
struct CacheEntry {
    observation: Arc<WeatherObservation>,
    fetched_at: Instant,
}

/// TTL cache of the latest observation per city
pub struct WeatherCache {
    provider: Arc<dyn WeatherProvider>,
    ttl: Duration,
    entries: DashMap<String, CacheEntry>,
    hits: AtomicU64,
    misses: AtomicU64,
    fetch_errors: AtomicU64,
    metrics: ForecastMetrics,
}

impl WeatherCache {
    pub fn new(provider: Arc<dyn WeatherProvider>) -> Self {
        Self::with_ttl(provider, DEFAULT_TTL)
    }

    pub fn with_ttl(provider: Arc<dyn WeatherProvider>, ttl: Duration) -> Self {
        Self {
            provider,
            ttl,
            entries: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            fetch_errors: AtomicU64::new(0),
            metrics: ForecastMetrics::new(),
        }
    }

    /// Return the cached observation for `city`, fetching it on miss or expiry
    pub async fn get(&self, city: &str) -> Result<Arc<WeatherObservation>, AcquisitionError> {
        let city = city.trim();
        if city.is_empty() {
            return Err(AcquisitionError::ProviderRejected {
                status: 400,
                message: "city name is empty".to_string(),
            });
        }

        let key = cache_key(city);
        if let Some(observation) = self.fresh(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            self.metrics.inc_cache_hit();
            debug!(city = %city, "Weather cache hit");
            return Ok(observation);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        self.metrics.inc_cache_miss();
        debug!(city = %city, provider = self.provider.name(), "Weather cache miss, fetching");

        match self.provider.fetch(city).await {
            Ok(observation) => {
                let observation = Arc::new(observation);
                self.entries.insert(
                    key,
                    CacheEntry {
                        observation: observation.clone(),
                        fetched_at: Instant::now(),
                    },
                );
                Ok(observation)
            }
            Err(e) => {
                self.fetch_errors.fetch_add(1, Ordering::Relaxed);
                warn!(city = %city, error = %e, "Weather fetch failed");
                Err(e)
            }
        }
    }

    fn fresh(&self, key: &str) -> Option<Arc<WeatherObservation>> {
        let entry = self.entries.get(key)?;
        if entry.fetched_at.elapsed() < self.ttl {
            Some(entry.observation.clone())
        } else {
            None
        }
    }

    /// Drop the cached entry for one city
    pub fn invalidate(&self, city: &str) {
        self.entries.remove(&cache_key(city.trim()));
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries.retain(|_, entry| entry.fetched_at.elapsed() < ttl);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            fetch_errors: self.fetch_errors.load(Ordering::Relaxed),
        }
    }
}

fn cache_key(city: &str) -> String {
    city.to_lowercase()
}

/// Cache counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub fetch_errors: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::AtomicUsize;

    /// Provider that counts calls and returns a new reading each time
    struct CountingProvider {
        calls: AtomicUsize,
        fail_cities: Vec<&'static str>,
    }

    impl CountingProvider {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_cities: vec!["nowhereville"],
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl WeatherProvider for CountingProvider {
        async fn fetch(&self, city: &str) -> Result<WeatherObservation, AcquisitionError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_cities.iter().any(|c| c.eq_ignore_ascii_case(city)) {
                return Err(AcquisitionError::ProviderRejected {
                    status: 404,
                    message: "city not found".into(),
                });
            }
            Ok(WeatherObservation {
                city: city.to_string(),
                temperature: 20.0 + n as f64,
                humidity: 50.0,
                pressure: 1013.0,
                wind_speed: 2.0,
                condition_code: 800,
                observed_at: Utc::now(),
            })
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hit_within_ttl_skips_network() {
        let provider = Arc::new(CountingProvider::new());
        let cache = WeatherCache::new(provider.clone());

        let first = cache.get("Chennai").await.unwrap();
        tokio::time::advance(Duration::from_secs(299)).await;
        let second = cache.get("Chennai").await.unwrap();

        assert_eq!(provider.calls(), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*first, *second);
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_triggers_exactly_one_refetch() {
        let provider = Arc::new(CountingProvider::new());
        let cache = WeatherCache::new(provider.clone());

        let first = cache.get("Chennai").await.unwrap();
        tokio::time::advance(Duration::from_secs(301)).await;

        let refreshed = cache.get("Chennai").await.unwrap();
        let again = cache.get("Chennai").await.unwrap();

        assert_eq!(provider.calls(), 2);
        assert_ne!(first.temperature, refreshed.temperature);
        assert!(Arc::ptr_eq(&refreshed, &again));
    }

    #[tokio::test]
    async fn test_city_key_is_case_and_whitespace_insensitive() {
        let provider = Arc::new(CountingProvider::new());
        let cache = WeatherCache::new(provider.clone());

        cache.get("Chennai").await.unwrap();
        cache.get("  chennai ").await.unwrap();
        cache.get("CHENNAI").await.unwrap();

        assert_eq!(provider.calls(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let provider = Arc::new(CountingProvider::new());
        let cache = WeatherCache::new(provider.clone());

        let err = cache.get("Nowhereville").await.unwrap_err();
        assert!(matches!(err, AcquisitionError::ProviderRejected { status: 404, .. }));
        assert!(cache.is_empty());

        assert!(cache.get("Nowhereville").await.is_err());
        assert_eq!(provider.calls(), 2);
        assert_eq!(cache.stats().fetch_errors, 2);
    }

    #[tokio::test]
    async fn test_empty_city_rejected_without_fetch() {
        let provider = Arc::new(CountingProvider::new());
        let cache = WeatherCache::new(provider.clone());

        let err = cache.get("   ").await.unwrap_err();
        assert!(matches!(err, AcquisitionError::ProviderRejected { status: 400, .. }));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_and_invalidate() {
        let provider = Arc::new(CountingProvider::new());
        let cache = WeatherCache::with_ttl(provider.clone(), Duration::from_secs(10));

        cache.get("Oslo").await.unwrap();
        cache.get("Lima").await.unwrap();
        cache.invalidate("LIMA");
        assert_eq!(cache.len(), 1);

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(cache.purge_expired(), 1);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_readers_share_entry() {
        let provider = Arc::new(CountingProvider::new());
        let cache = Arc::new(WeatherCache::new(provider.clone()));
        cache.get("Chennai").await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move { cache.get("Chennai").await }));
        }
        for handle in handles {
            let obs = handle.await.unwrap().unwrap();
            assert_eq!(obs.city, "Chennai");
        }
        assert_eq!(provider.calls(), 1);
    }
}
