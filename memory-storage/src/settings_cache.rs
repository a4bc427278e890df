//! Read-through cache for the single global `Settings` row.
//!
//! `Settings` has exactly one row and no tenant dimension, so this is a
//! minimal read-through cache: explicit staleness tolerance via
//! [`Freshness`], so no code path can read settings without deciding how
//! fresh it needs them.

use memory_core::{MemoryResult, Settings};
use std::sync::RwLock;
use std::time::Duration;
use tokio::sync::Mutex;

use chrono::{DateTime, Utc};

/// Staleness tolerance a caller must specify when reading settings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Freshness {
    /// Accept cached settings up to `max_staleness` old.
    BestEffort { max_staleness: Duration },
    /// Always re-read from storage.
    #[default]
    Consistent,
}

struct Cached {
    value: Settings,
    cached_at: DateTime<Utc>,
}

/// Async fetcher the cache falls back to on miss or forced refresh.
#[async_trait::async_trait]
pub trait SettingsFetcher: Send + Sync {
    async fn fetch(&self) -> MemoryResult<Settings>;
}

pub struct SettingsCache {
    cached: RwLock<Option<Cached>>,
    refresh_lock: Mutex<()>,
}

impl Default for SettingsCache {
    fn default() -> Self {
        Self { cached: RwLock::new(None), refresh_lock: Mutex::new(()) }
    }
}

impl SettingsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get<F: SettingsFetcher>(&self, freshness: Freshness, fetcher: &F) -> MemoryResult<Settings> {
        if let Freshness::BestEffort { max_staleness } = freshness {
            if let Some(settings) = self.try_cached(max_staleness) {
                return Ok(settings);
            }
        }
        self.refresh(fetcher).await
    }

    fn try_cached(&self, max_staleness: Duration) -> Option<Settings> {
        let guard = self.cached.read().unwrap();
        let entry = guard.as_ref()?;
        let age = Utc::now().signed_duration_since(entry.cached_at).to_std().unwrap_or(Duration::MAX);
        (age <= max_staleness).then(|| entry.value.clone())
    }

    async fn refresh<F: SettingsFetcher>(&self, fetcher: &F) -> MemoryResult<Settings> {
        let _guard = self.refresh_lock.lock().await;
        // Re-check: another task may have refreshed while we waited for the lock.
        if let Some(settings) = self.try_cached(Duration::ZERO) {
            return Ok(settings);
        }
        let value = fetcher.fetch().await?;
        *self.cached.write().unwrap() = Some(Cached { value: value.clone(), cached_at: Utc::now() });
        Ok(value)
    }

    /// Invalidate after a settings write so the next read re-fetches.
    pub fn invalidate(&self) {
        *self.cached.write().unwrap() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingFetcher {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl SettingsFetcher for CountingFetcher {
        async fn fetch(&self) -> MemoryResult<Settings> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Settings::default())
        }
    }

    #[tokio::test]
    async fn consistent_always_refetches() {
        let cache = SettingsCache::new();
        let fetcher = CountingFetcher { calls: AtomicUsize::new(0) };
        cache.get(Freshness::Consistent, &fetcher).await.unwrap();
        cache.get(Freshness::Consistent, &fetcher).await.unwrap();
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn best_effort_reuses_warm_cache() {
        let cache = SettingsCache::new();
        let fetcher = CountingFetcher { calls: AtomicUsize::new(0) };
        let freshness = Freshness::BestEffort { max_staleness: Duration::from_secs(60) };
        cache.get(freshness.clone(), &fetcher).await.unwrap();
        cache.get(freshness, &fetcher).await.unwrap();
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidate_forces_refetch() {
        let cache = SettingsCache::new();
        let fetcher = CountingFetcher { calls: AtomicUsize::new(0) };
        let freshness = Freshness::BestEffort { max_staleness: Duration::from_secs(60) };
        cache.get(freshness.clone(), &fetcher).await.unwrap();
        cache.invalidate();
        cache.get(freshness, &fetcher).await.unwrap();
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }
}
