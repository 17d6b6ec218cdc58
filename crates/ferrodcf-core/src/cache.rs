//! Bounded in-memory cache of statement histories.
//!
//! Entries are keyed by (ticker, as-of date), so a new calendar day always
//! triggers a fresh fetch while an interactive session re-valuing the same
//! ticker never goes back to the network.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use time::Date;

use crate::data_source::{FinancialsRequest, FinancialsSource, HealthStatus, SourceError};
use crate::{FinancialHistory, ProviderId, Ticker};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    /// Serve a live entry if present; otherwise fetch and store.
    #[default]
    Use,
    /// Always fetch, then store.
    Refresh,
    /// Always fetch; never read or write the cache.
    Bypass,
}

pub type CacheKey = (Ticker, Date);

#[derive(Debug, Clone)]
struct CacheEntry {
    history: FinancialHistory,
    inserted_at: Instant,
    expires_at: Instant,
}

#[derive(Debug)]
struct CacheInner {
    map: HashMap<CacheKey, CacheEntry>,
    ttl: Duration,
    max_entries: usize,
}

impl CacheInner {
    fn get(&self, key: &CacheKey) -> Option<FinancialHistory> {
        self.map
            .get(key)
            .filter(|entry| Instant::now() <= entry.expires_at)
            .map(|entry| entry.history.clone())
    }

    fn put(&mut self, key: CacheKey, history: FinancialHistory) {
        let now = Instant::now();
        self.map.retain(|_, entry| entry.expires_at > now);
        if !self.map.contains_key(&key) && self.map.len() >= self.max_entries {
            self.evict_oldest();
        }
        self.map.insert(
            key,
            CacheEntry {
                history,
                inserted_at: now,
                expires_at: now + self.ttl,
            },
        );
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .map
            .iter()
            .min_by_key(|(_, entry)| entry.inserted_at)
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            tracing::debug!(ticker = %key.0, "evicting oldest cache entry");
            self.map.remove(&key);
        }
    }
}

/// Thread-safe, bounded, TTL cache of [`FinancialHistory`] values.
#[derive(Debug, Clone)]
pub struct FinancialsCache {
    inner: Arc<tokio::sync::RwLock<CacheInner>>,
}

impl FinancialsCache {
    /// A zero `ttl` or zero `max_entries` disables the cache.
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            inner: Arc::new(tokio::sync::RwLock::new(CacheInner {
                map: HashMap::new(),
                ttl,
                max_entries,
            })),
        }
    }

    pub fn disabled() -> Self {
        Self::new(Duration::ZERO, 0)
    }

    pub async fn get(&self, key: &CacheKey) -> Option<FinancialHistory> {
        self.inner.read().await.get(key)
    }

    pub async fn put(&self, key: CacheKey, history: FinancialHistory) {
        let mut inner = self.inner.write().await;
        if inner.ttl.is_zero() || inner.max_entries == 0 {
            return;
        }
        inner.put(key, history);
    }

    pub async fn clear(&self) {
        self.inner.write().await.map.clear();
    }

    /// Entry count, expired entries included until the next write.
    pub async fn len(&self) -> usize {
        self.inner.read().await.map.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn is_disabled(&self) -> bool {
        let inner = self.inner.read().await;
        inner.ttl.is_zero() || inner.max_entries == 0
    }
}

impl Default for FinancialsCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(3_600), 64)
    }
}

/// Result of a cache-aware fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedFetch {
    pub history: FinancialHistory,
    pub cache_hit: bool,
}

/// Wraps any [`FinancialsSource`] with a [`FinancialsCache`].
#[derive(Debug, Clone)]
pub struct CachedSource<S> {
    source: S,
    cache: FinancialsCache,
    mode: CacheMode,
}

impl<S: FinancialsSource> CachedSource<S> {
    pub fn new(source: S, cache: FinancialsCache) -> Self {
        Self {
            source,
            cache,
            mode: CacheMode::Use,
        }
    }

    pub fn with_mode(mut self, mode: CacheMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn inner(&self) -> &S {
        &self.source
    }

    pub fn cache(&self) -> &FinancialsCache {
        &self.cache
    }

    /// Fetches through the cache using the configured mode.
    pub async fn fetch(&self, req: FinancialsRequest) -> Result<CachedFetch, SourceError> {
        self.fetch_with_mode(req, self.mode).await
    }

    pub async fn fetch_with_mode(
        &self,
        req: FinancialsRequest,
        mode: CacheMode,
    ) -> Result<CachedFetch, SourceError> {
        let key = (req.ticker.clone(), req.as_of);

        if mode == CacheMode::Use {
            if let Some(history) = self.cache.get(&key).await {
                tracing::debug!(ticker = %key.0, as_of = %key.1, "financials cache hit");
                return Ok(CachedFetch {
                    history,
                    cache_hit: true,
                });
            }
            tracing::debug!(ticker = %key.0, as_of = %key.1, "financials cache miss");
        }

        let history = self.source.financials(req).await?;
        if mode != CacheMode::Bypass {
            self.cache.put(key, history.clone()).await;
        }

        Ok(CachedFetch {
            history,
            cache_hit: false,
        })
    }
}

impl<S: FinancialsSource> FinancialsSource for CachedSource<S> {
    fn id(&self) -> ProviderId {
        self.source.id()
    }

    fn financials<'a>(
        &'a self,
        req: FinancialsRequest,
    ) -> Pin<Box<dyn Future<Output = Result<FinancialHistory, SourceError>> + Send + 'a>> {
        Box::pin(async move { self.fetch(req).await.map(|fetched| fetched.history) })
    }

    fn health<'a>(&'a self) -> Pin<Box<dyn Future<Output = HealthStatus> + Send + 'a>> {
        self.source.health()
    }
}
