//! TTL cache around query capabilities.
//!
//! The simulator itself never caches. Wrap a capability in [`QueryCache`] to
//! reuse successful responses across runs for a short TTL. Failed queries
//! are never cached, so a transient error is retried on the next run.

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::hash::Hash;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::capability::{
    LiquidationQueueQuery, PriceLookup, QueueFill, QueueRequest, RouteSaleSimulation, SaleQuote,
    SellOrder, VenueRetrievalQuery,
};

/// Cached value with timestamp for TTL expiration.
#[derive(Debug, Clone)]
struct Cached<T> {
    value: T,
    cached_at: Instant,
}

/// Cache key for route sale simulations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SaleKey {
    sell: Vec<SellOrder>,
    target: String,
}

/// Caching wrapper implementing every capability its inner value implements.
pub struct QueryCache<Q> {
    inner: Q,
    ttl: Duration,
    prices: DashMap<String, Cached<Option<Decimal>>>,
    venues: DashMap<(String, String), Cached<Decimal>>,
    queue: DashMap<QueueRequest, Cached<QueueFill>>,
    sales: DashMap<SaleKey, Cached<SaleQuote>>,
}

impl<Q: std::fmt::Debug> std::fmt::Debug for QueryCache<Q> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("inner", &self.inner)
            .field("ttl", &self.ttl)
            .field("cache_size", &self.len())
            .finish()
    }
}

impl<Q> QueryCache<Q> {
    /// Wrap `inner` with the given TTL.
    pub fn new(inner: Q, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            prices: DashMap::new(),
            venues: DashMap::new(),
            queue: DashMap::new(),
            sales: DashMap::new(),
        }
    }

    /// Access the wrapped capability.
    pub fn inner(&self) -> &Q {
        &self.inner
    }

    /// Total number of cached entries (including expired ones not yet cleaned).
    pub fn len(&self) -> usize {
        self.prices.len() + self.venues.len() + self.queue.len() + self.sales.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear expired entries from cache (call periodically).
    pub fn cleanup(&self) {
        let ttl = self.ttl;
        self.prices.retain(|_, c| c.cached_at.elapsed() < ttl);
        self.venues.retain(|_, c| c.cached_at.elapsed() < ttl);
        self.queue.retain(|_, c| c.cached_at.elapsed() < ttl);
        self.sales.retain(|_, c| c.cached_at.elapsed() < ttl);
    }

    fn lookup<K, V>(&self, map: &DashMap<K, Cached<V>>, key: &K) -> Option<V>
    where
        K: Eq + Hash,
        V: Clone,
    {
        let cached = map.get(key)?;
        if cached.cached_at.elapsed() < self.ttl {
            Some(cached.value.clone())
        } else {
            None
        }
    }

    fn store<K, V>(map: &DashMap<K, Cached<V>>, key: K, value: V)
    where
        K: Eq + Hash,
    {
        map.insert(
            key,
            Cached {
                value,
                cached_at: Instant::now(),
            },
        );
    }
}

#[async_trait]
impl<Q: PriceLookup> PriceLookup for QueryCache<Q> {
    async fn price(&self, denom: &str) -> Result<Option<Decimal>> {
        let key = denom.to_string();
        if let Some(price) = self.lookup(&self.prices, &key) {
            debug!(denom, "Cache hit for price");
            return Ok(price);
        }

        let price = self.inner.price(denom).await?;
        Self::store(&self.prices, key, price);
        Ok(price)
    }
}

#[async_trait]
impl<Q: VenueRetrievalQuery> VenueRetrievalQuery for QueryCache<Q> {
    async fn retrievable(&self, venue: &str, user: &str) -> Result<Decimal> {
        let key = (venue.to_string(), user.to_string());
        if let Some(amount) = self.lookup(&self.venues, &key) {
            debug!(venue, "Cache hit for venue retrieval");
            return Ok(amount);
        }

        let amount = self.inner.retrievable(venue, user).await?;
        Self::store(&self.venues, key, amount);
        Ok(amount)
    }
}

#[async_trait]
impl<Q: LiquidationQueueQuery> LiquidationQueueQuery for QueryCache<Q> {
    async fn check_liquidatable(&self, request: &QueueRequest) -> Result<QueueFill> {
        if let Some(fill) = self.lookup(&self.queue, request) {
            debug!(asset = %request.asset_denom, "Cache hit for queue check");
            return Ok(fill);
        }

        let fill = self.inner.check_liquidatable(request).await?;
        Self::store(&self.queue, request.clone(), fill);
        Ok(fill)
    }
}

#[async_trait]
impl<Q: RouteSaleSimulation> RouteSaleSimulation for QueryCache<Q> {
    async fn simulate_sale(&self, sell: &[SellOrder], target: &str) -> Result<SaleQuote> {
        let key = SaleKey {
            sell: sell.to_vec(),
            target: target.to_string(),
        };
        if let Some(quote) = self.lookup(&self.sales, &key) {
            debug!(target, "Cache hit for route simulation");
            return Ok(quote);
        }

        let quote = self.inner.simulate_sale(sell, target).await?;
        Self::store(&self.sales, key, quote.clone());
        Ok(quote)
    }
}
