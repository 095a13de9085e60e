//! Seams between the cache coordinator and its two collaborators.
//!
//! [`ReviewCache`](crate::ReviewCache) only sees these traits, so tests can
//! swap in stubs and the production types stay unaware of each other.

use async_trait::async_trait;
use reviewharvest_crawler::ReviewScraper;
use reviewharvest_shared::{CachedResult, ProductReviewSet, Result};
use reviewharvest_storage::Storage;

/// Persistence keyed by normalized query.
#[async_trait]
pub trait ReviewStore: Send + Sync {
    /// Records under `key`; empty when the key is unknown.
    async fn get(&self, key: &str) -> Result<CachedResult>;

    /// Append records; `true` when the write was acknowledged.
    async fn put(&self, key: &str, records: &[ProductReviewSet]) -> Result<bool>;

    /// Swap everything under `key` for `records` in one write; on failure
    /// the previous records stay.
    async fn replace(&self, key: &str, records: &[ProductReviewSet]) -> Result<bool>;

    /// Remove everything under `key`. Idempotent.
    async fn drop_key(&self, key: &str) -> Result<bool>;
}

/// Produces a fresh result for a query from the source site.
#[async_trait]
pub trait ReviewFetcher: Send + Sync {
    async fn fetch(&self, query: &str) -> Result<CachedResult>;
}

#[async_trait]
impl ReviewStore for Storage {
    async fn get(&self, key: &str) -> Result<CachedResult> {
        Storage::get(self, key).await
    }

    async fn put(&self, key: &str, records: &[ProductReviewSet]) -> Result<bool> {
        Storage::put(self, key, records).await
    }

    async fn replace(&self, key: &str, records: &[ProductReviewSet]) -> Result<bool> {
        Storage::replace(self, key, records).await
    }

    async fn drop_key(&self, key: &str) -> Result<bool> {
        Storage::drop_key(self, key).await
    }
}

#[async_trait]
impl ReviewFetcher for ReviewScraper {
    async fn fetch(&self, query: &str) -> Result<CachedResult> {
        ReviewScraper::fetch(self, query).await
    }
}
