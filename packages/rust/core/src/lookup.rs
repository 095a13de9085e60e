//! Cache-aside lookup: store first, scrape on a miss, write back.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument, warn};

use reviewharvest_shared::{CachedResult, Result, normalize_query};

use crate::backends::{ReviewFetcher, ReviewStore};

type InFlight = StdMutex<HashMap<String, Arc<Mutex<()>>>>;

/// Coordinates a [`ReviewStore`] and a [`ReviewFetcher`].
///
/// Blank queries never reach the fetcher. With in-flight deduplication on
/// (the default), concurrent misses on the same key share one fetch; the
/// callers that waited read the freshly written entry from the store.
pub struct ReviewCache<S, F> {
    store: S,
    fetcher: F,
    dedupe_in_flight: bool,
    /// Per-key locks; the map itself is only held for brief, non-async sections.
    in_flight: InFlight,
}

impl<S: ReviewStore, F: ReviewFetcher> ReviewCache<S, F> {
    pub fn new(store: S, fetcher: F) -> Self {
        Self {
            store,
            fetcher,
            dedupe_in_flight: true,
            in_flight: StdMutex::new(HashMap::new()),
        }
    }

    /// Enable or disable per-key fetch deduplication.
    pub fn with_dedupe(mut self, enabled: bool) -> Self {
        self.dedupe_in_flight = enabled;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Return the cached result for `raw_query`, scraping and storing it on
    /// a miss.
    ///
    /// A blank query returns whatever the store holds for the empty key
    /// (normally nothing) and never triggers a scrape. Store read failures
    /// are returned as errors, not treated as misses.
    #[instrument(skip_all, fields(query = %raw_query))]
    pub async fn lookup(&self, raw_query: &str) -> Result<CachedResult> {
        let key = normalize_query(raw_query);

        let cached = self.store.get(&key).await?;
        if !cached.is_empty() {
            info!(%key, records = cached.len(), "cache hit");
            return Ok(cached);
        }
        if key.is_empty() {
            debug!("blank query, not fetching");
            return Ok(cached);
        }

        if !self.dedupe_in_flight {
            return self.populate(&key).await;
        }

        let lease = KeyLease::acquire(&self.in_flight, &key);
        let _guard = lease.lock().await;

        // Someone else may have populated the key while we waited
        let cached = self.store.get(&key).await?;
        if !cached.is_empty() {
            info!(%key, "populated by concurrent lookup");
            return Ok(cached);
        }
        self.populate(&key).await
    }

    /// Scrape `raw_query` again and replace its cached entry.
    ///
    /// The old entry is swapped for the new one in a single store write, and
    /// only once the new scrape has succeeded.
    #[instrument(skip_all, fields(query = %raw_query))]
    pub async fn refresh(&self, raw_query: &str) -> Result<CachedResult> {
        let key = normalize_query(raw_query);
        if key.is_empty() {
            debug!("blank query, not fetching");
            return Ok(CachedResult::new());
        }

        let lease = KeyLease::acquire(&self.in_flight, &key);
        let _guard = lease.lock().await;

        let fresh = self.fetcher.fetch(&key).await?;
        if !self.store.replace(&key, &fresh).await? {
            warn!(%key, "store did not acknowledge write");
        }
        info!(%key, "entry refreshed");
        Ok(fresh)
    }

    /// Drop the cached entry for `raw_query`.
    pub async fn forget(&self, raw_query: &str) -> Result<bool> {
        let key = normalize_query(raw_query);
        info!(%key, "dropping cached entry");
        self.store.drop_key(&key).await
    }

    async fn populate(&self, key: &str) -> Result<CachedResult> {
        info!(%key, "cache miss, fetching");
        let fresh = self.fetcher.fetch(key).await?;
        if self.store.put(key, &fresh).await? {
            debug!(%key, records = fresh.len(), "stored");
        } else {
            warn!(%key, "store did not acknowledge write");
        }
        Ok(fresh)
    }
}

/// A caller's share of one key's lock.
///
/// Dropping the lease, including when the owning future is cancelled, removes
/// the key's entry once no other caller holds or awaits it.
struct KeyLease<'a> {
    in_flight: &'a InFlight,
    key: String,
    lock: Arc<Mutex<()>>,
}

impl<'a> KeyLease<'a> {
    fn acquire(in_flight: &'a InFlight, key: &str) -> Self {
        let mut map = in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        let lock = map
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        Self {
            in_flight,
            key: key.to_string(),
            lock,
        }
    }

    async fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().await
    }
}

impl Drop for KeyLease<'_> {
    fn drop(&mut self) {
        let mut map = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        // Only the map and this lease hold it: nobody is waiting
        if Arc::strong_count(&self.lock) <= 2 {
            map.remove(&self.key);
        }
    }
}
