//! Review scraper: listing page → up to five detail pages → normalized reviews.
//!
//! Detail pages are fetched by spawned tasks gated on a semaphore; results are
//! collected in card order so the product order always matches the listing.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};
use url::Url;

use reviewharvest_shared::{
    CachedResult, ProductReviewSet, Result, ReviewHarvestError, ScrapeConfig,
};

use crate::extract;
use crate::selectors::CompiledSelectors;

/// User-Agent string for scrape requests.
const USER_AGENT: &str = concat!("ReviewHarvest/", env!("CARGO_PKG_VERSION"));

/// Maximum number of redirects to follow per request.
const MAX_REDIRECTS: usize = 5;

// ---------------------------------------------------------------------------
// Retry policy
// ---------------------------------------------------------------------------

/// Fixed-delay retry for transient network failures.
#[derive(Debug, Clone, Copy)]
struct RetryPolicy {
    max_retries: u32,
    delay: Duration,
}

/// Outcome of a single failed GET.
enum AttemptError {
    /// Connection failure, timeout, 5xx or 429.
    Transient(ReviewHarvestError),
    /// Anything a retry cannot fix.
    Fatal(ReviewHarvestError),
}

// ---------------------------------------------------------------------------
// ReviewScraper
// ---------------------------------------------------------------------------

/// Fetches and normalizes review data for a search term.
pub struct ReviewScraper {
    config: ScrapeConfig,
    client: Client,
    selectors: Arc<CompiledSelectors>,
    retry: RetryPolicy,
}

impl ReviewScraper {
    /// Create a scraper, compiling the configured selector table.
    ///
    /// Zero detail concurrency or a zero timeout is a `Config` error.
    pub fn new(config: ScrapeConfig) -> Result<Self> {
        if config.detail_concurrency == 0 {
            return Err(ReviewHarvestError::config(
                "detail_concurrency must be at least 1",
            ));
        }
        if config.timeout_secs == 0 {
            return Err(ReviewHarvestError::config("timeout_secs must be at least 1"));
        }

        let selectors = CompiledSelectors::compile(&config.selectors)?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                ReviewHarvestError::Network(format!("failed to build HTTP client: {e}"))
            })?;

        let retry = RetryPolicy {
            max_retries: config.max_retries,
            delay: Duration::from_millis(config.retry_delay_ms),
        };

        Ok(Self {
            config,
            client,
            selectors: Arc::new(selectors),
            retry,
        })
    }

    /// Build the listing URL for `query`.
    pub fn listing_url(&self, query: &str) -> Result<Url> {
        let encoded: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
        let raw = format!("{}{encoded}", self.config.listing_url);
        Url::parse(&raw)
            .map_err(|e| ReviewHarvestError::validation(format!("invalid listing URL '{raw}': {e}")))
    }

    /// Run the full pipeline for `query`.
    ///
    /// Any network or structural failure aborts the whole call; no partial
    /// result is returned.
    #[instrument(skip_all, fields(query = %query))]
    pub async fn fetch(&self, query: &str) -> Result<CachedResult> {
        let listing_url = self.listing_url(query)?;
        info!(%listing_url, "fetching listing");

        let listing = fetch_html(&self.client, &listing_url, self.retry).await?;
        let links = extract::product_links(&listing, &self.selectors, &self.config.product_url)?;
        info!(products = links.len(), "listing parsed");

        let semaphore = Arc::new(Semaphore::new(self.config.detail_concurrency as usize));
        let mut handles = Vec::with_capacity(links.len());

        for url in links {
            let client = self.client.clone();
            let sem = semaphore.clone();
            let selectors = self.selectors.clone();
            let retry = self.retry;
            let query = query.to_string();

            handles.push(tokio::spawn(async move {
                let _permit = sem.acquire_owned().await.map_err(|e| {
                    ReviewHarvestError::Network(format!("detail fetch cancelled: {e}"))
                })?;
                let body = fetch_html(&client, &url, retry).await?;
                extract::product_reviews(&body, &selectors, &query, &url)
            }));
        }

        // Collect in card order, never completion order
        let mut set = ProductReviewSet::new();
        let mut pending = handles.into_iter();
        while let Some(handle) = pending.next() {
            let outcome = handle
                .await
                .map_err(|e| ReviewHarvestError::Network(format!("detail task failed: {e}")))
                .and_then(|r| r);

            match outcome {
                Ok((name, reviews)) => {
                    info!(product = %name, reviews = reviews.len(), "product scraped");
                    set.insert(name, reviews);
                }
                Err(e) => {
                    for rest in pending.by_ref() {
                        rest.abort();
                    }
                    return Err(e);
                }
            }
        }

        info!(
            products = set.len(),
            reviews = set.review_count(),
            "scrape completed"
        );
        Ok(vec![set])
    }
}

// ---------------------------------------------------------------------------
// Page fetching
// ---------------------------------------------------------------------------

/// GET `url` and return its body decoded as UTF-8, retrying transient failures.
async fn fetch_html(client: &Client, url: &Url, retry: RetryPolicy) -> Result<String> {
    let mut attempt: u32 = 0;
    loop {
        match fetch_once(client, url).await {
            Ok(body) => return Ok(body),
            Err(AttemptError::Transient(e)) if attempt < retry.max_retries => {
                attempt += 1;
                warn!(%url, attempt, error = %e, "transient failure, retrying");
                tokio::time::sleep(retry.delay).await;
            }
            Err(AttemptError::Transient(e)) | Err(AttemptError::Fatal(e)) => return Err(e),
        }
    }
}

async fn fetch_once(client: &Client, url: &Url) -> std::result::Result<String, AttemptError> {
    debug!(%url, "GET");

    let response = client.get(url.as_str()).send().await.map_err(|e| {
        let err = ReviewHarvestError::Network(format!("{url}: {e}"));
        if e.is_builder() || e.is_redirect() {
            AttemptError::Fatal(err)
        } else {
            AttemptError::Transient(err)
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        let err = ReviewHarvestError::Network(format!("{url}: HTTP {status}"));
        return Err(if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            AttemptError::Transient(err)
        } else {
            AttemptError::Fatal(err)
        });
    }

    // Decode as UTF-8 regardless of the declared charset
    let bytes = response.bytes().await.map_err(|e| {
        AttemptError::Transient(ReviewHarvestError::Network(format!(
            "{url}: body read failed: {e}"
        )))
    })?;

    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
