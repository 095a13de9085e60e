//! Application configuration for ReviewHarvest.
//!
//! User config lives at `~/.reviewharvest/reviewharvest.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ReviewHarvestError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "reviewharvest.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".reviewharvest";

/// Default database file name inside the config directory.
const DATABASE_FILE_NAME: &str = "reviewstore.db";

// ---------------------------------------------------------------------------
// Config structs (matching reviewharvest.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Source site URLs and request policy.
    #[serde(default)]
    pub source: SourceConfig,

    /// Structural selectors for the source site's markup.
    #[serde(default)]
    pub selectors: SelectorConfig,

    /// Review store location.
    #[serde(default)]
    pub store: StoreConfig,

    /// Cache-aside behavior.
    #[serde(default)]
    pub cache: CacheConfig,
}

/// `[source]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Search listing URL; the encoded query is appended verbatim.
    #[serde(default = "default_listing_url")]
    pub listing_url: String,

    /// Base that product card links are resolved against.
    #[serde(default = "default_product_url")]
    pub product_url: String,

    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Extra attempts after a transient network failure.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Fixed delay between attempts.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Detail pages fetched at once. `1` fetches strictly in order.
    #[serde(default = "default_detail_concurrency")]
    pub detail_concurrency: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            listing_url: default_listing_url(),
            product_url: default_product_url(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            detail_concurrency: default_detail_concurrency(),
        }
    }
}

fn default_listing_url() -> String {
    "https://www.flipkart.com/search?q=".into()
}
fn default_product_url() -> String {
    "https://www.flipkart.com".into()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    2
}
fn default_retry_delay_ms() -> u64 {
    500
}
fn default_detail_concurrency() -> u32 {
    4
}

/// `[selectors]` section: one CSS selector per structural role.
///
/// The listing and product-name selectors define identity; a miss on them
/// fails the fetch. The four review field selectors are scoped to a single
/// review card and a miss only blanks that field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Region of the listing page holding the product cards.
    pub listing_container: String,
    /// One product card inside the container.
    pub product_card: String,
    /// Link to the detail page inside a product card.
    pub card_link: String,
    /// Product display name on the detail page.
    pub product_name: String,
    /// One review on the detail page.
    pub review_card: String,
    pub reviewer_name: String,
    pub rating: String,
    pub comment_heading: String,
    pub comment_body: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            listing_container: "div._1YokD2._3Mn1Gg".into(),
            product_card: "div._2kHMtA".into(),
            card_link: "a[href]".into(),
            product_name: "h1.yhB1nd span".into(),
            review_card: "div._16PBlm".into(),
            reviewer_name: "p._2sc7ZR._2V5EHH".into(),
            rating: "div._3LWZlK".into(),
            comment_heading: "p._2-N8zT".into(),
            comment_body: "div.t-ZTKy div".into(),
        }
    }
}

/// `[store]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Database file. Defaults to `~/.reviewharvest/reviewstore.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<String>,
}

/// `[cache]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Collapse concurrent misses on one key into a single fetch.
    #[serde(default = "default_true")]
    pub dedupe_in_flight: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dedupe_in_flight: true,
        }
    }
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Scrape config (runtime, validated from config file)
// ---------------------------------------------------------------------------

/// Runtime scrape configuration with parsed URLs.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    /// Listing URL prefix (the encoded query is appended).
    pub listing_url: String,
    /// Base for resolving product links.
    pub product_url: Url,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub detail_concurrency: u32,
    pub selectors: SelectorConfig,
}

impl TryFrom<&AppConfig> for ScrapeConfig {
    type Error = ReviewHarvestError;

    fn try_from(config: &AppConfig) -> Result<Self> {
        let source = &config.source;

        // The listing URL must parse once a query is appended.
        Url::parse(&source.listing_url).map_err(|e| {
            ReviewHarvestError::config(format!(
                "invalid listing_url '{}': {e}",
                source.listing_url
            ))
        })?;

        let product_url = Url::parse(&source.product_url).map_err(|e| {
            ReviewHarvestError::config(format!(
                "invalid product_url '{}': {e}",
                source.product_url
            ))
        })?;

        if source.detail_concurrency == 0 {
            return Err(ReviewHarvestError::config(
                "detail_concurrency must be at least 1",
            ));
        }
        if source.timeout_secs == 0 {
            return Err(ReviewHarvestError::config("timeout_secs must be at least 1"));
        }

        Ok(Self {
            listing_url: source.listing_url.clone(),
            product_url,
            timeout_secs: source.timeout_secs,
            max_retries: source.max_retries,
            retry_delay_ms: source.retry_delay_ms,
            detail_concurrency: source.detail_concurrency,
            selectors: config.selectors.clone(),
        })
    }
}

impl AppConfig {
    /// Resolve the database path, falling back to the config directory.
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.store.database_path {
            Some(p) => Ok(PathBuf::from(p)),
            None => Ok(config_dir()?.join(DATABASE_FILE_NAME)),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.reviewharvest/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ReviewHarvestError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.reviewharvest/reviewharvest.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ReviewHarvestError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        ReviewHarvestError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ReviewHarvestError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ReviewHarvestError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ReviewHarvestError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("listing_url"));
        assert!(toml_str.contains("_16PBlm"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.source.max_retries, 2);
        assert_eq!(parsed.selectors, SelectorConfig::default());
        assert!(parsed.cache.dedupe_in_flight);
    }

    #[test]
    fn partial_selector_override() {
        let toml_str = r#"
[source]
listing_url = "https://shop.example.com/find?term="

[selectors]
rating = "span.stars"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.selectors.rating, "span.stars");
        // Unset roles keep their defaults
        assert_eq!(config.selectors.review_card, "div._16PBlm");
        assert_eq!(config.source.timeout_secs, 30);
    }

    #[test]
    fn scrape_config_from_app_config() {
        let app = AppConfig::default();
        let scrape = ScrapeConfig::try_from(&app).expect("valid defaults");
        assert_eq!(scrape.product_url.host_str(), Some("www.flipkart.com"));
        assert_eq!(scrape.detail_concurrency, 4);
    }

    #[test]
    fn scrape_config_rejects_bad_urls() {
        let mut app = AppConfig::default();
        app.source.product_url = "not a url".into();
        let err = ScrapeConfig::try_from(&app).unwrap_err();
        assert!(err.to_string().contains("product_url"));

        let mut app = AppConfig::default();
        app.source.detail_concurrency = 0;
        assert!(ScrapeConfig::try_from(&app).is_err());
    }

    #[test]
    fn scrape_config_rejects_zero_timeout() {
        let mut app = AppConfig::default();
        app.source.timeout_secs = 0;
        let err = ScrapeConfig::try_from(&app).unwrap_err();
        assert!(matches!(err, ReviewHarvestError::Config { .. }));
        assert!(err.to_string().contains("timeout_secs"));
    }

    #[test]
    fn explicit_database_path_wins() {
        let mut app = AppConfig::default();
        app.store.database_path = Some("/tmp/reviews.db".into());
        assert_eq!(app.database_path().unwrap(), PathBuf::from("/tmp/reviews.db"));
    }
}
