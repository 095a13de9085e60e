//! Cache-aside coordination for ReviewHarvest.
//!
//! This crate ties the libSQL store and the scraper together behind
//! [`ReviewCache`]: lookups are served from the store and only fall through
//! to a scrape on a miss.

pub mod backends;
pub mod lookup;

pub use backends::{ReviewFetcher, ReviewStore};
pub use lookup::ReviewCache;

#[cfg(test)]
mod tests {
    use super::*;
    use reviewharvest_crawler::ReviewScraper;
    use reviewharvest_shared::{AppConfig, ScrapeConfig};
    use reviewharvest_storage::Storage;
    use uuid::Uuid;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn load_fixture(name: &str) -> String {
        let path = format!("../../../fixtures/html/{name}");
        std::fs::read_to_string(&path).unwrap_or_else(|_| panic!("missing fixture: {path}"))
    }

    #[tokio::test]
    async fn second_lookup_is_served_from_storage() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "iphone_15"))
            .respond_with(ResponseTemplate::new(200).set_body_string(load_fixture("listing.html")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/apple-iphone-15-black-128-gb/p/itm6ac6485515ae4"))
            .respond_with(ResponseTemplate::new(200).set_body_string(load_fixture("product.html")))
            .expect(1)
            .mount(&server)
            .await;
        // Remaining cards reuse the same page shape under a different name
        let other = load_fixture("product.html").replace(
            "Apple iPhone 15 (Black, 128 GB)",
            "Apple iPhone 15 (Other)",
        );
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(other))
            .with_priority(10)
            .mount(&server)
            .await;

        let mut app = AppConfig::default();
        app.source.listing_url = format!("{}/search?q=", server.uri());
        app.source.product_url = server.uri();
        app.source.timeout_secs = 5;
        app.source.retry_delay_ms = 0;
        let scraper = ReviewScraper::new(ScrapeConfig::try_from(&app).unwrap()).unwrap();

        let tmp = std::env::temp_dir().join(format!("rh_core_{}.db", Uuid::now_v7()));
        let storage = Storage::open(&tmp).await.unwrap();
        let cache = ReviewCache::new(storage, scraper);

        let first = cache.lookup("iphone 15").await.unwrap();
        assert_eq!(first.len(), 1);
        let names: Vec<_> = first[0].names().collect();
        assert_eq!(names[0], "Apple iPhone 15 (Black, 128 GB)");

        let second = cache.lookup("  iphone   15").await.unwrap();
        assert_eq!(second, first);

        // Sentinels only appear when rendering
        let reviews = second[0].get("Apple iPhone 15 (Black, 128 GB)").unwrap();
        assert_eq!(reviews[1].rating, None);
        assert_eq!(reviews[1].render().rating, "Rating Unavailable.");

        let keys = cache.store().list_keys().await.unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].key, "iphone_15");

        drop(cache);
        let _ = std::fs::remove_file(&tmp);
    }
}
