//! Listing-to-detail review scraper.
//!
//! This crate provides:
//! - [`selectors`]: the compiled `{role: selector}` table for the source site
//! - [`extract`]: pure HTML extraction (listing links, product reviews)
//! - [`engine`]: [`ReviewScraper`], the networked fetch pipeline

pub mod engine;
pub mod extract;
pub mod selectors;

pub use engine::ReviewScraper;
pub use extract::{MAX_PRODUCTS, product_links, product_reviews};
pub use selectors::CompiledSelectors;

#[cfg(test)]
mod tests {
    use super::*;
    use reviewharvest_shared::{ReviewHarvestError, SelectorConfig};
    use url::Url;

    fn load_fixture(name: &str) -> String {
        let path = format!("../../../fixtures/html/{name}");
        std::fs::read_to_string(&path).unwrap_or_else(|_| panic!("missing fixture: {path}"))
    }

    fn selectors() -> CompiledSelectors {
        CompiledSelectors::compile(&SelectorConfig::default()).unwrap()
    }

    fn base() -> Url {
        Url::parse("https://www.flipkart.com").unwrap()
    }

    // -----------------------------------------------------------------------
    // Listing fixtures
    // -----------------------------------------------------------------------

    #[test]
    fn listing_caps_at_five_in_order() {
        let links = product_links(&load_fixture("listing.html"), &selectors(), &base()).unwrap();

        assert_eq!(links.len(), MAX_PRODUCTS);
        assert!(links[0].path().starts_with("/apple-iphone-15-black-128-gb/"));
        assert!(links[4].path().starts_with("/apple-iphone-15-green-128-gb/"));
        assert!(!links.iter().any(|l| l.path().contains("yellow")));
    }

    #[test]
    fn listing_without_container_fails() {
        let err = product_links(&load_fixture("listing_no_container.html"), &selectors(), &base())
            .unwrap_err();
        assert!(matches!(err, ReviewHarvestError::Extraction { .. }));
        assert!(err.to_string().contains("container"));
    }

    // -----------------------------------------------------------------------
    // Detail fixtures
    // -----------------------------------------------------------------------

    #[test]
    fn product_fixture_extracts_name_and_reviews() {
        let page = base().join("/apple-iphone-15-black-128-gb/p/itm6ac6485515ae4").unwrap();
        let (name, reviews) =
            product_reviews(&load_fixture("product.html"), &selectors(), "iphone_15", &page)
                .unwrap();

        assert_eq!(name, "Apple iPhone 15 (Black, 128 GB)");
        assert_eq!(reviews.len(), 3);
        assert!(reviews.iter().all(|r| r.product_query == "iphone_15"));

        // Product-level rating outside review cards is not picked up
        assert_eq!(reviews[0].rating.as_deref(), Some("5"));
        assert_eq!(reviews[1].rating, None);
    }

    #[test]
    fn product_fixture_without_heading_fails() {
        let page = base().join("/gone/p/1").unwrap();
        let err = product_reviews(
            &load_fixture("product_no_heading.html"),
            &selectors(),
            "iphone_15",
            &page,
        )
        .unwrap_err();
        assert!(matches!(err, ReviewHarvestError::Extraction { .. }));
    }

    #[test]
    fn swapped_selector_table_drives_extraction() {
        let config = SelectorConfig {
            product_name: "h1#title".into(),
            review_card: "li.review".into(),
            reviewer_name: ".author".into(),
            rating: ".stars".into(),
            comment_heading: "h3".into(),
            comment_body: "blockquote".into(),
            ..SelectorConfig::default()
        };
        let selectors = CompiledSelectors::compile(&config).unwrap();
        let html = r#"<h1 id="title">Kettle</h1><ul>
            <li class="review"><span class="author">Lin</span><span class="stars">3/5</span>
                <h3>Boils fast</h3><blockquote>Loud though.</blockquote></li>
        </ul>"#;
        let page = Url::parse("https://shop.example.com/kettle").unwrap();

        let (name, reviews) = product_reviews(html, &selectors, "kettle", &page).unwrap();
        assert_eq!(name, "Kettle");
        assert_eq!(reviews[0].rating.as_deref(), Some("3/5"));
        assert_eq!(reviews[0].comment_body.as_deref(), Some("Loud though."));
    }
}
