//! Compiled structural selectors.
//!
//! The raw `{role: selector}` table lives in [`SelectorConfig`] so it can be
//! updated from configuration when the source site changes its markup. This
//! module only parses it once, up front.

use reviewharvest_shared::{Result, ReviewHarvestError, SelectorConfig};
use scraper::Selector;

/// Parsed selectors, one per structural role.
#[derive(Debug, Clone)]
pub struct CompiledSelectors {
    pub listing_container: Selector,
    pub product_card: Selector,
    pub card_link: Selector,
    pub product_name: Selector,
    pub review_card: Selector,
    pub reviewer_name: Selector,
    pub rating: Selector,
    pub comment_heading: Selector,
    pub comment_body: Selector,
}

impl CompiledSelectors {
    /// Parse every selector in `config`. The first invalid one is reported
    /// by role.
    pub fn compile(config: &SelectorConfig) -> Result<Self> {
        Ok(Self {
            listing_container: parse("listing_container", &config.listing_container)?,
            product_card: parse("product_card", &config.product_card)?,
            card_link: parse("card_link", &config.card_link)?,
            product_name: parse("product_name", &config.product_name)?,
            review_card: parse("review_card", &config.review_card)?,
            reviewer_name: parse("reviewer_name", &config.reviewer_name)?,
            rating: parse("rating", &config.rating)?,
            comment_heading: parse("comment_heading", &config.comment_heading)?,
            comment_body: parse("comment_body", &config.comment_body)?,
        })
    }
}

fn parse(role: &str, selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| {
        ReviewHarvestError::config(format!("invalid {role} selector '{selector}': {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_compiles() {
        assert!(CompiledSelectors::compile(&SelectorConfig::default()).is_ok());
    }

    #[test]
    fn invalid_selector_names_its_role() {
        let config = SelectorConfig {
            rating: "div[[".into(),
            ..SelectorConfig::default()
        };
        let err = CompiledSelectors::compile(&config).unwrap_err();
        assert!(err.to_string().contains("rating selector"));
    }
}
