//! Listing and detail page extraction.
//!
//! Structural lookups (results container, product cards, card links, product
//! heading) define identity and fail with [`ReviewHarvestError::Extraction`].
//! Review field lookups are independent of each other and a miss only yields
//! `None` for that one field.

use reviewharvest_shared::{Result, Review, ReviewHarvestError};
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::selectors::CompiledSelectors;

/// Products followed from one listing page.
pub const MAX_PRODUCTS: usize = 5;

/// Resolve the detail page URLs of the first [`MAX_PRODUCTS`] product cards,
/// in listing order.
pub fn product_links(
    html: &str,
    selectors: &CompiledSelectors,
    product_base: &Url,
) -> Result<Vec<Url>> {
    let doc = Html::parse_document(html);

    let container = doc
        .select(&selectors.listing_container)
        .next()
        .ok_or_else(|| ReviewHarvestError::extraction("product card container not found"))?;

    let mut links = Vec::new();
    for (index, card) in container
        .select(&selectors.product_card)
        .take(MAX_PRODUCTS)
        .enumerate()
    {
        let href = card
            .select(&selectors.card_link)
            .next()
            .and_then(|a| a.value().attr("href"))
            .ok_or_else(|| {
                ReviewHarvestError::extraction(format!("product card {index} has no link"))
            })?;

        let url = product_base.join(href).map_err(|e| {
            ReviewHarvestError::extraction(format!(
                "product card {index} has an unusable link '{href}': {e}"
            ))
        })?;
        links.push(url);
    }

    if links.is_empty() {
        return Err(ReviewHarvestError::extraction(
            "listing contains no product cards",
        ));
    }

    Ok(links)
}

/// Extract the product display name and its reviews from a detail page.
///
/// `query` is stamped on every review as `product_query`.
pub fn product_reviews(
    html: &str,
    selectors: &CompiledSelectors,
    query: &str,
    page_url: &Url,
) -> Result<(String, Vec<Review>)> {
    let doc = Html::parse_document(html);

    let name = doc
        .select(&selectors.product_name)
        .next()
        .map(element_text)
        .ok_or_else(|| {
            ReviewHarvestError::extraction(format!("{page_url}: product heading not found"))
        })?;

    let reviews = doc
        .select(&selectors.review_card)
        .map(|card| Review {
            product_query: query.to_string(),
            reviewer_name: first_text(card, &selectors.reviewer_name),
            rating: first_text(card, &selectors.rating),
            comment_heading: first_text(card, &selectors.comment_heading),
            comment_body: first_text(card, &selectors.comment_body),
        })
        .collect();

    Ok((name, reviews))
}

/// Trimmed text of the first match of `selector` under `scope`.
fn first_text(scope: ElementRef<'_>, selector: &Selector) -> Option<String> {
    scope.select(selector).next().map(element_text)
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reviewharvest_shared::SelectorConfig;

    fn selectors() -> CompiledSelectors {
        CompiledSelectors::compile(&SelectorConfig::default()).unwrap()
    }

    fn base() -> Url {
        Url::parse("https://shop.example.com").unwrap()
    }

    #[test]
    fn links_resolve_against_product_base() {
        let html = r#"<div class="_1YokD2 _3Mn1Gg">
            <div class="_2kHMtA"><a href="/phone-a/p/itm1?pid=A">A</a></div>
            <div class="_2kHMtA"><a href="https://cdn.example.net/phone-b/p/itm2">B</a></div>
        </div>"#;

        let links = product_links(html, &selectors(), &base()).unwrap();
        assert_eq!(links[0].as_str(), "https://shop.example.com/phone-a/p/itm1?pid=A");
        assert_eq!(links[1].host_str(), Some("cdn.example.net"));
    }

    #[test]
    fn card_without_link_is_fatal() {
        let html = r#"<div class="_1YokD2 _3Mn1Gg">
            <div class="_2kHMtA"><a href="/ok/p/1">ok</a></div>
            <div class="_2kHMtA"><span>sponsored</span></div>
        </div>"#;

        let err = product_links(html, &selectors(), &base()).unwrap_err();
        assert!(matches!(err, ReviewHarvestError::Extraction { .. }));
        assert!(err.to_string().contains("card 1"));
    }

    #[test]
    fn empty_container_is_fatal() {
        let html = r#"<div class="_1YokD2 _3Mn1Gg"><p>No results found</p></div>"#;
        let err = product_links(html, &selectors(), &base()).unwrap_err();
        assert!(err.to_string().contains("no product cards"));
    }

    #[test]
    fn review_fields_fail_independently() {
        let html = r#"<html><body>
            <h1 class="yhB1nd"><span>Widget</span></h1>
            <div class="_16PBlm">
                <p class="_2sc7ZR _2V5EHH">Meera</p>
                <div class="t-ZTKy"><div>Does the job</div></div>
            </div>
        </body></html>"#;
        let page = Url::parse("https://shop.example.com/widget/p/1").unwrap();

        let (name, reviews) = product_reviews(html, &selectors(), "widget", &page).unwrap();
        assert_eq!(name, "Widget");
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].reviewer_name.as_deref(), Some("Meera"));
        assert_eq!(reviews[0].rating, None);
        assert_eq!(reviews[0].comment_heading, None);
        assert_eq!(reviews[0].comment_body.as_deref(), Some("Does the job"));
        assert_eq!(reviews[0].product_query, "widget");
    }

    #[test]
    fn page_without_reviews_yields_empty_list() {
        let html = r#"<h1 class="yhB1nd"><span>Quiet Product</span></h1>"#;
        let page = Url::parse("https://shop.example.com/quiet/p/1").unwrap();

        let (name, reviews) = product_reviews(html, &selectors(), "quiet", &page).unwrap();
        assert_eq!(name, "Quiet Product");
        assert!(reviews.is_empty());
    }
}
