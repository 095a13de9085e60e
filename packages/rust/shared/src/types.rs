//! Core domain types: reviews, per-product review sets, cache keys.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

// ---------------------------------------------------------------------------
// Review
// ---------------------------------------------------------------------------

/// The four per-review fields extracted from a review card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewField {
    ReviewerName,
    Rating,
    CommentHeading,
    CommentBody,
}

impl ReviewField {
    /// All fields, in display order.
    pub const ALL: [ReviewField; 4] = [
        ReviewField::ReviewerName,
        ReviewField::Rating,
        ReviewField::CommentHeading,
        ReviewField::CommentBody,
    ];

    /// Placeholder rendered when the field could not be extracted.
    pub fn sentinel(self) -> &'static str {
        match self {
            ReviewField::ReviewerName => "Name Unavailable.",
            ReviewField::Rating => "Rating Unavailable.",
            ReviewField::CommentHeading => "Comment Heading Unavailable.",
            ReviewField::CommentBody => "Comment Unavailable.",
        }
    }
}

/// One user review for one product.
///
/// Each extracted field is `None` when its markup was missing. The
/// "Unavailable" sentinels only appear once a review is [rendered](Review::render).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    /// The search term the fetch was run for.
    pub product_query: String,
    pub reviewer_name: Option<String>,
    /// Free text; the source does not guarantee a numeric scale.
    pub rating: Option<String>,
    pub comment_heading: Option<String>,
    pub comment_body: Option<String>,
}

impl Review {
    /// Raw extracted value of `field`.
    pub fn get(&self, field: ReviewField) -> Option<&str> {
        match field {
            ReviewField::ReviewerName => self.reviewer_name.as_deref(),
            ReviewField::Rating => self.rating.as_deref(),
            ReviewField::CommentHeading => self.comment_heading.as_deref(),
            ReviewField::CommentBody => self.comment_body.as_deref(),
        }
    }

    /// Value of `field`, or its sentinel when absent.
    pub fn field_or_sentinel(&self, field: ReviewField) -> &str {
        self.get(field).unwrap_or_else(|| field.sentinel())
    }

    /// Flatten into the presentation shape with sentinels substituted.
    pub fn render(&self) -> RenderedReview {
        RenderedReview {
            product_query: self.product_query.clone(),
            reviewer_name: self.field_or_sentinel(ReviewField::ReviewerName).to_string(),
            rating: self.field_or_sentinel(ReviewField::Rating).to_string(),
            comment_heading: self
                .field_or_sentinel(ReviewField::CommentHeading)
                .to_string(),
            comment_body: self.field_or_sentinel(ReviewField::CommentBody).to_string(),
        }
    }
}

/// A review as handed to presentation code: every field is plain text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedReview {
    pub product_query: String,
    pub reviewer_name: String,
    pub rating: String,
    pub comment_heading: String,
    pub comment_body: String,
}

// ---------------------------------------------------------------------------
// ProductReviewSet
// ---------------------------------------------------------------------------

/// Reviews for one product, keyed by the product's display name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductReviews {
    /// Display name as shown on the detail page (may differ from the query).
    pub name: String,
    /// Reviews in page order.
    pub reviews: Vec<Review>,
}

/// Ordered mapping of product display name to reviews.
///
/// Products keep discovery order. Inserting a name that is already present
/// replaces its reviews in place, like a map would.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductReviewSet {
    products: Vec<ProductReviews>,
}

impl ProductReviewSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the reviews for `name`.
    pub fn insert(&mut self, name: impl Into<String>, reviews: Vec<Review>) {
        let name = name.into();
        match self.products.iter_mut().find(|p| p.name == name) {
            Some(existing) => existing.reviews = reviews,
            None => self.products.push(ProductReviews { name, reviews }),
        }
    }

    /// Reviews for `name`, if that product is present.
    pub fn get(&self, name: &str) -> Option<&[Review]> {
        self.products
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.reviews.as_slice())
    }

    /// Product display names in discovery order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.products.iter().map(|p| p.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProductReviews> {
        self.products.iter()
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Total number of reviews across all products.
    pub fn review_count(&self) -> usize {
        self.products.iter().map(|p| p.reviews.len()).sum()
    }
}

impl From<Vec<ProductReviews>> for ProductReviewSet {
    fn from(products: Vec<ProductReviews>) -> Self {
        let mut set = Self::new();
        for p in products {
            set.insert(p.name, p.reviews);
        }
        set
    }
}

impl IntoIterator for ProductReviewSet {
    type Item = ProductReviews;
    type IntoIter = std::vec::IntoIter<ProductReviews>;

    fn into_iter(self) -> Self::IntoIter {
        self.products.into_iter()
    }
}

/// Serializes as a JSON object `{ "<display name>": [review, ...] }` in
/// discovery order, with sentinels rendered.
impl Serialize for ProductReviewSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.products.len()))?;
        for p in &self.products {
            let rendered: Vec<RenderedReview> = p.reviews.iter().map(Review::render).collect();
            map.serialize_entry(&p.name, &rendered)?;
        }
        map.end()
    }
}

/// The unit persisted per cache key. A fetch always yields exactly one set.
pub type CachedResult = Vec<ProductReviewSet>;

// ---------------------------------------------------------------------------
// Cache keys
// ---------------------------------------------------------------------------

/// Normalize a user query into a store key.
///
/// Trims the ends, collapses whitespace runs, and joins words with `_`.
/// Case is preserved. Blank input yields an empty key.
pub fn normalize_query(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join("_")
}
