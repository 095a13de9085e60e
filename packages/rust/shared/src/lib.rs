//! Shared types, error model, and configuration for ReviewHarvest.
//!
//! This crate is the foundation depended on by all other ReviewHarvest crates.
//! It provides:
//! - [`ReviewHarvestError`]: the unified error type
//! - Domain types ([`Review`], [`ProductReviewSet`], [`CachedResult`])
//! - Configuration ([`AppConfig`], [`ScrapeConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CacheConfig, ScrapeConfig, SelectorConfig, SourceConfig, StoreConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from,
};
pub use error::{ReviewHarvestError, Result};
pub use types::{
    CachedResult, ProductReviewSet, ProductReviews, RenderedReview, Review, ReviewField,
    normalize_query,
};
