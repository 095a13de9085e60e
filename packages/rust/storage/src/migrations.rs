//! SQL migration definitions for the review store.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: review_sets, products, reviews",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- One row per stored record; `collection` is the normalized query key.
-- No uniqueness on collection: repeated puts append records.
CREATE TABLE IF NOT EXISTS review_sets (
    id         TEXT PRIMARY KEY,
    collection TEXT NOT NULL,
    position   INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_review_sets_collection ON review_sets(collection);

-- Products of a record, in discovery order
CREATE TABLE IF NOT EXISTS products (
    id       TEXT PRIMARY KEY,
    set_id   TEXT NOT NULL REFERENCES review_sets(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    name     TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_products_set_id ON products(set_id);

-- Flat review rows; NULL marks a field that could not be extracted
CREATE TABLE IF NOT EXISTS reviews (
    id              TEXT PRIMARY KEY,
    product_id      TEXT NOT NULL REFERENCES products(id) ON DELETE CASCADE,
    position        INTEGER NOT NULL,
    product_query   TEXT NOT NULL,
    reviewer_name   TEXT,
    rating          TEXT,
    comment_heading TEXT,
    comment_body    TEXT
);

CREATE INDEX IF NOT EXISTS idx_reviews_product_id ON reviews(product_id);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
