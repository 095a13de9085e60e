//! libSQL-backed review store (embedded, offline).
//!
//! The [`Storage`] struct keeps cached review results keyed by normalized
//! search term. Each key addresses a "collection" of independent records; a
//! record is one [`ProductReviewSet`], stored as flat review rows that carry
//! their product and record context.
//!
//! **Contract:**
//! - [`Storage::get`] returns an empty `Vec` for an unknown key (not an error)
//! - [`Storage::put`] appends records in one transaction
//! - [`Storage::replace`] swaps a key's records atomically
//! - [`Storage::drop_key`] removes every record under a key and is idempotent
//! - reads never observe a write that has not committed

mod migrations;

use std::path::Path;

use chrono::{DateTime, Utc};
use libsql::{Connection, Database, Row, Transaction, Value, params};
use reviewharvest_shared::{
    CachedResult, ProductReviewSet, ProductReviews, Result, Review, ReviewHarvestError,
};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
    /// Write transactions run on the shared connection, so readers must not
    /// interleave with them.
    lock: RwLock<()>,
}

/// A cached key with its record count.
#[derive(Debug, Clone)]
pub struct KeySummary {
    /// Normalized query key.
    pub key: String,
    /// Number of records stored under the key.
    pub records: u64,
    /// When the oldest record was written.
    pub first_cached_at: DateTime<Utc>,
}

fn persistence(e: impl std::fmt::Display) -> ReviewHarvestError {
    ReviewHarvestError::Persistence(e.to_string())
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ReviewHarvestError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(persistence)?;

        let conn = db.connect().map_err(persistence)?;

        let storage = Self {
            db,
            conn,
            readonly: false,
            lock: RwLock::new(()),
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` for inspection only.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ReviewHarvestError::Persistence(format!(
                "database not found at {}",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(persistence)?;

        let conn = db.connect().map_err(persistence)?;

        Ok(Self {
            db,
            conn,
            readonly: true,
            lock: RwLock::new(()),
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        ReviewHarvestError::Persistence(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(ReviewHarvestError::Persistence(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Collection operations
    // -----------------------------------------------------------------------

    /// All records stored under `key`, in write order.
    ///
    /// Never observes a write transaction in progress: readers and writers
    /// share one connection, so reads wait for the write lock to clear.
    pub async fn get(&self, key: &str) -> Result<CachedResult> {
        let _read = self.lock.read().await;
        let mut rows = self
            .conn
            .query(
                "SELECT s.id, p.id, p.name, r.id, r.product_query,
                        r.reviewer_name, r.rating, r.comment_heading, r.comment_body
                 FROM review_sets s
                 LEFT JOIN products p ON p.set_id = s.id
                 LEFT JOIN reviews r ON r.product_id = p.id
                 WHERE s.collection = ?1
                 ORDER BY s.rowid, p.position, r.position",
                params![key],
            )
            .await
            .map_err(persistence)?;

        let mut records = CachedResult::new();
        let mut current: Option<RecordBuilder> = None;

        while let Some(row) = rows.next().await.map_err(persistence)? {
            let set_id = required_text(&row, 0)?;

            let builder = match current.take() {
                Some(b) if b.set_id == set_id => b,
                Some(done) => {
                    records.push(done.finish());
                    RecordBuilder::new(set_id)
                }
                None => RecordBuilder::new(set_id),
            };
            let builder = current.insert(builder);

            // Record without products
            let Some(product_id) = optional_text(&row, 1)? else {
                continue;
            };
            if builder.product_id.as_deref() != Some(product_id.as_str()) {
                builder.products.push(ProductReviews {
                    name: required_text(&row, 2)?,
                    reviews: Vec::new(),
                });
                builder.product_id = Some(product_id);
            }

            // Product without reviews
            if optional_text(&row, 3)?.is_none() {
                continue;
            }
            let review = Review {
                product_query: required_text(&row, 4)?,
                reviewer_name: optional_text(&row, 5)?,
                rating: optional_text(&row, 6)?,
                comment_heading: optional_text(&row, 7)?,
                comment_body: optional_text(&row, 8)?,
            };
            if let Some(product) = builder.products.last_mut() {
                product.reviews.push(review);
            }
        }

        if let Some(done) = current {
            records.push(done.finish());
        }

        tracing::debug!(key, records = records.len(), "loaded collection");
        Ok(records)
    }

    /// Append `records` under `key` as independent documents.
    ///
    /// Returns `true` once the write is committed, `false` if there was
    /// nothing to write.
    pub async fn put(&self, key: &str, records: &[ProductReviewSet]) -> Result<bool> {
        self.check_writable()?;
        if records.is_empty() {
            return Ok(false);
        }

        let _write = self.lock.write().await;
        let tx = self.conn.transaction().await.map_err(persistence)?;
        let outcome = insert_records(&tx, key, records).await;
        settle(tx, outcome).await?;

        tracing::debug!(key, records = records.len(), "stored collection");
        Ok(true)
    }

    /// Replace everything under `key` with `records` in one transaction.
    ///
    /// On failure the previous records are left untouched. Returns `false`
    /// when `records` is empty (the key ends up absent).
    pub async fn replace(&self, key: &str, records: &[ProductReviewSet]) -> Result<bool> {
        self.check_writable()?;

        let _write = self.lock.write().await;
        let tx = self.conn.transaction().await.map_err(persistence)?;
        let outcome = async {
            let removed = delete_collection(&tx, key).await?;
            insert_records(&tx, key, records).await?;
            Ok::<_, ReviewHarvestError>(removed)
        }
        .await;
        let removed = settle(tx, outcome).await?;

        tracing::debug!(key, removed, records = records.len(), "replaced collection");
        Ok(!records.is_empty())
    }

    /// Delete every record under `key`. Missing keys are not an error.
    pub async fn drop_key(&self, key: &str) -> Result<bool> {
        self.check_writable()?;

        let _write = self.lock.write().await;
        let tx = self.conn.transaction().await.map_err(persistence)?;
        let outcome = delete_collection(&tx, key).await;
        let removed = settle(tx, outcome).await?;

        tracing::debug!(key, removed, "dropped collection");
        Ok(true)
    }

    /// Every cached key with its record count, ordered by key.
    pub async fn list_keys(&self) -> Result<Vec<KeySummary>> {
        let _read = self.lock.read().await;
        let mut rows = self
            .conn
            .query(
                "SELECT collection, COUNT(*), MIN(created_at)
                 FROM review_sets
                 GROUP BY collection
                 ORDER BY collection",
                params![],
            )
            .await
            .map_err(persistence)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(persistence)? {
            let created: String = row.get(2).map_err(persistence)?;
            results.push(KeySummary {
                key: row.get(0).map_err(persistence)?,
                records: row.get::<i64>(1).map_err(persistence)? as u64,
                first_cached_at: DateTime::parse_from_rfc3339(&created)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| ReviewHarvestError::Persistence(format!("invalid date: {e}")))?,
            });
        }
        Ok(results)
    }
}

/// Text column where only SQL NULL means absent; other value types are faults.
fn optional_text(row: &Row, idx: i32) -> Result<Option<String>> {
    match row.get_value(idx).map_err(persistence)? {
        Value::Null => Ok(None),
        Value::Text(text) => Ok(Some(text)),
        other => Err(ReviewHarvestError::Persistence(format!(
            "column {idx} holds a non-text value: {other:?}"
        ))),
    }
}

fn required_text(row: &Row, idx: i32) -> Result<String> {
    optional_text(row, idx)?.ok_or_else(|| {
        ReviewHarvestError::Persistence(format!("column {idx} is unexpectedly NULL"))
    })
}

/// Commit on success, roll back on failure.
///
/// The connection is shared, so a transaction must never be left open.
async fn settle<T>(tx: Transaction, outcome: Result<T>) -> Result<T> {
    match outcome {
        Ok(value) => {
            tx.commit().await.map_err(persistence)?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback) = tx.rollback().await {
                tracing::warn!(error = %rollback, "rollback failed");
            }
            Err(e)
        }
    }
}

async fn insert_records(
    conn: &Connection,
    key: &str,
    records: &[ProductReviewSet],
) -> Result<()> {
    let now = Utc::now().to_rfc3339();

    for (set_pos, set) in records.iter().enumerate() {
        let set_id = Uuid::now_v7().to_string();
        conn.execute(
            "INSERT INTO review_sets (id, collection, position, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![set_id.as_str(), key, set_pos as i64, now.as_str()],
        )
        .await
        .map_err(persistence)?;

        for (product_pos, product) in set.iter().enumerate() {
            let product_id = Uuid::now_v7().to_string();
            conn.execute(
                "INSERT INTO products (id, set_id, position, name) VALUES (?1, ?2, ?3, ?4)",
                params![
                    product_id.as_str(),
                    set_id.as_str(),
                    product_pos as i64,
                    product.name.as_str()
                ],
            )
            .await
            .map_err(persistence)?;

            for (review_pos, review) in product.reviews.iter().enumerate() {
                conn.execute(
                    "INSERT INTO reviews (id, product_id, position, product_query,
                                          reviewer_name, rating, comment_heading, comment_body)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        Uuid::now_v7().to_string(),
                        product_id.as_str(),
                        review_pos as i64,
                        review.product_query.as_str(),
                        review.reviewer_name.as_deref(),
                        review.rating.as_deref(),
                        review.comment_heading.as_deref(),
                        review.comment_body.as_deref(),
                    ],
                )
                .await
                .map_err(persistence)?;
            }
        }
    }
    Ok(())
}

/// Delete a collection bottom-up; returns the number of records removed.
async fn delete_collection(conn: &Connection, key: &str) -> Result<u64> {
    conn.execute(
        "DELETE FROM reviews WHERE product_id IN (
             SELECT p.id FROM products p
             JOIN review_sets s ON s.id = p.set_id
             WHERE s.collection = ?1)",
        params![key],
    )
    .await
    .map_err(persistence)?;
    conn.execute(
        "DELETE FROM products WHERE set_id IN (
             SELECT id FROM review_sets WHERE collection = ?1)",
        params![key],
    )
    .await
    .map_err(persistence)?;
    conn.execute(
        "DELETE FROM review_sets WHERE collection = ?1",
        params![key],
    )
    .await
    .map_err(persistence)
}

/// Accumulates the rows of one stored record during [`Storage::get`].
struct RecordBuilder {
    set_id: String,
    product_id: Option<String>,
    products: Vec<ProductReviews>,
}

impl RecordBuilder {
    fn new(set_id: String) -> Self {
        Self {
            set_id,
            product_id: None,
            products: Vec::new(),
        }
    }

    fn finish(self) -> ProductReviewSet {
        ProductReviewSet::from(self.products)
    }
}
