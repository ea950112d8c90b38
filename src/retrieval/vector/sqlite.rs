use super::types::{ScoredChunk, VectorError, VectorItem, VectorStore};
use crate::retrieval::similarity::{cosine_similarity, rank_top_k};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, FromRow)]
struct ChunkRow {
    id: i64,
    text: String,
    vector: String,
}

/// Relational store that keeps vectors as JSON arrays and ranks them with
/// a full scan per query.
///
/// Every search decodes and scores every row, which is fine for a profile
/// of a few hundred chunks and nothing larger.
pub struct SqliteVectorStore {
    pool: SqlitePool,
    table: String,
    // Quoted form for SQL, so keywords and leading digits are valid names
    ident: String,
}

impl SqliteVectorStore {
    /// Open (or create) the database file at `path`
    pub async fn connect(path: &str, table: &str) -> Result<Self, VectorError> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    VectorError::ConnectionError(format!(
                        "Failed to create directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        info!("Opening SQLite vector store at {} (table: {})", path, table);

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await
            .map_err(|e| {
                VectorError::ConnectionError(format!("Failed to open SQLite database: {}", e))
            })?;

        Self::with_pool(pool, table).await
    }

    /// Wrap an existing pool and make sure the chunk table exists
    pub async fn with_pool(pool: SqlitePool, table: &str) -> Result<Self, VectorError> {
        let store = Self {
            pool,
            table: table.to_string(),
            ident: format!("\"{}\"", table.replace('"', "\"\"")),
        };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<(), VectorError> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id INTEGER PRIMARY KEY,
                text TEXT NOT NULL,
                vector TEXT NOT NULL
            )",
            self.ident
        );

        sqlx::query(&sql).execute(&self.pool).await.map_err(|e| {
            VectorError::DatabaseError(format!("Failed to create table '{}': {}", self.table, e))
        })?;

        Ok(())
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn exists_and_populated(&self) -> Result<bool, VectorError> {
        Ok(self.count().await? > 0)
    }

    async fn insert_all(&self, items: Vec<VectorItem>) -> Result<(), VectorError> {
        if items.is_empty() {
            debug!("No items to insert into table: {}", self.table);
            return Ok(());
        }

        info!("Inserting {} items into table: {}", items.len(), self.table);

        let db_err = |e: sqlx::Error| {
            VectorError::OperationError(format!(
                "Failed to insert items into table '{}': {}",
                self.table, e
            ))
        };

        // Clear and insert in one transaction so a crash never leaves a
        // partially populated table behind.
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let delete_sql = format!("DELETE FROM {}", self.ident);
        sqlx::query(&delete_sql)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        let insert_sql = format!(
            "INSERT INTO {} (id, text, vector) VALUES (?, ?, ?)",
            self.ident
        );
        for item in &items {
            let vector = serde_json::to_string(&item.vector)
                .map_err(|e| VectorError::SerializationError(e.to_string()))?;

            sqlx::query(&insert_sql)
                .bind(item.id)
                .bind(&item.text)
                .bind(vector)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;

        info!(
            "Successfully inserted {} items into table: {}",
            items.len(),
            self.table
        );
        Ok(())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>, VectorError> {
        let sql = format!("SELECT id, text, vector FROM {} ORDER BY id", self.ident);

        let rows = sqlx::query_as::<_, ChunkRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                VectorError::DatabaseError(format!(
                    "Failed to read table '{}': {}",
                    self.table, e
                ))
            })?;

        debug!("Scoring {} rows from table: {}", rows.len(), self.table);

        let scored: Vec<ScoredChunk> = rows
            .into_iter()
            .filter_map(|row| match serde_json::from_str::<Vec<f32>>(&row.vector) {
                Ok(vector) => Some(ScoredChunk {
                    score: cosine_similarity(query, &vector),
                    id: row.id,
                    text: row.text,
                }),
                Err(e) => {
                    warn!("Skipping chunk {} with undecodable vector: {}", row.id, e);
                    None
                }
            })
            .collect();

        Ok(rank_top_k(scored, k))
    }

    async fn count(&self) -> Result<usize, VectorError> {
        let sql = format!("SELECT COUNT(*) FROM {}", self.ident);

        let count = sqlx::query_scalar::<_, i64>(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                VectorError::DatabaseError(format!(
                    "Failed to count rows in '{}': {}",
                    self.table, e
                ))
            })?;

        Ok(count.max(0) as usize)
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}
