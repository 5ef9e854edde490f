//! SQLite-backed vector index.
//!
//! Chunks and their embedding vectors live in the same database as the
//! metadata store. Vectors are little-endian f32 BLOBs; similarity search
//! embeds the query and ranks candidates by cosine similarity in-process.
//!
//! Batch upserts are transactional: a failed batch leaves no partial rows,
//! so the pipeline can mark the affected documents FAILED and retry cleanly.

use anyhow::Result;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob, Embedder};
use crate::models::{Chunk, SearchHit};

#[derive(Clone)]
pub struct VectorStore {
    pool: SqlitePool,
    embedder: Arc<dyn Embedder>,
}

impl VectorStore {
    pub fn new(pool: SqlitePool, embedder: Arc<dyn Embedder>) -> Self {
        Self { pool, embedder }
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Remove all chunks and vectors for a document. Run before re-ingesting
    /// a changed or retried document.
    pub async fn clear_document(&self, locator: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM embeddings WHERE document_locator = ?")
            .bind(locator)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM chunks WHERE document_locator = ?")
            .bind(locator)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Write one batch of chunks and their vectors atomically.
    pub async fn upsert_batch(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()> {
        anyhow::ensure!(
            chunks.len() == vectors.len(),
            "batch size mismatch: {} chunks, {} vectors",
            chunks.len(),
            vectors.len()
        );

        let model = self.embedder.model_name().to_string();
        let dims = self.embedder.dims() as i64;

        let mut tx = self.pool.begin().await?;

        for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
            sqlx::query(
                "INSERT INTO chunks (id, document_locator, chunk_index, text, hash) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&chunk.id)
            .bind(&chunk.document_locator)
            .bind(chunk.chunk_index)
            .bind(&chunk.text)
            .bind(&chunk.hash)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                "INSERT INTO embeddings (chunk_id, document_locator, model, dims, vector) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&chunk.id)
            .bind(&chunk.document_locator)
            .bind(&model)
            .bind(dims)
            .bind(vec_to_blob(vector))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Top-k chunks by cosine similarity to the query, optionally restricted
    /// to a single document.
    pub async fn similarity_search(
        &self,
        query: &str,
        k: i64,
        filter_locator: Option<&str>,
    ) -> Result<Vec<SearchHit>> {
        let query_vec = self
            .embedder
            .embed(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))?;

        let rows = match filter_locator {
            Some(locator) => {
                sqlx::query(
                    "SELECT c.id, c.document_locator, c.chunk_index, c.text, e.vector
                     FROM chunks c JOIN embeddings e ON e.chunk_id = c.id
                     WHERE c.document_locator = ?",
                )
                .bind(locator)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT c.id, c.document_locator, c.chunk_index, c.text, e.vector
                     FROM chunks c JOIN embeddings e ON e.chunk_id = c.id",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut hits: Vec<SearchHit> = rows
            .into_iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("vector");
                let score = cosine_similarity(&query_vec, &blob_to_vec(&blob));
                SearchHit {
                    chunk_id: row.get("id"),
                    document_locator: row.get("document_locator"),
                    chunk_index: row.get("chunk_index"),
                    text: row.get("text"),
                    score,
                }
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k.max(0) as usize);

        Ok(hits)
    }

    /// All chunks of a document in `chunk_index` order.
    pub async fn chunks_for_document(&self, locator: &str) -> Result<Vec<Chunk>> {
        let rows = sqlx::query(
            "SELECT id, document_locator, chunk_index, text, hash
             FROM chunks WHERE document_locator = ? ORDER BY chunk_index",
        )
        .bind(locator)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| Chunk {
                id: row.get("id"),
                document_locator: row.get("document_locator"),
                chunk_index: row.get("chunk_index"),
                text: row.get("text"),
                hash: row.get("hash"),
            })
            .collect())
    }

    /// Count of stored chunks, across all documents.
    pub async fn chunk_count(&self) -> Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }
}
