//! Durable metadata store for tracked documents.
//!
//! One row per known document, keyed by locator. Rows are created on
//! discovery and mutated only by the ingestion pipeline (single-writer
//! discipline); readers on the chat path see committed state.

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;

use crate::models::{DocStatus, DocumentMetadata};

#[derive(Clone)]
pub struct MetadataStore {
    pool: SqlitePool,
}

impl MetadataStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, locator: &str) -> Result<Option<DocumentMetadata>> {
        let row = sqlx::query(
            "SELECT locator, file_name, extension, size, fingerprint, status, error, chunk_count, last_processed_at
             FROM documents WHERE locator = ?",
        )
        .bind(locator)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(row_to_metadata))
    }

    /// Insert or replace a document record.
    pub async fn upsert(&self, doc: &DocumentMetadata) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (locator, file_name, extension, size, fingerprint, status, error, chunk_count, last_processed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(locator) DO UPDATE SET
                file_name = excluded.file_name,
                extension = excluded.extension,
                size = excluded.size,
                fingerprint = excluded.fingerprint,
                status = excluded.status,
                error = excluded.error,
                chunk_count = excluded.chunk_count,
                last_processed_at = excluded.last_processed_at
            "#,
        )
        .bind(&doc.locator)
        .bind(&doc.file_name)
        .bind(&doc.extension)
        .bind(doc.size)
        .bind(&doc.fingerprint)
        .bind(doc.status.as_str())
        .bind(&doc.error)
        .bind(doc.chunk_count)
        .bind(doc.last_processed_at.map(|t| t.timestamp()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list_all(&self) -> Result<Vec<DocumentMetadata>> {
        let rows = sqlx::query(
            "SELECT locator, file_name, extension, size, fingerprint, status, error, chunk_count, last_processed_at
             FROM documents ORDER BY locator",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(row_to_metadata).collect())
    }

    pub async fn list_by_status(&self, status: DocStatus) -> Result<Vec<DocumentMetadata>> {
        let rows = sqlx::query(
            "SELECT locator, file_name, extension, size, fingerprint, status, error, chunk_count, last_processed_at
             FROM documents WHERE status = ? ORDER BY locator",
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(row_to_metadata).collect())
    }

    pub async fn set_status(
        &self,
        locator: &str,
        status: DocStatus,
        error: Option<&str>,
    ) -> Result<()> {
        sqlx::query("UPDATE documents SET status = ?, error = ? WHERE locator = ?")
            .bind(status.as_str())
            .bind(error)
            .bind(locator)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Record full success for a document: EMBEDDED status, chunk count,
    /// processing timestamp, cleared error.
    pub async fn mark_embedded(&self, locator: &str, chunk_count: i64) -> Result<()> {
        let now = Utc::now().timestamp();
        sqlx::query(
            "UPDATE documents SET status = ?, error = NULL, chunk_count = ?, last_processed_at = ?
             WHERE locator = ?",
        )
        .bind(DocStatus::Embedded.as_str())
        .bind(chunk_count)
        .bind(now)
        .bind(locator)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn status_counts(&self) -> Result<HashMap<DocStatus, i64>> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS n FROM documents GROUP BY status")
            .fetch_all(&self.pool)
            .await?;

        let mut counts = HashMap::new();
        for row in rows {
            let status: String = row.get("status");
            let n: i64 = row.get("n");
            if let Some(status) = DocStatus::parse(&status) {
                counts.insert(status, n);
            }
        }
        Ok(counts)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn row_to_metadata(row: sqlx::sqlite::SqliteRow) -> DocumentMetadata {
    let status: String = row.get("status");
    let last_processed: Option<i64> = row.get("last_processed_at");
    DocumentMetadata {
        locator: row.get("locator"),
        file_name: row.get("file_name"),
        extension: row.get("extension"),
        size: row.get("size"),
        fingerprint: row.get("fingerprint"),
        status: DocStatus::parse(&status).unwrap_or(DocStatus::Discovered),
        error: row.get("error"),
        chunk_count: row.get("chunk_count"),
        last_processed_at: last_processed.and_then(timestamp_to_datetime),
    }
}

fn timestamp_to_datetime(ts: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(ts, 0).single()
}
