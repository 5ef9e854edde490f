use anyhow::Result;
use sqlx::SqlitePool;

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Metadata store: one row per known document, keyed by locator.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            locator TEXT PRIMARY KEY,
            file_name TEXT NOT NULL,
            extension TEXT NOT NULL,
            size INTEGER NOT NULL,
            fingerprint TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'discovered',
            error TEXT,
            chunk_count INTEGER NOT NULL DEFAULT 0,
            last_processed_at INTEGER
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            id TEXT PRIMARY KEY,
            document_locator TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            text TEXT NOT NULL,
            hash TEXT NOT NULL,
            UNIQUE(document_locator, chunk_index),
            FOREIGN KEY (document_locator) REFERENCES documents(locator)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Embedding vectors stored as little-endian f32 BLOBs.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS embeddings (
            chunk_id TEXT PRIMARY KEY,
            document_locator TEXT NOT NULL,
            model TEXT NOT NULL,
            dims INTEGER NOT NULL,
            vector BLOB NOT NULL,
            FOREIGN KEY (chunk_id) REFERENCES chunks(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_chunks_document_locator ON chunks(document_locator)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_status ON documents(status)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_embeddings_document_locator ON embeddings(document_locator)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
