//! Ingestion pipeline: change detection, parsing, chunking, batched
//! embedding, and status accounting.
//!
//! One run is idempotent over an unchanged corpus: a document is skipped only
//! when its fingerprint matches the stored row AND the row is EMBEDDED, so
//! failed documents are retried on every run until they succeed. Per-document
//! faults (parse errors, failed embedding batches) mark that document FAILED
//! and never abort the run.

use anyhow::Result;
use std::collections::HashSet;

use crate::chunk::chunk_text;
use crate::config::{ChunkingConfig, IngestionConfig};
use crate::models::{Chunk, DocStatus, DocumentMetadata, IngestionReport};
use crate::parse::{ParseOutcome, ParserProvider};
use crate::store::MetadataStore;
use crate::vector::VectorStore;

pub struct IngestionPipeline {
    metadata: MetadataStore,
    vectors: VectorStore,
    parsers: ParserProvider,
    chunking: ChunkingConfig,
    max_batch_size: usize,
}

impl IngestionPipeline {
    pub fn new(
        metadata: MetadataStore,
        vectors: VectorStore,
        parsers: ParserProvider,
        chunking: ChunkingConfig,
        ingestion: &IngestionConfig,
    ) -> Self {
        Self {
            metadata,
            vectors,
            parsers,
            chunking,
            max_batch_size: ingestion.max_batch_size,
        }
    }

    /// Process one discovery scan's worth of documents.
    pub async fn run(&self, discovered: Vec<DocumentMetadata>) -> Result<IngestionReport> {
        let mut report = IngestionReport {
            discovered: discovered.len(),
            ..Default::default()
        };

        // Stage 1: change detection + parse + chunk. Chunks from all changed
        // documents accumulate into one stream for batching.
        let mut pending: Vec<(String, Vec<Chunk>)> = Vec::new();

        for doc in discovered {
            let existing = self.metadata.get(&doc.locator).await?;
            let unchanged = existing
                .as_ref()
                .map(|e| e.fingerprint == doc.fingerprint && e.status == DocStatus::Embedded)
                .unwrap_or(false);
            if unchanged {
                report.unchanged += 1;
                continue;
            }

            report.processed += 1;
            self.metadata.upsert(&doc).await?;

            let segments = match self.parsers.parse_safe(&doc) {
                ParseOutcome::Success(segments) => segments,
                ParseOutcome::Failure(reason) => {
                    tracing::warn!(locator = %doc.locator, reason = %reason, "parse failed");
                    self.metadata
                        .set_status(&doc.locator, DocStatus::Failed, Some(&reason))
                        .await?;
                    report.failed += 1;
                    continue;
                }
            };

            self.metadata
                .set_status(&doc.locator, DocStatus::Parsed, None)
                .await?;

            let text = segments
                .iter()
                .map(|s| s.text.as_str())
                .collect::<Vec<_>>()
                .join("\n\n");
            let chunks = chunk_text(&doc.locator, &text, &self.chunking);

            // Stale chunks from a previous version or a partial failed run
            // must go before the new ones land.
            self.vectors.clear_document(&doc.locator).await?;

            pending.push((doc.locator, chunks));
        }

        // Stage 2: embed and upsert in batches that fill across document
        // boundaries.
        let all_chunks: Vec<Chunk> = pending
            .iter()
            .flat_map(|(_, chunks)| chunks.iter().cloned())
            .collect();
        let mut failed_docs: HashSet<String> = HashSet::new();

        for batch in split_batches(&all_chunks, self.max_batch_size) {
            report.batches_issued += 1;
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();

            let outcome = match self.vectors.embedder().embed(&texts).await {
                Ok(vectors) => self.vectors.upsert_batch(batch, &vectors).await,
                Err(e) => Err(e),
            };

            match outcome {
                Ok(()) => report.chunks_written += batch.len(),
                Err(e) => {
                    tracing::warn!(error = %e, batch_size = batch.len(), "embedding batch failed");
                    for chunk in batch {
                        failed_docs.insert(chunk.document_locator.clone());
                    }
                }
            }
        }

        // Stage 3: per-document verdicts. A document is EMBEDDED only when
        // every batch containing one of its chunks succeeded.
        for (locator, chunks) in &pending {
            if failed_docs.contains(locator) {
                self.metadata
                    .set_status(locator, DocStatus::Failed, Some("embedding batch failed"))
                    .await?;
                report.failed += 1;
            } else {
                self.metadata
                    .mark_embedded(locator, chunks.len() as i64)
                    .await?;
                report.embedded += 1;
            }
        }

        tracing::info!(
            discovered = report.discovered,
            unchanged = report.unchanged,
            embedded = report.embedded,
            failed = report.failed,
            batches = report.batches_issued,
            "ingestion run complete"
        );

        Ok(report)
    }
}

/// Fixed-size batches over the chunk stream; the last batch may be short.
fn split_batches(chunks: &[Chunk], max_batch_size: usize) -> Vec<&[Chunk]> {
    chunks.chunks(max_batch_size.max(1)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(locator: &str, index: i64) -> Chunk {
        Chunk {
            id: format!("{}:{}", locator, index),
            document_locator: locator.to_string(),
            chunk_index: index,
            text: format!("chunk {}", index),
            hash: "h".to_string(),
        }
    }

    #[test]
    fn batches_fill_across_documents() {
        let mut chunks = Vec::new();
        for doc in 0..5 {
            for i in 0..50 {
                chunks.push(chunk(&format!("/docs/d{}", doc), i));
            }
        }
        // 250 chunks at batch size 100: two full batches and one of 50
        let batches = split_batches(&chunks, 100);
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].len(), 100);
        assert_eq!(batches[1].len(), 100);
        assert_eq!(batches[2].len(), 50);
        // The first batch spans the first two documents
        assert_ne!(
            batches[0].first().map(|c| &c.document_locator),
            batches[0].last().map(|c| &c.document_locator)
        );
    }

    #[test]
    fn empty_stream_yields_no_batches() {
        assert!(split_batches(&[], 100).is_empty());
    }

    #[test]
    fn batch_size_floor_is_one() {
        let chunks = vec![chunk("/docs/a", 0), chunk("/docs/a", 1)];
        assert_eq!(split_batches(&chunks, 0).len(), 2);
    }
}
