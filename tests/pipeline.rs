//! Ingestion pipeline behavior: idempotence, change detection, fault
//! isolation, retry of failed documents, and batch accounting.

mod common;

use std::sync::Arc;

use common::{documents_config, setup_env, StubEmbedder, TestEnv};
use docchat::config::{ChunkingConfig, IngestionConfig};
use docchat::discover;
use docchat::ingest::IngestionPipeline;
use docchat::models::{DocStatus, DocumentMetadata, IngestionReport};
use docchat::parse::ParserProvider;

fn make_pipeline(
    env: &TestEnv,
    embedder: Arc<StubEmbedder>,
    max_batch_size: usize,
    chunking: ChunkingConfig,
) -> IngestionPipeline {
    IngestionPipeline::new(
        env.metadata.clone(),
        env.vector_store(embedder),
        ParserProvider::from_enabled(&["text".to_string()]),
        chunking,
        &IngestionConfig { max_batch_size },
    )
}

fn scan(env: &TestEnv) -> Vec<DocumentMetadata> {
    let parsers = ParserProvider::from_enabled(&["text".to_string()]);
    discover::scan_documents(&documents_config(&env.docs_dir), &parsers.supported_extensions())
        .unwrap()
}

async fn run(pipeline: &IngestionPipeline, env: &TestEnv) -> IngestionReport {
    pipeline.run(scan(env)).await.unwrap()
}

#[tokio::test]
async fn second_run_over_unchanged_corpus_is_a_noop() {
    let env = setup_env().await;
    env.write_doc("alpha.txt", "Alpha document about Rust programming.");
    env.write_doc("beta.txt", "Beta document about Python and machine learning.");
    env.write_doc("gamma.md", "Gamma notes on deployment and infrastructure.");

    let embedder = StubEmbedder::new(8);
    let pipeline = make_pipeline(&env, embedder.clone(), 100, ChunkingConfig::default());

    let first = run(&pipeline, &env).await;
    assert_eq!(first.discovered, 3);
    assert_eq!(first.embedded, 3);
    assert_eq!(first.failed, 0);

    let second = run(&pipeline, &env).await;
    assert_eq!(second.discovered, 3);
    assert_eq!(second.unchanged, 3);
    assert_eq!(second.processed, 0);
    assert_eq!(second.batches_issued, 0);

    // No duplicate chunks were written
    let store = env.vector_store(embedder);
    assert_eq!(store.chunk_count().await.unwrap(), 3);
}

#[tokio::test]
async fn changed_document_is_reprocessed_and_replaced() {
    let env = setup_env().await;
    let path = env.write_doc("report.txt", "Original report contents.");
    env.write_doc("notes.txt", "Unrelated notes.");

    let embedder = StubEmbedder::new(8);
    let pipeline = make_pipeline(&env, embedder.clone(), 100, ChunkingConfig::default());
    run(&pipeline, &env).await;

    std::fs::write(&path, "Updated report contents with new findings.").unwrap();

    let report = run(&pipeline, &env).await;
    assert_eq!(report.unchanged, 1);
    assert_eq!(report.processed, 1);
    assert_eq!(report.embedded, 1);

    let store = env.vector_store(embedder);
    let locator = path.to_string_lossy().to_string();
    let chunks = store.chunks_for_document(&locator).await.unwrap();
    assert_eq!(chunks.len(), 1);
    assert!(chunks[0].text.contains("new findings"));

    let doc = env.metadata.get(&locator).await.unwrap().unwrap();
    assert_eq!(doc.status, DocStatus::Embedded);
    assert!(doc.last_processed_at.is_some());
}

#[tokio::test]
async fn parse_failure_marks_one_document_without_aborting_the_run() {
    let env = setup_env().await;
    env.write_doc("good-one.txt", "Readable content.");
    // Invalid UTF-8 makes the text parser fail for this file only
    let bad = env.write_doc_bytes("broken.txt", &[0xff, 0xfe, 0x00, 0x80]);
    env.write_doc("good-two.txt", "More readable content.");

    let embedder = StubEmbedder::new(8);
    let pipeline = make_pipeline(&env, embedder, 100, ChunkingConfig::default());

    let report = run(&pipeline, &env).await;
    assert_eq!(report.discovered, 3);
    assert_eq!(report.embedded, 2);
    assert_eq!(report.failed, 1);

    let doc = env
        .metadata
        .get(&bad.to_string_lossy())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc.status, DocStatus::Failed);
    assert!(doc.error.is_some());
}

#[tokio::test]
async fn failed_document_is_retried_on_the_next_run() {
    let env = setup_env().await;
    let bad = env.write_doc_bytes("flaky.txt", &[0xff, 0xfe]);

    let embedder = StubEmbedder::new(8);
    let pipeline = make_pipeline(&env, embedder, 100, ChunkingConfig::default());

    let first = run(&pipeline, &env).await;
    assert_eq!(first.failed, 1);

    // Unchanged but FAILED: not skipped on the next run
    let second = run(&pipeline, &env).await;
    assert_eq!(second.unchanged, 0);
    assert_eq!(second.processed, 1);
    assert_eq!(second.failed, 1);

    // Once the file is fixed it converges to EMBEDDED
    std::fs::write(&bad, "Now readable.").unwrap();
    let third = run(&pipeline, &env).await;
    assert_eq!(third.embedded, 1);

    let doc = env
        .metadata
        .get(&bad.to_string_lossy())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc.status, DocStatus::Embedded);
    assert!(doc.error.is_none());
}

#[tokio::test]
async fn chunk_stream_batches_fill_across_documents() {
    let env = setup_env().await;
    // Each 30-char paragraph becomes its own chunk at max_chars 40; five
    // documents of 50 paragraphs give a 250-chunk stream.
    let paragraph = "p".repeat(30);
    let body = vec![paragraph; 50].join("\n\n");
    for i in 0..5 {
        env.write_doc(&format!("doc{}.txt", i), &body);
    }

    let embedder = StubEmbedder::new(8);
    let chunking = ChunkingConfig {
        max_chars: 40,
        overlap_chars: 0,
    };
    let pipeline = make_pipeline(&env, embedder.clone(), 100, chunking);

    let report = run(&pipeline, &env).await;
    assert_eq!(report.chunks_written, 250);
    assert_eq!(report.batches_issued, 3);
    assert_eq!(*embedder.batch_sizes.lock().unwrap(), vec![100, 100, 50]);
}

#[tokio::test]
async fn failed_batch_fails_its_documents_but_later_batches_proceed() {
    let env = setup_env().await;
    let paragraph = "q".repeat(30);
    let body = vec![paragraph; 2].join("\n\n");
    let first_doc = env.write_doc("a-first.txt", &body);
    let second_doc = env.write_doc("b-second.txt", &body);

    let embedder = StubEmbedder::new(8);
    embedder.fail_call(0);
    let chunking = ChunkingConfig {
        max_chars: 40,
        overlap_chars: 0,
    };
    // Batch size 2: one batch per document
    let pipeline = make_pipeline(&env, embedder.clone(), 2, chunking.clone());

    let report = run(&pipeline, &env).await;
    assert_eq!(report.batches_issued, 2);
    assert_eq!(report.embedded, 1);
    assert_eq!(report.failed, 1);

    let failed = env
        .metadata
        .get(&first_doc.to_string_lossy())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(failed.status, DocStatus::Failed);
    let ok = env
        .metadata
        .get(&second_doc.to_string_lossy())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ok.status, DocStatus::Embedded);

    // Next run retries only the failed document and converges
    embedder.clear_failures();
    let retry = run(&pipeline, &env).await;
    assert_eq!(retry.unchanged, 1);
    assert_eq!(retry.embedded, 1);

    let store = env.vector_store(embedder);
    assert_eq!(store.chunk_count().await.unwrap(), 4);
}

#[tokio::test]
async fn status_counts_reflect_the_lifecycle() {
    let env = setup_env().await;
    env.write_doc("ok.txt", "Fine.");
    env.write_doc_bytes("bad.txt", &[0xff]);

    let embedder = StubEmbedder::new(8);
    let pipeline = make_pipeline(&env, embedder, 100, ChunkingConfig::default());
    run(&pipeline, &env).await;

    let counts = env.metadata.status_counts().await.unwrap();
    assert_eq!(counts.get(&DocStatus::Embedded), Some(&1));
    assert_eq!(counts.get(&DocStatus::Failed), Some(&1));
}
