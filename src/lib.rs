//! # docchat
//!
//! A local-first document question-answering pipeline.
//!
//! docchat ingests a folder of documents (text, PDF, DOCX), chunks and embeds
//! them into SQLite, and answers questions about them through an
//! intent-classified chat loop: each message is classified into a closed set
//! of intents and routed to a retrieval strategy (semantic search, document
//! listing, whole-document summarization, or plain conversation).
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────────┐   ┌──────────┐
//! │ Discovery  │──▶│  Pipeline     │──▶│  SQLite   │
//! │ scan+hash │   │ Parse+Chunk  │   │ meta+vec │
//! └───────────┘   │   +Embed     │   └────┬─────┘
//!                 └──────────────┘        │
//!                                         ▼
//!                 ┌──────────────┐   ┌──────────┐
//!                 │  Classifier   │──▶│ Retrieval │
//!                 │ intent+gate  │   │ strategy │
//!                 └──────────────┘   └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docchat init                  # create database
//! docchat ingest                # scan, parse, embed documents
//! docchat status                # per-status document counts
//! docchat chat                  # interactive question answering
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`models`] | Core data types |
//! | [`discover`] | Document discovery and fingerprinting |
//! | [`parse`] | Format parsers behind a non-throwing boundary |
//! | [`chunk`] | Text chunking with overlap |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`llm`] | Chat/classification model abstraction |
//! | [`ingest`] | The ingestion pipeline |
//! | [`intent`] | Intent classification and the confidence gate |
//! | [`prompt`] | Deterministic prompt construction |
//! | [`retrieval`] | Per-intent retrieval strategies |
//! | [`chat`] | Chat turn orchestration |
//! | [`store`] | Document metadata store |
//! | [`vector`] | SQLite-backed vector index |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod chat;
pub mod chunk;
pub mod config;
pub mod db;
pub mod discover;
pub mod embedding;
pub mod ingest;
pub mod intent;
pub mod llm;
pub mod migrate;
pub mod models;
pub mod parse;
pub mod prompt;
pub mod retrieval;
pub mod store;
pub mod vector;
