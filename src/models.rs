//! Core data models used throughout docchat.
//!
//! These types represent the documents, chunks, and conversation state that
//! flow through the ingestion and chat pipelines.

use chrono::{DateTime, Utc};

/// Processing status of a tracked document.
///
/// A document moves DISCOVERED → PARSED → EMBEDDED on success; any stage may
/// drop it to FAILED, from which the next ingestion run retries it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocStatus {
    Discovered,
    Parsed,
    Embedded,
    Failed,
}

impl DocStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocStatus::Discovered => "discovered",
            DocStatus::Parsed => "parsed",
            DocStatus::Embedded => "embedded",
            DocStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "discovered" => Some(DocStatus::Discovered),
            "parsed" => Some(DocStatus::Parsed),
            "embedded" => Some(DocStatus::Embedded),
            "failed" => Some(DocStatus::Failed),
            _ => None,
        }
    }

    pub fn all() -> [DocStatus; 4] {
        [
            DocStatus::Discovered,
            DocStatus::Parsed,
            DocStatus::Embedded,
            DocStatus::Failed,
        ]
    }
}

/// Durable record of a known document.
///
/// Created on discovery and mutated only by the ingestion pipeline. Rows are
/// never deleted; a changed source file supersedes its row with a new
/// fingerprint.
#[derive(Debug, Clone)]
pub struct DocumentMetadata {
    /// Stable locator (absolute path for local files).
    pub locator: String,
    pub file_name: String,
    pub extension: String,
    pub size: i64,
    /// SHA-256 of the raw file bytes.
    pub fingerprint: String,
    pub status: DocStatus,
    /// Last processing error, if any.
    pub error: Option<String>,
    pub chunk_count: i64,
    pub last_processed_at: Option<DateTime<Utc>>,
}

/// A segment of extracted text produced by a parser (e.g. a page).
#[derive(Debug, Clone)]
pub struct ParsedSegment {
    pub text: String,
}

/// A chunk of a document's extracted text, the unit of embedding.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    /// Back-reference to the owning document's locator.
    pub document_locator: String,
    pub chunk_index: i64,
    pub text: String,
    pub hash: String,
}

/// A similarity-search hit returned by the vector store.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub chunk_id: String,
    pub document_locator: String,
    pub chunk_index: i64,
    pub text: String,
    pub score: f32,
}

/// Summary counters for one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestionReport {
    pub discovered: usize,
    pub unchanged: usize,
    pub processed: usize,
    pub embedded: usize,
    pub failed: usize,
    pub chunks_written: usize,
    pub batches_issued: usize,
}

/// Speaker role within a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One (role, message) entry in a conversation, append-only per session.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}
