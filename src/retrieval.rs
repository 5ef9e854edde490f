//! Retrieval strategies, one per classified intent.
//!
//! [`RetrievalManager`] owns the closed intent-to-strategy dispatch. Each
//! strategy shapes its own retrieval (top-k search, name listing, whole
//! document, or none at all) and builds the answer prompt; the model call is
//! the last step of every strategy.

use anyhow::Result;
use std::collections::HashSet;
use std::sync::Arc;

use crate::config::ChatConfig;
use crate::intent::{IntentClassificationResult, UserIntent};
use crate::llm::LanguageModel;
use crate::models::{ChatTurn, DocStatus, DocumentMetadata, SearchHit};
use crate::prompt;
use crate::store::MetadataStore;
use crate::vector::VectorStore;

/// Failure to pin a summarization request to exactly one document.
#[derive(Debug, thiserror::Error)]
pub enum DocumentResolutionError {
    #[error("no ingested document matches '{0}'")]
    NotFound(String),
    #[error("'{name}' matches more than one document: {candidates:?}")]
    Ambiguous {
        name: String,
        candidates: Vec<String>,
    },
}

/// Match a user-supplied name against ingested documents: exact file name or
/// locator first, then case-insensitive, then substring. Substring matches
/// must be unique.
pub fn resolve_document<'a>(
    docs: &'a [DocumentMetadata],
    name: &str,
) -> Result<&'a DocumentMetadata, DocumentResolutionError> {
    if let Some(doc) = docs
        .iter()
        .find(|d| d.file_name == name || d.locator == name)
    {
        return Ok(doc);
    }

    let needle = name.to_lowercase();
    if let Some(doc) = docs.iter().find(|d| d.file_name.to_lowercase() == needle) {
        return Ok(doc);
    }

    let partial: Vec<&DocumentMetadata> = docs
        .iter()
        .filter(|d| d.file_name.to_lowercase().contains(&needle))
        .collect();
    match partial.len() {
        0 => Err(DocumentResolutionError::NotFound(name.to_string())),
        1 => Ok(partial[0]),
        _ => Err(DocumentResolutionError::Ambiguous {
            name: name.to_string(),
            candidates: partial.iter().map(|d| d.file_name.clone()).collect(),
        }),
    }
}

/// Keep the best-scored hit per document, preserving score order.
fn dedup_by_locator(hits: Vec<SearchHit>) -> Vec<SearchHit> {
    let mut seen: HashSet<String> = HashSet::new();
    hits.into_iter()
        .filter(|hit| seen.insert(hit.document_locator.clone()))
        .collect()
}

pub struct RetrievalManager {
    vectors: VectorStore,
    metadata: MetadataStore,
    model: Arc<dyn LanguageModel>,
    temperature: f32,
    search_k: i64,
    names_k: i64,
}

impl RetrievalManager {
    pub fn new(
        vectors: VectorStore,
        metadata: MetadataStore,
        model: Arc<dyn LanguageModel>,
        chat_config: &ChatConfig,
        temperature: f32,
    ) -> Self {
        Self {
            vectors,
            metadata,
            model,
            temperature,
            search_k: chat_config.search_k,
            names_k: chat_config.names_k,
        }
    }

    /// Run the strategy for an effective intent and produce the answer text.
    ///
    /// `intent` has already passed the confidence gate, so UNKNOWN never
    /// reaches a retrieval strategy; the arm is kept because the enum is the
    /// dispatch key and every variant must route somewhere.
    pub async fn answer(
        &self,
        intent: UserIntent,
        classification: &IntentClassificationResult,
        message: &str,
        history: &[ChatTurn],
    ) -> Result<String> {
        match intent {
            UserIntent::SearchDocuments => {
                self.search_documents(classification, message, history).await
            }
            UserIntent::GetDocumentNames => {
                self.document_names(classification, message, history).await
            }
            UserIntent::SummarizeDocument => {
                self.summarize_document(classification, message, history)
                    .await
            }
            UserIntent::ChatGeneral | UserIntent::Unknown => {
                self.general_chat(message, history).await
            }
        }
    }

    async fn search_documents(
        &self,
        classification: &IntentClassificationResult,
        message: &str,
        history: &[ChatTurn],
    ) -> Result<String> {
        let term = classification
            .parameter("search_term")
            .unwrap_or_else(|| message.to_string());
        let hits = self.vectors.similarity_search(&term, self.search_k, None).await?;
        tracing::debug!(term = %term, hits = hits.len(), "search strategy retrieval");

        let context = prompt::format_hits_with_sources(&hits);
        let prompt = prompt::search_documents_prompt(&context, history, message);
        self.model.complete(&prompt, self.temperature).await
    }

    async fn document_names(
        &self,
        classification: &IntentClassificationResult,
        message: &str,
        history: &[ChatTurn],
    ) -> Result<String> {
        let term = classification
            .parameter("search_term")
            .unwrap_or_else(|| message.to_string());
        let hits = self.vectors.similarity_search(&term, self.names_k, None).await?;
        let hits = dedup_by_locator(hits);
        tracing::debug!(term = %term, documents = hits.len(), "names strategy retrieval");

        let context = prompt::format_hits_with_sources(&hits);
        let prompt = prompt::document_names_prompt(&context, history, message);
        self.model.complete(&prompt, self.temperature).await
    }

    async fn summarize_document(
        &self,
        classification: &IntentClassificationResult,
        message: &str,
        history: &[ChatTurn],
    ) -> Result<String> {
        let target = classification
            .parameter("document_name")
            .or_else(|| classification.parameter("search_term"))
            .unwrap_or_else(|| message.to_string());

        let docs = self.metadata.list_by_status(DocStatus::Embedded).await?;
        let doc = match resolve_document(&docs, &target) {
            Ok(doc) => doc,
            Err(e) => return Ok(self.resolution_reply(&e, &docs)),
        };

        let chunks = self.vectors.chunks_for_document(&doc.locator).await?;
        if chunks.is_empty() {
            return Ok(format!(
                "I found '{}' but it has no indexed content to summarize.",
                doc.file_name
            ));
        }

        let context = prompt::format_document_content(&doc.locator, &chunks);
        let prompt = prompt::summarize_document_prompt(&context, history, message);
        self.model.complete(&prompt, self.temperature).await
    }

    async fn general_chat(&self, message: &str, history: &[ChatTurn]) -> Result<String> {
        let prompt = prompt::general_chat_prompt(history, message);
        self.model.complete(&prompt, self.temperature).await
    }

    /// Deterministic clarifying reply for a failed document lookup; no model
    /// call involved.
    fn resolution_reply(
        &self,
        error: &DocumentResolutionError,
        docs: &[DocumentMetadata],
    ) -> String {
        match error {
            DocumentResolutionError::NotFound(name) => {
                if docs.is_empty() {
                    format!(
                        "I couldn't find a document matching '{}'. No documents have been ingested yet.",
                        name
                    )
                } else {
                    let names = docs
                        .iter()
                        .map(|d| d.file_name.as_str())
                        .collect::<Vec<_>>()
                        .join(", ");
                    format!(
                        "I couldn't find a document matching '{}'. Available documents: {}",
                        name, names
                    )
                }
            }
            DocumentResolutionError::Ambiguous { name, candidates } => format!(
                "'{}' matches several documents: {}. Which one would you like summarized?",
                name,
                candidates.join(", ")
            ),
        }
    }
}
