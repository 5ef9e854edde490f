//! Deterministic prompt construction.
//!
//! All prompts are built with plain string formatting from (message, history,
//! retrieved context); the only non-determinism in the chat pipeline is the
//! model call itself.

use std::collections::HashMap;

use crate::intent::UserIntent;
use crate::models::{ChatTurn, Chunk, SearchHit};

/// Few-shot example for the classification prompt.
struct IntentExample {
    query: &'static str,
    intent: UserIntent,
    parameters: &'static str,
    confidence: f32,
}

const INTENT_EXAMPLES: &[IntentExample] = &[
    IntentExample {
        query: "What is the main topic of document.pdf?",
        intent: UserIntent::SummarizeDocument,
        parameters: r#"{"document_name": "document.pdf"}"#,
        confidence: 1.0,
    },
    IntentExample {
        query: "Which documents mention artificial intelligence?",
        intent: UserIntent::GetDocumentNames,
        parameters: r#"{"search_term": "artificial intelligence"}"#,
        confidence: 1.0,
    },
    IntentExample {
        query: "How does machine learning work according to the documents?",
        intent: UserIntent::SearchDocuments,
        parameters: r#"{"search_term": "machine learning"}"#,
        confidence: 1.0,
    },
    IntentExample {
        query: "What are the key findings about neural networks?",
        intent: UserIntent::SearchDocuments,
        parameters: r#"{"search_term": "neural networks"}"#,
        confidence: 1.0,
    },
    IntentExample {
        query: "Can you summarize the research paper on transformers?",
        intent: UserIntent::SummarizeDocument,
        parameters: r#"{"search_term": "transformers", "document_type": "research paper"}"#,
        confidence: 1.0,
    },
    IntentExample {
        query: "Hello, how are you?",
        intent: UserIntent::ChatGeneral,
        parameters: "{}",
        confidence: 1.0,
    },
];

pub fn classification_prompt(message: &str, history: &[ChatTurn]) -> String {
    let intent_types = UserIntent::classifiable()
        .iter()
        .map(|i| format!("- {}: {}", i.as_str(), i.description()))
        .collect::<Vec<_>>()
        .join("\n");

    let examples = INTENT_EXAMPLES
        .iter()
        .map(|e| {
            format!(
                "query: {}\nintent: {}\nparameters: {}\nconfidence: {}",
                e.query,
                e.intent.as_str(),
                e.parameters,
                e.confidence
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "You are an intent classifier for a document search and retrieval system.\n\
         Your job is to analyze user queries and determine what they want to do.\n\n\
         Available intent types:\n{intent_types}\n\n\
         Examples:\n{examples}\n\n\
         Instructions:\n\
         1. Analyze the user query carefully\n\
         2. Determine the most appropriate intent\n\
         3. Extract relevant parameters (search terms, document names, etc.)\n\
         4. Provide a confidence score (0.0-1.0)\n\
         5. Give a brief reasoning for your classification\n\n\
         Respond with a single JSON object and nothing else:\n\
         {{\"intent\": \"<intent type>\", \"parameters\": {{...}}, \"confidence\": <0.0-1.0>, \"reasoning\": \"<brief explanation>\"}}\n\n\
         {history}\n\
         User Query: {message}",
        intent_types = intent_types,
        examples = examples,
        history = format_chat_history(history),
        message = message,
    )
}

pub fn search_documents_prompt(context: &str, history: &[ChatTurn], message: &str) -> String {
    format!(
        "You are a helpful assistant that searches through documents to answer questions.\n\
         Use the following pieces of context to answer the user's question accurately.\n\n\
         IMPORTANT RULES:\n\
         - Only use information from the provided context\n\
         - If the answer cannot be found in the context, say \"I don't have enough information to answer that question\"\n\
         - Be specific and cite relevant details from the context\n\
         - Present each document only once, even if multiple sections are relevant\n\
         - CRITICAL: You MUST always end your answer with \"Sources: [filename1, filename2, ...]\"\n\n\
         Context from documents (each section shows source):\n{context}\n\n\
         Previous conversation:\n{history}\n\n\
         Current question: {message}\n\n\
         Answer based on the context above and ALWAYS end with sources list:",
        context = context,
        history = format_chat_history(history),
        message = message,
    )
}

pub fn document_names_prompt(context: &str, history: &[ChatTurn], message: &str) -> String {
    format!(
        "You are a document finder assistant.\n\
         Your job is to identify which documents contain information relevant to the user's query.\n\n\
         Based on the search results below, list the document names/sources that contain relevant information.\n\n\
         IMPORTANT RULES:\n\
         - Focus on document names, file paths, and sources\n\
         - Briefly explain what type of information each document contains\n\
         - If no relevant documents are found, say so clearly\n\
         - Present each document only once, even if multiple sections are relevant\n\n\
         Search results from documents:\n{context}\n\n\
         Previous conversation:\n{history}\n\n\
         User is looking for documents about: {message}\n\n\
         Documents that contain relevant information:",
        context = context,
        history = format_chat_history(history),
        message = message,
    )
}

pub fn summarize_document_prompt(context: &str, history: &[ChatTurn], message: &str) -> String {
    format!(
        "You are a document summarization assistant. Create a comprehensive summary of the provided document content.\n\n\
         IMPORTANT RULES:\n\
         - Create a well-structured summary with key points\n\
         - Include main topics, important details, and conclusions\n\
         - Maintain the logical flow of information\n\
         - If the content is incomplete, mention what sections are covered\n\
         - Use bullet points or sections for better readability\n\
         - CRITICAL: You MUST always end your summary with \"Sources: [filename1, filename2, ...]\"\n\n\
         Document content to summarize:\n{context}\n\n\
         Previous conversation:\n{history}\n\n\
         Summarization request: {message}\n\n\
         Document Summary (remember to end with sources):",
        context = context,
        history = format_chat_history(history),
        message = message,
    )
}

pub fn general_chat_prompt(history: &[ChatTurn], message: &str) -> String {
    format!(
        "You are a helpful assistant for a document question-answering system.\n\
         The user is having a general conversation that may not be directly related to document search.\n\
         Focus on being helpful and conversational.\n\n\
         Previous conversation:\n{history}\n\n\
         User message: {message}\n\n\
         Response:",
        history = format_chat_history(history),
        message = message,
    )
}

pub fn format_chat_history(history: &[ChatTurn]) -> String {
    if history.is_empty() {
        return "(no previous conversation)".to_string();
    }
    history
        .iter()
        .map(|turn| {
            let label = match turn.role {
                crate::models::Role::User => "User",
                crate::models::Role::Assistant => "Assistant",
            };
            format!("{}: {}", label, turn.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format search hits grouped by source document so each document appears
/// once, with section breaks between multiple chunks of the same document.
pub fn format_hits_with_sources(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return "No relevant documents found.".to_string();
    }

    // Preserve first-seen (score) order of the documents
    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<&str>> = HashMap::new();
    for hit in hits {
        let entry = groups.entry(hit.document_locator.as_str()).or_default();
        if entry.is_empty() {
            order.push(hit.document_locator.as_str());
        }
        entry.push(hit.text.as_str());
    }

    order
        .iter()
        .map(|locator| {
            let contents = &groups[locator];
            if contents.len() == 1 {
                format!("[Source: {}]\n{}\n", locator, contents[0])
            } else {
                format!(
                    "[Source: {}]\n{}\n",
                    locator,
                    contents.join("\n\n--- Section Break ---\n\n")
                )
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Concatenate a document's chunks in index order under one source header.
pub fn format_document_content(locator: &str, chunks: &[Chunk]) -> String {
    let body = chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    format!("[Source: {}]\n{}\n", locator, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    #[test]
    fn classification_prompt_is_deterministic() {
        let history = vec![ChatTurn {
            role: Role::User,
            content: "hi".to_string(),
        }];
        let a = classification_prompt("What about visas?", &history);
        let b = classification_prompt("What about visas?", &history);
        assert_eq!(a, b);
        assert!(a.contains("search_documents"));
        assert!(a.contains("User Query: What about visas?"));
    }

    #[test]
    fn hits_grouped_by_source() {
        let hit = |locator: &str, text: &str| SearchHit {
            chunk_id: "c".to_string(),
            document_locator: locator.to_string(),
            chunk_index: 0,
            text: text.to_string(),
            score: 0.5,
        };
        let hits = vec![hit("a.txt", "one"), hit("b.txt", "two"), hit("a.txt", "three")];
        let formatted = format_hits_with_sources(&hits);
        assert_eq!(formatted.matches("[Source: a.txt]").count(), 1);
        assert!(formatted.contains("--- Section Break ---"));
        assert!(formatted.contains("[Source: b.txt]"));
    }

    #[test]
    fn empty_hits_message() {
        assert_eq!(format_hits_with_sources(&[]), "No relevant documents found.");
    }

    #[test]
    fn empty_history_placeholder() {
        assert_eq!(format_chat_history(&[]), "(no previous conversation)");
    }
}
