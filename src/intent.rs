//! User-intent classification.
//!
//! [`IntentClassifier`] builds a deterministic prompt from the message and a
//! recent-history window, asks the classification model for structured JSON,
//! and coerces anything unparseable or out-of-enum to UNKNOWN. The confidence
//! gate is the separate pure function [`resolve_effective_intent`]; it never
//! mutates the raw classification record.

use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::llm::LanguageModel;
use crate::models::ChatTurn;
use crate::prompt;

/// Closed set of user intents. Every retrieval strategy key is drawn from
/// this set; UNKNOWN routes to the general-chat strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserIntent {
    SearchDocuments,
    GetDocumentNames,
    SummarizeDocument,
    ChatGeneral,
    Unknown,
}

impl UserIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserIntent::SearchDocuments => "search_documents",
            UserIntent::GetDocumentNames => "get_document_names",
            UserIntent::SummarizeDocument => "summarize_document",
            UserIntent::ChatGeneral => "chat_general",
            UserIntent::Unknown => "unknown",
        }
    }

    /// Map an intent string to the enum; anything unrecognized is UNKNOWN.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "search_documents" => UserIntent::SearchDocuments,
            "get_document_names" => UserIntent::GetDocumentNames,
            "summarize_document" => UserIntent::SummarizeDocument,
            "chat_general" => UserIntent::ChatGeneral,
            _ => UserIntent::Unknown,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            UserIntent::SearchDocuments => {
                "Search document content to answer a question about the corpus"
            }
            UserIntent::GetDocumentNames => {
                "List which documents contain information about a topic"
            }
            UserIntent::SummarizeDocument => "Summarize one named document",
            UserIntent::ChatGeneral => "General conversation not tied to the documents",
            UserIntent::Unknown => "Could not be determined",
        }
    }

    /// Intents the classifier may choose between (UNKNOWN excluded).
    pub fn classifiable() -> [UserIntent; 4] {
        [
            UserIntent::SearchDocuments,
            UserIntent::GetDocumentNames,
            UserIntent::SummarizeDocument,
            UserIntent::ChatGeneral,
        ]
    }
}

/// Raw classification output for one turn. Produced fresh per turn; never
/// persisted. `reasoning` is diagnostic only and never drives control flow.
#[derive(Debug, Clone, Deserialize)]
pub struct IntentClassificationResult {
    pub intent: String,
    #[serde(default)]
    pub parameters: HashMap<String, serde_json::Value>,
    pub confidence: f32,
    #[serde(default)]
    pub reasoning: String,
}

impl IntentClassificationResult {
    /// Extracted slot value as a string, if present and non-empty.
    pub fn parameter(&self, name: &str) -> Option<String> {
        self.parameters
            .get(name)
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }
}

/// Pure confidence gate: below the threshold the effective intent is forced
/// to CHAT_GENERAL regardless of the classifier's raw output.
pub fn resolve_effective_intent(
    result: &IntentClassificationResult,
    threshold: f32,
) -> UserIntent {
    if result.confidence >= threshold {
        let intent = UserIntent::parse(&result.intent);
        if intent == UserIntent::Unknown {
            UserIntent::ChatGeneral
        } else {
            intent
        }
    } else {
        UserIntent::ChatGeneral
    }
}

pub struct IntentClassifier {
    model: Arc<dyn LanguageModel>,
    confidence_threshold: f32,
    history_window: usize,
    temperature: f32,
}

impl IntentClassifier {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        confidence_threshold: f32,
        history_window: usize,
        temperature: f32,
    ) -> Self {
        Self {
            model,
            confidence_threshold,
            history_window,
            temperature,
        }
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.confidence_threshold
    }

    /// Classify a user message. Never fails: a model error or unparseable
    /// output becomes an UNKNOWN result with confidence 0.0.
    pub async fn classify_intent(
        &self,
        message: &str,
        chat_history: &[ChatTurn],
    ) -> IntentClassificationResult {
        if message.trim().is_empty() {
            return IntentClassificationResult {
                intent: UserIntent::ChatGeneral.as_str().to_string(),
                parameters: HashMap::new(),
                confidence: 1.0,
                reasoning: "Empty message received".to_string(),
            };
        }

        let recent = tail_window(chat_history, self.history_window);
        let prompt = prompt::classification_prompt(message, recent);

        match self.model.complete(&prompt, self.temperature).await {
            Ok(output) => match parse_classification(&output) {
                Some(result) => {
                    tracing::debug!(
                        intent = %result.intent,
                        confidence = result.confidence,
                        "intent classified"
                    );
                    result
                }
                None => {
                    tracing::warn!(output = %truncate(&output, 200), "unparseable classification output");
                    unknown_result("Classification output could not be parsed")
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "intent classification call failed");
                unknown_result(&format!("Intent classification failed: {}", e))
            }
        }
    }

    pub fn is_high_confidence(&self, result: &IntentClassificationResult) -> bool {
        result.confidence >= self.confidence_threshold
    }

    /// String intent to enum; never raises on out-of-enum values.
    pub fn get_intent_enum(&self, result: &IntentClassificationResult) -> UserIntent {
        UserIntent::parse(&result.intent)
    }
}

fn unknown_result(reasoning: &str) -> IntentClassificationResult {
    IntentClassificationResult {
        intent: UserIntent::Unknown.as_str().to_string(),
        parameters: HashMap::new(),
        confidence: 0.0,
        reasoning: reasoning.to_string(),
    }
}

/// Parse the model's structured output, tolerating markdown code fences and
/// surrounding prose.
pub fn parse_classification(output: &str) -> Option<IntentClassificationResult> {
    let candidate = extract_json_object(output)?;
    let mut result: IntentClassificationResult = serde_json::from_str(candidate).ok()?;
    result.confidence = result.confidence.clamp(0.0, 1.0);
    Some(result)
}

/// Slice out the first top-level `{ ... }` object in the text.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

pub(crate) fn tail_window(history: &[ChatTurn], turns: usize) -> &[ChatTurn] {
    // One turn is a user/assistant pair
    let entries = turns * 2;
    let start = history.len().saturating_sub(entries);
    &history[start..]
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(intent: &str, confidence: f32) -> IntentClassificationResult {
        IntentClassificationResult {
            intent: intent.to_string(),
            parameters: HashMap::new(),
            confidence,
            reasoning: String::new(),
        }
    }

    #[test]
    fn parse_known_intents() {
        assert_eq!(
            UserIntent::parse("search_documents"),
            UserIntent::SearchDocuments
        );
        assert_eq!(UserIntent::parse(" Chat_General "), UserIntent::ChatGeneral);
    }

    #[test]
    fn out_of_enum_intent_is_unknown() {
        assert_eq!(UserIntent::parse("delete_documents"), UserIntent::Unknown);
        assert_eq!(UserIntent::parse(""), UserIntent::Unknown);
    }

    #[test]
    fn confidence_boundary_at_threshold() {
        let below = result("search_documents", 0.69);
        let at = result("search_documents", 0.70);
        assert_eq!(
            resolve_effective_intent(&below, 0.7),
            UserIntent::ChatGeneral
        );
        assert_eq!(
            resolve_effective_intent(&at, 0.7),
            UserIntent::SearchDocuments
        );
    }

    #[test]
    fn unknown_intent_resolves_to_general_even_when_confident() {
        let confident_garbage = result("reticulate_splines", 0.99);
        assert_eq!(
            resolve_effective_intent(&confident_garbage, 0.7),
            UserIntent::ChatGeneral
        );
    }

    #[test]
    fn parse_plain_json() {
        let output = r#"{"intent": "search_documents", "parameters": {"search_term": "visas"}, "confidence": 0.89, "reasoning": "asks about document content"}"#;
        let parsed = parse_classification(output).unwrap();
        assert_eq!(parsed.intent, "search_documents");
        assert_eq!(parsed.parameter("search_term").as_deref(), Some("visas"));
        assert!((parsed.confidence - 0.89).abs() < 1e-6);
    }

    #[test]
    fn parse_fenced_json() {
        let output = "Here you go:\n```json\n{\"intent\": \"chat_general\", \"confidence\": 0.95}\n```";
        let parsed = parse_classification(output).unwrap();
        assert_eq!(parsed.intent, "chat_general");
    }

    #[test]
    fn parse_garbage_returns_none() {
        assert!(parse_classification("no json here").is_none());
        assert!(parse_classification("{broken").is_none());
    }

    #[test]
    fn confidence_clamped() {
        let output = r#"{"intent": "chat_general", "confidence": 3.5}"#;
        let parsed = parse_classification(output).unwrap();
        assert_eq!(parsed.confidence, 1.0);
    }

    #[test]
    fn tail_window_takes_last_pairs() {
        let history: Vec<ChatTurn> = (0..10)
            .map(|i| ChatTurn {
                role: if i % 2 == 0 {
                    crate::models::Role::User
                } else {
                    crate::models::Role::Assistant
                },
                content: format!("m{}", i),
            })
            .collect();
        let window = tail_window(&history, 2);
        assert_eq!(window.len(), 4);
        assert_eq!(window[0].content, "m6");
    }
}
