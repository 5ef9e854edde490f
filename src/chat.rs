//! Chat orchestration: classify, gate, route, answer.
//!
//! [`ChatOrchestrator`] drives one turn through its states: the message is
//! received, classified, routed (confidently or via the low-confidence
//! fallback), and answered. History is appended only once a turn reaches
//! ANSWERED; a provider failure yields an apology and leaves history
//! untouched, so a broken turn cannot pollute later classifications.

use std::collections::HashMap;

use crate::intent::{resolve_effective_intent, IntentClassifier, UserIntent};
use crate::models::{ChatTurn, Role};
use crate::retrieval::RetrievalManager;

const APOLOGY: &str =
    "I'm sorry, I ran into a problem while answering. Please try again in a moment.";

/// Lifecycle of a single chat turn, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TurnState {
    Received,
    Classifying,
    RoutedConfident,
    RoutedFallback,
    Answered,
}

/// Everything produced for one answered turn. `intent`, `confidence`,
/// `reasoning`, and `parameters` echo the raw classification;
/// `routed_intent` is the effective intent after the confidence gate.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub answer: String,
    pub intent: String,
    pub confidence: f32,
    pub reasoning: String,
    pub parameters: HashMap<String, serde_json::Value>,
    pub routed_intent: UserIntent,
}

pub struct ChatOrchestrator {
    classifier: IntentClassifier,
    retrieval: RetrievalManager,
    history: Vec<ChatTurn>,
    history_window: usize,
}

impl ChatOrchestrator {
    pub fn new(
        classifier: IntentClassifier,
        retrieval: RetrievalManager,
        history_window: usize,
    ) -> Self {
        Self {
            classifier,
            retrieval,
            history: Vec::new(),
            history_window,
        }
    }

    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    /// Handle one user message. Never fails: any provider error becomes an
    /// apology answer, routed as CHAT_GENERAL with zero confidence recorded.
    pub async fn handle_message(&mut self, message: &str) -> ChatResponse {
        let mut state = TurnState::Received;
        tracing::debug!(?state, "turn started");

        state = TurnState::Classifying;
        tracing::debug!(?state, "classifying");
        let classification = self.classifier.classify_intent(message, &self.history).await;

        let threshold = self.classifier.confidence_threshold();
        let routed = resolve_effective_intent(&classification, threshold);
        let raw = self.classifier.get_intent_enum(&classification);

        if classification.confidence < threshold || raw == UserIntent::Unknown {
            state = TurnState::RoutedFallback;
            tracing::warn!(
                ?state,
                raw_intent = %classification.intent,
                confidence = classification.confidence,
                threshold,
                "low-confidence or unknown intent; routing to general chat"
            );
        } else {
            state = TurnState::RoutedConfident;
            tracing::debug!(?state, intent = routed.as_str(), "intent routed");
        }

        let recent = crate::intent::tail_window(&self.history, self.history_window);
        let answer = match self
            .retrieval
            .answer(routed, &classification, message, recent)
            .await
        {
            Ok(answer) => answer,
            Err(e) => {
                tracing::error!(error = %e, intent = routed.as_str(), "answer generation failed");
                return ChatResponse {
                    answer: APOLOGY.to_string(),
                    intent: UserIntent::Unknown.as_str().to_string(),
                    confidence: 0.0,
                    reasoning: format!("Answer generation failed: {}", e),
                    parameters: HashMap::new(),
                    routed_intent: routed,
                };
            }
        };

        state = TurnState::Answered;
        tracing::debug!(?state, "turn complete");

        self.history.push(ChatTurn {
            role: Role::User,
            content: message.to_string(),
        });
        self.history.push(ChatTurn {
            role: Role::Assistant,
            content: answer.clone(),
        });

        ChatResponse {
            answer,
            intent: classification.intent,
            confidence: classification.confidence,
            reasoning: classification.reasoning,
            parameters: classification.parameters,
            routed_intent: routed,
        }
    }
}
