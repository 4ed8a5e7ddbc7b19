//! Intent classification: raw utterance + history → requirement summary.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::sync::Arc;

use clixen_core::requirement::{ConversationTurn, RequirementSummary};

use crate::inference::{InferenceError, ModelInference};
use crate::parse::extract_json;

/// Maximum utterance length fed to the model; longer input is truncated to
/// bound prompt cost.
pub const MAX_UTTERANCE_CHARS: usize = 500;

/// How many trailing conversation turns are included in the prompt.
const MAX_HISTORY_TURNS: usize = 6;

/// Schema hint sent as the system message.
const CLASSIFY_SCHEMA: &str = "You extract workflow requirements from user requests. \
Respond with exactly one JSON object: \
{\"trigger\": string describing how the workflow starts, \
\"actions\": array of strings (one per distinct action, in order), \
\"integrations\": array of external service names}. \
No other text.";

/// Errors from intent classification. Retryable with backoff at the caller.
#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    /// The utterance was empty after trimming.
    #[error("Utterance is empty")]
    EmptyUtterance,

    /// The underlying model call failed.
    #[error("Classification inference failed: {0}")]
    Inference(#[from] InferenceError),

    /// The model responded but not in the expected shape.
    #[error("Classification output failed shape validation: {0}")]
    Shape(String),
}

/// Maps a user utterance plus conversation history to a
/// [`RequirementSummary`].
///
/// The complexity tier is derived locally from extracted feature counts,
/// never taken from the model.
pub struct IntentClassifier {
    model: Arc<dyn ModelInference>,
}

impl IntentClassifier {
    pub fn new(model: Arc<dyn ModelInference>) -> Self {
        Self { model }
    }

    /// Classify one utterance.
    pub async fn classify(
        &self,
        utterance: &str,
        history: &[ConversationTurn],
    ) -> Result<RequirementSummary, ClassifyError> {
        let trimmed = utterance.trim();
        if trimmed.is_empty() {
            return Err(ClassifyError::EmptyUtterance);
        }
        let bounded: String = trimmed.chars().take(MAX_UTTERANCE_CHARS).collect();

        let prompt = build_prompt(&bounded, history);
        let raw = self.model.infer(&prompt, CLASSIFY_SCHEMA).await?;
        let summary = parse_summary(&raw)?;

        tracing::debug!(
            trigger = %summary.trigger_description,
            actions = summary.actions.len(),
            integrations = summary.integrations.len(),
            tier = ?summary.tier,
            "Classified intent",
        );
        Ok(summary)
    }
}

/// Render the classification prompt from the bounded utterance and the tail
/// of the conversation.
fn build_prompt(utterance: &str, history: &[ConversationTurn]) -> String {
    let mut prompt = String::new();
    if !history.is_empty() {
        prompt.push_str("Conversation so far:\n");
        let skip = history.len().saturating_sub(MAX_HISTORY_TURNS);
        for turn in &history[skip..] {
            let _ = writeln!(prompt, "{}: {}", turn.role, turn.content);
        }
        prompt.push('\n');
    }
    let _ = write!(prompt, "Request: {utterance}");
    prompt
}

/// Parse and shape-check the model's JSON into a summary.
fn parse_summary(raw: &str) -> Result<RequirementSummary, ClassifyError> {
    let json = extract_json(raw)
        .ok_or_else(|| ClassifyError::Shape("response contained no JSON object".into()))?;

    let trigger = json
        .get("trigger")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ClassifyError::Shape("missing or empty 'trigger'".into()))?
        .to_string();

    let actions: Vec<String> = json
        .get("actions")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    let integrations: BTreeSet<String> = json
        .get("integrations")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    Ok(RequirementSummary::new(trigger, actions, integrations))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use clixen_core::requirement::ComplexityTier;

    use super::*;
    use crate::inference::PinnedModel;

    fn classifier(response: &str) -> (Arc<PinnedModel>, IntentClassifier) {
        let model = Arc::new(PinnedModel::single(response));
        let classifier = IntentClassifier::new(model.clone());
        (model, classifier)
    }

    const DIGEST_RESPONSE: &str = r#"{
        "trigger": "every day at 9am (schedule)",
        "actions": ["send email digest"],
        "integrations": []
    }"#;

    #[tokio::test]
    async fn classifies_daily_digest_as_simple_schedule() {
        let (_, classifier) = classifier(DIGEST_RESPONSE);
        let summary = classifier
            .classify("send me a daily 9am email digest", &[])
            .await
            .unwrap();
        assert!(summary.trigger_description.contains("schedule"));
        assert_eq!(summary.tier, ComplexityTier::Simple);
        assert_eq!(summary.actions, vec!["send email digest"]);
    }

    #[tokio::test]
    async fn empty_utterance_rejected_without_model_call() {
        let (model, classifier) = classifier(DIGEST_RESPONSE);
        let result = classifier.classify("   ", &[]).await;
        assert_matches!(result, Err(ClassifyError::EmptyUtterance));
        assert!(model.prompts().await.is_empty());
    }

    #[tokio::test]
    async fn overlong_utterance_is_truncated_in_prompt() {
        let (model, classifier) = classifier(DIGEST_RESPONSE);
        let long = "x".repeat(MAX_UTTERANCE_CHARS * 2);
        classifier.classify(&long, &[]).await.unwrap();
        let prompts = model.prompts().await;
        assert!(prompts[0].len() < MAX_UTTERANCE_CHARS + 50);
    }

    #[tokio::test]
    async fn missing_trigger_fails_shape_validation() {
        let (_, classifier) = classifier(r#"{"actions": ["x"], "integrations": []}"#);
        let result = classifier.classify("do something", &[]).await;
        assert_matches!(result, Err(ClassifyError::Shape(_)));
    }

    #[tokio::test]
    async fn non_json_response_fails_shape_validation() {
        let (_, classifier) = classifier("I would love to help you build a workflow!");
        let result = classifier.classify("do something", &[]).await;
        assert_matches!(result, Err(ClassifyError::Shape(_)));
    }

    #[tokio::test]
    async fn history_tail_appears_in_prompt() {
        let (model, classifier) = classifier(DIGEST_RESPONSE);
        let history = vec![
            ConversationTurn {
                role: "user".into(),
                content: "I want a digest".into(),
            },
            ConversationTurn {
                role: "assistant".into(),
                content: "What time?".into(),
            },
        ];
        classifier.classify("9am please", &history).await.unwrap();
        let prompts = model.prompts().await;
        assert!(prompts[0].contains("What time?"));
        assert!(prompts[0].contains("9am please"));
    }

    #[tokio::test]
    async fn many_integrations_classify_as_advanced() {
        let response = r#"{
            "trigger": "on webhook",
            "actions": ["fan out"],
            "integrations": ["a","b","c","d","e","f","g","h","i","j","k","l"]
        }"#;
        let (_, classifier) = classifier(response);
        let summary = classifier
            .classify("connect everything to everything", &[])
            .await
            .unwrap();
        assert_eq!(summary.tier, ComplexityTier::Advanced);
        assert_eq!(summary.integrations.len(), 12);
    }
}
