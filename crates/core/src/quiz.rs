use crate::error::CompletionError;
use crate::models::{QuizEntry, QuizPayload, QuizQuestion};
use crate::traits::CompletionClient;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub fn build_prompt(context: &str, question_count: usize) -> String {
    format!(
        "Generate {question_count} multiple-choice questions about '{context}'. \
         Respond in strict JSON array format (top-level array). \
         Each element must be an object with keys: question (string), \
         choices (object with keys A,B,C,D), answer (A/B/C/D), explanation (string). \
         Return only the JSON array (no surrounding text) if possible."
    )
}

/// Finds the first bracket-balanced `[...]` span in `text` and returns it
/// when it parses as JSON.
pub fn extract_first_json_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let mut depth = 0usize;

    for (offset, ch) in text[start..].char_indices() {
        match ch {
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    let candidate = &text[start..start + offset + 1];
                    return serde_json::from_str::<Value>(candidate)
                        .ok()
                        .map(|_| candidate);
                }
            }
            _ => {}
        }
    }

    None
}

/// Two-stage parse of model output: the whole text as JSON first, then the
/// first balanced array inside it. Only a top-level array is accepted.
pub fn parse_quiz_output(text: &str) -> Option<Vec<QuizEntry>> {
    let parsed = serde_json::from_str::<Value>(text).ok().or_else(|| {
        extract_first_json_array(text).and_then(|span| serde_json::from_str(span).ok())
    })?;

    match parsed {
        Value::Array(items) => Some(items.into_iter().map(into_entry).collect()),
        _ => None,
    }
}

fn into_entry(value: Value) -> QuizEntry {
    serde_json::from_value::<QuizEntry>(value.clone()).unwrap_or(QuizEntry::Unstructured(value))
}

fn mock_question(
    question: &str,
    choices: [&str; 4],
    answer: &str,
    explanation: &str,
) -> QuizQuestion {
    let choices = ["A", "B", "C", "D"]
        .into_iter()
        .zip(choices)
        .map(|(key, choice)| (key.to_string(), choice.to_string()))
        .collect::<BTreeMap<_, _>>();

    QuizQuestion {
        question: question.to_string(),
        choices,
        answer: answer.to_string(),
        explanation: explanation.to_string(),
    }
}

/// Canned questions served when the completion backend is unavailable.
pub fn mock_bank() -> Vec<QuizQuestion> {
    vec![
        mock_question(
            "What is supervised learning?",
            [
                "Learning without labels",
                "Learning from labeled data",
                "Learning from rewards only",
                "A type of clustering",
            ],
            "B",
            "Supervised learning uses labeled examples to train models.",
        ),
        mock_question(
            "Which algorithm is commonly used for classification?",
            ["K-means", "Linear regression", "Logistic regression", "PCA"],
            "C",
            "Logistic regression is widely used for binary classification.",
        ),
        mock_question(
            "What is overfitting?",
            [
                "Model fits training noise and fails on unseen data",
                "Model generalizes perfectly",
                "Model has too little capacity",
                "Model underfits training data",
            ],
            "A",
            "Overfitting happens when a model memorizes noise in training data.",
        ),
    ]
}

pub fn mock_payload(question_count: usize) -> QuizPayload {
    QuizPayload {
        from_mock: true,
        questions: mock_bank()
            .into_iter()
            .take(question_count)
            .map(QuizEntry::Question)
            .collect(),
    }
}

/// Turns retrieved context into quiz questions through a completion client.
///
/// With `use_mock` set, a missing client, a failed call and unparseable
/// output all fall back to [`mock_payload`]. Without it, the first two are
/// errors and unparseable output is returned as a single `raw_text` entry.
pub struct QuizGenerator {
    client: Option<Arc<dyn CompletionClient>>,
    use_mock: bool,
}

impl QuizGenerator {
    pub fn new(client: Option<Arc<dyn CompletionClient>>, use_mock: bool) -> Self {
        Self { client, use_mock }
    }

    pub fn use_mock(&self) -> bool {
        self.use_mock
    }

    pub async fn generate(
        &self,
        context: &str,
        question_count: usize,
    ) -> Result<QuizPayload, CompletionError> {
        let Some(client) = &self.client else {
            if self.use_mock {
                info!(question_count, "no completion client configured, returning mock quiz");
                return Ok(mock_payload(question_count));
            }
            return Err(CompletionError::Unavailable(
                "no completion client configured and mock fallback disabled".to_string(),
            ));
        };

        let prompt = build_prompt(context, question_count);
        let output = match client.complete(&prompt).await {
            Ok(output) => output,
            Err(failure) => {
                error!(backend = client.name(), error = %failure, "completion call failed");
                if self.use_mock {
                    info!(question_count, "returning mock quiz after completion failure");
                    return Ok(mock_payload(question_count));
                }
                return Err(failure);
            }
        };

        debug!(
            backend = client.name(),
            preview = %output.chars().take(400).collect::<String>(),
            "completion output"
        );

        match parse_quiz_output(&output) {
            Some(mut questions) => {
                questions.truncate(question_count);
                info!(backend = client.name(), parsed = questions.len(), "parsed quiz questions");
                Ok(QuizPayload {
                    from_mock: false,
                    questions,
                })
            }
            None if self.use_mock => {
                warn!(
                    backend = client.name(),
                    "completion output is not a JSON array, returning mock quiz"
                );
                Ok(mock_payload(question_count))
            }
            None => {
                warn!(
                    backend = client.name(),
                    "completion output is not a JSON array, returning raw text"
                );
                Ok(QuizPayload {
                    from_mock: false,
                    questions: vec![QuizEntry::Raw { raw_text: output }],
                })
            }
        }
    }
}
