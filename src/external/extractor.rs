use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A medical condition extracted from a progress note. `detail` carries
/// whatever secondary field the backing model was asked for: a free-text
/// description for OpenAI, a billing-code string for Vertex AI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub name: String,
    pub detail: Option<String>,
}

/// Hosted-model condition extraction. One call per note; any transport or
/// parse failure surfaces as a single error, the caller decides whether to
/// skip the note or abort.
#[async_trait]
pub trait ConditionExtractor: Send + Sync {
    async fn extract_conditions(&self, note_text: &str) -> Result<Vec<Condition>>;
}

pub(crate) const SYSTEM_PROMPT: &str = r#"You are a clinical expert. Your job is to extract the medical condition(s) and their description from the given clinical progress note.

Your task:
- For each medical condition, provide a condition name and an optional description.
- Extract the conditions in the following format:
    [
        {"condition": "<condition_name>", "description": "<optional_description>"}
    ]

Example 1:
Clinical Progress Note:
"The patient presents with a history of hypertension and diabetes. Hypertension has been controlled with medication. Diabetes management includes insulin therapy."

Extracted conditions:
[
    {"condition": "Hypertension", "description": "Controlled with medication."},
    {"condition": "Diabetes", "description": "Managed with insulin therapy."}
]

Example 2:
Clinical Progress Note:
"Patient is experiencing chest pain, and has been diagnosed with chronic asthma."

Extracted conditions:
[
    {"condition": "Chest Pain", "description": "Patient is experiencing chest pain."},
    {"condition": "Asthma", "description": "Chronic condition affecting the airways."}
]"#;

pub(crate) fn user_prompt(note_text: &str) -> String {
    format!("Clinical Progress Note:\n{}", note_text)
}

/// Models sometimes wrap their structured output in a markdown code block
/// even when asked not to.
pub(crate) fn strip_code_fences(response: &str) -> &str {
    let trimmed = response.trim();
    let stripped = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    stripped.strip_suffix("```").unwrap_or(stripped).trim()
}
