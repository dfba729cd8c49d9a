use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::external::error::ExtractionError;
use crate::external::extractor::{strip_code_fences, user_prompt, Condition, ConditionExtractor, SYSTEM_PROMPT};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VertexConfig {
    pub project_id: String,
    pub location: String,
    pub credentials_path: String,
    pub model: String,
}

impl VertexConfig {
    /// Regional generateContent endpoint for the configured model
    pub fn get_url(&self) -> Result<String> {
        let url = format!(
            "https://{}-aiplatform.googleapis.com/v1/projects/{}/locations/{}/publishers/google/models/{}:generateContent",
            self.location, self.project_id, self.location, self.model
        );

        // Validate the URL
        Url::parse(&url).map_err(|e| ExtractionError::ConfigError(format!("Invalid URL: {}", e)))?;

        Ok(url)
    }
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Vec<Candidate>,
}

/// Vertex AI-backed condition extraction. Same contract as the OpenAI
/// variant; the optional secondary field is a billing-code string instead
/// of a description.
pub struct VertexModel {
    client: Client,
    config: VertexConfig,
    url: String,
}

impl VertexModel {
    pub fn new(config: VertexConfig) -> Result<Self> {
        if config.project_id.is_empty() || config.location.is_empty() {
            return Err(ExtractionError::ConfigError(
                "Vertex AI project and location must be set".to_string(),
            )
            .into());
        }
        let url = config.get_url()?;

        Ok(Self {
            client: Client::new(),
            config,
            url,
        })
    }

    /// Mint a bearer token from the application-default credentials
    /// (GOOGLE_APPLICATION_CREDENTIALS is honored by gcloud).
    async fn access_token(&self) -> Result<String> {
        let output = tokio::process::Command::new("gcloud")
            .args(["auth", "application-default", "print-access-token"])
            .output()
            .await
            .map_err(|e| {
                ExtractionError::ConfigError(format!(
                    "Failed to obtain an access token via gcloud ({}): {}",
                    self.config.credentials_path, e
                ))
            })?;

        if !output.status.success() {
            return Err(ExtractionError::ConfigError(format!(
                "gcloud exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ))
            .into());
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn parse_conditions(content: &str) -> Result<Vec<Condition>> {
        #[derive(Debug, Deserialize)]
        struct ConditionPayload {
            condition: String,
            hcc_code: Option<String>,
        }

        let parsed: Vec<ConditionPayload> = serde_json::from_str(strip_code_fences(content))
            .map_err(|e| ExtractionError::MalformedResponse(format!("{}: {}", e, content)))?;

        Ok(parsed
            .into_iter()
            .map(|c| Condition {
                name: c.condition,
                detail: c.hcc_code,
            })
            .collect())
    }
}

#[async_trait]
impl ConditionExtractor for VertexModel {
    async fn extract_conditions(&self, note_text: &str) -> Result<Vec<Condition>> {
        let token = self.access_token().await?;

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(token)
            .json(&serde_json::json!({
                "systemInstruction": {
                    "parts": [{ "text": SYSTEM_PROMPT }]
                },
                "contents": [
                    {
                        "role": "user",
                        "parts": [{ "text": user_prompt(note_text) }]
                    }
                ],
                "generationConfig": {
                    "responseMimeType": "application/json",
                    "responseSchema": {
                        "type": "ARRAY",
                        "items": {
                            "type": "OBJECT",
                            "required": ["condition"],
                            "properties": {
                                "condition": {
                                    "type": "STRING"
                                },
                                "hcc_code": {
                                    "type": "STRING"
                                }
                            }
                        }
                    }
                }
            }))
            .send()
            .await
            .map_err(|e| ExtractionError::ApiError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ExtractionError::ApiError(format!("{}: {}", status, error_text)).into());
        }

        let generated: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ExtractionError::MalformedResponse(e.to_string()))?;

        let content = generated
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.as_str())
            .ok_or_else(|| ExtractionError::MalformedResponse("No candidates in response".to_string()))?;

        debug!("Model returned {} chars of structured output", content.len());

        Self::parse_conditions(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> VertexConfig {
        VertexConfig {
            project_id: "test-project".to_string(),
            location: "us-central1".to_string(),
            credentials_path: "/tmp/creds.json".to_string(),
            model: "gemini-1.5-pro".to_string(),
        }
    }

    #[test]
    fn test_url_generation() {
        let config = test_config();
        assert_eq!(
            config.get_url().unwrap(),
            "https://us-central1-aiplatform.googleapis.com/v1/projects/test-project/locations/us-central1/publishers/google/models/gemini-1.5-pro:generateContent"
        );
    }

    #[test]
    fn test_missing_project_rejected() {
        let mut config = test_config();
        config.project_id = String::new();
        assert!(VertexModel::new(config).is_err());
    }

    #[test]
    fn test_parse_conditions() {
        let content = r#"[
            {"condition": "Hypertension", "hcc_code": "I10"},
            {"condition": "Seasonal allergies"}
        ]"#;

        let conditions = VertexModel::parse_conditions(content).unwrap();
        assert_eq!(conditions.len(), 2);
        assert_eq!(conditions[0].name, "Hypertension");
        assert_eq!(conditions[0].detail.as_deref(), Some("I10"));
        assert_eq!(conditions[1].detail, None);
    }

    #[test]
    fn test_parse_conditions_rejects_object_root() {
        let content = r#"{"condition": "Hypertension"}"#;
        assert!(VertexModel::parse_conditions(content).is_err());
    }
}
