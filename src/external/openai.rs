use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::external::error::ExtractionError;
use crate::external::extractor::{strip_code_fences, user_prompt, Condition, ConditionExtractor, SYSTEM_PROMPT};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIConfig {
    pub api_key: String,
    pub model: String,
    pub endpoint: String,
}

impl OpenAIConfig {
    /// Get the base URL for the chat completions API
    pub fn get_url(&self) -> Result<String> {
        let url = if self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://") {
            self.endpoint.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", self.endpoint.trim_end_matches('/'))
        };

        // Validate the URL
        Url::parse(&url).map_err(|e| ExtractionError::ConfigError(format!("Invalid URL: {}", e)))?;

        Ok(url)
    }
}

/// OpenAI-backed condition extraction with schema-constrained output
pub struct OpenAIModel {
    client: Client,
    config: OpenAIConfig,
    base_url: String,
}

impl OpenAIModel {
    pub fn new(config: OpenAIConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(ExtractionError::ConfigError("OpenAI API key is empty".to_string()).into());
        }
        let base_url = config.get_url()?;

        Ok(Self {
            client: Client::new(),
            config,
            base_url,
        })
    }

    fn parse_conditions(content: &str) -> Result<Vec<Condition>> {
        #[derive(Debug, Deserialize)]
        struct ConditionPayload {
            condition: String,
            description: Option<String>,
        }

        #[derive(Debug, Deserialize)]
        struct ConditionList {
            conditions: Vec<ConditionPayload>,
        }

        let parsed: ConditionList = serde_json::from_str(strip_code_fences(content))
            .map_err(|e| ExtractionError::MalformedResponse(format!("{}: {}", e, content)))?;

        Ok(parsed
            .conditions
            .into_iter()
            .map(|c| Condition {
                name: c.condition,
                detail: c.description,
            })
            .collect())
    }
}

#[async_trait]
impl ConditionExtractor for OpenAIModel {
    async fn extract_conditions(&self, note_text: &str) -> Result<Vec<Condition>> {
        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&serde_json::json!({
                "model": &self.config.model,
                "messages": [
                    {
                        "role": "system",
                        "content": SYSTEM_PROMPT
                    },
                    {
                        "role": "user",
                        "content": user_prompt(note_text)
                    }
                ],
                "response_format": {
                    "type": "json_schema",
                    "json_schema": {
                        "name": "condition_list",
                        "strict": true,
                        "schema": {
                            "type": "object",
                            "required": ["conditions"],
                            "additionalProperties": false,
                            "properties": {
                                "conditions": {
                                    "type": "array",
                                    "items": {
                                        "type": "object",
                                        "required": ["condition"],
                                        "additionalProperties": false,
                                        "properties": {
                                            "condition": {
                                                "type": "string"
                                            },
                                            "description": {
                                                "type": "string"
                                            }
                                        }
                                    }
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

        #[derive(Debug, Deserialize)]
        struct ChatMessage {
            content: String,
        }

        #[derive(Debug, Deserialize)]
        struct ChatChoice {
            message: ChatMessage,
        }

        #[derive(Debug, Deserialize)]
        struct ChatResponse {
            choices: Vec<ChatChoice>,
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| ExtractionError::MalformedResponse(e.to_string()))?;

        let content = chat_response
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| ExtractionError::MalformedResponse("Empty choices in response".to_string()))?;

        debug!("Model returned {} chars of structured output", content.len());

        Self::parse_conditions(content)
    }
}
