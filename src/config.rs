use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

use crate::external::{OpenAIConfig, VertexConfig};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} environment variable is missing. Please set it in the .env file.")]
    Missing(&'static str),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub progress_note_path: String,
    pub hcc_codes_path: String,
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub openai: OpenAIConfig,
    pub vertex: VertexConfig,
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Load configuration from environment variables. Required values abort
    /// with a descriptive error before any file or network access happens.
    pub fn from_env() -> Result<Self, ConfigError> {
        let required = |name: &'static str| env::var(name).map_err(|_| ConfigError::Missing(name));

        // Load OpenAI config
        let openai = OpenAIConfig {
            api_key: required("OPENAI_API_KEY")?,
            model: env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-3.5-turbo-0125".to_string()),
            endpoint: env::var("OPENAI_ENDPOINT")
                .unwrap_or_else(|_| "https://api.openai.com".to_string()),
        };

        // Load Vertex AI config
        let vertex = VertexConfig {
            project_id: required("PROJECT_ID")?,
            location: required("LOCATION")?,
            credentials_path: required("GOOGLE_APPLICATION_CREDENTIALS")?,
            model: env::var("VERTEX_MODEL").unwrap_or_else(|_| "gemini-1.5-pro".to_string()),
        };

        // Load pipeline config
        let pipeline = PipelineConfig {
            progress_note_path: env::var("PROGRESS_NOTE_PATH")
                .unwrap_or_else(|_| "data/progress_notes".to_string()),
            hcc_codes_path: env::var("HCC_CODES_PATH")
                .unwrap_or_else(|_| "data/hcc_codes/HCC_relevant_codes.csv".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        };

        Ok(Self {
            openai,
            vertex,
            pipeline,
        })
    }
}
