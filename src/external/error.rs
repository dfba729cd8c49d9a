use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Model API error: {0}")]
    ApiError(String),

    #[error("Malformed structured output: {0}")]
    MalformedResponse(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
