pub mod error;
mod extractor;
mod openai;
mod vertex;

pub use error::ExtractionError;
pub use extractor::{Condition, ConditionExtractor};
pub use openai::{OpenAIConfig, OpenAIModel};
pub use vertex::{VertexConfig, VertexModel};
