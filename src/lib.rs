pub mod config;
pub mod external;
pub mod relevance;
pub mod workflow;

pub use config::{Config, ConfigError};
pub use external::{Condition, ConditionExtractor, ExtractionError, OpenAIModel, VertexModel};
pub use relevance::{check_hcc_relevance, HccCodeEntry, RelevanceError, RelevantCondition};
pub use workflow::{route, NoteWorkflow, WorkflowError, WorkflowState};
