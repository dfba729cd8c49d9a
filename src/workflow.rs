use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::external::{Condition, ConditionExtractor};
use crate::relevance::{check_hcc_relevance, RelevanceError, RelevantCondition};

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Unexpected workflow transition: {0}")]
    Routing(String),
}

/// States of the per-note workflow: extract, then either check relevance
/// or end, depending on the routing decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Extract,
    CheckRelevance,
    End,
}

/// Routing decision after extraction. Conditions found means the relevance
/// check runs next; an empty extraction ends the workflow.
pub fn route(conditions: &[Condition]) -> WorkflowState {
    if conditions.is_empty() {
        WorkflowState::End
    } else {
        WorkflowState::CheckRelevance
    }
}

/// Runs each progress note through the extract -> route -> check-relevance
/// state machine and aggregates relevant conditions across notes.
pub struct NoteWorkflow {
    extractor: Box<dyn ConditionExtractor>,
    hcc_codes_path: PathBuf,
}

impl NoteWorkflow {
    pub fn new(extractor: Box<dyn ConditionExtractor>, hcc_codes_path: impl Into<PathBuf>) -> Self {
        Self {
            extractor,
            hcc_codes_path: hcc_codes_path.into(),
        }
    }

    /// Run the state machine for a single note.
    pub async fn run_note(&self, note_text: &str) -> Result<Vec<RelevantCondition>> {
        let mut state = WorkflowState::Extract;
        let mut conditions: Option<Vec<Condition>> = None;
        let mut relevant = Vec::new();

        loop {
            state = match state {
                WorkflowState::Extract => {
                    let extracted = self.extractor.extract_conditions(note_text).await?;
                    info!("Extracted {} conditions", extracted.len());
                    let next = route(&extracted);
                    conditions = Some(extracted);
                    next
                }
                WorkflowState::CheckRelevance => {
                    let extracted = conditions.take().ok_or_else(|| {
                        WorkflowError::Routing(
                            "relevance check reached before extraction".to_string(),
                        )
                    })?;
                    let names: Vec<String> =
                        extracted.into_iter().map(|c| c.name).collect();
                    relevant = check_hcc_relevance(&names, &self.hcc_codes_path)?;
                    WorkflowState::End
                }
                WorkflowState::End => break,
            };
        }

        Ok(relevant)
    }

    /// Process every `.txt` note in the directory, sequentially. A note
    /// whose extraction fails is logged and skipped; a table-load or
    /// routing failure aborts the whole run.
    pub async fn run_directory(&self, notes_dir: &Path) -> Result<Vec<RelevantCondition>> {
        let mut all_relevant = Vec::new();

        for entry in WalkDir::new(notes_dir)
            .min_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("txt") {
                continue;
            }

            info!("Processing progress note {}", path.display());
            let note_text = match fs::read_to_string(path) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Skipping unreadable note {}: {}", path.display(), e);
                    continue;
                }
            };

            match self.run_note(&note_text).await {
                Ok(relevant) => {
                    info!(
                        "{} relevant conditions in {}",
                        relevant.len(),
                        path.display()
                    );
                    all_relevant.extend(relevant);
                }
                Err(e) if e.downcast_ref::<RelevanceError>().is_some()
                    || e.downcast_ref::<WorkflowError>().is_some() =>
                {
                    return Err(e);
                }
                Err(e) => {
                    warn!("Skipping note {}: {}", path.display(), e);
                }
            }
        }

        Ok(all_relevant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use mockall::mock;
    use std::fs;
    use tempfile::TempDir;

    mock! {
        pub Extractor {}

        #[async_trait]
        impl ConditionExtractor for Extractor {
            async fn extract_conditions(&self, note_text: &str) -> Result<Vec<Condition>>;
        }
    }

    fn condition(name: &str) -> Condition {
        Condition {
            name: name.to_string(),
            detail: None,
        }
    }

    fn write_sample_table(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("hcc_codes.csv");
        fs::write(
            &path,
            "condition,code\n\
             Gastroesophageal reflux disease,K21.9\n\
             Hypertension,I10\n",
        )
        .unwrap();
        path
    }

    #[test]
    fn test_route_with_conditions() {
        assert_eq!(route(&[condition("Hypertension")]), WorkflowState::CheckRelevance);
    }

    #[test]
    fn test_route_without_conditions() {
        assert_eq!(route(&[]), WorkflowState::End);
    }

    #[tokio::test]
    async fn test_run_note_extracts_and_matches() {
        let dir = TempDir::new().unwrap();
        let table = write_sample_table(&dir);

        let mut mock = MockExtractor::new();
        mock.expect_extract_conditions()
            .times(1)
            .returning(|_| Ok(vec![condition("Hypertension"), condition("Asthma")]));

        let workflow = NoteWorkflow::new(Box::new(mock), table);
        let relevant = workflow.run_note("Patient has hypertension.").await.unwrap();

        assert_eq!(relevant.len(), 1);
        assert_eq!(relevant[0].condition, "Hypertension");
        assert_eq!(relevant[0].hcc_codes, vec!["I10".to_string()]);
    }

    #[tokio::test]
    async fn test_run_note_without_conditions_skips_relevance_check() {
        let dir = TempDir::new().unwrap();

        let mut mock = MockExtractor::new();
        mock.expect_extract_conditions().times(1).returning(|_| Ok(vec![]));

        // The table path does not exist; the workflow must end without
        // touching it when nothing was extracted.
        let workflow = NoteWorkflow::new(Box::new(mock), dir.path().join("missing.csv"));
        let relevant = workflow.run_note("Routine checkup, no findings.").await.unwrap();

        assert!(relevant.is_empty());
    }

    #[tokio::test]
    async fn test_run_directory_continues_after_extraction_failure() {
        let dir = TempDir::new().unwrap();
        let table = write_sample_table(&dir);

        let notes = TempDir::new().unwrap();
        fs::write(notes.path().join("bad.txt"), "unparseable note").unwrap();
        fs::write(notes.path().join("good.txt"), "Patient has hypertension.").unwrap();
        fs::write(notes.path().join("ignored.md"), "not a note").unwrap();

        let mut mock = MockExtractor::new();
        mock.expect_extract_conditions()
            .times(2)
            .returning(|note_text| {
                if note_text.contains("unparseable") {
                    Err(anyhow!("API Error"))
                } else {
                    Ok(vec![condition("Hypertension")])
                }
            });

        let workflow = NoteWorkflow::new(Box::new(mock), table);
        let relevant = workflow.run_directory(notes.path()).await.unwrap();

        // The failing note is skipped, the rest of the run completes
        assert_eq!(relevant.len(), 1);
        assert_eq!(relevant[0].condition, "Hypertension");
    }

    #[tokio::test]
    async fn test_run_directory_table_error_is_fatal() {
        let notes = TempDir::new().unwrap();
        fs::write(notes.path().join("note.txt"), "Patient has hypertension.").unwrap();

        let mut mock = MockExtractor::new();
        mock.expect_extract_conditions()
            .times(1)
            .returning(|_| Ok(vec![condition("Hypertension")]));

        let workflow = NoteWorkflow::new(Box::new(mock), "/no/such/table.csv");
        let result = workflow.run_directory(notes.path()).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_run_directory_empty_dir_yields_empty_result() {
        let dir = TempDir::new().unwrap();
        let table = write_sample_table(&dir);
        let notes = TempDir::new().unwrap();

        let mock = MockExtractor::new();
        let workflow = NoteWorkflow::new(Box::new(mock), table);
        let relevant = workflow.run_directory(notes.path()).await.unwrap();

        assert!(relevant.is_empty());
    }
}
