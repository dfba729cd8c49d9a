use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum RelevanceError {
    #[error("Failed to read HCC codes table {path}: {source}")]
    TableLoad {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("HCC codes table {path} is missing the '{column}' column")]
    MissingColumn { path: String, column: &'static str },
}

/// One row of the HCC reference table: a free-text condition description
/// and the billing code associated with it.
#[derive(Debug, Clone, Deserialize)]
pub struct HccCodeEntry {
    pub condition: String,
    pub code: String,
}

/// A condition that matched at least one table row, with every matching
/// row's code in table order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelevantCondition {
    pub condition: String,
    pub hcc_codes: Vec<String>,
}

fn load_table(csv_path: &Path) -> Result<Vec<HccCodeEntry>, RelevanceError> {
    let table_load = |source| RelevanceError::TableLoad {
        path: csv_path.display().to_string(),
        source,
    };

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(csv_path)
        .map_err(table_load)?;

    let headers = reader.headers().map_err(table_load)?;
    for column in ["condition", "code"] {
        if !headers.iter().any(|h| h == column) {
            return Err(RelevanceError::MissingColumn {
                path: csv_path.display().to_string(),
                column,
            });
        }
    }

    let mut entries = Vec::new();
    for record in reader.deserialize() {
        entries.push(record.map_err(table_load)?);
    }

    Ok(entries)
}

/// Cross-reference extracted condition names against the HCC codes table.
///
/// A condition is relevant when at least one row's condition text contains
/// it, compared case-insensitively. Conditions with no match are dropped.
/// The table is loaded fresh on every call and never mutated.
pub fn check_hcc_relevance(
    conditions: &[String],
    csv_path: &Path,
) -> Result<Vec<RelevantCondition>, RelevanceError> {
    let entries = load_table(csv_path)?;
    debug!("Loaded {} HCC code entries from {}", entries.len(), csv_path.display());

    let mut relevant_conditions = Vec::new();
    for condition in conditions {
        let needle = condition.to_lowercase();
        let hcc_codes: Vec<String> = entries
            .iter()
            .filter(|entry| entry.condition.to_lowercase().contains(&needle))
            .map(|entry| entry.code.clone())
            .collect();

        if !hcc_codes.is_empty() {
            relevant_conditions.push(RelevantCondition {
                condition: condition.clone(),
                hcc_codes,
            });
        }
    }

    Ok(relevant_conditions)
}
